//! Write phase group results in JSON format
//!

use std::fs::File;
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use log::info;
use serde::Serialize;
use unwrap::unwrap;

use crate::assembly::{AssemblyId, AssemblyOutcome, Junction, JunctionAssembly};
use crate::phase::assembly_link::AssemblyLink;
use crate::phase::phase_group::{PhaseGroup, PhaseGroupStatus};
use crate::phase::phase_set::PhaseSet;

#[derive(Serialize)]
struct AssemblySummary<'a> {
    id: AssemblyId,
    junction: &'a Junction,
    outcome: AssemblyOutcome,
    derived: bool,
    ref_base_length: usize,
    extension_length: usize,
    support_read_count: usize,
}

impl<'a> From<&'a JunctionAssembly> for AssemblySummary<'a> {
    fn from(assembly: &'a JunctionAssembly) -> Self {
        Self {
            id: assembly.id,
            junction: &assembly.junction,
            outcome: assembly.outcome,
            derived: assembly.derived,
            ref_base_length: assembly.ref_base_length(),
            extension_length: assembly.extension_length(),
            support_read_count: assembly.support.len(),
        }
    }
}

#[derive(Serialize)]
struct PhaseGroupRecord<'a> {
    id: usize,
    status: PhaseGroupStatus,
    assemblies: Vec<AssemblySummary<'a>>,
    phase_sets: &'a [PhaseSet],
    secondary_links: &'a [AssemblyLink],
}

impl<'a> From<&'a PhaseGroup> for PhaseGroupRecord<'a> {
    fn from(group: &'a PhaseGroup) -> Self {
        Self {
            id: group.id,
            status: group.status,
            assemblies: group.assemblies.iter().map(AssemblySummary::from).collect(),
            phase_sets: &group.phase_sets,
            secondary_links: &group.secondary_links,
        }
    }
}

fn write_phase_groups_to(writer: impl Write, groups: &[PhaseGroup]) -> serde_json::Result<()> {
    let records = groups.iter().map(PhaseGroupRecord::from).collect::<Vec<_>>();
    serde_json::to_writer_pretty(writer, &records)
}

/// Write all phase groups to a JSON array in `filename`
pub fn write_phase_groups(filename: &Utf8Path, groups: &[PhaseGroup]) {
    info!("Writing {} phase groups to file: '{filename}'", groups.len());

    let f = unwrap!(
        File::create(filename),
        "Unable to create phase group json file: '{}'",
        filename
    );
    let mut writer = BufWriter::new(f);
    unwrap!(
        write_phase_groups_to(&mut writer, groups),
        "Unable to write phase groups to file: '{}'",
        filename
    );
    unwrap!(
        writer.flush(),
        "Unable to write phase groups to file: '{}'",
        filename
    );
}
