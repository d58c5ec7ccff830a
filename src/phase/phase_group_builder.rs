//! Group assemblies into phase groups from local and remote phasing evidence
//!

use std::sync::mpsc::channel;

use log::{debug, info};
use serde::Serialize;

use super::PhaseSettings;
use super::assembly_linker::AssemblyLinker;
use super::junction_group::{JunctionGroup, JunctionGroupIndex};
use super::local_group_builder::find_local_phasing_evidence;
use super::phase_group::PhaseGroupTable;
use super::remote_group_builder::{find_remote_phasing_evidence, has_remote_evidence};
use crate::assembly::{AssemblyId, JunctionAssembly};
use crate::seq_compare::SequenceComparator;

#[derive(Clone, Debug, Default, Serialize)]
pub struct GroupingStats {
    pub local_evidence_pairs: usize,
    pub remote_evidence_pairs: usize,

    /// Groups merged into other groups during grouping
    pub merged_groups: usize,

    pub phase_groups: usize,
    pub singleton_groups: usize,
}

/// Apply all evidence received from one grouping stage, then sweep merged groups
fn apply_evidence(
    table: &mut PhaseGroupTable,
    evidence: impl IntoIterator<Item = Vec<(AssemblyId, AssemblyId)>>,
) -> (usize, usize) {
    let mut pair_count = 0;
    for pairs in evidence {
        for (a1, a2) in pairs {
            pair_count += 1;
            table.link_to_phase_groups(a1, a2);
        }
    }
    let merged = table.sweep_removed_groups();
    debug!(
        "Applied {} evidence pairs, {} groups merged, {} multi-assembly groups",
        pair_count,
        merged,
        table.group_count()
    );
    (pair_count, merged)
}

/// Partition all assemblies into phase groups
///
/// Local evidence is found per junction group, and remote evidence per assembly, on a worker pool
/// of `thread_count` threads. Workers only report evidence pairs; every group membership change is
/// applied on the calling thread. `assemblies` must be indexed by assembly id.
///
/// Returns the member ids of each phase group, with every assembly in exactly one group.
///
pub fn build_phase_groups(
    settings: &PhaseSettings,
    comparator: &dyn SequenceComparator,
    assemblies: &[JunctionAssembly],
    junction_groups: &[JunctionGroup],
    thread_count: usize,
) -> (Vec<Vec<AssemblyId>>, GroupingStats) {
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .unwrap();

    let mut stats = GroupingStats::default();
    let mut table = PhaseGroupTable::new(assemblies.len());

    info!(
        "Finding local phasing evidence in {} junction groups",
        junction_groups.len()
    );
    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for junction_group in junction_groups.iter() {
            if junction_group.assembly_ids.len() < 2 {
                continue;
            }
            let tx = tx.clone();
            scope.spawn(move |_| {
                let linker = AssemblyLinker::new(settings, comparator);
                let members = junction_group
                    .assembly_ids
                    .iter()
                    .map(|x| &assemblies[x.0])
                    .collect::<Vec<_>>();
                tx.send(find_local_phasing_evidence(&linker, &members))
                    .unwrap();
            });
        }
    });
    let (pair_count, merged) = apply_evidence(&mut table, rx);
    stats.local_evidence_pairs = pair_count;
    stats.merged_groups += merged;

    info!("Finding remote phasing evidence");
    let group_index = JunctionGroupIndex::new(junction_groups);
    let group_index = &group_index;
    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for assembly in assemblies.iter().filter(|x| has_remote_evidence(x)) {
            let tx = tx.clone();
            scope.spawn(move |_| {
                tx.send(find_remote_phasing_evidence(
                    settings,
                    assembly,
                    assemblies,
                    junction_groups,
                    group_index,
                ))
                .unwrap();
            });
        }
    });
    let (pair_count, merged) = apply_evidence(&mut table, rx);
    stats.remote_evidence_pairs = pair_count;
    stats.merged_groups += merged;

    let groups = table.finalize();
    stats.phase_groups = groups.len();
    stats.singleton_groups = groups.iter().filter(|x| x.len() == 1).count();
    info!(
        "Formed {} phase groups, {} with a single assembly",
        stats.phase_groups, stats.singleton_groups
    );
    (groups, stats)
}
