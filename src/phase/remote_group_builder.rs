//! Find phasing evidence between an assembly and assemblies in the junction groups its remote
//! regions or ref-side soft clips point to
//!

use std::collections::HashSet;

use super::PhaseSettings;
use super::junction_group::{JunctionGroup, JunctionGroupIndex};
use crate::assembly::read_sharing::assemblies_share_reads;
use crate::assembly::{AssemblyId, JunctionAssembly};
use crate::int_range::IntRange;

/// True if the assembly has any remote evidence to follow
pub fn has_remote_evidence(assembly: &JunctionAssembly) -> bool {
    !assembly.remote_regions.is_empty() || !assembly.ref_side_soft_clips.is_empty()
}

/// Genomic regions implicated by an assembly's remote regions and ref-side soft clips
fn get_evidence_regions(
    settings: &PhaseSettings,
    assembly: &JunctionAssembly,
) -> Vec<(String, IntRange)> {
    let mut regions = assembly
        .remote_regions
        .iter()
        .map(|x| (x.chromosome.clone(), x.range()))
        .collect::<Vec<_>>();
    let tolerance = settings.ref_side_soft_clip_tolerance;
    regions.extend(assembly.ref_side_soft_clips.iter().map(|x| {
        (
            assembly.junction.chromosome.clone(),
            IntRange::from_pair(x.position - tolerance, x.position + tolerance + 1),
        )
    }));
    regions
}

/// Pair `assembly` with every assembly in an overlapping junction group that shares enough reads
///
/// `assemblies` is indexed by assembly id.
///
pub fn find_remote_phasing_evidence(
    settings: &PhaseSettings,
    assembly: &JunctionAssembly,
    assemblies: &[JunctionAssembly],
    junction_groups: &[JunctionGroup],
    group_index: &JunctionGroupIndex,
) -> Vec<(AssemblyId, AssemblyId)> {
    let mut tested = HashSet::new();
    let mut evidence = Vec::new();
    for (chromosome, range) in get_evidence_regions(settings, assembly) {
        for jg_index in group_index.find_overlapping(junction_groups, &chromosome, &range) {
            for &other_id in junction_groups[jg_index].assembly_ids.iter() {
                if other_id == assembly.id || !tested.insert(other_id) {
                    continue;
                }
                let other = &assemblies[other_id.0];
                if assemblies_share_reads(
                    assembly,
                    other,
                    settings.remote_min_shared_reads,
                    &settings.fragment_check_budget,
                ) {
                    evidence.push((assembly.id, other_id));
                }
            }
        }
    }
    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::test_utils::*;
    use crate::assembly::{Orientation, RemoteRegion};
    use crate::phase::junction_group::build_junction_groups;

    #[test]
    fn test_remote_evidence() {
        let settings = PhaseSettings::default();
        let bases = [b'A'; 41];
        let mut assemblies = vec![
            test_assembly(0, "chr1", 1000, Orientation::Forward, &bases, 20),
            test_assembly(1, "chr2", 5100, Orientation::Reverse, &bases, 20),
            test_assembly(2, "chr2", 5300, Orientation::Forward, &bases, 20),
            test_assembly(3, "chr2", 9000, Orientation::Reverse, &bases, 20),
        ];
        assemblies[0].remote_regions.push(RemoteRegion {
            chromosome: "chr2".to_string(),
            start: 5000,
            end: 5400,
            orientation: Orientation::Reverse,
            read_ids: vec!["r1".to_string(), "r2".to_string()],
        });
        for id in ["r1", "r2"] {
            assemblies[0]
                .support
                .push(test_read(id, "chr1", 900, Orientation::Forward));
            assemblies[1]
                .candidate_support
                .push(test_read(id, "chr2", 5200, Orientation::Reverse));
            assemblies[3]
                .support
                .push(test_read(id, "chr2", 9000, Orientation::Reverse));
        }
        // One shared read only
        assemblies[2]
            .support
            .push(test_read("r1", "chr2", 5300, Orientation::Reverse));

        let junction_groups = build_junction_groups(&assemblies, settings.junction_group_distance);
        let index = JunctionGroupIndex::new(&junction_groups);

        assert!(has_remote_evidence(&assemblies[0]));
        assert!(!has_remote_evidence(&assemblies[1]));
        let evidence = find_remote_phasing_evidence(
            &settings,
            &assemblies[0],
            &assemblies,
            &junction_groups,
            &index,
        );
        assert_eq!(evidence, vec![(AssemblyId(0), AssemblyId(1))]);
    }
}
