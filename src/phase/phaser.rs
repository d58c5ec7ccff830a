//! Top-level phasing: group assemblies, build phase sets per group on a worker pool, then merge
//! phase sets across groups
//!

use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::mpsc::channel;

use log::{error, info, warn};
use serde::Serialize;
use simple_error::{SimpleResult, bail};

use super::junction_group::build_junction_groups;
use super::phase_group::{PhaseGroup, PhaseGroupStatus};
use super::phase_group_builder::{GroupingStats, build_phase_groups};
use super::phase_set_builder::{PhaseSetBuildStats, PhaseSetBuilder};
use super::phase_set_merger::{MergeStats, PhaseSetMerger};
use super::{GroupErrorPolicy, PhaseSettings};
use crate::assembly::{AssemblyId, JunctionAssembly};
use crate::genome_ref::RefGenomeSource;
use crate::read_source::RemoteReadSource;
use crate::seq_compare::SequenceComparator;

#[derive(Clone, Debug, Default, Serialize)]
pub struct PhasingStats {
    pub input_assemblies: usize,
    pub derived_assemblies: usize,
    pub junction_groups: usize,
    pub grouping: GroupingStats,
    pub phase_set_build: PhaseSetBuildStats,
    pub skipped_groups: usize,
    pub failed_groups: usize,
    pub phase_sets: usize,
    pub merge: MergeStats,
}

pub struct PhasingResult {
    /// Phase groups in id order
    pub groups: Vec<PhaseGroup>,
    pub stats: PhasingStats,
}

/// Build the phase sets of one group on the current worker thread
///
/// When read sources are given, the source owned by the current worker is used for remote region
/// re-anchoring.
///
fn build_group_phase_sets<R: RemoteReadSource + Send>(
    settings: &PhaseSettings,
    genome_ref: &dyn RefGenomeSource,
    comparator: &dyn SequenceComparator,
    read_sources: Option<&[Mutex<R>]>,
    next_id: &AtomicUsize,
    group: &mut PhaseGroup,
) -> (SimpleResult<()>, PhaseSetBuildStats) {
    let mut reader =
        read_sources.map(|x| x[rayon::current_thread_index().unwrap()].lock().unwrap());
    let read_source = reader
        .as_deref_mut()
        .map(|x| x as &mut dyn RemoteReadSource);
    let mut builder = PhaseSetBuilder::new(settings, genome_ref, comparator, read_source, next_id);
    let result = builder.build_phase_sets(group);
    (result, builder.stats)
}

/// Move each assembly into its phase group
fn distribute_assemblies(
    assemblies: Vec<JunctionAssembly>,
    group_ids: Vec<Vec<AssemblyId>>,
) -> Vec<PhaseGroup> {
    let mut slots = assemblies.into_iter().map(Some).collect::<Vec<_>>();
    group_ids
        .into_iter()
        .enumerate()
        .map(|(group_id, ids)| {
            let members = ids
                .into_iter()
                .filter_map(|x| slots.get_mut(x.0).and_then(|x| x.take()))
                .collect();
            PhaseGroup::new(group_id, members)
        })
        .collect()
}

/// Phase all assemblies
///
/// `assemblies` must be indexed by assembly id. `read_sources` should hold one source per worker
/// thread; without it, remote region re-anchoring is skipped.
///
pub fn run_phasing<R: RemoteReadSource + Send>(
    settings: &PhaseSettings,
    genome_ref: &dyn RefGenomeSource,
    comparator: &dyn SequenceComparator,
    read_sources: Option<&[Mutex<R>]>,
    assemblies: Vec<JunctionAssembly>,
    thread_count: usize,
) -> SimpleResult<PhasingResult> {
    for (index, assembly) in assemblies.iter().enumerate() {
        if assembly.id.0 != index {
            bail!(
                "Assembly id {} does not match its input index {index}",
                assembly.id
            );
        }
    }
    let read_source_count = read_sources.map_or(thread_count, |x| x.len());
    if read_source_count < thread_count {
        bail!(
            "Only {} read sources provided for {} worker threads",
            read_source_count,
            thread_count
        );
    }

    let mut stats = PhasingStats {
        input_assemblies: assemblies.len(),
        ..Default::default()
    };

    let junction_groups = build_junction_groups(&assemblies, settings.junction_group_distance);
    stats.junction_groups = junction_groups.len();
    info!(
        "Formed {} junction groups from {} assemblies",
        junction_groups.len(),
        assemblies.len()
    );

    let (group_ids, grouping_stats) = build_phase_groups(
        settings,
        comparator,
        &assemblies,
        &junction_groups,
        thread_count,
    );
    stats.grouping = grouping_stats;

    let next_id = AtomicUsize::new(assemblies.len());
    let mut pending_groups = Vec::new();
    let mut groups = Vec::new();
    for mut group in distribute_assemblies(assemblies, group_ids) {
        if group.assembly_count() > settings.phase_processing_limit {
            warn!(
                "Skipping phase group {} with {} assemblies, over the processing limit of {}",
                group.id,
                group.assembly_count(),
                settings.phase_processing_limit
            );
            group.status = PhaseGroupStatus::SkippedOverLimit;
            stats.skipped_groups += 1;
            groups.push(group);
        } else {
            pending_groups.push(group);
        }
    }

    info!("Building phase sets in {} phase groups", pending_groups.len());
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .unwrap();
    let next_id = &next_id;
    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for mut group in pending_groups {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let (result, build_stats) = build_group_phase_sets(
                    settings,
                    genome_ref,
                    comparator,
                    read_sources,
                    next_id,
                    &mut group,
                );
                tx.send((group, result, build_stats)).unwrap();
            });
        }
    });

    let mut first_error = None;
    for (mut group, result, build_stats) in rx {
        stats.phase_set_build.merge(&build_stats);
        if let Err(e) = result {
            error!(
                "Failed to build phase sets for phase group {}: {e}\n{}",
                group.id,
                group.dump()
            );
            match settings.group_error_policy {
                GroupErrorPolicy::Abort => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                GroupErrorPolicy::Skip => {
                    group.phase_sets.clear();
                    group.secondary_links.clear();
                    group.status = PhaseGroupStatus::Failed;
                    stats.failed_groups += 1;
                }
            }
        }
        groups.push(group);
    }
    if let Some(e) = first_error {
        bail!("Phasing aborted: {}", e);
    }

    groups.sort_by_key(|x| x.id);

    let mut phase_set_id = 0;
    for group in groups.iter_mut() {
        for phase_set in group.phase_sets.iter_mut() {
            phase_set.id = phase_set_id;
            phase_set_id += 1;
        }
    }
    stats.phase_sets = phase_set_id;
    stats.derived_assemblies = groups
        .iter()
        .flat_map(|x| x.assemblies.iter())
        .filter(|x| x.derived)
        .count();

    info!("Merging {} phase sets", stats.phase_sets);
    let merger = PhaseSetMerger::new(settings, comparator);
    stats.merge = merger.merge_phase_sets(&mut groups);
    info!(
        "Merged {} of {} candidate phase sets",
        stats.merge.merged_phase_sets, stats.merge.candidate_phase_sets
    );

    Ok(PhasingResult { groups, stats })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::assembly::test_utils::*;
    use crate::assembly::{AssemblyOutcome, Orientation, RemoteRegion, SupportRead};
    use crate::genome_ref::GenomeRef;
    use crate::read_source::test_utils::TestReadSource;
    use crate::seq_compare::QualRepeatComparator;

    struct FailingReadSource;

    impl RemoteReadSource for FailingReadSource {
        fn get_region_reads(
            &mut self,
            chromosome: &str,
            _start: i64,
            _end: i64,
            _read_ids: &HashSet<String>,
        ) -> SimpleResult<Vec<SupportRead>> {
            bail!("Can't read region on {}", chromosome)
        }
    }

    fn get_test_ref(seq: &[u8]) -> GenomeRef {
        let mut chroms = HashMap::new();
        chroms.insert("chr1".to_string(), seq.to_vec());
        GenomeRef { chroms }
    }

    /// Deletions [200, 1000) and [1101, 1500) joined through a templated segment, plus an
    /// unrelated assembly
    fn get_test_assemblies(reference: &[u8]) -> Vec<JunctionAssembly> {
        let mut a = test_assembly(
            0,
            "chr1",
            199,
            Orientation::Forward,
            &[&reference[150..200], &reference[1000..1030]].concat(),
            49,
        );
        let mut b = test_assembly(
            1,
            "chr1",
            1000,
            Orientation::Reverse,
            &[&reference[170..200], &reference[1000..1101]].concat(),
            30,
        );
        let mut c = test_assembly(
            2,
            "chr1",
            1100,
            Orientation::Forward,
            &[&reference[1000..1101], &reference[1500..1530]].concat(),
            100,
        );
        let mut d = test_assembly(
            3,
            "chr1",
            1500,
            Orientation::Reverse,
            &[&reference[1070..1101], &reference[1500..1560]].concat(),
            31,
        );
        let e = test_assembly(
            4,
            "chr1",
            1799,
            Orientation::Forward,
            &[&reference[1700..1800], &random_seq(40, 77)].concat(),
            99,
        );

        a.support.push(test_read("f1", "chr1", 120, Orientation::Forward));
        a.support.push(test_read("s1", "chr1", 130, Orientation::Forward));
        b.support.push(test_read("s1", "chr1", 1000, Orientation::Reverse));
        b.support.push(test_read("t1", "chr1", 1010, Orientation::Forward));
        let mut mate = test_read("t1", "chr1", 1050, Orientation::Reverse);
        mate.first_in_pair = false;
        c.support.push(mate);
        c.support.push(test_read("f1", "chr1", 1040, Orientation::Reverse));
        c.support.push(test_read("s2", "chr1", 1060, Orientation::Forward));
        d.support.push(test_read("s2", "chr1", 1500, Orientation::Reverse));

        vec![a, b, c, d, e]
    }

    #[test]
    fn test_run_phasing() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 5);
        let genome_ref = get_test_ref(&reference);

        let result = run_phasing::<TestReadSource>(
            &settings,
            &genome_ref,
            &comparator,
            None,
            get_test_assemblies(&reference),
            2,
        )
        .unwrap();

        assert_eq!(result.groups.len(), 2);
        let group = &result.groups[0];
        assert_eq!(group.status, PhaseGroupStatus::Built);
        assert_eq!(group.assembly_count(), 4);
        assert_eq!(group.phase_sets.len(), 1);
        assert_eq!(group.phase_sets[0].assembly_count(), 4);
        let full_sequence = group.phase_sets[0].full_sequence.as_ref().unwrap();
        assert_eq!(
            full_sequence.bases,
            [
                &reference[150..200],
                &reference[1000..1101],
                &reference[1500..1560]
            ]
            .concat()
        );

        let singleton = &result.groups[1];
        assert_eq!(singleton.assembly_count(), 1);
        assert!(singleton.phase_sets.is_empty());
        assert_eq!(singleton.assemblies[0].id, AssemblyId(4));
        assert_eq!(singleton.assemblies[0].outcome, AssemblyOutcome::Unset);

        assert_eq!(result.stats.input_assemblies, 5);
        assert_eq!(result.stats.phase_sets, 1);
        assert_eq!(result.stats.phase_set_build.split_links, 2);
        assert_eq!(result.stats.phase_set_build.facing_links, 1);
        assert_eq!(result.stats.merge.merged_phase_sets, 0);
    }

    #[test]
    fn test_processing_limit() {
        let settings = PhaseSettings {
            phase_processing_limit: 3,
            ..Default::default()
        };
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 5);
        let genome_ref = get_test_ref(&reference);

        let result = run_phasing::<TestReadSource>(
            &settings,
            &genome_ref,
            &comparator,
            None,
            get_test_assemblies(&reference),
            1,
        )
        .unwrap();
        assert_eq!(result.groups[0].status, PhaseGroupStatus::SkippedOverLimit);
        assert!(result.groups[0].phase_sets.is_empty());
        assert_eq!(result.groups[1].status, PhaseGroupStatus::Built);
        assert_eq!(result.stats.skipped_groups, 1);
    }

    fn get_remote_assembly(reference: &[u8]) -> JunctionAssembly {
        let mut assembly = test_assembly(
            0,
            "chr1",
            199,
            Orientation::Forward,
            &[&reference[100..200], &random_seq(50, 91)].concat(),
            99,
        );
        for id in ["r1", "r2"] {
            assembly
                .support
                .push(test_read(id, "chr1", 120, Orientation::Forward));
        }
        assembly.remote_regions.push(RemoteRegion {
            chromosome: "chr2".to_string(),
            start: 5000,
            end: 5400,
            orientation: Orientation::Reverse,
            read_ids: vec!["r1".to_string(), "r2".to_string()],
        });
        assembly
    }

    #[test]
    fn test_group_error_policy() {
        let reference = random_seq(2000, 5);
        let genome_ref = get_test_ref(&reference);
        let read_sources = [Mutex::new(FailingReadSource)];

        let settings = PhaseSettings {
            group_error_policy: GroupErrorPolicy::Skip,
            ..Default::default()
        };
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let result = run_phasing(
            &settings,
            &genome_ref,
            &comparator,
            Some(&read_sources[..]),
            vec![get_remote_assembly(&reference)],
            1,
        )
        .unwrap();
        assert_eq!(result.groups[0].status, PhaseGroupStatus::Failed);
        assert_eq!(result.stats.failed_groups, 1);

        let settings = PhaseSettings::default();
        assert!(
            run_phasing(
                &settings,
                &genome_ref,
                &comparator,
                Some(&read_sources[..]),
                vec![get_remote_assembly(&reference)],
                1,
            )
            .is_err()
        );
    }

    #[test]
    fn test_assembly_ids_must_match_index() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 5);
        let genome_ref = get_test_ref(&reference);

        let mut assemblies = get_test_assemblies(&reference);
        assemblies.swap(0, 1);
        assert!(
            run_phasing::<TestReadSource>(
                &settings,
                &genome_ref,
                &comparator,
                None,
                assemblies,
                1,
            )
            .is_err()
        );
    }
}
