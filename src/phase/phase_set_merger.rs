//! Merge phase sets whose full sequences overlap
//!

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use super::PhaseSettings;
use super::junction_sequence::JunctionSequence;
use super::phase_group::PhaseGroup;
use super::phase_set::AssemblyPlacement;
use super::sequence_search::{find_best_sequence_match, find_exact, find_seed_shifts};
use crate::assembly::AssemblyId;
use crate::seq_compare::SequenceComparator;
use crate::seq_util::rev_comp;

#[derive(Clone, Debug, Default, Serialize)]
pub struct MergeStats {
    pub candidate_phase_sets: usize,
    pub merged_phase_sets: usize,
}

/// Alignment of a secondary full sequence onto a primary full sequence
#[derive(Debug, PartialEq)]
struct MergeMatch {
    /// Primary index of the first base of the oriented secondary sequence
    shift: i64,

    /// True if the secondary sequence is reverse complemented
    reversed: bool,

    penalty: u32,
}

/// Location of one phase set within the group list
#[derive(Clone, Copy)]
struct PhaseSetLocation {
    group_index: usize,
    set_index: usize,
}

/// Map a full sequence coordinate of the secondary into the merged frame
fn remap_index(index: i64, length: i64, secondary_length: i64, reversed: bool, shift: i64) -> i64 {
    let index = if reversed {
        secondary_length - index - length
    } else {
        index
    };
    index + shift
}

pub struct PhaseSetMerger<'a> {
    settings: &'a PhaseSettings,
    comparator: &'a dyn SequenceComparator,
}

impl<'a> PhaseSetMerger<'a> {
    pub fn new(settings: &'a PhaseSettings, comparator: &'a dyn SequenceComparator) -> Self {
        Self {
            settings,
            comparator,
        }
    }

    /// Find an end-to-end overlap, or containment, of `secondary` in `primary`
    ///
    /// The secondary is tried in both orientations. The whole overlapping region must align
    /// within the mismatch budget.
    ///
    fn find_merge_match(&self, primary: &[u8], secondary: &[u8]) -> Option<MergeMatch> {
        let qual = self.settings.synthetic_base_qual;
        let mut best: Option<MergeMatch> = None;
        for reversed in [false, true] {
            let oriented = if reversed {
                rev_comp(secondary)
            } else {
                secondary.to_vec()
            };
            if let Some(pos) = find_exact(&oriented, primary) {
                return Some(MergeMatch {
                    shift: pos as i64,
                    reversed,
                    penalty: 0,
                });
            }

            let first = JunctionSequence::from_raw(&oriented, false, qual);
            let second = JunctionSequence::from_raw(primary, false, qual);
            let min_overlap = self.settings.merge_min_overlap;
            let shifts = find_seed_shifts(
                &first,
                &second,
                self.settings.merge_subsequence_length,
                min_overlap,
            );
            let Some(seq_match) = find_best_sequence_match(
                &first,
                &second,
                min_overlap,
                &shifts,
                self.settings.merge_max_mismatch_penalty,
                self.comparator,
            ) else {
                continue;
            };
            if seq_match.index_diff != 0 {
                continue;
            }

            let shift = seq_match.shift();
            let overlap_start = (-shift).max(0) as usize;
            let overlap_end = (oriented.len() as i64).min(primary.len() as i64 - shift) as usize;
            if seq_match.first_start != overlap_start
                || seq_match.first_start + seq_match.length != overlap_end
            {
                continue;
            }

            let candidate = MergeMatch {
                shift,
                reversed,
                penalty: seq_match.penalty,
            };
            if best.as_ref().is_none_or(|x| candidate.penalty < x.penalty) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Merge every pair of valid phase sets whose full sequences overlap
    ///
    /// Longer phase sets act as primaries and absorb shorter ones. An absorbed phase set keeps its
    /// links, and records the id of the primary in `merged_into`. The placements of its
    /// assemblies move to the primary full sequence, and their read full sequence indexes are
    /// re-mapped to the merged frame.
    ///
    pub fn merge_phase_sets(&self, groups: &mut [PhaseGroup]) -> MergeStats {
        let mut locations = Vec::new();
        for (group_index, group) in groups.iter().enumerate() {
            for (set_index, phase_set) in group.phase_sets.iter().enumerate() {
                if phase_set.full_sequence.is_some() && phase_set.merged_into.is_none() {
                    locations.push(PhaseSetLocation {
                        group_index,
                        set_index,
                    });
                }
            }
        }
        let seq_length = |groups: &[PhaseGroup], x: &PhaseSetLocation| {
            groups[x.group_index].phase_sets[x.set_index]
                .full_sequence
                .as_ref()
                .map_or(0, |x| x.bases.len())
        };
        locations.sort_by_key(|x| std::cmp::Reverse(seq_length(&*groups, x)));

        let mut assembly_groups = HashMap::new();
        for (group_index, group) in groups.iter().enumerate() {
            for assembly in group.assemblies.iter() {
                assembly_groups.insert(assembly.id, group_index);
            }
        }

        let mut stats = MergeStats {
            candidate_phase_sets: locations.len(),
            ..Default::default()
        };
        let mut absorbed = vec![false; locations.len()];
        for i in 0..locations.len() {
            if absorbed[i] {
                continue;
            }
            for j in (i + 1)..locations.len() {
                if absorbed[j] {
                    continue;
                }
                let (primary, secondary) = (locations[i], locations[j]);
                let merge_match = {
                    let get_bases = |x: PhaseSetLocation| {
                        groups[x.group_index].phase_sets[x.set_index]
                            .full_sequence
                            .as_ref()
                            .map(|x| x.bases.as_slice())
                    };
                    let (Some(primary_bases), Some(secondary_bases)) =
                        (get_bases(primary), get_bases(secondary))
                    else {
                        continue;
                    };
                    self.find_merge_match(primary_bases, secondary_bases)
                };
                if let Some(merge_match) = merge_match {
                    apply_merge(groups, &assembly_groups, primary, secondary, &merge_match);
                    absorbed[j] = true;
                    stats.merged_phase_sets += 1;
                }
            }
        }
        stats
    }
}

/// Extend the primary full sequence with the secondary, and move secondary placements and read
/// indexes into the merged frame
fn apply_merge(
    groups: &mut [PhaseGroup],
    assembly_groups: &HashMap<AssemblyId, usize>,
    primary: PhaseSetLocation,
    secondary: PhaseSetLocation,
    merge_match: &MergeMatch,
) {
    let secondary_set = &groups[secondary.group_index].phase_sets[secondary.set_index];
    let secondary_id = secondary_set.id;
    let Some(secondary_seq) = secondary_set.full_sequence.clone() else {
        return;
    };
    let primary_set = &groups[primary.group_index].phase_sets[primary.set_index];
    let primary_id = primary_set.id;
    let Some(primary_seq) = primary_set.full_sequence.clone() else {
        return;
    };

    let oriented = if merge_match.reversed {
        rev_comp(&secondary_seq.bases)
    } else {
        secondary_seq.bases.clone()
    };
    let shift = merge_match.shift;
    let primary_length = primary_seq.bases.len() as i64;
    let secondary_length = oriented.len() as i64;
    let prepend_length = (-shift).max(0);
    let append_start = primary_length - shift;

    let mut bases = oriented[..prepend_length as usize].to_vec();
    bases.extend_from_slice(&primary_seq.bases);
    if append_start < secondary_length {
        bases.extend_from_slice(&oriented[append_start as usize..]);
    }

    // Shift everything already in the primary frame
    let mut placements = Vec::new();
    for placement in primary_seq.placements.iter() {
        placements.push(AssemblyPlacement {
            offset: placement.offset + prepend_length,
            ..placement.clone()
        });
        if prepend_length == 0 {
            continue;
        }
        let Some(&group_index) = assembly_groups.get(&placement.assembly_id) else {
            continue;
        };
        let group = &mut groups[group_index];
        if let Some(index) = group.assembly_index(placement.assembly_id) {
            for read in group.assemblies[index].support.iter_mut() {
                if let Some(x) = read.full_seq_index.as_mut() {
                    *x += prepend_length;
                }
            }
        }
    }

    let merged_shift = shift + prepend_length;
    for placement in secondary_seq.placements.iter() {
        let Some(&group_index) = assembly_groups.get(&placement.assembly_id) else {
            continue;
        };
        let group = &mut groups[group_index];
        let Some(index) = group.assembly_index(placement.assembly_id) else {
            continue;
        };
        let assembly = &mut group.assemblies[index];
        placements.push(AssemblyPlacement {
            assembly_id: placement.assembly_id,
            offset: remap_index(
                placement.offset,
                assembly.base_length() as i64,
                secondary_length,
                merge_match.reversed,
                merged_shift,
            ),
            reversed: placement.reversed != merge_match.reversed,
        });
        for read in assembly.support.iter_mut() {
            let Some(full_seq_index) = read.full_seq_index else {
                continue;
            };
            read.full_seq_index = Some(remap_index(
                full_seq_index,
                read.read_length(),
                secondary_length,
                merge_match.reversed,
                merged_shift,
            ));
            read.full_seq_reversed = read.full_seq_reversed != merge_match.reversed;
        }
    }

    debug!(
        "Merged phase set {} into {} with shift {} reversed {}",
        secondary_id, primary_id, shift, merge_match.reversed
    );

    let primary_set = &mut groups[primary.group_index].phase_sets[primary.set_index];
    if let Some(full_sequence) = primary_set.full_sequence.as_mut() {
        full_sequence.bases = bases;
        full_sequence.placements = placements;
    }
    primary_set.merged_from.push(secondary_id);
    groups[secondary.group_index].phase_sets[secondary.set_index].merged_into = Some(primary_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::test_utils::*;
    use crate::assembly::{JunctionAssembly, Orientation};
    use crate::phase::assembly_link::{AssemblyLink, LinkType, SplitBases};
    use crate::phase::phase_set::{FullSequence, PhaseSet};
    use crate::seq_compare::QualRepeatComparator;

    fn get_phase_group(
        group_id: usize,
        set_id: usize,
        assembly_id: usize,
        bases: Vec<u8>,
        read_index: i64,
    ) -> PhaseGroup {
        let mut assembly: JunctionAssembly = test_assembly(
            assembly_id,
            "chr1",
            1000,
            Orientation::Forward,
            &bases[..100],
            49,
        );
        let mut read = test_read("r1", "chr1", 950, Orientation::Forward);
        read.full_seq_index = Some(read_index);
        assembly.support.push(read);

        let mut phase_set = PhaseSet::new(
            set_id,
            AssemblyLink::new(
                AssemblyId(assembly_id),
                AssemblyId(assembly_id + 1),
                LinkType::Split(SplitBases::Exact),
            ),
        );
        phase_set.full_sequence = Some(FullSequence {
            bases,
            placements: vec![AssemblyPlacement {
                assembly_id: AssemblyId(assembly_id),
                offset: 10,
                reversed: false,
            }],
        });
        let mut group = PhaseGroup::new(group_id, vec![assembly]);
        group.phase_sets.push(phase_set);
        group
    }

    #[test]
    fn test_merge_overlapping_phase_sets() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let merger = PhaseSetMerger::new(&settings, &comparator);
        let reference = random_seq(1000, 14);

        let mut groups = vec![
            get_phase_group(0, 0, 0, reference[0..300].to_vec(), 20),
            get_phase_group(1, 1, 10, reference[250..400].to_vec(), 20),
        ];
        let stats = merger.merge_phase_sets(&mut groups);
        assert_eq!(stats.merged_phase_sets, 1);

        let primary = &groups[0].phase_sets[0];
        assert_eq!(primary.merged_from, vec![1]);
        let full_sequence = primary.full_sequence.as_ref().unwrap();
        assert_eq!(full_sequence.bases, reference[0..400].to_vec());
        assert_eq!(
            full_sequence.placement(AssemblyId(10)).unwrap().offset,
            260
        );
        assert_eq!(groups[1].phase_sets[0].merged_into, Some(0));
        assert_eq!(groups[1].assemblies[0].support[0].full_seq_index, Some(270));
        assert_eq!(groups[0].assemblies[0].support[0].full_seq_index, Some(20));
    }

    #[test]
    fn test_merge_reversed_secondary() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let merger = PhaseSetMerger::new(&settings, &comparator);
        let reference = random_seq(1000, 15);

        let mut groups = vec![
            get_phase_group(0, 0, 0, reference[0..300].to_vec(), 20),
            get_phase_group(1, 1, 10, rev_comp(&reference[250..400]), 20),
        ];
        let stats = merger.merge_phase_sets(&mut groups);
        assert_eq!(stats.merged_phase_sets, 1);

        let full_sequence = groups[0].phase_sets[0].full_sequence.as_ref().unwrap();
        assert_eq!(full_sequence.bases, reference[0..400].to_vec());

        // Placement offset 10 of a 100 base assembly in a 150 base sequence
        let placement = full_sequence.placement(AssemblyId(10)).unwrap();
        assert_eq!(placement.offset, 250 + 40);
        assert!(placement.reversed);

        let read = &groups[1].assemblies[0].support[0];
        assert_eq!(read.full_seq_index, Some(250 + 30));
        assert!(read.full_seq_reversed);
    }

    #[test]
    fn test_merge_extends_primary_start() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let merger = PhaseSetMerger::new(&settings, &comparator);
        let reference = random_seq(1000, 16);

        // Mismatch within the overlap
        let mut secondary = reference[50..160].to_vec();
        secondary[105] = if secondary[105] == b'A' { b'C' } else { b'A' };

        let mut groups = vec![
            get_phase_group(0, 0, 0, reference[100..400].to_vec(), 20),
            get_phase_group(1, 1, 10, secondary, 20),
        ];
        let stats = merger.merge_phase_sets(&mut groups);
        assert_eq!(stats.merged_phase_sets, 1);

        let full_sequence = groups[0].phase_sets[0].full_sequence.as_ref().unwrap();
        assert_eq!(full_sequence.bases, reference[50..400].to_vec());
        assert_eq!(full_sequence.placement(AssemblyId(0)).unwrap().offset, 60);
        assert_eq!(full_sequence.placement(AssemblyId(10)).unwrap().offset, 10);
        assert_eq!(groups[0].assemblies[0].support[0].full_seq_index, Some(70));
        assert_eq!(groups[1].assemblies[0].support[0].full_seq_index, Some(20));
    }

    #[test]
    fn test_unrelated_phase_sets_not_merged() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let merger = PhaseSetMerger::new(&settings, &comparator);

        let mut groups = vec![
            get_phase_group(0, 0, 0, random_seq(300, 17), 20),
            get_phase_group(1, 1, 10, random_seq(200, 18), 20),
        ];
        let stats = merger.merge_phase_sets(&mut groups);
        assert_eq!(stats.candidate_phase_sets, 2);
        assert_eq!(stats.merged_phase_sets, 0);
        assert!(groups[1].phase_sets[0].merged_into.is_none());
    }
}
