//! Pairwise link discovery between junction assemblies
//!

use log::{trace, warn};

use super::PhaseSettings;
use super::assembly_link::{AssemblyLink, LinkType, SplitBases};
use super::junction_sequence::{JunctionSequence, SequenceMode};
use super::sequence_search::{
    LocalMatchEvidence, SequenceMatch, find_best_sequence_match, find_exact,
    find_local_sequence_match, find_seed_shifts,
};
use crate::assembly::read_sharing::count_shared_fragments;
use crate::assembly::{JunctionAssembly, SupportRead};
use crate::seq_compare::SequenceComparator;
use crate::seq_util::rev_comp;

/// Minimum poly-A/T run length on both assemblies for a LINE insertion link
const LINE_POLY_A_MIN_LENGTH: usize = 10;

/// Get the `overlap_length` ref bases next to the junction, ending at the junction base for a
/// forward junction and starting from it for a reverse junction
///
pub fn extract_overlap_bases(
    assembly: &JunctionAssembly,
    overlap_length: usize,
) -> Option<Vec<u8>> {
    let j = assembly.junction_index();
    let (start, end) = if assembly.is_forward_junction() {
        if overlap_length > j + 1 {
            return None;
        }
        (j + 1 - overlap_length, j + 1)
    } else {
        (j, j + overlap_length)
    };
    if end > assembly.base_length() {
        return None;
    }
    Some(assembly.bases()[start..end].to_vec())
}

/// Order two assemblies for overlap matching
///
/// Returns (first, second, first_reversed, second_reversed). When orientations differ the
/// forward junction assembly is first. Otherwise the lower assembly is first, and one of the two
/// is reversed so that the first view is forward-like and the second view is reverse-like.
///
fn get_canonical_order<'b>(
    a1: &'b JunctionAssembly,
    a2: &'b JunctionAssembly,
) -> (&'b JunctionAssembly, &'b JunctionAssembly, bool, bool) {
    let (first, second) = if a1.is_forward_junction() != a2.is_forward_junction() {
        if a1.is_forward_junction() {
            (a1, a2)
        } else {
            (a2, a1)
        }
    } else {
        let key = |a: &JunctionAssembly| (a.junction.chromosome.clone(), a.junction.position, a.id);
        if key(a1) <= key(a2) { (a1, a2) } else { (a2, a1) }
    };
    (
        first,
        second,
        first.is_reverse_junction(),
        second.is_forward_junction(),
    )
}

/// Length of the run of `base` at the start of `bases`
fn leading_run(bases: &[u8], base: u8) -> usize {
    bases.iter().take_while(|&&x| x == base).count()
}

fn trailing_run(bases: &[u8], base: u8) -> usize {
    bases.iter().rev().take_while(|&&x| x == base).count()
}

/// True if two reads of one fragment face each other on the same chromosome
fn reads_face(r1: &SupportRead, r2: &SupportRead) -> bool {
    if r1.chromosome != r2.chromosome || r1.orientation == r2.orientation {
        return false;
    }
    let (fwd, rev) = if r1.orientation.is_forward() {
        (r1, r2)
    } else {
        (r2, r1)
    };
    fwd.aligned_start < rev.aligned_start
}

/// True if two assemblies are close enough on the genome to form a local deletion or duplication
///
pub fn is_local_assembly_candidate(
    settings: &PhaseSettings,
    a1: &JunctionAssembly,
    a2: &JunctionAssembly,
    check_shared_reads: bool,
) -> bool {
    if a1.junction.chromosome != a2.junction.chromosome
        || a1.junction.orientation == a2.junction.orientation
    {
        return false;
    }
    let (fwd, rev) = if a1.is_forward_junction() {
        (a1, a2)
    } else {
        (a2, a1)
    };
    let is_proximate = if fwd.junction.position < rev.junction.position {
        rev.junction.position - fwd.junction.position <= settings.proximate_del_length
    } else {
        fwd.junction.position - rev.junction.position <= settings.proximate_dup_length
    };
    if !is_proximate {
        return false;
    }
    !check_shared_reads || count_shared_fragments(a1, a2, true) > 0
}

pub struct AssemblyLinker<'a> {
    settings: &'a PhaseSettings,
    comparator: &'a dyn SequenceComparator,
}

impl<'a> AssemblyLinker<'a> {
    pub fn new(settings: &'a PhaseSettings, comparator: &'a dyn SequenceComparator) -> Self {
        Self {
            settings,
            comparator,
        }
    }

    pub fn settings(&self) -> &PhaseSettings {
        self.settings
    }

    pub fn comparator(&self) -> &dyn SequenceComparator {
        self.comparator
    }

    /// Link two indel assemblies formed from the same indel
    pub fn try_assembly_indel(
        &self,
        a1: &JunctionAssembly,
        a2: &JunctionAssembly,
    ) -> Option<AssemblyLink> {
        if !a1.junction.indel || !a2.junction.indel {
            return None;
        }
        if a1.is_forward_junction() == a2.is_forward_junction() {
            return None;
        }
        let c1 = a1.indel_coords.as_ref()?;
        let c2 = a2.indel_coords.as_ref()?;
        if !c1.matches(c2) {
            return None;
        }
        let (first, second) = if a1.is_forward_junction() {
            (a1, a2)
        } else {
            (a2, a1)
        };
        let inserted_bases = if c1.inserted_bases.is_empty() {
            c2.inserted_bases.clone()
        } else {
            c1.inserted_bases.clone()
        };
        Some(AssemblyLink::new(
            first.id,
            second.id,
            LinkType::Indel {
                inserted_bases: inserted_bases.into_bytes(),
            },
        ))
    }

    /// Link assemblies whose ref sides face each other across a templated segment
    ///
    /// On success both assemblies have their ref bases trimmed to the other's junction.
    ///
    pub fn try_assembly_facing(
        &self,
        a1: &mut JunctionAssembly,
        a2: &mut JunctionAssembly,
        split_links: &[AssemblyLink],
    ) -> Option<AssemblyLink> {
        if a1.junction.chromosome != a2.junction.chromosome
            || a1.junction.orientation == a2.junction.orientation
        {
            return None;
        }
        if split_links
            .iter()
            .any(|x| x.is_split() && x.has_assembly(a1.id) && x.has_assembly(a2.id))
        {
            return None;
        }

        let (lower, upper) = if a1.junction.position <= a2.junction.position {
            (a1, a2)
        } else {
            (a2, a1)
        };
        if !lower.is_reverse_junction() {
            return None;
        }

        let link_distance = upper.junction.position - lower.junction.position;
        if link_distance < self.settings.phased_assembly_min_ti
            || link_distance > self.settings.phased_assembly_max_ti
        {
            return None;
        }

        if !(self.has_matching_soft_clips(lower, upper) || has_facing_read_support(lower, upper)) {
            return None;
        }

        lower.trim_ref_bases_to(upper.junction.position);
        upper.trim_ref_bases_to(lower.junction.position);

        Some(AssemblyLink::new(lower.id, upper.id, LinkType::Facing))
    }

    fn has_matching_soft_clips(&self, lower: &JunctionAssembly, upper: &JunctionAssembly) -> bool {
        let tolerance = self.settings.ref_side_soft_clip_tolerance;
        let matches = |a: &JunctionAssembly, other: &JunctionAssembly| {
            a.ref_side_soft_clips.iter().any(|x| {
                x.orientation == other.junction.orientation
                    && (x.position - other.junction.position).abs() <= tolerance
            })
        };
        matches(lower, upper) && matches(upper, lower)
    }

    /// Find a split link between two assemblies from overlapping sequence
    ///
    /// When `is_local_indel` is set, the match window straddles each junction and the match must
    /// cover enough ref or extension bases on both sequences.
    ///
    pub fn try_assembly_overlap(
        &self,
        a1: &JunctionAssembly,
        a2: &JunctionAssembly,
        allow_mismatches: bool,
        is_local_indel: bool,
    ) -> Option<AssemblyLink> {
        let (first, second, first_reversed, second_reversed) = get_canonical_order(a1, a2);

        if let Some(link) = try_line_link(first, second, first_reversed, second_reversed) {
            return Some(link);
        }

        let mode = if is_local_indel {
            SequenceMode::Straddling(self.settings.link_match_window)
        } else {
            SequenceMode::OuterExtension {
                window: self.settings.link_match_window,
                max_ref_bases: self.settings.link_outer_max_ref_bases,
            }
        };
        let first_seq = JunctionSequence::from_assembly(first, first_reversed, mode);
        let second_seq = JunctionSequence::from_assembly(second, second_reversed, mode);

        if first_seq.match_bases().len() >= self.settings.link_min_overlap
            && let Some(second_start) = find_exact(first_seq.match_bases(), second_seq.bases())
        {
            let seq_match = SequenceMatch {
                first_start: first_seq.match_start(),
                second_start,
                length: first_seq.match_bases().len(),
                penalty: 0,
                index_diff: 0,
            };
            return self.form_link(first, second, &first_seq, &second_seq, &seq_match, 0);
        }

        if !allow_mismatches {
            return None;
        }

        let shifts = find_seed_shifts(
            &first_seq,
            &second_seq,
            self.settings.match_subsequence_length,
            self.settings.link_min_overlap,
        );
        if shifts.is_empty() {
            return None;
        }

        let seq_match = if is_local_indel {
            let evidence = LocalMatchEvidence {
                min_ref_bases: self.settings.local_min_ref_overlap,
                min_extension_bases: self.settings.local_min_ext_overlap,
            };
            find_local_sequence_match(
                &first_seq,
                &second_seq,
                &shifts,
                self.settings.link_max_mismatch_penalty,
                &evidence,
                self.comparator,
            )
        } else {
            find_best_sequence_match(
                &first_seq,
                &second_seq,
                self.settings.link_min_overlap,
                &shifts,
                self.settings.link_max_mismatch_penalty,
                self.comparator,
            )
        }?;

        let first_mismatch_diff = if first_seq.junction_index() >= seq_match.first_start {
            seq_match.index_diff
        } else {
            0
        };
        self.form_link(
            first,
            second,
            &first_seq,
            &second_seq,
            &seq_match,
            first_mismatch_diff,
        )
    }

    /// Translate an alignment of the two views into a split link
    ///
    /// The first view must be forward-like and the second reverse-like. The gap between the first
    /// junction and the second junction once aligned determines whether the link has inserted
    /// bases, overlapping ref bases, or neither.
    ///
    pub fn form_link(
        &self,
        first: &JunctionAssembly,
        second: &JunctionAssembly,
        first_seq: &JunctionSequence,
        second_seq: &JunctionSequence,
        seq_match: &SequenceMatch,
        first_mismatch_diff: i64,
    ) -> Option<AssemblyLink> {
        let first_junction = first_seq.junction_index() as i64;
        let second_junction = second_seq.junction_index() as i64;
        let first_junction_in_second = first_junction + seq_match.shift() + first_mismatch_diff;
        let junction_offset_diff = second_junction - first_junction_in_second - 1;

        let split_bases = if junction_offset_diff == 0 {
            SplitBases::Exact
        } else if junction_offset_diff > 0 {
            let insert_length = junction_offset_diff as usize;
            let first_insert_start = first_junction as usize + 1;
            let insert = if first_insert_start + insert_length <= first_seq.len() {
                first_seq.bases()[first_insert_start..first_insert_start + insert_length].to_vec()
            } else if second_junction as usize >= insert_length {
                let second_junction = second_junction as usize;
                second_seq.bases()[second_junction - insert_length..second_junction].to_vec()
            } else {
                warn!(
                    "Can't extract {insert_length} inserted bases linking assemblies {} and {}",
                    first.id, second.id
                );
                return None;
            };
            SplitBases::Insert(insert)
        } else {
            let overlap_length = (-junction_offset_diff) as usize;
            if overlap_length >= first.ref_base_length()
                || overlap_length >= second.ref_base_length()
            {
                trace!(
                    "Overlap of {overlap_length} exceeds ref bases of assemblies {} and {}",
                    first.id, second.id
                );
                return None;
            }
            let oriented = |bases: Vec<u8>, reversed: bool| {
                if reversed { rev_comp(&bases) } else { bases }
            };
            let overlap = extract_overlap_bases(first, overlap_length)
                .map(|x| oriented(x, first_seq.reversed()))
                .or_else(|| {
                    extract_overlap_bases(second, overlap_length)
                        .map(|x| oriented(x, second_seq.reversed()))
                });
            match overlap {
                Some(x) => SplitBases::Overlap(x),
                None => {
                    warn!(
                        "Can't extract {overlap_length} overlap bases linking assemblies {} and {}",
                        first.id, second.id
                    );
                    return None;
                }
            }
        };

        Some(AssemblyLink::new(
            first.id,
            second.id,
            LinkType::Split(split_bases),
        ))
    }
}

/// Link assemblies whose extensions meet at a shared poly-A/T run, as at a LINE insertion
///
fn try_line_link(
    first: &JunctionAssembly,
    second: &JunctionAssembly,
    first_reversed: bool,
    second_reversed: bool,
) -> Option<AssemblyLink> {
    let oriented = |bases: &[u8], reversed: bool| {
        if reversed {
            rev_comp(bases)
        } else {
            bases.to_vec()
        }
    };
    let first_ext = oriented(first.extension_bases(), first_reversed);
    let second_ext = oriented(second.extension_bases(), second_reversed);

    let base = *first_ext.first()?;
    if base != b'A' && base != b'T' {
        return None;
    }
    let first_run = leading_run(&first_ext, base);
    let second_run = trailing_run(&second_ext, base);
    if first_run < LINE_POLY_A_MIN_LENGTH || second_run < LINE_POLY_A_MIN_LENGTH {
        return None;
    }
    let run_length = first_run.max(second_run);
    Some(AssemblyLink::new(
        first.id,
        second.id,
        LinkType::Split(SplitBases::Insert(vec![base; run_length])),
    ))
}

/// True if the assemblies share a fragment consistent with spanning the facing segment
fn has_facing_read_support(lower: &JunctionAssembly, upper: &JunctionAssembly) -> bool {
    let is_indel = lower.junction.indel || upper.junction.indel;
    let assembly_indels = [lower.indel_coords.as_ref(), upper.indel_coords.as_ref()];
    for r1 in lower.support.iter() {
        for r2 in upper.support.iter() {
            if !r1.matches_fragment(r2) {
                continue;
            }
            if is_indel {
                let read_indel_match = [r1.indel_coords.as_ref(), r2.indel_coords.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|read_indel| {
                        assembly_indels
                            .iter()
                            .flatten()
                            .any(|x| x.matches(read_indel))
                    });
                if read_indel_match {
                    return true;
                }
            }
            if r1.matches_read(r2) || reads_face(r1, r2) {
                return true;
            }
        }
    }
    false
}
