//! Re-anchor an assembly's extension sequence against nearby reference bases
//!
//! A match implies a local indel whose partner junction was not assembled. The partner is
//! represented by a synthetic reference-backed assembly.
//!

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use super::PhaseSettings;
use super::assembly_link::{AssemblyLink, LinkType, SplitBases};
use super::junction_sequence::{JunctionSequence, SequenceMode};
use super::sequence_search::{
    SequenceMatch, find_best_sequence_match, find_exact, find_seed_shifts,
};
use crate::assembly::{
    AssemblyId, AssemblyOutcome, Junction, JunctionAssembly, Orientation,
};
use crate::genome_ref::RefGenomeSource;
use crate::seq_compare::SequenceComparator;
use crate::seq_util::rev_comp;

/// Location of the partner junction implied by a match against reference bases
pub(super) struct PartnerAnchor {
    /// Reference view index of the partner junction base
    pub ref_junction_index: usize,

    /// Assembly bases between the assembly junction and the matched reference
    pub insert: Vec<u8>,

    /// Start of the matched region in the assembly and reference views, after extending the match
    /// back toward the assembly junction
    pub assembly_start: usize,
    pub ref_start: usize,
}

/// Find the assembly match sequence in a reference view
///
/// An exact match of the whole match sequence is tried first, followed by a seeded approximate
/// search.
///
pub(super) fn find_reference_match(
    assembly_seq: &JunctionSequence,
    ref_seq: &JunctionSequence,
    settings: &PhaseSettings,
    comparator: &dyn SequenceComparator,
) -> Option<SequenceMatch> {
    let match_length = assembly_seq.match_bases().len();
    if match_length < settings.link_min_overlap {
        return None;
    }
    if let Some(ref_start) = find_exact(assembly_seq.match_bases(), ref_seq.bases()) {
        return Some(SequenceMatch {
            first_start: assembly_seq.match_start(),
            second_start: ref_start,
            length: match_length,
            penalty: 0,
            index_diff: 0,
        });
    }
    let shifts = find_seed_shifts(
        assembly_seq,
        ref_seq,
        settings.match_subsequence_length,
        settings.link_min_overlap,
    );
    find_best_sequence_match(
        assembly_seq,
        ref_seq,
        settings.link_min_overlap,
        &shifts,
        settings.link_max_mismatch_penalty,
        comparator,
    )
}

/// Infer the partner junction from a match of a forward-like assembly view to a reference view
///
pub(super) fn infer_partner_anchor(
    assembly_seq: &JunctionSequence,
    ref_seq: &JunctionSequence,
    seq_match: &SequenceMatch,
) -> Option<PartnerAnchor> {
    let assembly_bases = assembly_seq.bases();
    let ref_bases = ref_seq.bases();
    let junction = assembly_seq.junction_index();

    let mut assembly_start = seq_match.first_start;
    let mut ref_start = seq_match.second_start;
    while assembly_start > junction + 1
        && ref_start > 0
        && assembly_bases[assembly_start - 1] == ref_bases[ref_start - 1]
    {
        assembly_start -= 1;
        ref_start -= 1;
    }

    let (ref_junction_index, insert) = if assembly_start > junction + 1 {
        (
            ref_start,
            assembly_bases[junction + 1..assembly_start].to_vec(),
        )
    } else {
        (ref_start + (junction + 1 - assembly_start), Vec::new())
    };
    if ref_junction_index >= ref_bases.len() {
        return None;
    }
    Some(PartnerAnchor {
        ref_junction_index,
        insert,
        assembly_start,
        ref_start,
    })
}

/// Convert a reference view index into a genomic position
///
/// `ref_start` is the genomic position of the first base of the source reference buffer.
///
pub(super) fn get_genomic_position(
    ref_start: i64,
    ref_seq: &JunctionSequence,
    index: usize,
) -> i64 {
    ref_start + ref_seq.index_reverted(index) as i64
}

/// Reference bases for a partner leaving its junction at `position`, in the orientation of a
/// reference view with the given reversal
///
pub(super) fn get_partner_ref_bases(
    genome_ref: &dyn RefGenomeSource,
    chromosome: &str,
    position: i64,
    length: usize,
    reversed: bool,
) -> Option<Vec<u8>> {
    let length = length as i64;
    if reversed {
        genome_ref
            .get_bases(chromosome, position - length + 1, position + 1)
            .map(rev_comp)
    } else {
        genome_ref
            .get_bases(chromosome, position, position + length)
            .map(|x| x.to_vec())
    }
}

pub(super) struct RefBackedPartner<'b> {
    pub id: AssemblyId,
    pub chromosome: &'b str,
    pub position: i64,

    /// Extension bases followed by ref bases, oriented so that the partner leaves its junction
    /// into the ref bases
    pub frame_extension: Vec<u8>,
    pub frame_ref: Vec<u8>,

    /// True if the frame is reverse complemented relative to the genome
    pub frame_reversed: bool,
    pub synthetic_qual: u8,
}

/// Build a synthetic assembly standing in for an unassembled partner junction
pub(super) fn build_ref_backed_assembly(partner: RefBackedPartner) -> JunctionAssembly {
    let mut bases = partner.frame_extension;
    let mut junction_index = bases.len();
    bases.extend_from_slice(&partner.frame_ref);
    let orientation = if partner.frame_reversed {
        bases = rev_comp(&bases);
        junction_index = bases.len() - 1 - junction_index;
        Orientation::Forward
    } else {
        Orientation::Reverse
    };
    let quals = vec![partner.synthetic_qual; bases.len()];
    let junction = Junction {
        chromosome: partner.chromosome.to_string(),
        position: partner.position,
        orientation,
        indel: false,
    };
    let mut assembly = JunctionAssembly::new(partner.id, junction, bases, quals, junction_index);
    assembly.derived = true;
    assembly
}

/// Frame bases of the assembly to carry as the partner's extension
pub(super) fn get_partner_extension(
    assembly_seq: &JunctionSequence,
    max_ref_bases: usize,
    insert: &[u8],
) -> Vec<u8> {
    let junction = assembly_seq.junction_index();
    let start = (junction + 1).saturating_sub(max_ref_bases);
    let mut ext = assembly_seq.bases()[start..=junction].to_vec();
    ext.extend_from_slice(insert);
    ext
}

pub fn get_split_link_type(insert: Vec<u8>) -> LinkType {
    if insert.is_empty() {
        LinkType::Split(SplitBases::Exact)
    } else {
        LinkType::Split(SplitBases::Insert(insert))
    }
}

pub struct LocalSequenceMatcher<'a> {
    settings: &'a PhaseSettings,
    genome_ref: &'a dyn RefGenomeSource,
    comparator: &'a dyn SequenceComparator,
    pub match_count: usize,
}

impl<'a> LocalSequenceMatcher<'a> {
    pub fn new(
        settings: &'a PhaseSettings,
        genome_ref: &'a dyn RefGenomeSource,
        comparator: &'a dyn SequenceComparator,
    ) -> Self {
        Self {
            settings,
            genome_ref,
            comparator,
            match_count: 0,
        }
    }

    /// Try to link `assembly` to a reference-backed partner near its own junction
    ///
    /// On success the assembly outcome is set to LocalIndel, and the partner assembly is returned
    /// with the link.
    ///
    pub fn try_local_link(
        &mut self,
        assembly: &mut JunctionAssembly,
        next_id: &AtomicUsize,
    ) -> Option<(JunctionAssembly, AssemblyLink)> {
        let chromosome = assembly.junction.chromosome.clone();
        let position = assembly.junction.position;
        let window_start = (position - self.settings.local_match_distance).max(0);
        let window_end = position + self.settings.local_match_distance + 1;
        let ref_bases = self
            .genome_ref
            .get_bases(&chromosome, window_start, window_end)?;

        let reversed = assembly.is_reverse_junction();
        let mode = SequenceMode::OuterExtension {
            window: self.settings.link_match_window,
            max_ref_bases: 0,
        };
        let assembly_seq = JunctionSequence::from_assembly(assembly, reversed, mode);
        let ref_seq =
            JunctionSequence::from_raw(ref_bases, reversed, self.settings.synthetic_base_qual);

        let seq_match =
            find_reference_match(&assembly_seq, &ref_seq, self.settings, self.comparator)?;
        let anchor = infer_partner_anchor(&assembly_seq, &ref_seq, &seq_match)?;
        let partner_position =
            get_genomic_position(window_start, &ref_seq, anchor.ref_junction_index);
        if (partner_position - position).abs() < self.settings.min_local_indel_length {
            return None;
        }

        let frame_ref = get_partner_ref_bases(
            self.genome_ref,
            &chromosome,
            partner_position,
            self.settings.local_ref_tail_length,
            reversed,
        )?;
        let frame_extension = get_partner_extension(
            &assembly_seq,
            self.settings.link_match_window,
            &anchor.insert,
        );
        let partner_id = AssemblyId(next_id.fetch_add(1, Ordering::Relaxed));
        let mut partner = build_ref_backed_assembly(RefBackedPartner {
            id: partner_id,
            chromosome: &chromosome,
            position: partner_position,
            frame_extension,
            frame_ref,
            frame_reversed: reversed,
            synthetic_qual: self.settings.synthetic_base_qual,
        });
        partner.outcome = AssemblyOutcome::LocalIndel;
        assembly.outcome = AssemblyOutcome::LocalIndel;
        self.match_count += 1;

        if log::log_enabled!(log::Level::Debug) {
            let partner_ref = self.genome_ref.get_base_string(
                &chromosome,
                partner_position - 10,
                partner_position + 11,
            );
            debug!(
                "Local reference match for assembly {} at {}:{} insert length {} partner ref {}",
                assembly.id,
                chromosome,
                partner_position,
                anchor.insert.len(),
                partner_ref.unwrap_or_default()
            );
        }

        let link = AssemblyLink::new(assembly.id, partner_id, get_split_link_type(anchor.insert));
        Some((partner, link))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::assembly::test_utils::*;
    use crate::genome_ref::GenomeRef;
    use crate::seq_compare::QualRepeatComparator;

    fn get_test_ref(seq: &[u8]) -> GenomeRef {
        let mut chroms = HashMap::new();
        chroms.insert("chr1".to_string(), seq.to_vec());
        GenomeRef { chroms }
    }

    #[test]
    fn test_local_deletion() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 21);
        let genome_ref = get_test_ref(&reference);

        // Deletion of [1000, 1200) with a 4 base insertion, seen only from the left side
        let mut bases = reference[900..1000].to_vec();
        bases.extend_from_slice(b"TTAC");
        bases.extend_from_slice(&reference[1200..1280]);
        let mut assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let next_id = AtomicUsize::new(10);
        let mut matcher = LocalSequenceMatcher::new(&settings, &genome_ref, &comparator);
        let (partner, link) = matcher.try_local_link(&mut assembly, &next_id).unwrap();

        assert_eq!(partner.id, AssemblyId(10));
        assert_eq!(partner.junction.position, 1200);
        assert_eq!(partner.junction.orientation, Orientation::Reverse);
        assert!(partner.derived);
        assert_eq!(partner.ref_bases(), &reference[1200..1300]);
        assert_eq!(link.first(), AssemblyId(0));
        assert_eq!(link.second(), AssemblyId(10));
        assert_eq!(link.inserted_bases(), b"TTAC");
        assert_eq!(assembly.outcome, AssemblyOutcome::LocalIndel);
        assert_eq!(matcher.match_count, 1);
    }

    #[test]
    fn test_local_deletion_reverse() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 22);
        let genome_ref = get_test_ref(&reference);

        // Deletion of [1000, 1200), seen only from the right side
        let mut bases = reference[920..1000].to_vec();
        bases.extend_from_slice(&reference[1200..1300]);
        let mut assembly = test_assembly(0, "chr1", 1200, Orientation::Reverse, &bases, 80);

        let next_id = AtomicUsize::new(10);
        let mut matcher = LocalSequenceMatcher::new(&settings, &genome_ref, &comparator);
        let (partner, link) = matcher.try_local_link(&mut assembly, &next_id).unwrap();

        assert_eq!(partner.junction.position, 999);
        assert_eq!(partner.junction.orientation, Orientation::Forward);
        assert_eq!(partner.ref_bases(), &reference[900..1000]);
        assert_eq!(link.link_type(), &LinkType::Split(SplitBases::Exact));
    }

    #[test]
    fn test_no_local_match() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 23);
        let genome_ref = get_test_ref(&reference);

        // Extension from an unrelated sequence
        let mut bases = reference[900..1000].to_vec();
        bases.extend(random_seq(80, 99));
        let mut assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let next_id = AtomicUsize::new(10);
        let mut matcher = LocalSequenceMatcher::new(&settings, &genome_ref, &comparator);
        assert!(matcher.try_local_link(&mut assembly, &next_id).is_none());
        assert_eq!(assembly.outcome, AssemblyOutcome::Unset);
    }

    #[test]
    fn test_reference_continuation_rejected() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let reference = random_seq(2000, 24);
        let genome_ref = get_test_ref(&reference);

        // Extension continues the reference directly, so there is no indel
        let bases = reference[900..1080].to_vec();
        let mut assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let next_id = AtomicUsize::new(10);
        let mut matcher = LocalSequenceMatcher::new(&settings, &genome_ref, &comparator);
        assert!(matcher.try_local_link(&mut assembly, &next_id).is_none());
    }
}
