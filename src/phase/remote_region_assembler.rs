//! Re-anchor an assembly's extension against the reference of a remote region implicated by
//! discordant mates
//!

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};
use simple_error::SimpleResult;

use super::PhaseSettings;
use super::assembly_link::AssemblyLink;
use super::junction_sequence::{JunctionSequence, SequenceMode};
use super::local_sequence_matcher::{
    PartnerAnchor, RefBackedPartner, build_ref_backed_assembly, find_reference_match,
    get_genomic_position, get_partner_extension, get_partner_ref_bases, get_split_link_type,
    infer_partner_anchor,
};
use super::sequence_search::{SequenceMatch, find_exact};
use crate::assembly::{
    AssemblyId, AssemblyOutcome, JunctionAssembly, RemoteRegion, SupportRead, SupportType,
};
use crate::genome_ref::RefGenomeSource;
use crate::int_range::IntRange;
use crate::read_source::RemoteReadSource;
use crate::seq_compare::SequenceComparator;

/// Extra flank added on each side of the matched length when re-verifying an inferred junction
const REFINEMENT_FLANK: usize = 20;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RemoteRegionStats {
    pub regions_searched: usize,
    pub reads_searched: usize,
    pub reads_matched: usize,
    pub links_formed: usize,
}

impl RemoteRegionStats {
    pub fn merge(&mut self, other: &Self) {
        self.regions_searched += other.regions_searched;
        self.reads_searched += other.reads_searched;
        self.reads_matched += other.reads_matched;
        self.links_formed += other.links_formed;
    }
}

pub struct RemoteRegionAssembler<'a> {
    settings: &'a PhaseSettings,
    genome_ref: &'a dyn RefGenomeSource,
    comparator: &'a dyn SequenceComparator,
    read_source: &'a mut dyn RemoteReadSource,
    pub stats: RemoteRegionStats,
}

impl<'a> RemoteRegionAssembler<'a> {
    pub fn new(
        settings: &'a PhaseSettings,
        genome_ref: &'a dyn RefGenomeSource,
        comparator: &'a dyn SequenceComparator,
        read_source: &'a mut dyn RemoteReadSource,
    ) -> Self {
        Self {
            settings,
            genome_ref,
            comparator,
            read_source,
            stats: RemoteRegionStats::default(),
        }
    }

    /// Try to link `assembly` to a reference-backed partner in `region`
    ///
    /// Only reads named by the region are fetched. The reference bases spanned by those reads are
    /// searched for the assembly extension in both orientations.
    ///
    pub fn try_remote_link(
        &mut self,
        assembly: &JunctionAssembly,
        region: &RemoteRegion,
        next_id: &AtomicUsize,
    ) -> SimpleResult<Option<(JunctionAssembly, AssemblyLink)>> {
        let read_ids = region.read_ids.iter().cloned().collect::<HashSet<_>>();
        let reads = self.read_source.get_region_reads(
            &region.chromosome,
            region.start,
            region.end,
            &read_ids,
        )?;
        self.stats.regions_searched += 1;
        self.stats.reads_searched += reads.len();
        if reads.is_empty() {
            return Ok(None);
        }

        let pad = self.settings.link_match_window as i64;
        let span_start = reads
            .iter()
            .map(|x| x.aligned_start)
            .min()
            .unwrap_or(region.start);
        let span_end = reads
            .iter()
            .map(|x| x.aligned_end)
            .max()
            .unwrap_or(region.end);
        let span_start = (span_start - pad).max(0);
        let span_end = span_end + pad;
        let ref_bases = match self
            .genome_ref
            .get_bases(&region.chromosome, span_start, span_end)
        {
            Some(x) => x,
            None => return Ok(None),
        };

        let mode = SequenceMode::FullExtension { max_ref_bases: 0 };
        let assembly_seq =
            JunctionSequence::from_assembly(assembly, assembly.is_reverse_junction(), mode);

        for ref_reversed in [false, true] {
            let ref_seq = JunctionSequence::from_raw(
                ref_bases,
                ref_reversed,
                self.settings.synthetic_base_qual,
            );
            let Some(seq_match) =
                find_reference_match(&assembly_seq, &ref_seq, self.settings, self.comparator)
            else {
                continue;
            };
            let Some(anchor) = infer_partner_anchor(&assembly_seq, &ref_seq, &seq_match) else {
                continue;
            };

            let mut partner_position =
                get_genomic_position(span_start, &ref_seq, anchor.ref_junction_index);
            if !reads
                .iter()
                .any(|x| x.aligned_start <= partner_position && partner_position < x.aligned_end)
            {
                match self.refine_partner_position(
                    &region.chromosome,
                    &assembly_seq,
                    &seq_match,
                    &anchor,
                    partner_position,
                    ref_reversed,
                ) {
                    Some(x) => partner_position = x,
                    None => continue,
                }
            }

            if region.chromosome == assembly.junction.chromosome
                && (partner_position - assembly.junction.position).abs()
                    < self.settings.min_local_indel_length
            {
                continue;
            }

            let Some(frame_ref) = get_partner_ref_bases(
                self.genome_ref,
                &region.chromosome,
                partner_position,
                self.settings.local_ref_tail_length,
                ref_reversed,
            ) else {
                continue;
            };
            let frame_extension = get_partner_extension(
                &assembly_seq,
                self.settings.link_match_window,
                &anchor.insert,
            );
            let partner_id = AssemblyId(next_id.fetch_add(1, Ordering::Relaxed));
            let mut partner = build_ref_backed_assembly(RefBackedPartner {
                id: partner_id,
                chromosome: &region.chromosome,
                position: partner_position,
                frame_extension,
                frame_ref,
                frame_reversed: ref_reversed,
                synthetic_qual: self.settings.synthetic_base_qual,
            });
            partner.outcome = AssemblyOutcome::RemoteRegion;
            partner.support = get_matched_reads(&reads, &partner.ref_range());

            self.stats.reads_matched += partner.support.len();
            self.stats.links_formed += 1;

            debug!(
                "Remote region link for assembly {} at {}:{} with {} matched reads",
                assembly.id,
                region.chromosome,
                partner_position,
                partner.support.len()
            );

            let link =
                AssemblyLink::new(assembly.id, partner_id, get_split_link_type(anchor.insert));
            return Ok(Some((partner, link)));
        }
        Ok(None)
    }

    /// Re-verify an inferred partner junction which no fetched read spans
    ///
    /// The matched assembly bases must be found exactly in a tight reference window around the
    /// inferred position. Returns the adjusted position.
    ///
    fn refine_partner_position(
        &self,
        chromosome: &str,
        assembly_seq: &JunctionSequence,
        seq_match: &SequenceMatch,
        anchor: &PartnerAnchor,
        position: i64,
        ref_reversed: bool,
    ) -> Option<i64> {
        let matched = &assembly_seq.bases()
            [anchor.assembly_start..seq_match.first_start + seq_match.length];
        let flank = (matched.len() + REFINEMENT_FLANK) as i64;
        let window_start = (position - flank).max(0);
        let window = self
            .genome_ref
            .get_bases(chromosome, window_start, position + flank + 1)?;
        let window =
            JunctionSequence::from_raw(window, ref_reversed, self.settings.synthetic_base_qual);
        let hit = find_exact(matched, window.bases())?;
        let ref_junction_index = hit + (anchor.ref_junction_index - anchor.ref_start);
        if ref_junction_index >= window.len() {
            return None;
        }
        Some(get_genomic_position(window_start, &window, ref_junction_index))
    }
}

/// Fetched reads overlapping the partner ref bases, as discordant support
fn get_matched_reads(reads: &[SupportRead], ref_range: &IntRange) -> Vec<SupportRead> {
    reads
        .iter()
        .filter(|x| ref_range.intersect_range(&IntRange::from_pair(x.aligned_start, x.aligned_end)))
        .map(|x| {
            let mut read = x.clone();
            read.support_type = SupportType::Discordant;
            read
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::assembly::Orientation;
    use crate::assembly::test_utils::*;
    use crate::genome_ref::GenomeRef;
    use crate::phase::assembly_link::{LinkType, SplitBases};
    use crate::read_source::test_utils::TestReadSource;
    use crate::seq_util::rev_comp;
    use crate::seq_compare::QualRepeatComparator;

    fn get_test_ref() -> GenomeRef {
        let mut chroms = HashMap::new();
        chroms.insert("chr1".to_string(), random_seq(2000, 31));
        chroms.insert("chr2".to_string(), random_seq(2000, 32));
        GenomeRef { chroms }
    }

    fn get_region(start: i64, end: i64) -> RemoteRegion {
        RemoteRegion {
            chromosome: "chr2".to_string(),
            start,
            end,
            orientation: Orientation::Reverse,
            read_ids: vec!["r1".to_string(), "r2".to_string()],
        }
    }

    fn get_read_source(starts: &[(&str, i64)]) -> TestReadSource {
        TestReadSource {
            reads: starts
                .iter()
                .map(|(id, start)| test_read(id, "chr2", *start, Orientation::Forward))
                .collect(),
            query_count: 0,
        }
    }

    #[test]
    fn test_remote_translocation_link() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let genome_ref = get_test_ref();
        let chr1 = genome_ref.chroms["chr1"].clone();
        let chr2 = genome_ref.chroms["chr2"].clone();

        let mut bases = chr1[900..1000].to_vec();
        bases.extend_from_slice(&chr2[1500..1580]);
        let assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let mut read_source = get_read_source(&[("r1", 1450), ("r2", 1520), ("r3", 1480)]);
        let next_id = AtomicUsize::new(5);
        let mut assembler =
            RemoteRegionAssembler::new(&settings, &genome_ref, &comparator, &mut read_source);
        let (partner, link) = assembler
            .try_remote_link(&assembly, &get_region(1400, 1700), &next_id)
            .unwrap()
            .unwrap();

        assert_eq!(partner.id, AssemblyId(5));
        assert_eq!(partner.junction.chromosome, "chr2");
        assert_eq!(partner.junction.position, 1500);
        assert_eq!(partner.junction.orientation, Orientation::Reverse);
        assert_eq!(partner.ref_bases(), &chr2[1500..1600]);
        assert_eq!(partner.outcome, AssemblyOutcome::RemoteRegion);
        assert_eq!(partner.support.len(), 2);
        assert!(
            partner
                .support
                .iter()
                .all(|x| x.support_type == SupportType::Discordant)
        );
        assert_eq!(link.first(), AssemblyId(0));
        assert_eq!(link.link_type(), &LinkType::Split(SplitBases::Exact));

        let stats = assembler.stats.clone();
        assert_eq!(stats.regions_searched, 1);
        assert_eq!(stats.reads_searched, 2);
        assert_eq!(stats.reads_matched, 2);
        assert_eq!(stats.links_formed, 1);
    }

    #[test]
    fn test_remote_reversed_link() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let genome_ref = get_test_ref();
        let chr1 = genome_ref.chroms["chr1"].clone();
        let chr2 = genome_ref.chroms["chr2"].clone();

        // Extension continues into chr2 reading leftward from 1499
        let mut bases = chr1[900..1000].to_vec();
        bases.extend(rev_comp(&chr2[1420..1500]));
        let assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let mut read_source = get_read_source(&[("r1", 1450), ("r2", 1520)]);
        let next_id = AtomicUsize::new(5);
        let mut assembler =
            RemoteRegionAssembler::new(&settings, &genome_ref, &comparator, &mut read_source);
        let (partner, _link) = assembler
            .try_remote_link(&assembly, &get_region(1400, 1700), &next_id)
            .unwrap()
            .unwrap();

        assert_eq!(partner.junction.position, 1499);
        assert_eq!(partner.junction.orientation, Orientation::Forward);
        assert_eq!(partner.ref_bases(), &chr2[1400..1500]);
    }

    #[test]
    fn test_remote_junction_refinement() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let genome_ref = get_test_ref();
        let chr1 = genome_ref.chroms["chr1"].clone();
        let chr2 = genome_ref.chroms["chr2"].clone();

        // The partner junction lies beyond the end of every fetched read
        let mut bases = chr1[900..1000].to_vec();
        bases.extend_from_slice(&chr2[1460..1495]);
        let assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &bases, 99);

        let mut read_source = get_read_source(&[("r1", 1300), ("r2", 1350)]);
        let next_id = AtomicUsize::new(5);
        let mut assembler =
            RemoteRegionAssembler::new(&settings, &genome_ref, &comparator, &mut read_source);
        let (partner, _link) = assembler
            .try_remote_link(&assembly, &get_region(1300, 1500), &next_id)
            .unwrap()
            .unwrap();
        assert_eq!(partner.junction.position, 1460);
        assert_eq!(partner.junction.orientation, Orientation::Reverse);
    }

    #[test]
    fn test_remote_region_without_reads() {
        let settings = PhaseSettings::default();
        let comparator = QualRepeatComparator::new(settings.low_base_qual_threshold);
        let genome_ref = get_test_ref();
        let chr1 = genome_ref.chroms["chr1"].clone();

        let assembly = test_assembly(0, "chr1", 999, Orientation::Forward, &chr1[900..1080], 99);
        let mut read_source = get_read_source(&[("r3", 1450)]);
        let next_id = AtomicUsize::new(5);
        let mut assembler =
            RemoteRegionAssembler::new(&settings, &genome_ref, &comparator, &mut read_source);
        let result = assembler
            .try_remote_link(&assembly, &get_region(1400, 1700), &next_id)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(assembler.stats.regions_searched, 1);
        assert_eq!(assembler.stats.reads_searched, 0);
        assert_eq!(next_id.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_stats_merge() {
        let mut stats = RemoteRegionStats {
            regions_searched: 1,
            reads_searched: 4,
            reads_matched: 2,
            links_formed: 1,
        };
        stats.merge(&stats.clone());
        assert_eq!(stats.reads_searched, 8);
        assert_eq!(stats.links_formed, 2);
    }
}
