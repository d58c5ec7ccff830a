//! Exact and seeded approximate sequence search between junction sequence views
//!

use std::collections::HashSet;

use bio::pattern_matching::bom::BOM;

use super::junction_sequence::JunctionSequence;
use crate::seq_compare::SequenceComparator;

/// An accepted alignment between two views, described by the start of the matched region in each
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceMatch {
    pub first_start: usize,
    pub second_start: usize,

    /// Matched length in first view coordinates
    pub length: usize,

    pub penalty: u32,

    /// Repeat drift of the second view relative to the first, over the compared region
    pub index_diff: i64,
}

impl SequenceMatch {
    /// Offset from a first view index to the aligned second view index, at the match start
    pub fn shift(&self) -> i64 {
        self.second_start as i64 - self.first_start as i64
    }

    fn is_better_than(&self, other: &SequenceMatch) -> bool {
        self.length > other.length || (self.length == other.length && self.penalty < other.penalty)
    }
}

/// All start positions of `pattern` in `text`
pub fn find_all_exact(pattern: &[u8], text: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || pattern.len() > text.len() {
        return Vec::new();
    }
    let bom = BOM::new(pattern);
    bom.find_all(text).collect()
}

/// First start position of `pattern` in `text`
pub fn find_exact(pattern: &[u8], text: &[u8]) -> Option<usize> {
    find_all_exact(pattern, text).into_iter().next()
}

/// Range [start, end) of first view indices which are aligned to a valid second view index
/// under `shift`
fn get_overlap_range(len1: usize, len2: usize, shift: i64) -> (usize, usize) {
    let start = (-shift).max(0);
    let end = (len1 as i64).min(len2 as i64 - shift);
    if end <= start {
        (0, 0)
    } else {
        (start as usize, end as usize)
    }
}

fn range_intersect_len(a: (usize, usize), b: (usize, usize)) -> usize {
    let start = a.0.max(b.0);
    let end = a.1.min(b.1);
    end.saturating_sub(start)
}

/// Find candidate shifts between two views from exact matches of fixed length seed chunks
///
/// Chunks are taken from the match window of `first` and searched across the whole buffer of
/// `second`. Shifts implying an overlap shorter than `min_overlap` are dropped.
///
pub fn find_seed_shifts(
    first: &JunctionSequence,
    second: &JunctionSequence,
    chunk_len: usize,
    min_overlap: usize,
) -> Vec<i64> {
    let mut shifts = Vec::new();
    if chunk_len == 0 {
        return shifts;
    }
    let (match_start, match_end) = (first.match_start(), first.match_end());
    if match_end < match_start + chunk_len {
        return shifts;
    }

    let mut chunk_starts = (match_start..=(match_end - chunk_len))
        .step_by(chunk_len)
        .collect::<Vec<_>>();
    let last_start = match_end - chunk_len;
    if chunk_starts.last() != Some(&last_start) {
        chunk_starts.push(last_start);
    }

    let mut tested_chunks = HashSet::new();
    let mut observed_shifts = HashSet::new();
    for chunk_start in chunk_starts {
        let chunk = &first.bases()[chunk_start..chunk_start + chunk_len];
        if !tested_chunks.insert(chunk) {
            continue;
        }
        for hit in find_all_exact(chunk, second.bases()) {
            let shift = hit as i64 - chunk_start as i64;
            if !observed_shifts.insert(shift) {
                continue;
            }
            let (start, end) = get_overlap_range(first.len(), second.len(), shift);
            if end - start < min_overlap {
                continue;
            }
            shifts.push(shift);
        }
    }
    shifts
}

/// Select the best scoring alignment among candidate shifts
///
/// Each candidate is scored over the match window of `first`, then freely extended in both
/// directions while bases match exactly. The best match is the longest, with ties going to the
/// lowest mismatch penalty.
///
pub fn find_best_sequence_match(
    first: &JunctionSequence,
    second: &JunctionSequence,
    min_overlap: usize,
    shifts: &[i64],
    max_penalty: u32,
    comparator: &dyn SequenceComparator,
) -> Option<SequenceMatch> {
    let len1 = first.len();
    let len2 = second.len();
    let b1 = first.bases();
    let b2 = second.bases();

    let mut best: Option<SequenceMatch> = None;
    for &shift in shifts {
        let (valid_start, valid_end) = get_overlap_range(len1, len2, shift);
        let mut start = valid_start.max(first.match_start());
        let mut end = valid_end.min(first.match_end());
        if end < start + min_overlap {
            continue;
        }

        let result = comparator.compare(
            &first.compare_seq(),
            start,
            end,
            &second.compare_seq(),
            (start as i64 + shift) as usize,
            (end as i64 + shift) as usize,
            max_penalty,
        );
        if result.penalty > max_penalty {
            continue;
        }

        while start > valid_start && b1[start - 1] == b2[(start as i64 - 1 + shift) as usize] {
            start -= 1;
        }
        let end_shift = shift + result.index_diff;
        while end < len1 {
            let index2 = end as i64 + end_shift;
            if index2 < 0 || index2 as usize >= len2 || b1[end] != b2[index2 as usize] {
                break;
            }
            end += 1;
        }

        let candidate = SequenceMatch {
            first_start: start,
            second_start: (start as i64 + shift) as usize,
            length: end - start,
            penalty: result.penalty,
            index_diff: result.index_diff,
        };
        if best.as_ref().is_none_or(|x| candidate.is_better_than(x)) {
            best = Some(candidate);
        }
    }
    best
}

/// Evidence thresholds for a local sequence match
pub struct LocalMatchEvidence {
    pub min_ref_bases: usize,
    pub min_extension_bases: usize,
}

/// Select the best alignment among candidate shifts which covers enough ref bases, or enough
/// extension bases, on both views
///
/// Each candidate is scored over the full overlap of the two buffers.
///
pub fn find_local_sequence_match(
    first: &JunctionSequence,
    second: &JunctionSequence,
    shifts: &[i64],
    max_penalty: u32,
    evidence: &LocalMatchEvidence,
    comparator: &dyn SequenceComparator,
) -> Option<SequenceMatch> {
    let mut best: Option<SequenceMatch> = None;
    for &shift in shifts {
        let (start, end) = get_overlap_range(first.len(), second.len(), shift);
        if end == start {
            continue;
        }
        let second_range = (
            (start as i64 + shift) as usize,
            (end as i64 + shift) as usize,
        );

        let ref1 = range_intersect_len((start, end), first.ref_range());
        let ref2 = range_intersect_len(second_range, second.ref_range());
        let ext1 = range_intersect_len((start, end), first.extension_range());
        let ext2 = range_intersect_len(second_range, second.extension_range());
        let has_ref_evidence = ref1 >= evidence.min_ref_bases && ref2 >= evidence.min_ref_bases;
        let has_ext_evidence =
            ext1 >= evidence.min_extension_bases && ext2 >= evidence.min_extension_bases;
        if !(has_ref_evidence || has_ext_evidence) {
            continue;
        }

        let result = comparator.compare(
            &first.compare_seq(),
            start,
            end,
            &second.compare_seq(),
            second_range.0,
            second_range.1,
            max_penalty,
        );
        if result.penalty > max_penalty {
            continue;
        }

        let candidate = SequenceMatch {
            first_start: start,
            second_start: second_range.0,
            length: end - start,
            penalty: result.penalty,
            index_diff: result.index_diff,
        };
        if best.as_ref().is_none_or(|x| candidate.is_better_than(x)) {
            best = Some(candidate);
        }
    }
    best
}
