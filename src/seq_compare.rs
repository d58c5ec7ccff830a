//! Quality and repeat aware base sequence comparison
//!

use crate::assembly::repeats::{RepeatInfo, get_repeat_at};

/// Base sequence with qualities and tandem repeat annotation, as input to a comparator
pub struct CompareSeq<'a> {
    pub bases: &'a [u8],
    pub quals: &'a [u8],
    pub repeats: &'a [RepeatInfo],
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ComparisonResult {
    /// Total mismatch penalty over the compared range
    pub penalty: u32,

    /// Net count of extra bases consumed in the second sequence relative to the first, from
    /// repeat copy count differences
    pub index_diff: i64,
}

/// Score base mismatches between two sequence ranges
///
/// The penalty must be usable as both an accept/reject threshold and a tie-break score, and it
/// may not decrease when a compared range is extended.
///
pub trait SequenceComparator: Sync {
    /// Compare ranges [first_start, first_end) and [second_start, second_end)
    ///
    /// Comparison can stop as soon as the penalty exceeds `max_penalty`.
    ///
    #[allow(clippy::too_many_arguments)]
    fn compare(
        &self,
        first: &CompareSeq,
        first_start: usize,
        first_end: usize,
        second: &CompareSeq,
        second_start: usize,
        second_end: usize,
        max_penalty: u32,
    ) -> ComparisonResult;
}

pub struct QualRepeatComparator {
    /// Mismatches where either base quality falls below this value carry no penalty
    pub low_base_qual_threshold: u8,
}

impl QualRepeatComparator {
    pub fn new(low_base_qual_threshold: u8) -> Self {
        Self {
            low_base_qual_threshold,
        }
    }
}

/// Repeat covering `index`, or ending immediately before it
fn get_adjacent_repeat(repeats: &[RepeatInfo], index: usize) -> Option<&RepeatInfo> {
    get_repeat_at(repeats, index).or_else(|| {
        if index > 0 {
            get_repeat_at(repeats, index - 1)
        } else {
            None
        }
    })
}

impl SequenceComparator for QualRepeatComparator {
    fn compare(
        &self,
        first: &CompareSeq,
        first_start: usize,
        first_end: usize,
        second: &CompareSeq,
        second_start: usize,
        second_end: usize,
        max_penalty: u32,
    ) -> ComparisonResult {
        let first_end = first_end.min(first.bases.len());
        let second_end = second_end.min(second.bases.len());

        let mut result = ComparisonResult::default();
        let mut i1 = first_start;
        let mut i2 = second_start;
        while i1 < first_end && i2 < second_end {
            if first.bases[i1] == second.bases[i2] {
                i1 += 1;
                i2 += 1;
                continue;
            }

            let q1 = first.quals.get(i1).copied().unwrap_or(0);
            let q2 = second.quals.get(i2).copied().unwrap_or(0);
            if q1 < self.low_base_qual_threshold || q2 < self.low_base_qual_threshold {
                i1 += 1;
                i2 += 1;
                continue;
            }

            let repeat_skip = match (
                get_adjacent_repeat(first.repeats, i1),
                get_adjacent_repeat(second.repeats, i2),
            ) {
                (Some(r1), Some(r2)) if r1.unit == r2.unit && r1.count != r2.count => {
                    let end1 = r1.end_index().max(i1);
                    let end2 = r2.end_index().max(i2);
                    if end1 > i1 || end2 > i2 {
                        Some((end1, end2))
                    } else {
                        None
                    }
                }
                _ => None,
            };

            result.penalty += 1;
            match repeat_skip {
                Some((end1, end2)) => {
                    result.index_diff += (end2 - i2) as i64 - (end1 - i1) as i64;
                    i1 = end1;
                    i2 = end2;
                }
                None => {
                    i1 += 1;
                    i2 += 1;
                }
            }

            if result.penalty > max_penalty {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::repeats::find_repeats;

    fn compare_simple(s1: &[u8], q1: &[u8], s2: &[u8], q2: &[u8], max: u32) -> ComparisonResult {
        let r1 = find_repeats(s1);
        let r2 = find_repeats(s2);
        let c1 = CompareSeq {
            bases: s1,
            quals: q1,
            repeats: &r1,
        };
        let c2 = CompareSeq {
            bases: s2,
            quals: q2,
            repeats: &r2,
        };
        QualRepeatComparator::new(26).compare(&c1, 0, s1.len(), &c2, 0, s2.len(), max)
    }

    #[test]
    fn test_exact_match() {
        let s = b"ACGTTGCAAGCT";
        let q = vec![37; s.len()];
        assert_eq!(compare_simple(s, &q, s, &q, 3), ComparisonResult::default());
    }

    #[test]
    fn test_mismatch_penalty() {
        let s1 = b"ACGTTGCAAGCT";
        let s2 = b"ACGATGCAAGGT";
        let q = vec![37; s1.len()];
        assert_eq!(compare_simple(s1, &q, s2, &q, 3).penalty, 2);

        // Low quality mismatches are free
        let mut q_low = q.clone();
        q_low[3] = 10;
        assert_eq!(compare_simple(s1, &q_low, s2, &q, 3).penalty, 1);
    }

    #[test]
    fn test_early_stop() {
        let s1 = b"AAAAAAAAAAAA";
        let s2 = b"CCCCCCCCCCCC";
        let q = vec![37; s1.len()];
        assert_eq!(compare_simple(s1, &q, s2, &q, 3).penalty, 4);
    }

    #[test]
    fn test_repeat_count_difference() {
        // Second sequence carries one extra CA copy
        let s1 = b"GTTGCACACAGGTCCT";
        let s2 = b"GTTGCACACACAGGTCCT";
        let q1 = vec![37; s1.len()];
        let q2 = vec![37; s2.len()];
        let result = compare_simple(s1, &q1, s2, &q2, 3);
        assert_eq!(result.penalty, 1);
        assert_eq!(result.index_diff, 2);
    }
}
