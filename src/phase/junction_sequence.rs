//! Oriented, indexed view of assembly or reference bases for sequence matching
//!

use crate::assembly::JunctionAssembly;
use crate::assembly::repeats::{RepeatInfo, find_repeats};
use crate::seq_compare::CompareSeq;
use crate::seq_util::rev_comp;

/// How much of an assembly is covered by the match window of a junction sequence
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SequenceMode {
    /// A window of this length centered on the junction
    Straddling(usize),

    /// Up to the given window length of extension bases, from the outer end of the extension.
    /// Short extensions are padded with ref bases next to the junction, up to the given max.
    OuterExtension {
        window: usize,
        max_ref_bases: usize,
    },

    /// The whole extension plus up to the given number of ref bases
    FullExtension { max_ref_bases: usize },
}

/// Base buffer oriented for matching, with the junction index and a match window
///
/// In a 'forward-like' view the ref bases are at the start of the buffer and the extension
/// follows the junction. A forward junction assembly is forward-like unless reversed, and a
/// reverse junction assembly is forward-like only when reversed.
///
pub struct JunctionSequence {
    bases: Vec<u8>,
    quals: Vec<u8>,
    repeats: Vec<RepeatInfo>,
    reversed: bool,
    forward_like: bool,
    junction_index: usize,

    /// Match window [match_start, match_end)
    match_start: usize,
    match_end: usize,
}

impl JunctionSequence {
    pub fn from_assembly(assembly: &JunctionAssembly, reversed: bool, mode: SequenceMode) -> Self {
        let len = assembly.base_length();
        let (bases, quals, junction_index) = if reversed {
            (
                rev_comp(assembly.bases()),
                assembly.base_quals().iter().rev().copied().collect(),
                len - 1 - assembly.junction_index(),
            )
        } else {
            (
                assembly.bases().to_vec(),
                assembly.base_quals().to_vec(),
                assembly.junction_index(),
            )
        };
        let forward_like = assembly.is_forward_junction() != reversed;
        let (match_start, match_end) = get_match_window(len, junction_index, forward_like, mode);
        let repeats = find_repeats(&bases);
        Self {
            bases,
            quals,
            repeats,
            reversed,
            forward_like,
            junction_index,
            match_start,
            match_end,
        }
    }

    /// View of raw sequence such as reference bases, with the whole buffer as the match window
    ///
    /// All base qualities are set to `synthetic_qual`.
    ///
    pub fn from_raw(bases: &[u8], reversed: bool, synthetic_qual: u8) -> Self {
        let bases = if reversed {
            rev_comp(bases)
        } else {
            bases.to_vec()
        };
        let repeats = find_repeats(&bases);
        let len = bases.len();
        Self {
            quals: vec![synthetic_qual; len],
            bases,
            repeats,
            reversed,
            forward_like: true,
            junction_index: 0,
            match_start: 0,
            match_end: len,
        }
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn quals(&self) -> &[u8] {
        &self.quals
    }

    pub fn repeats(&self) -> &[RepeatInfo] {
        &self.repeats
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn junction_index(&self) -> usize {
        self.junction_index
    }

    pub fn match_start(&self) -> usize {
        self.match_start
    }

    pub fn match_end(&self) -> usize {
        self.match_end
    }

    pub fn match_bases(&self) -> &[u8] {
        &self.bases[self.match_start..self.match_end]
    }

    /// Number of ref bases, including the junction base
    pub fn ref_base_length(&self) -> usize {
        if self.forward_like {
            self.junction_index + 1
        } else {
            self.len() - self.junction_index
        }
    }

    pub fn extension_length(&self) -> usize {
        self.len() - self.ref_base_length()
    }

    /// Ref base index range [start, end) in view coordinates
    pub fn ref_range(&self) -> (usize, usize) {
        if self.forward_like {
            (0, self.junction_index + 1)
        } else {
            (self.junction_index, self.len())
        }
    }

    /// Extension index range [start, end) in view coordinates
    pub fn extension_range(&self) -> (usize, usize) {
        if self.forward_like {
            (self.junction_index + 1, self.len())
        } else {
            (0, self.junction_index)
        }
    }

    /// Map a view index back to the index of the same base in the source buffer
    ///
    /// The mapping is its own inverse.
    ///
    pub fn index_reverted(&self, index: usize) -> usize {
        if self.reversed {
            self.len() - 1 - index
        } else {
            index
        }
    }

    pub fn compare_seq(&self) -> CompareSeq<'_> {
        CompareSeq {
            bases: &self.bases,
            quals: &self.quals,
            repeats: &self.repeats,
        }
    }
}

/// Get the match window [start, end) for a view with junction at `j`
fn get_match_window(
    len: usize,
    j: usize,
    forward_like: bool,
    mode: SequenceMode,
) -> (usize, usize) {
    match mode {
        SequenceMode::Straddling(window) => {
            let half = window / 2;
            let center = if forward_like { j + 1 } else { j };
            (center.saturating_sub(half), (center + half).min(len))
        }
        SequenceMode::OuterExtension {
            window,
            max_ref_bases,
        } => {
            if forward_like {
                let ext_len = len - 1 - j;
                if ext_len >= window {
                    (len - window, len)
                } else {
                    let ref_count = (window - ext_len).min(max_ref_bases).min(j + 1);
                    (j + 1 - ref_count, len)
                }
            } else {
                let ext_len = j;
                if ext_len >= window {
                    (0, window)
                } else {
                    let ref_count = (window - ext_len).min(max_ref_bases).min(len - j);
                    (0, j + ref_count)
                }
            }
        }
        SequenceMode::FullExtension { max_ref_bases } => {
            if forward_like {
                let ref_count = max_ref_bases.min(j + 1);
                (j + 1 - ref_count, len)
            } else {
                let ref_count = max_ref_bases.min(len - j);
                (0, j + ref_count)
            }
        }
    }
}
