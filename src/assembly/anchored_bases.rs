//! Base buffer for a junction assembly, anchored at the junction
//!
//! Ref bases sit on one side of the junction and extension bases on the other, depending on the
//! junction orientation. All orientation-dependent growth and trimming of the ref side is kept in
//! this type so that callers only ask to extend or trim "outward" from the junction.
//!

use super::Orientation;

#[derive(Clone, Debug, PartialEq)]
pub struct AnchoredBases {
    bases: Vec<u8>,
    quals: Vec<u8>,

    /// Index of the junction base, which is always the innermost ref base
    junction_index: usize,

    orientation: Orientation,
}

impl AnchoredBases {
    pub fn new(
        bases: Vec<u8>,
        quals: Vec<u8>,
        junction_index: usize,
        orientation: Orientation,
    ) -> Self {
        assert_eq!(bases.len(), quals.len());
        assert!(junction_index < bases.len());
        Self {
            bases,
            quals,
            junction_index,
            orientation,
        }
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn quals(&self) -> &[u8] {
        &self.quals
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn junction_index(&self) -> usize {
        self.junction_index
    }

    /// Number of ref bases, including the junction base
    pub fn ref_base_length(&self) -> usize {
        match self.orientation {
            Orientation::Forward => self.junction_index + 1,
            Orientation::Reverse => self.bases.len() - self.junction_index,
        }
    }

    pub fn extension_length(&self) -> usize {
        self.bases.len() - self.ref_base_length()
    }

    pub fn ref_bases(&self) -> &[u8] {
        match self.orientation {
            Orientation::Forward => &self.bases[..=self.junction_index],
            Orientation::Reverse => &self.bases[self.junction_index..],
        }
    }

    pub fn extension_bases(&self) -> &[u8] {
        match self.orientation {
            Orientation::Forward => &self.bases[self.junction_index + 1..],
            Orientation::Reverse => &self.bases[..self.junction_index],
        }
    }

    /// Add ref bases on the far side of the current ref region
    ///
    /// Bases are given in outward order, starting with the base adjacent to the current outermost
    /// ref base and moving away from the junction.
    ///
    /// Returns the shift applied to all existing buffer indices.
    ///
    pub fn extend_ref_outward(&mut self, outward_bases: &[u8], outward_quals: &[u8]) -> usize {
        assert_eq!(outward_bases.len(), outward_quals.len());
        let count = outward_bases.len();
        match self.orientation {
            Orientation::Forward => {
                let mut bases = outward_bases.iter().rev().copied().collect::<Vec<_>>();
                let mut quals = outward_quals.iter().rev().copied().collect::<Vec<_>>();
                bases.extend_from_slice(&self.bases);
                quals.extend_from_slice(&self.quals);
                self.bases = bases;
                self.quals = quals;
                self.junction_index += count;
                count
            }
            Orientation::Reverse => {
                self.bases.extend_from_slice(outward_bases);
                self.quals.extend_from_slice(outward_quals);
                0
            }
        }
    }

    /// Remove `count` of the outermost ref bases. The junction base is never removed.
    ///
    /// Returns the shift applied to all remaining buffer indices (as a count of bases removed from
    /// the front of the buffer).
    ///
    pub fn trim_ref_outer(&mut self, count: usize) -> usize {
        let count = std::cmp::min(count, self.ref_base_length() - 1);
        match self.orientation {
            Orientation::Forward => {
                self.bases.drain(..count);
                self.quals.drain(..count);
                self.junction_index -= count;
                count
            }
            Orientation::Reverse => {
                let new_len = self.bases.len() - count;
                self.bases.truncate(new_len);
                self.quals.truncate(new_len);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quals(n: usize) -> Vec<u8> {
        vec![30; n]
    }

    #[test]
    fn test_forward_regions() {
        let x = AnchoredBases::new(b"AACCGGTT".to_vec(), quals(8), 3, Orientation::Forward);
        assert_eq!(x.ref_bases(), b"AACC");
        assert_eq!(x.extension_bases(), b"GGTT");
        assert_eq!(x.ref_base_length(), 4);
        assert_eq!(x.extension_length(), 4);
    }

    #[test]
    fn test_reverse_regions() {
        let x = AnchoredBases::new(b"AACCGGTT".to_vec(), quals(8), 3, Orientation::Reverse);
        assert_eq!(x.ref_bases(), b"CGGTT");
        assert_eq!(x.extension_bases(), b"AAC");
    }

    #[test]
    fn test_extend_ref_outward() {
        let mut x = AnchoredBases::new(b"CCGG".to_vec(), quals(4), 1, Orientation::Forward);
        let shift = x.extend_ref_outward(b"TA", &quals(2));
        assert_eq!(shift, 2);
        assert_eq!(x.bases(), b"ATCCGG");
        assert_eq!(x.junction_index(), 3);
        assert_eq!(x.ref_bases(), b"ATCC");

        let mut x = AnchoredBases::new(b"CCGG".to_vec(), quals(4), 1, Orientation::Reverse);
        let shift = x.extend_ref_outward(b"TA", &quals(2));
        assert_eq!(shift, 0);
        assert_eq!(x.bases(), b"CCGGTA");
        assert_eq!(x.junction_index(), 1);
    }

    #[test]
    fn test_trim_ref_outer() {
        let mut x = AnchoredBases::new(b"AACCGG".to_vec(), quals(6), 3, Orientation::Forward);
        assert_eq!(x.trim_ref_outer(2), 2);
        assert_eq!(x.bases(), b"CCGG");
        assert_eq!(x.junction_index(), 1);

        // The junction base is kept
        assert_eq!(x.trim_ref_outer(10), 1);
        assert_eq!(x.bases(), b"CGG");
        assert_eq!(x.junction_index(), 0);

        let mut x = AnchoredBases::new(b"AACCGG".to_vec(), quals(6), 2, Orientation::Reverse);
        assert_eq!(x.trim_ref_outer(2), 0);
        assert_eq!(x.bases(), b"AACC");
        assert_eq!(x.ref_bases(), b"CC");
    }
}
