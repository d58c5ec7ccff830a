//! Tandem repeat annotation for assembly and reference sequence buffers
//!

/// Longest repeat unit considered
const MAX_REPEAT_UNIT_LENGTH: usize = 4;

/// Homopolymer runs need at least this many copies to be annotated
const MIN_HOMOPOLYMER_COUNT: usize = 4;

/// Repeat units longer than one base need at least this many copies to be annotated
const MIN_REPEAT_COUNT: usize = 3;

/// A tandem repeat run within a sequence buffer
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatInfo {
    /// Buffer index of the first base of the run
    pub index: usize,
    pub unit: Vec<u8>,
    pub count: usize,
}

impl RepeatInfo {
    pub fn length(&self) -> usize {
        self.unit.len() * self.count
    }

    /// Buffer index immediately after the run
    pub fn end_index(&self) -> usize {
        self.index + self.length()
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.index && index < self.end_index()
    }
}

fn get_unit_count(bases: &[u8], index: usize, unit_len: usize) -> usize {
    let unit = &bases[index..index + unit_len];
    let mut count = 1;
    loop {
        let next = index + count * unit_len;
        if next + unit_len > bases.len() || &bases[next..next + unit_len] != unit {
            break;
        }
        count += 1;
    }
    count
}

/// Find all non-overlapping tandem repeat runs in `bases`, in buffer order
///
/// At each position the repeat covering the most bases is chosen, with ties going to the shorter
/// unit.
///
pub fn find_repeats(bases: &[u8]) -> Vec<RepeatInfo> {
    let mut repeats = Vec::new();
    let mut index = 0;
    while index < bases.len() {
        let mut best: Option<RepeatInfo> = None;
        for unit_len in 1..=MAX_REPEAT_UNIT_LENGTH {
            if index + unit_len * 2 > bases.len() {
                break;
            }
            let unit = &bases[index..index + unit_len];
            if unit.contains(&b'N') {
                continue;
            }
            // Skip units which are themselves a homopolymer, these are covered by unit length 1
            if unit_len > 1 && unit.iter().all(|&x| x == unit[0]) {
                continue;
            }
            let count = get_unit_count(bases, index, unit_len);
            let min_count = if unit_len == 1 {
                MIN_HOMOPOLYMER_COUNT
            } else {
                MIN_REPEAT_COUNT
            };
            if count < min_count {
                continue;
            }
            let candidate = RepeatInfo {
                index,
                unit: unit.to_vec(),
                count,
            };
            if best
                .as_ref()
                .is_none_or(|x| candidate.length() > x.length())
            {
                best = Some(candidate);
            }
        }
        match best {
            Some(x) => {
                index = x.end_index();
                repeats.push(x);
            }
            None => {
                index += 1;
            }
        }
    }
    repeats
}

/// Find the repeat covering `index`, given repeats sorted in buffer order
pub fn get_repeat_at(repeats: &[RepeatInfo], index: usize) -> Option<&RepeatInfo> {
    let pos = repeats.partition_point(|x| x.end_index() <= index);
    repeats.get(pos).filter(|x| x.contains(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_repeats() {
        let repeats = find_repeats(b"GAAAAAC");
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats[0].index, 1);
        assert_eq!(repeats[0].unit, b"A".to_vec());
        assert_eq!(repeats[0].count, 5);

        // Homopolymer below the minimum count
        assert!(find_repeats(b"GAAAC").is_empty());

        let repeats = find_repeats(b"TTCACACAGG");
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats[0].index, 2);
        assert_eq!(repeats[0].unit, b"CA".to_vec());
        assert_eq!(repeats[0].count, 3);
        assert_eq!(repeats[0].end_index(), 8);
    }

    #[test]
    fn test_find_repeats_skips_n() {
        assert!(find_repeats(b"NNNNNNNN").is_empty());
    }

    #[test]
    fn test_get_repeat_at() {
        let repeats = find_repeats(b"GAAAAACTTCTTCTTCG");
        assert_eq!(repeats.len(), 2);
        assert!(get_repeat_at(&repeats, 0).is_none());
        assert_eq!(get_repeat_at(&repeats, 3).unwrap().unit, b"A".to_vec());
        assert_eq!(get_repeat_at(&repeats, 6).unwrap().unit, b"CTT".to_vec());
        assert_eq!(get_repeat_at(&repeats, 14).unwrap().count, 3);
        assert!(get_repeat_at(&repeats, 15).is_none());
    }
}
