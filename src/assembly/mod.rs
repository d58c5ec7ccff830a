//! Junction assembly data model
//!
//! A junction assembly is a contiguous base sequence anchored at one genomic breakend. These are
//! built by the per-junction assembly step and consumed here for linking and phasing.
//!

pub mod anchored_bases;
pub mod read_sharing;
pub mod ref_base_extension;
pub mod repeats;

use std::fmt;

use serde::{Deserialize, Serialize};

use self::anchored_bases::AnchoredBases;
use crate::int_range::IntRange;

/// Junction orientation
///
/// A 'Forward' junction has its ref bases on the left (lower positions) and the novel extension
/// sequence continuing to the right, as on the left side of a simple deletion.
///
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
)]
pub enum Orientation {
    Forward,
    Reverse,
}

impl Orientation {
    pub fn is_forward(&self) -> bool {
        *self == Orientation::Forward
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Junction {
    pub chromosome: String,

    /// 0-indexed position of the junction base, the innermost ref base of the assembly
    pub position: i64,

    pub orientation: Orientation,

    /// True if the junction was formed from an indel in the read alignments
    #[serde(default)]
    pub indel: bool,
}

impl Junction {
    pub fn is_forward(&self) -> bool {
        self.orientation.is_forward()
    }

    pub fn is_reverse(&self) -> bool {
        !self.is_forward()
    }
}

impl fmt::Display for Junction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let orientation = if self.is_forward() { 1 } else { -1 };
        let indel = if self.indel { ":indel" } else { "" };
        write!(
            f,
            "{}:{}:{}{}",
            self.chromosome, self.position, orientation, indel
        )
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct AssemblyId(pub usize);

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Indel coordinates observed in a read alignment
///
/// For a deletion, `pos_start` is the last base before the deleted bases and `pos_end` the first
/// base after them. For an insertion, they are the bases on either side of the inserted sequence.
///
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndelCoords {
    pub pos_start: i64,
    pub pos_end: i64,
    pub length: i64,
    #[serde(default)]
    pub inserted_bases: String,
}

impl IndelCoords {
    pub fn matches(&self, other: &IndelCoords) -> bool {
        self.pos_start == other.pos_start
            && self.pos_end == other.pos_end
            && self.length == other.length
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display)]
pub enum SupportType {
    /// Read spanning the junction
    Junction,

    /// Mate of a junction-spanning read
    JunctionMate,

    /// Discordant pair read supporting the assembly
    Discordant,

    /// Read matched to the extension sequence only
    Extension,

    /// Read which may support the assembly, not yet confirmed
    Candidate,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SupportRead {
    /// Read name, shared by both reads of a fragment
    pub id: String,

    pub support_type: SupportType,

    #[serde(default = "default_true")]
    pub first_in_pair: bool,

    #[serde(default)]
    pub supplementary: bool,

    pub chromosome: String,

    /// Aligned range on the reference [aligned_start, aligned_end)
    pub aligned_start: i64,
    pub aligned_end: i64,

    /// Reference position of the first read base, including soft-clipped bases
    #[serde(default)]
    pub unclipped_start: Option<i64>,

    pub orientation: Orientation,

    #[serde(default)]
    pub indel_coords: Option<IndelCoords>,

    #[serde(default, with = "base_string")]
    pub bases: Vec<u8>,

    #[serde(default)]
    pub base_quals: Vec<u8>,

    /// Index of the first read base within the assembly buffer
    #[serde(default)]
    pub assembly_index: Option<i64>,

    /// Index of the first read base within its phase set's full sequence
    #[serde(default, skip_deserializing)]
    pub full_seq_index: Option<i64>,

    #[serde(default, skip_deserializing)]
    pub full_seq_reversed: bool,
}

fn default_true() -> bool {
    true
}

impl SupportRead {
    /// True if this is the same read as `other`
    pub fn matches_read(&self, other: &SupportRead) -> bool {
        self.id == other.id
            && self.first_in_pair == other.first_in_pair
            && self.supplementary == other.supplementary
    }

    /// True if this read comes from the same fragment as `other`
    pub fn matches_fragment(&self, other: &SupportRead) -> bool {
        self.id == other.id
    }

    pub fn read_length(&self) -> i64 {
        if self.bases.is_empty() {
            self.aligned_end - self.aligned_start
        } else {
            self.bases.len() as i64
        }
    }

    pub fn unclipped_start(&self) -> i64 {
        self.unclipped_start.unwrap_or(self.aligned_start)
    }

    /// Return the read base and quality aligned to `pos`
    ///
    /// Bases are mapped linearly from the unclipped start, so this only applies within the aligned
    /// range of reads without indels in the queried region.
    ///
    pub fn base_at(&self, pos: i64) -> Option<(u8, u8)> {
        if pos < self.aligned_start || pos >= self.aligned_end {
            return None;
        }
        let index = pos - self.unclipped_start();
        if index < 0 || index as usize >= self.bases.len() {
            return None;
        }
        let index = index as usize;
        let qual = self.base_quals.get(index).copied().unwrap_or(0);
        Some((self.bases[index], qual))
    }
}

/// Serialize read and assembly base buffers as strings
pub mod base_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bases: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bases))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.into_bytes())
    }
}

/// Alternative ref base truncation point observed from soft-clipped reads on the ref side of an
/// assembly
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RefSideSoftClip {
    pub position: i64,
    pub orientation: Orientation,
    pub read_ids: Vec<String>,
}

/// A region implicated by the mates of discordant or junction reads
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RemoteRegion {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub orientation: Orientation,
    pub read_ids: Vec<String>,
}

impl RemoteRegion {
    pub fn range(&self) -> IntRange {
        IntRange::from_pair(self.start, self.end)
    }

    pub fn read_count(&self) -> usize {
        self.read_ids.len()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
pub enum AssemblyOutcome {
    Unset,
    Linked,
    LocalIndel,
    DupBranch,
    RemoteRegion,
    Secondary,
}

#[derive(Clone, Debug)]
pub struct JunctionAssembly {
    pub id: AssemblyId,
    pub junction: Junction,
    seq: AnchoredBases,
    pub support: Vec<SupportRead>,
    pub candidate_support: Vec<SupportRead>,
    pub ref_side_soft_clips: Vec<RefSideSoftClip>,
    pub remote_regions: Vec<RemoteRegion>,
    pub indel_coords: Option<IndelCoords>,
    pub outcome: AssemblyOutcome,

    /// True for assemblies created during linking, such as reference-backed stand-ins
    pub derived: bool,
}

impl JunctionAssembly {
    pub fn new(
        id: AssemblyId,
        junction: Junction,
        bases: Vec<u8>,
        quals: Vec<u8>,
        junction_index: usize,
    ) -> Self {
        let orientation = junction.orientation;
        Self {
            id,
            junction,
            seq: AnchoredBases::new(bases, quals, junction_index, orientation),
            support: Vec::new(),
            candidate_support: Vec::new(),
            ref_side_soft_clips: Vec::new(),
            remote_regions: Vec::new(),
            indel_coords: None,
            outcome: AssemblyOutcome::Unset,
            derived: false,
        }
    }

    pub fn bases(&self) -> &[u8] {
        self.seq.bases()
    }

    pub fn base_quals(&self) -> &[u8] {
        self.seq.quals()
    }

    pub fn base_length(&self) -> usize {
        self.seq.len()
    }

    pub fn junction_index(&self) -> usize {
        self.seq.junction_index()
    }

    pub fn ref_base_length(&self) -> usize {
        self.seq.ref_base_length()
    }

    pub fn extension_length(&self) -> usize {
        self.seq.extension_length()
    }

    pub fn ref_bases(&self) -> &[u8] {
        self.seq.ref_bases()
    }

    pub fn extension_bases(&self) -> &[u8] {
        self.seq.extension_bases()
    }

    pub fn is_forward_junction(&self) -> bool {
        self.junction.is_forward()
    }

    pub fn is_reverse_junction(&self) -> bool {
        self.junction.is_reverse()
    }

    /// Genomic position of the outermost ref base
    pub fn ref_base_position(&self) -> i64 {
        let ref_len = self.ref_base_length() as i64;
        if self.is_forward_junction() {
            self.junction.position - (ref_len - 1)
        } else {
            self.junction.position + (ref_len - 1)
        }
    }

    /// Genomic range covered by the ref bases
    pub fn ref_range(&self) -> IntRange {
        let outer = self.ref_base_position();
        if self.is_forward_junction() {
            IntRange::from_pair(outer, self.junction.position + 1)
        } else {
            IntRange::from_pair(self.junction.position, outer + 1)
        }
    }

    fn shift_read_assembly_indexes(&mut self, shift: i64) {
        if shift == 0 {
            return;
        }
        for read in self
            .support
            .iter_mut()
            .chain(self.candidate_support.iter_mut())
        {
            if let Some(index) = read.assembly_index.as_mut() {
                *index += shift;
            }
        }
    }

    /// Trim ref bases so that they do not extend past genomic `position`
    ///
    /// Returns the number of bases trimmed.
    ///
    pub fn trim_ref_bases_to(&mut self, position: i64) -> usize {
        let outer = self.ref_base_position();
        let excess = if self.is_forward_junction() {
            position - outer
        } else {
            outer - position
        };
        if excess <= 0 {
            return 0;
        }
        let before = self.ref_base_length();
        let shift = self.seq.trim_ref_outer(excess as usize);
        self.shift_read_assembly_indexes(-(shift as i64));
        before - self.ref_base_length()
    }

    /// Extend ref bases outward from the current outermost ref base
    pub fn extend_ref_bases(&mut self, outward_bases: &[u8], outward_quals: &[u8]) {
        let shift = self.seq.extend_ref_outward(outward_bases, outward_quals);
        self.shift_read_assembly_indexes(shift as i64);
    }

    /// True if all support reads are supplementary alignments
    pub fn is_supplementary_only(&self) -> bool {
        !self.support.is_empty() && self.support.iter().all(|x| x.supplementary)
    }

    /// True if any support or candidate read carries fragment `read_id`
    pub fn has_fragment(&self, read_id: &str) -> bool {
        self.support
            .iter()
            .chain(self.candidate_support.iter())
            .any(|x| x.id == read_id)
    }
}

impl fmt::Display for JunctionAssembly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "id({}) junc({}) len({}) refLen({}) extLen({}) support({}) candidates({}) outcome({})",
            self.id,
            self.junction,
            self.base_length(),
            self.ref_base_length(),
            self.extension_length(),
            self.support.len(),
            self.candidate_support.len(),
            self.outcome
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_ref_base_position() {
        let a = test_assembly(0, "chr1", 100, Orientation::Forward, b"AACCGGTT", 3);
        assert_eq!(a.ref_base_position(), 97);
        assert_eq!(a.ref_range(), IntRange::from_pair(97, 101));

        let a = test_assembly(0, "chr1", 100, Orientation::Reverse, b"AACCGGTT", 3);
        assert_eq!(a.ref_base_position(), 104);
        assert_eq!(a.ref_range(), IntRange::from_pair(100, 105));
    }

    #[test]
    fn test_trim_ref_bases_to() {
        let mut a = test_assembly(0, "chr1", 100, Orientation::Forward, b"AACCGGTT", 3);
        let mut read = test_read("r1", "chr1", 97, Orientation::Forward);
        read.assembly_index = Some(2);
        a.support.push(read);

        assert_eq!(a.trim_ref_bases_to(95), 0);
        assert_eq!(a.trim_ref_bases_to(99), 2);
        assert_eq!(a.ref_bases(), b"CC");
        assert_eq!(a.support[0].assembly_index, Some(0));

        let mut a = test_assembly(0, "chr1", 100, Orientation::Reverse, b"AACCGGTT", 3);
        assert_eq!(a.trim_ref_bases_to(102), 2);
        assert_eq!(a.ref_bases(), b"CGG");
        assert_eq!(a.ref_base_position(), 102);
    }

    #[test]
    fn test_base_at() {
        let mut read = test_read("r1", "chr1", 10, Orientation::Forward);
        read.aligned_end = 14;
        read.unclipped_start = Some(8);
        read.bases = b"TTACGT".to_vec();
        read.base_quals = vec![30; 6];
        assert_eq!(read.base_at(10), Some((b'A', 30)));
        assert_eq!(read.base_at(13), Some((b'T', 30)));
        assert_eq!(read.base_at(9), None);
        assert_eq!(read.base_at(14), None);
    }
}
