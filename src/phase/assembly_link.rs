//! Links between junction assemblies
//!

use std::fmt;

use serde::Serialize;

use crate::assembly::{AssemblyId, JunctionAssembly};

/// Breakpoint bases of a split link
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SplitBases {
    /// The two junctions join with no inserted or overlapping bases
    Exact,

    /// Novel bases between the two junctions
    Insert(#[serde(with = "crate::assembly::base_string")] Vec<u8>),

    /// Ref bases shared by both sides of the breakpoint
    Overlap(#[serde(with = "crate::assembly::base_string")] Vec<u8>),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum LinkType {
    Split(SplitBases),

    /// Two assemblies whose ref sides face each other, spanning a templated segment
    Facing,

    Indel {
        #[serde(with = "crate::assembly::base_string")]
        inserted_bases: Vec<u8>,
    },
}

/// A directional pairing of two assemblies
///
/// Inserted and overlap bases are given in the orientation where `first` leads into its junction
/// from its ref bases, and `second` continues from its junction into its ref bases.
///
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AssemblyLink {
    first: AssemblyId,
    second: AssemblyId,
    link_type: LinkType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
pub enum SvType {
    Del,
    Dup,
    Ins,
    Inv,
    Bnd,
}

impl AssemblyLink {
    pub fn new(first: AssemblyId, second: AssemblyId, link_type: LinkType) -> Self {
        Self {
            first,
            second,
            link_type,
        }
    }

    pub fn first(&self) -> AssemblyId {
        self.first
    }

    pub fn second(&self) -> AssemblyId {
        self.second
    }

    pub fn link_type(&self) -> &LinkType {
        &self.link_type
    }

    pub fn is_split(&self) -> bool {
        matches!(self.link_type, LinkType::Split(_) | LinkType::Indel { .. })
    }

    pub fn is_facing(&self) -> bool {
        self.link_type == LinkType::Facing
    }

    pub fn inserted_bases(&self) -> &[u8] {
        match &self.link_type {
            LinkType::Split(SplitBases::Insert(x)) => x,
            LinkType::Indel { inserted_bases } => inserted_bases,
            _ => &[],
        }
    }

    pub fn overlap_bases(&self) -> &[u8] {
        match &self.link_type {
            LinkType::Split(SplitBases::Overlap(x)) => x,
            _ => &[],
        }
    }

    pub fn has_assembly(&self, id: AssemblyId) -> bool {
        self.first == id || self.second == id
    }

    pub fn other_assembly(&self, id: AssemblyId) -> Option<AssemblyId> {
        if self.first == id {
            Some(self.second)
        } else if self.second == id {
            Some(self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for AssemblyLink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let type_label = match &self.link_type {
            LinkType::Split(_) => "SPLIT",
            LinkType::Facing => "FACING",
            LinkType::Indel { .. } => "INDEL",
        };
        write!(
            f,
            "{}({}-{}) ins({}) overlap({})",
            type_label,
            self.first,
            self.second,
            String::from_utf8_lossy(self.inserted_bases()),
            String::from_utf8_lossy(self.overlap_bases())
        )
    }
}

/// Classify the structural variant implied by a split link between two assemblies
pub fn get_sv_type(first: &JunctionAssembly, second: &JunctionAssembly) -> SvType {
    let j1 = &first.junction;
    let j2 = &second.junction;
    if j1.chromosome != j2.chromosome {
        return SvType::Bnd;
    }
    if j1.orientation == j2.orientation {
        return SvType::Inv;
    }
    let (lower, upper) = if j1.position <= j2.position {
        (j1, j2)
    } else {
        (j2, j1)
    };
    if lower.is_forward() {
        let distance = upper.position - lower.position;
        if distance <= 1 {
            SvType::Ins
        } else {
            SvType::Del
        }
    } else {
        SvType::Dup
    }
}

/// SV length implied by a split link, not including inserted bases
pub fn get_sv_length(first: &JunctionAssembly, second: &JunctionAssembly) -> i64 {
    match get_sv_type(first, second) {
        SvType::Bnd => 0,
        SvType::Ins => 0,
        SvType::Del => (second.junction.position - first.junction.position).abs() - 1,
        SvType::Dup | SvType::Inv => {
            (second.junction.position - first.junction.position).abs() + 1
        }
    }
}

/// True for a duplication shorter than `max_length`
pub fn is_short_dup(first: &JunctionAssembly, second: &JunctionAssembly, max_length: i64) -> bool {
    get_sv_type(first, second) == SvType::Dup && get_sv_length(first, second) < max_length
}
