//! Chains of split and facing links, and the derived full sequence of each chain
//!

use log::debug;
use serde::Serialize;

use super::assembly_link::AssemblyLink;
use crate::assembly::{AssemblyId, JunctionAssembly};
use crate::seq_util::rev_comp;

/// Location of one assembly's oriented bases within a phase set full sequence
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssemblyPlacement {
    pub assembly_id: AssemblyId,

    /// Full sequence index of the first base of the oriented assembly buffer. This can be negative
    /// when the assembly starts the chain from its junction.
    pub offset: i64,

    /// True if the assembly bases are reverse complemented in the full sequence
    pub reversed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FullSequence {
    #[serde(with = "crate::assembly::base_string")]
    pub bases: Vec<u8>,
    pub placements: Vec<AssemblyPlacement>,
}

impl FullSequence {
    pub fn placement(&self, id: AssemblyId) -> Option<&AssemblyPlacement> {
        self.placements.iter().find(|x| x.assembly_id == id)
    }
}

/// Direction in which the full sequence passes through an assembly junction
#[derive(Clone, Copy, Debug, PartialEq)]
enum ChainRole {
    /// Ref bases lead into the junction
    Arriving,

    /// Ref bases lead away from the junction
    Leaving,
}

#[derive(Clone, Debug, Serialize)]
pub struct PhaseSet {
    pub id: usize,

    /// Links in chain order, each sharing one assembly with the next
    links: Vec<AssemblyLink>,

    /// Phase set that absorbed this one
    pub merged_into: Option<usize>,

    /// Phase sets absorbed into this one
    pub merged_from: Vec<usize>,

    pub full_sequence: Option<FullSequence>,
}

impl PhaseSet {
    pub fn new(id: usize, link: AssemblyLink) -> Self {
        Self {
            id,
            links: vec![link],
            merged_into: None,
            merged_from: Vec::new(),
            full_sequence: None,
        }
    }

    pub fn links(&self) -> &[AssemblyLink] {
        &self.links
    }

    /// Assembly at the start of the chain
    pub fn front_assembly(&self) -> AssemblyId {
        self.assembly_ids()[0]
    }

    /// Assembly at the end of the chain
    pub fn back_assembly(&self) -> AssemblyId {
        let ids = self.assembly_ids();
        ids[ids.len() - 1]
    }

    /// Add a link at the start of the chain, sharing the current front assembly
    pub fn push_front(&mut self, link: AssemblyLink) {
        self.links.insert(0, link);
    }

    /// Add a link at the end of the chain, sharing the current back assembly
    pub fn push_back(&mut self, link: AssemblyLink) {
        self.links.push(link);
    }

    /// Member assemblies in chain order
    pub fn assembly_ids(&self) -> Vec<AssemblyId> {
        let first_link = &self.links[0];
        let start = match self.links.get(1) {
            Some(next_link) if next_link.has_assembly(first_link.first()) => first_link.second(),
            _ => first_link.first(),
        };
        let mut ids = vec![start];
        let mut current = start;
        for link in self.links.iter() {
            match link.other_assembly(current) {
                Some(next) => {
                    ids.push(next);
                    current = next;
                }
                None => break,
            }
        }
        ids
    }

    pub fn has_assembly(&self, id: AssemblyId) -> bool {
        self.links.iter().any(|x| x.has_assembly(id))
    }

    pub fn assembly_count(&self) -> usize {
        self.links.len() + 1
    }

    /// True if the two assemblies are joined by one link of this phase set
    pub fn has_direct_link(&self, a1: AssemblyId, a2: AssemblyId) -> bool {
        self.links
            .iter()
            .any(|x| x.has_assembly(a1) && x.has_assembly(a2))
    }

    /// Role of each assembly in chain order
    ///
    /// Returns None if consecutive links do not alternate consistently between split and facing.
    ///
    fn chain_roles(&self) -> Option<Vec<ChainRole>> {
        let count = self.assembly_count();
        let mut roles: Vec<Option<ChainRole>> = vec![None; count];
        for (i, link) in self.links.iter().enumerate() {
            let (left, right) = if link.is_facing() {
                (ChainRole::Leaving, ChainRole::Arriving)
            } else {
                (ChainRole::Arriving, ChainRole::Leaving)
            };
            for (index, role) in [(i, left), (i + 1, right)] {
                match roles[index] {
                    Some(x) if x != role => return None,
                    _ => roles[index] = Some(role),
                }
            }
        }
        roles.into_iter().collect()
    }

    /// Orientation of each assembly in chain order within the full sequence
    ///
    /// An arriving assembly is reverse complemented if it is a reverse junction, and a leaving
    /// assembly if it is a forward junction.
    ///
    pub fn chain_orientation<'b>(
        &self,
        get_assembly: impl Fn(AssemblyId) -> Option<&'b JunctionAssembly>,
    ) -> Option<Vec<(AssemblyId, bool)>> {
        let roles = self.chain_roles()?;
        let mut result = Vec::new();
        for (id, role) in self.assembly_ids().into_iter().zip(roles) {
            let assembly = get_assembly(id)?;
            let reversed = match role {
                ChainRole::Arriving => assembly.is_reverse_junction(),
                ChainRole::Leaving => assembly.is_forward_junction(),
            };
            result.push((id, reversed));
        }
        Some(result)
    }

    /// Derive the full sequence of the chain from the member assemblies
    ///
    /// Returns None when the chain can't be traversed, such as a facing gap longer than the ref
    /// bases of both assemblies.
    ///
    pub fn build_full_sequence<'b>(
        &self,
        get_assembly: impl Fn(AssemblyId) -> Option<&'b JunctionAssembly>,
    ) -> Option<FullSequence> {
        let roles = self.chain_roles()?;
        let ids = self.assembly_ids();
        let assemblies = ids
            .iter()
            .map(|&x| get_assembly(x))
            .collect::<Option<Vec<_>>>()?;

        let views = assemblies
            .iter()
            .zip(roles.iter())
            .map(|(a, role)| {
                let reversed = match role {
                    ChainRole::Arriving => a.is_reverse_junction(),
                    ChainRole::Leaving => a.is_forward_junction(),
                };
                if reversed {
                    (rev_comp(a.bases()), a.base_length() - 1 - a.junction_index(), true)
                } else {
                    (a.bases().to_vec(), a.junction_index(), false)
                }
            })
            .collect::<Vec<_>>();

        let mut bases: Vec<u8> = Vec::new();
        let mut placements = Vec::new();

        // Bases of the current leaving assembly already in the full sequence, from an overlap
        let mut skip = 0;
        for i in 0..ids.len() {
            let (view, junction, reversed) = &views[i];
            let junction = *junction;
            match roles[i] {
                ChainRole::Arriving => {
                    let offset = if i == 0 {
                        bases.extend_from_slice(&view[..=junction]);
                        0
                    } else {
                        // Junction base was written by the preceding facing segment
                        bases.len() as i64 - 1 - junction as i64
                    };
                    placements.push(AssemblyPlacement {
                        assembly_id: ids[i],
                        offset,
                        reversed: *reversed,
                    });

                    if let Some(link) = self.links.get(i) {
                        let inserted = if link.first() == ids[i] {
                            link.inserted_bases().to_vec()
                        } else {
                            rev_comp(link.inserted_bases())
                        };
                        bases.extend_from_slice(&inserted);
                        skip = link.overlap_bases().len();
                    }
                }
                ChainRole::Leaving => {
                    let junction_start = bases.len() as i64 - skip as i64;
                    placements.push(AssemblyPlacement {
                        assembly_id: ids[i],
                        offset: junction_start - junction as i64,
                        reversed: *reversed,
                    });

                    if i + 1 < ids.len() {
                        let segment_length = (assemblies[i].junction.position
                            - assemblies[i + 1].junction.position)
                            .abs() as usize
                            + 1;
                        if segment_length <= skip {
                            debug!(
                                "Overlap of {skip} bases covers facing segment {segment_length}"
                            );
                            return None;
                        }
                        let (next_view, next_junction, _) = &views[i + 1];
                        let segment = if *next_junction + 1 >= segment_length {
                            &next_view[*next_junction + 1 - segment_length + skip..=*next_junction]
                        } else if junction + segment_length <= view.len() {
                            &view[junction + skip..junction + segment_length]
                        } else {
                            debug!(
                                "No assembly covers facing segment between {} and {}",
                                ids[i],
                                ids[i + 1]
                            );
                            return None;
                        };
                        bases.extend_from_slice(segment);
                    } else {
                        if junction + skip > view.len() {
                            return None;
                        }
                        bases.extend_from_slice(&view[junction + skip..]);
                    }
                    skip = 0;
                }
            }
        }

        Some(FullSequence { bases, placements })
    }
}

/// Full sequence index and orientation of every support read with a known assembly index
///
pub fn assign_read_full_seq_indexes(
    assembly: &mut JunctionAssembly,
    placement: &AssemblyPlacement,
) {
    let assembly_length = assembly.base_length() as i64;
    for read in assembly.support.iter_mut() {
        let Some(assembly_index) = read.assembly_index else {
            continue;
        };
        let index = if placement.reversed {
            assembly_length - assembly_index - read.read_length()
        } else {
            assembly_index
        };
        read.full_seq_index = Some(placement.offset + index);
        read.full_seq_reversed = placement.reversed;
    }
}
