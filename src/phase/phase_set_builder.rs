//! Select split and facing links within one phase group and chain them into phase sets
//!

use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use serde::Serialize;
use simple_error::{SimpleResult, bail};

use super::PhaseSettings;
use super::assembly_link::{AssemblyLink, is_short_dup};
use super::assembly_linker::{AssemblyLinker, is_local_assembly_candidate};
use super::local_sequence_matcher::LocalSequenceMatcher;
use super::phase_group::PhaseGroup;
use super::phase_set::{PhaseSet, assign_read_full_seq_indexes};
use super::remote_region_assembler::{RemoteRegionAssembler, RemoteRegionStats};
use crate::assembly::read_sharing::count_shared_fragments;
use crate::assembly::ref_base_extension::extend_ref_bases;
use crate::assembly::{AssemblyId, AssemblyOutcome, JunctionAssembly, SupportRead, SupportType};
use crate::genome_ref::RefGenomeSource;
use crate::log_utils::debug_msg;
use crate::read_source::RemoteReadSource;
use crate::seq_compare::SequenceComparator;

#[derive(Clone, Debug, Default, Serialize)]
pub struct PhaseSetBuildStats {
    pub split_links: usize,
    pub facing_links: usize,
    pub secondary_links: usize,
    pub local_matches: usize,
    pub branched_assemblies: usize,
    pub promoted_chained_reads: usize,
    pub remote: RemoteRegionStats,
}

impl PhaseSetBuildStats {
    pub fn merge(&mut self, other: &Self) {
        self.split_links += other.split_links;
        self.facing_links += other.facing_links;
        self.secondary_links += other.secondary_links;
        self.local_matches += other.local_matches;
        self.branched_assemblies += other.branched_assemblies;
        self.promoted_chained_reads += other.promoted_chained_reads;
        self.remote.merge(&other.remote);
    }
}

/// Links found so far within the current phase group
#[derive(Default)]
struct GroupLinks {
    split_links: Vec<AssemblyLink>,
    facing_links: Vec<AssemblyLink>,
    secondary_links: Vec<AssemblyLink>,
    linked: HashSet<AssemblyId>,
}

fn get_assembly_index(group: &PhaseGroup, id: AssemblyId) -> SimpleResult<usize> {
    match group.assembly_index(id) {
        Some(x) => Ok(x),
        None => bail!("Assembly {id} not found in phase group {}", group.id),
    }
}

/// Mutable references to two distinct items
fn get_two_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j);
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

fn set_linked_outcome(assembly: &mut JunctionAssembly) {
    if assembly.outcome == AssemblyOutcome::Unset {
        assembly.outcome = AssemblyOutcome::Linked;
    }
}

fn support_and_candidates(assembly: &JunctionAssembly) -> impl Iterator<Item = &SupportRead> {
    assembly
        .support
        .iter()
        .chain(assembly.candidate_support.iter())
}

/// Move the candidate reads at `indexes` into confirmed support
fn promote_candidates(assembly: &mut JunctionAssembly, indexes: &[usize]) -> Vec<SupportRead> {
    let indexes = indexes.iter().copied().collect::<HashSet<_>>();
    let (promoted, kept): (Vec<_>, Vec<_>) = assembly
        .candidate_support
        .drain(..)
        .enumerate()
        .partition(|(i, _)| indexes.contains(i));
    assembly.candidate_support = kept.into_iter().map(|(_, x)| x).collect();

    let promoted = promoted
        .into_iter()
        .map(|(_, mut read)| {
            if read.support_type != SupportType::JunctionMate {
                read.support_type = SupportType::Discordant;
            }
            read
        })
        .collect::<Vec<_>>();
    assembly.support.extend(promoted.iter().cloned());
    promoted
}

/// Promote candidate reads of `assembly` which are junction mates or share a fragment with `other`
fn promote_shared_candidates(
    assembly: &mut JunctionAssembly,
    other: &JunctionAssembly,
) -> Vec<SupportRead> {
    let indexes = assembly
        .candidate_support
        .iter()
        .enumerate()
        .filter(|(_, candidate)| {
            candidate.support_type == SupportType::JunctionMate
                || support_and_candidates(other).any(|x| x.matches_fragment(candidate))
        })
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    promote_candidates(assembly, &indexes)
}

/// Record a primary split link, promote shared candidate reads on both assemblies and use them
/// to extend ref bases
///
/// Returns the number of branch assemblies added to the group.
///
fn build_split_link(
    settings: &PhaseSettings,
    next_id: &AtomicUsize,
    group: &mut PhaseGroup,
    links: &mut GroupLinks,
    link: AssemblyLink,
    allow_branching: bool,
) -> SimpleResult<usize> {
    let i = get_assembly_index(group, link.first())?;
    let j = get_assembly_index(group, link.second())?;

    let (a1, a2) = get_two_mut(&mut group.assemblies, i, j);
    set_linked_outcome(a1);
    set_linked_outcome(a2);
    let promoted1 = promote_shared_candidates(a1, a2);
    let promoted2 = promote_shared_candidates(a2, a1);

    let mut branches = Vec::new();
    for (index, promoted) in [(i, promoted1), (j, promoted2)] {
        if promoted.is_empty() {
            continue;
        }
        if let Some(branch) = extend_ref_bases(
            &mut group.assemblies[index],
            &promoted,
            settings.ref_extension_min_reads,
            allow_branching,
            || AssemblyId(next_id.fetch_add(1, Ordering::Relaxed)),
        ) {
            branches.push(branch);
        }
    }
    let branch_count = branches.len();
    group.assemblies.extend(branches);

    debug_msg!(
        settings.is_debug_group(group.id),
        "Phase group {} split link {}",
        group.id,
        link
    );
    links.linked.insert(link.first());
    links.linked.insert(link.second());
    links.split_links.push(link);
    Ok(branch_count)
}

/// Chain split links through facing links into phase sets
///
/// Each phase set starts from the next unused split link and grows at both ends, alternately
/// taking a facing link and a split link. A consumed facing link removes every other facing link
/// touching either of its assemblies.
///
fn form_phase_sets(links: &GroupLinks) -> Vec<PhaseSet> {
    let mut split_pool = links.split_links.iter().cloned().collect::<VecDeque<_>>();
    let mut facing_pool = links.facing_links.clone();
    let mut phase_sets = Vec::new();

    while let Some(split_link) = split_pool.pop_front() {
        let mut phase_set = PhaseSet::new(phase_sets.len(), split_link);
        for at_back in [true, false] {
            loop {
                let end = if at_back {
                    phase_set.back_assembly()
                } else {
                    phase_set.front_assembly()
                };
                let Some(facing_index) = facing_pool.iter().position(|x| x.has_assembly(end))
                else {
                    break;
                };
                let facing_link = facing_pool.remove(facing_index);
                let Some(next) = facing_link.other_assembly(end) else {
                    break;
                };
                facing_pool.retain(|x| !x.has_assembly(end) && !x.has_assembly(next));
                if phase_set.has_assembly(next) {
                    break;
                }
                if at_back {
                    phase_set.push_back(facing_link);
                } else {
                    phase_set.push_front(facing_link);
                }

                let Some(split_index) = split_pool.iter().position(|x| x.has_assembly(next)) else {
                    break;
                };
                let Some(next_split) = split_pool.remove(split_index) else {
                    break;
                };
                if at_back {
                    phase_set.push_back(next_split);
                } else {
                    phase_set.push_front(next_split);
                }
            }
        }
        phase_sets.push(phase_set);
    }
    phase_sets
}

/// Promote candidate reads shared by two assemblies of one chain, where the reads face each other
/// along the chain
///
/// `a1` precedes `a2` in the chain, and each flag gives whether the assembly is reverse
/// complemented in the chain orientation.
///
fn promote_chained_candidates(
    a1: &mut JunctionAssembly,
    a1_reversed: bool,
    a2: &mut JunctionAssembly,
    a2_reversed: bool,
) -> usize {
    let faces = |r1: &SupportRead, r2: &SupportRead| {
        r1.matches_fragment(r2)
            && !r1.matches_read(r2)
            && r1.orientation.is_forward() != a1_reversed
            && r2.orientation.is_forward() == a2_reversed
    };
    let indexes1 = a1
        .candidate_support
        .iter()
        .enumerate()
        .filter(|(_, c)| support_and_candidates(a2).any(|r| faces(c, r)))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    let indexes2 = a2
        .candidate_support
        .iter()
        .enumerate()
        .filter(|(_, c)| support_and_candidates(a1).any(|r| faces(r, c)))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    promote_candidates(a1, &indexes1).len() + promote_candidates(a2, &indexes2).len()
}

/// Add support from candidate reads spanning non-adjacent assemblies of each longer phase set
fn add_chained_support(group: &mut PhaseGroup, phase_sets: &[PhaseSet]) -> usize {
    let mut promoted = 0;
    for phase_set in phase_sets.iter().filter(|x| x.assembly_count() > 2) {
        let Some(chain) = phase_set.chain_orientation(|id| group.assembly(id)) else {
            continue;
        };
        for (i, &(id1, reversed1)) in chain.iter().enumerate() {
            for &(id2, reversed2) in chain[i + 1..].iter() {
                if phase_set.has_direct_link(id1, id2) {
                    continue;
                }
                let (Some(index1), Some(index2)) =
                    (group.assembly_index(id1), group.assembly_index(id2))
                else {
                    continue;
                };
                let (a1, a2) = get_two_mut(&mut group.assemblies, index1, index2);
                promoted += promote_chained_candidates(a1, reversed1, a2, reversed2);
            }
        }
    }
    promoted
}

pub struct PhaseSetBuilder<'a> {
    settings: &'a PhaseSettings,
    linker: AssemblyLinker<'a>,
    local_matcher: LocalSequenceMatcher<'a>,
    remote_assembler: Option<RemoteRegionAssembler<'a>>,

    /// Source of ids for assemblies created while linking
    next_id: &'a AtomicUsize,

    pub stats: PhaseSetBuildStats,
}

impl<'a> PhaseSetBuilder<'a> {
    /// Without a read source, remote regions are not searched
    pub fn new(
        settings: &'a PhaseSettings,
        genome_ref: &'a dyn RefGenomeSource,
        comparator: &'a dyn SequenceComparator,
        read_source: Option<&'a mut dyn RemoteReadSource>,
        next_id: &'a AtomicUsize,
    ) -> Self {
        Self {
            settings,
            linker: AssemblyLinker::new(settings, comparator),
            local_matcher: LocalSequenceMatcher::new(settings, genome_ref, comparator),
            remote_assembler: read_source.map(|x| {
                RemoteRegionAssembler::new(settings, genome_ref, comparator, x)
            }),
            next_id,
            stats: PhaseSetBuildStats::default(),
        }
    }

    /// Build the phase sets of one phase group
    ///
    /// Derived assemblies created while linking are added to the group. Any secondary split links
    /// found are stored on the group.
    ///
    pub fn build_phase_sets(&mut self, group: &mut PhaseGroup) -> SimpleResult<()> {
        let mut links = GroupLinks::default();
        match group.assemblies.len() {
            0 => return Ok(()),
            1 => {
                let id = group.assemblies[0].id;
                if !self.try_local_link(group, &mut links, id)? {
                    self.form_remote_links(group, &mut links)?;
                }
            }
            2 => {
                let (a1, a2) = (&group.assemblies[0], &group.assemblies[1]);
                if let Some(link) = self.try_split_link(a1, a2) {
                    let allow_branching =
                        !is_short_dup(a1, a2, self.settings.small_dup_branch_length);
                    self.stats.branched_assemblies += build_split_link(
                        self.settings,
                        self.next_id,
                        group,
                        &mut links,
                        link,
                        allow_branching,
                    )?;
                }
            }
            _ => {
                self.form_primary_links(group, &mut links)?;
                self.form_remote_links(group, &mut links)?;
                self.form_facing_links(group, &mut links)?;
            }
        }

        let mut phase_sets = form_phase_sets(&links);
        for phase_set in phase_sets.iter() {
            for id in phase_set.assembly_ids() {
                let index = get_assembly_index(group, id)?;
                set_linked_outcome(&mut group.assemblies[index]);
            }
        }

        self.stats.promoted_chained_reads += add_chained_support(group, &phase_sets);
        self.cleanup(group, &mut phase_sets);

        self.stats.split_links += links.split_links.len();
        self.stats.facing_links += links.facing_links.len();
        self.stats.secondary_links += links.secondary_links.len();
        group.phase_sets = phase_sets;
        group.secondary_links = links.secondary_links;
        Ok(())
    }

    /// Try an indel link, then a sequence overlap link
    fn try_split_link(&self, a1: &JunctionAssembly, a2: &JunctionAssembly) -> Option<AssemblyLink> {
        self.linker.try_assembly_indel(a1, a2).or_else(|| {
            let is_local_indel = a1.junction.indel && a2.junction.indel;
            self.linker.try_assembly_overlap(a1, a2, true, is_local_indel)
        })
    }

    /// Try to link one assembly to a local reference-backed partner
    ///
    /// On success the partner joins the group and both assemblies are marked as linked.
    ///
    fn try_local_link(
        &mut self,
        group: &mut PhaseGroup,
        links: &mut GroupLinks,
        id: AssemblyId,
    ) -> SimpleResult<bool> {
        let index = get_assembly_index(group, id)?;
        let Some((partner, link)) = self
            .local_matcher
            .try_local_link(&mut group.assemblies[index], self.next_id)
        else {
            return Ok(false);
        };
        links.linked.insert(link.first());
        links.linked.insert(link.second());
        links.split_links.push(link);
        group.assemblies.push(partner);
        self.stats.local_matches += 1;
        Ok(true)
    }

    /// Score all assembly pairs and greedily form primary split links, highest evidence first
    ///
    /// Pairs which are not local candidates first test each assembly for a local reference link.
    /// Pairs with exactly one linked assembly may still form a secondary link.
    ///
    fn form_primary_links(
        &mut self,
        group: &mut PhaseGroup,
        links: &mut GroupLinks,
    ) -> SimpleResult<()> {
        let mut pairs = Vec::new();
        for (i, a1) in group.assemblies.iter().enumerate() {
            for a2 in group.assemblies[i + 1..].iter() {
                let is_local = is_local_assembly_candidate(self.settings, a1, a2, false);
                let shared_count = count_shared_fragments(a1, a2, true);
                pairs.push((a1.id, a2.id, is_local, shared_count));
            }
        }
        pairs.sort_by_key(|&(_, _, is_local, shared_count)| Reverse((is_local, shared_count)));

        let mut local_ref_checked = HashSet::new();
        for (id1, id2, is_local, _) in pairs {
            let linked1 = links.linked.contains(&id1);
            let linked2 = links.linked.contains(&id2);
            if !linked1 && !linked2 {
                if !is_local {
                    let mut local_link_found = false;
                    for id in [id1, id2] {
                        if local_ref_checked.insert(id) && self.try_local_link(group, links, id)? {
                            local_link_found = true;
                        }
                    }
                    if local_link_found {
                        continue;
                    }
                }

                let a1 = &group.assemblies[get_assembly_index(group, id1)?];
                let a2 = &group.assemblies[get_assembly_index(group, id2)?];
                if let Some(link) = self.try_split_link(a1, a2) {
                    let allow_branching =
                        !is_short_dup(a1, a2, self.settings.small_dup_branch_length);
                    self.stats.branched_assemblies += build_split_link(
                        self.settings,
                        self.next_id,
                        group,
                        links,
                        link,
                        allow_branching,
                    )?;
                }
            } else if linked1 != linked2 {
                let a1 = &group.assemblies[get_assembly_index(group, id1)?];
                let a2 = &group.assemblies[get_assembly_index(group, id2)?];
                let excluded = |a: &JunctionAssembly| {
                    a.is_supplementary_only() || a.outcome == AssemblyOutcome::DupBranch
                };
                if excluded(a1) || excluded(a2) {
                    continue;
                }
                if let Some(link) = self.linker.try_assembly_overlap(a1, a2, true, false) {
                    links.secondary_links.push(link);
                }
            }
        }
        Ok(())
    }

    /// Link still unlinked assemblies to reference-backed partners in their remote regions
    ///
    /// Regions are tried in order of descending read count. The first link formed for an
    /// assembly is primary, and any later links are secondary.
    ///
    fn form_remote_links(
        &mut self,
        group: &mut PhaseGroup,
        links: &mut GroupLinks,
    ) -> SimpleResult<()> {
        let Some(remote_assembler) = self.remote_assembler.as_mut() else {
            return Ok(());
        };
        let candidate_ids = group
            .assemblies
            .iter()
            .filter(|x| {
                !links.linked.contains(&x.id)
                    && !x.derived
                    && !x.remote_regions.is_empty()
                    && x.support.len() >= self.settings.remote_min_support
            })
            .map(|x| x.id)
            .collect::<Vec<_>>();

        for id in candidate_ids {
            let index = get_assembly_index(group, id)?;
            let regions = group.assemblies[index]
                .remote_regions
                .iter()
                .sorted_by_key(|x| Reverse(x.read_count()))
                .take(self.settings.remote_max_regions)
                .cloned()
                .collect::<Vec<_>>();

            let mut has_primary_link = false;
            for region in regions.iter() {
                let remote_link = remote_assembler.try_remote_link(
                    &group.assemblies[index],
                    region,
                    self.next_id,
                )?;
                let Some((mut partner, link)) = remote_link else {
                    continue;
                };
                if has_primary_link {
                    partner.outcome = AssemblyOutcome::Secondary;
                    group.assemblies.push(partner);
                    links.secondary_links.push(link);
                } else {
                    has_primary_link = true;
                    group.assemblies.push(partner);
                    self.stats.branched_assemblies += build_split_link(
                        self.settings,
                        self.next_id,
                        group,
                        links,
                        link,
                        true,
                    )?;
                }
            }
        }
        self.stats.remote = remote_assembler.stats.clone();
        Ok(())
    }

    /// Find facing links from each split link endpoint to other assemblies of the group
    ///
    /// A facing partner must share a fragment with the other endpoint of the split link. Each
    /// assembly faces at most one partner.
    ///
    fn form_facing_links(
        &mut self,
        group: &mut PhaseGroup,
        links: &mut GroupLinks,
    ) -> SimpleResult<()> {
        let split_links = links.split_links.clone();
        let mut facing_assigned = HashSet::new();
        for split_link in split_links.iter() {
            for (end_id, other_end_id) in [
                (split_link.first(), split_link.second()),
                (split_link.second(), split_link.first()),
            ] {
                if facing_assigned.contains(&end_id) {
                    continue;
                }
                let end_index = get_assembly_index(group, end_id)?;
                let other_end_index = get_assembly_index(group, other_end_id)?;
                let candidate_ids = group.assemblies.iter().map(|x| x.id).collect::<Vec<_>>();
                for candidate_id in candidate_ids {
                    if candidate_id == end_id
                        || candidate_id == other_end_id
                        || facing_assigned.contains(&candidate_id)
                    {
                        continue;
                    }
                    let candidate_index = get_assembly_index(group, candidate_id)?;
                    if count_shared_fragments(
                        &group.assemblies[candidate_index],
                        &group.assemblies[other_end_index],
                        true,
                    ) == 0
                    {
                        continue;
                    }
                    let (end, candidate) =
                        get_two_mut(&mut group.assemblies, end_index, candidate_index);
                    if let Some(facing_link) =
                        self.linker
                            .try_assembly_facing(end, candidate, &links.split_links)
                    {
                        debug_msg!(
                            self.settings.is_debug_group(group.id),
                            "Phase group {} facing link {}",
                            group.id,
                            facing_link
                        );
                        facing_assigned.insert(end_id);
                        facing_assigned.insert(candidate_id);
                        links.facing_links.push(facing_link);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Drop candidate reads and unused duplication branches, then derive the full sequence of
    /// each phase set
    fn cleanup(&self, group: &mut PhaseGroup, phase_sets: &mut [PhaseSet]) {
        for assembly in group.assemblies.iter_mut() {
            assembly.candidate_support.clear();
        }

        let facing_members = phase_sets
            .iter()
            .flat_map(|x| x.links().iter())
            .filter(|x| x.is_facing())
            .flat_map(|x| [x.first(), x.second()])
            .collect::<HashSet<_>>();
        group.assemblies.retain(|x| {
            x.outcome != AssemblyOutcome::DupBranch || facing_members.contains(&x.id)
        });

        for phase_set in phase_sets.iter_mut() {
            phase_set.full_sequence = phase_set.build_full_sequence(|id| group.assembly(id));
            let Some(full_sequence) = phase_set.full_sequence.as_ref() else {
                debug_msg!(
                    self.settings.is_debug_group(group.id),
                    "Phase group {} phase set {} has no valid full sequence",
                    group.id, phase_set.id
                );
                continue;
            };
            for placement in full_sequence.placements.iter() {
                if let Some(index) = group.assembly_index(placement.assembly_id) {
                    assign_read_full_seq_indexes(&mut group.assemblies[index], placement);
                }
            }
        }
    }
}
