//! Phase groups and the grouping table used while they are discovered
//!

use std::collections::BTreeMap;

use serde::Serialize;

use super::assembly_link::AssemblyLink;
use super::phase_set::PhaseSet;
use crate::assembly::{AssemblyId, JunctionAssembly};

/// Assembly to group membership during grouping
///
/// All membership changes go through `link_to_phase_groups`. Groups merged away are kept, empty,
/// until `sweep_removed_groups` is called at the end of a grouping stage.
///
pub struct PhaseGroupTable {
    groups: BTreeMap<usize, Vec<AssemblyId>>,

    /// Group id of each assembly, indexed by assembly id
    assembly_groups: Vec<Option<usize>>,

    pending_removals: Vec<usize>,
    next_group_id: usize,
}

impl PhaseGroupTable {
    pub fn new(assembly_count: usize) -> Self {
        Self {
            groups: BTreeMap::new(),
            assembly_groups: vec![None; assembly_count],
            pending_removals: Vec::new(),
            next_group_id: 0,
        }
    }

    pub fn group_of(&self, id: AssemblyId) -> Option<usize> {
        self.assembly_groups[id.0]
    }

    /// Number of groups, excluding those merged away
    pub fn group_count(&self) -> usize {
        self.groups.len() - self.pending_removals.len()
    }

    fn add_member(&mut self, group_id: usize, id: AssemblyId) {
        if let Some(members) = self.groups.get_mut(&group_id) {
            members.push(id);
        }
        self.assembly_groups[id.0] = Some(group_id);
    }

    /// Record that assemblies `a1` and `a2` share evidence
    ///
    /// Ungrouped assemblies join the other's group or form a new group. When both are grouped
    /// separately, the smaller group is merged into the larger, and on equal sizes the group with
    /// the higher id is merged into the lower. Returns false if the assemblies were already in
    /// one group.
    ///
    pub fn link_to_phase_groups(&mut self, a1: AssemblyId, a2: AssemblyId) -> bool {
        if a1 == a2 {
            return false;
        }
        match (self.group_of(a1), self.group_of(a2)) {
            (None, None) => {
                let group_id = self.next_group_id;
                self.next_group_id += 1;
                self.groups.insert(group_id, Vec::new());
                self.add_member(group_id, a1);
                self.add_member(group_id, a2);
            }
            (Some(g1), None) => self.add_member(g1, a2),
            (None, Some(g2)) => self.add_member(g2, a1),
            (Some(g1), Some(g2)) => {
                if g1 == g2 {
                    return false;
                }
                let size1 = self.groups[&g1].len();
                let size2 = self.groups[&g2].len();
                let (target, source) = if size1 > size2 || (size1 == size2 && g1 < g2) {
                    (g1, g2)
                } else {
                    (g2, g1)
                };
                let moved = self
                    .groups
                    .get_mut(&source)
                    .map(std::mem::take)
                    .unwrap_or_default();
                for id in moved {
                    self.add_member(target, id);
                }
                self.pending_removals.push(source);
            }
        }
        true
    }

    /// Drop all groups merged away since the last sweep
    ///
    /// Returns the number of groups removed.
    ///
    pub fn sweep_removed_groups(&mut self) -> usize {
        let count = self.pending_removals.len();
        for group_id in self.pending_removals.drain(..) {
            self.groups.remove(&group_id);
        }
        count
    }

    /// Complete grouping, giving each ungrouped assembly its own group
    ///
    /// Groups are returned ordered by their lowest assembly id, with members in id order.
    ///
    pub fn finalize(mut self) -> Vec<Vec<AssemblyId>> {
        self.sweep_removed_groups();
        let mut groups = self.groups.into_values().collect::<Vec<_>>();
        for (index, group) in self.assembly_groups.iter().enumerate() {
            if group.is_none() {
                groups.push(vec![AssemblyId(index)]);
            }
        }
        for group in groups.iter_mut() {
            group.sort();
        }
        groups.sort_by_key(|x| x[0]);
        groups
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
pub enum PhaseGroupStatus {
    Built,

    /// Too many assemblies to build phase sets
    SkippedOverLimit,

    /// Phase set building failed and the group was skipped
    Failed,
}

pub struct PhaseGroup {
    pub id: usize,

    /// Member assemblies, including derived assemblies created while linking
    pub assemblies: Vec<JunctionAssembly>,

    pub phase_sets: Vec<PhaseSet>,

    /// Split links found but not selected to build phase sets
    pub secondary_links: Vec<AssemblyLink>,

    pub status: PhaseGroupStatus,
}

impl PhaseGroup {
    pub fn new(id: usize, assemblies: Vec<JunctionAssembly>) -> Self {
        Self {
            id,
            assemblies,
            phase_sets: Vec::new(),
            secondary_links: Vec::new(),
            status: PhaseGroupStatus::Built,
        }
    }

    pub fn assembly_index(&self, id: AssemblyId) -> Option<usize> {
        self.assemblies.iter().position(|x| x.id == id)
    }

    pub fn assembly(&self, id: AssemblyId) -> Option<&JunctionAssembly> {
        self.assemblies.iter().find(|x| x.id == id)
    }

    pub fn assembly_count(&self) -> usize {
        self.assemblies.len()
    }

    /// Description of every member assembly for error reports
    pub fn dump(&self) -> String {
        let mut s = format!(
            "Phase group {} with {} assemblies:",
            self.id,
            self.assemblies.len()
        );
        for assembly in self.assemblies.iter() {
            s += &format!("\n  {assembly}");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(x: &[usize]) -> Vec<AssemblyId> {
        x.iter().map(|&x| AssemblyId(x)).collect()
    }

    fn group_members(table: &PhaseGroupTable, group_id: usize) -> Option<&[AssemblyId]> {
        table.groups.get(&group_id).map(|x| x.as_slice())
    }

    #[test]
    fn test_merge_smaller_group_into_larger() {
        let mut table = PhaseGroupTable::new(5);
        // {A,B} and {C,D,E}
        assert!(table.link_to_phase_groups(AssemblyId(0), AssemblyId(1)));
        assert!(table.link_to_phase_groups(AssemblyId(2), AssemblyId(3)));
        assert!(table.link_to_phase_groups(AssemblyId(3), AssemblyId(4)));
        assert_eq!(table.group_count(), 2);
        let small_group = table.group_of(AssemblyId(0)).unwrap();
        let large_group = table.group_of(AssemblyId(2)).unwrap();

        // Shared read between B and C
        assert!(table.link_to_phase_groups(AssemblyId(1), AssemblyId(2)));
        assert_eq!(table.group_count(), 1);
        for i in 0..5 {
            assert_eq!(table.group_of(AssemblyId(i)), Some(large_group));
        }
        assert_eq!(group_members(&table, large_group).unwrap().len(), 5);
        assert_eq!(table.sweep_removed_groups(), 1);
        assert!(group_members(&table, small_group).is_none());

        let groups = table.finalize();
        assert_eq!(groups, vec![ids(&[0, 1, 2, 3, 4])]);
    }

    #[test]
    fn test_idempotent_link() {
        let mut table = PhaseGroupTable::new(3);
        assert!(table.link_to_phase_groups(AssemblyId(0), AssemblyId(1)));
        assert!(!table.link_to_phase_groups(AssemblyId(1), AssemblyId(0)));
        assert!(!table.link_to_phase_groups(AssemblyId(0), AssemblyId(1)));
        assert!(!table.link_to_phase_groups(AssemblyId(0), AssemblyId(0)));
        assert_eq!(table.group_count(), 1);
        let group_id = table.group_of(AssemblyId(0)).unwrap();
        assert_eq!(group_members(&table, group_id).unwrap(), ids(&[0, 1]).as_slice());
    }

    #[test]
    fn test_equal_size_merge_order() {
        let mut table = PhaseGroupTable::new(4);
        table.link_to_phase_groups(AssemblyId(0), AssemblyId(1));
        table.link_to_phase_groups(AssemblyId(2), AssemblyId(3));
        let g0 = table.group_of(AssemblyId(0)).unwrap();
        table.link_to_phase_groups(AssemblyId(3), AssemblyId(1));
        assert_eq!(table.group_of(AssemblyId(3)), Some(g0));
    }

    #[test]
    fn test_every_assembly_in_one_group() {
        let mut table = PhaseGroupTable::new(8);
        let pairs = [(0, 1), (2, 3), (4, 5), (1, 2), (5, 6), (0, 3)];
        for (a, b) in pairs {
            table.link_to_phase_groups(AssemblyId(a), AssemblyId(b));
            let mut member_count = 0;
            for group_id in 0..10 {
                if let Some(members) = group_members(&table, group_id) {
                    for id in members {
                        assert_eq!(table.group_of(*id), Some(group_id));
                    }
                    member_count += members.len();
                }
            }
            let grouped = (0..8)
                .filter(|&x| table.group_of(AssemblyId(x)).is_some())
                .count();
            assert_eq!(member_count, grouped);
        }
        let groups = table.finalize();
        assert_eq!(
            groups,
            vec![ids(&[0, 1, 2, 3]), ids(&[4, 5, 6]), ids(&[7])]
        );
    }
}
