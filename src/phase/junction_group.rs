//! Clusters of nearby junction assemblies on one chromosome
//!

use std::collections::HashMap;

use itertools::Itertools;

use crate::assembly::{AssemblyId, JunctionAssembly};
use crate::int_range::IntRange;

/// Assemblies with junctions close to each other on one chromosome
#[derive(Clone, Debug)]
pub struct JunctionGroup {
    pub chromosome: String,

    /// Genomic span of the group's junctions and ref bases
    pub region: IntRange,

    pub assembly_ids: Vec<AssemblyId>,
}

/// Cluster assemblies into junction groups
///
/// A new group starts whenever the next junction, in position order, is more than `max_distance`
/// from the previous one or on another chromosome. Groups are returned in chromosome and
/// position order.
///
pub fn build_junction_groups(
    assemblies: &[JunctionAssembly],
    max_distance: i64,
) -> Vec<JunctionGroup> {
    let mut groups: Vec<JunctionGroup> = Vec::new();
    let mut last_position = 0;
    for assembly in assemblies
        .iter()
        .sorted_by(|a, b| {
            (&a.junction.chromosome, a.junction.position, a.id)
                .cmp(&(&b.junction.chromosome, b.junction.position, b.id))
        })
    {
        let junction = &assembly.junction;
        let range = assembly.ref_range();
        match groups.last_mut() {
            Some(group)
                if group.chromosome == junction.chromosome
                    && junction.position - last_position <= max_distance =>
            {
                group.region.merge(&range);
                group.assembly_ids.push(assembly.id);
            }
            _ => {
                groups.push(JunctionGroup {
                    chromosome: junction.chromosome.clone(),
                    region: range,
                    assembly_ids: vec![assembly.id],
                });
            }
        }
        last_position = junction.position;
    }
    groups
}

/// Lookup of junction groups overlapping a genomic region
pub struct JunctionGroupIndex {
    /// Per chromosome, indexes into the junction group list sorted by region start
    chrom_groups: HashMap<String, Vec<usize>>,
}

impl JunctionGroupIndex {
    pub fn new(groups: &[JunctionGroup]) -> Self {
        let mut chrom_groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (group_index, group) in groups.iter().enumerate() {
            chrom_groups
                .entry(group.chromosome.clone())
                .or_default()
                .push(group_index);
        }
        for indexes in chrom_groups.values_mut() {
            indexes.sort_by_key(|&x| groups[x].region.start);
        }
        Self { chrom_groups }
    }

    /// Indexes of all junction groups overlapping `range` on `chromosome`
    ///
    /// The last group starting before the end of `range` is found by binary search, and the
    /// search expands back toward lower positions while groups still overlap.
    ///
    pub fn find_overlapping(
        &self,
        groups: &[JunctionGroup],
        chromosome: &str,
        range: &IntRange,
    ) -> Vec<usize> {
        let Some(indexes) = self.chrom_groups.get(chromosome) else {
            return Vec::new();
        };
        let end_index = indexes.partition_point(|&x| groups[x].region.start < range.end);

        let mut overlapping = Vec::new();
        for &group_index in indexes[..end_index].iter().rev() {
            if groups[group_index].region.intersect_range(range) {
                overlapping.push(group_index);
            } else {
                break;
            }
        }
        overlapping.reverse();
        overlapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Orientation;
    use crate::assembly::test_utils::*;

    fn get_test_assemblies() -> Vec<JunctionAssembly> {
        let bases = vec![b'A'; 21];
        vec![
            test_assembly(0, "chr1", 5000, Orientation::Forward, &bases, 10),
            test_assembly(1, "chr1", 1000, Orientation::Forward, &bases, 10),
            test_assembly(2, "chr2", 1000, Orientation::Reverse, &bases, 10),
            test_assembly(3, "chr1", 1800, Orientation::Reverse, &bases, 10),
            test_assembly(4, "chr1", 5900, Orientation::Reverse, &bases, 10),
        ]
    }

    #[test]
    fn test_build_junction_groups() {
        let assemblies = get_test_assemblies();
        let groups = build_junction_groups(&assemblies, 1000);
        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0].chromosome, "chr1");
        assert_eq!(groups[0].assembly_ids, vec![AssemblyId(1), AssemblyId(3)]);
        assert_eq!(groups[0].region, IntRange::from_pair(990, 1811));

        assert_eq!(groups[1].assembly_ids, vec![AssemblyId(0), AssemblyId(4)]);
        assert_eq!(groups[2].chromosome, "chr2");
    }

    #[test]
    fn test_find_overlapping() {
        let assemblies = get_test_assemblies();
        let groups = build_junction_groups(&assemblies, 1000);
        let index = JunctionGroupIndex::new(&groups);

        let found = index.find_overlapping(&groups, "chr1", &IntRange::from_pair(1500, 1600));
        assert_eq!(found, vec![0]);

        let found = index.find_overlapping(&groups, "chr1", &IntRange::from_pair(1500, 6000));
        assert_eq!(found, vec![0, 1]);

        let found = index.find_overlapping(&groups, "chr1", &IntRange::from_pair(2000, 4000));
        assert!(found.is_empty());

        let found = index.find_overlapping(&groups, "chr3", &IntRange::from_pair(0, 10000));
        assert!(found.is_empty());
    }
}
