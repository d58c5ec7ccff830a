//! Shared read evidence between junction assemblies
//!

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{JunctionAssembly, SupportRead};

/// Bounds the number of read pairs compared when testing whether two assemblies share reads
///
/// Each entry of `schedule` gives an exclusive upper bound on the number of possible read pairings
/// and the fraction of those pairings to check. Pools larger than the last entry use
/// `default_fraction`. The check count never exceeds `max_checks`.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FragmentCheckBudget {
    pub schedule: Vec<(usize, f64)>,
    pub default_fraction: f64,
    pub max_checks: usize,
}

impl Default for FragmentCheckBudget {
    fn default() -> Self {
        Self {
            schedule: vec![
                (500, 1.0),
                (1000, 0.6),
                (2000, 0.5),
                (5000, 0.4),
                (10000, 0.3),
            ],
            default_fraction: 0.1,
            max_checks: 20000,
        }
    }
}

impl FragmentCheckBudget {
    /// Fraction of the `total_pairs` possible read pairings to check
    pub fn check_fraction(&self, total_pairs: usize) -> f64 {
        self.schedule
            .iter()
            .find(|(limit, _)| total_pairs < *limit)
            .map(|(_, fraction)| *fraction)
            .unwrap_or(self.default_fraction)
    }

    /// Number of read pairings to check out of `total_pairs` possible pairings
    pub fn check_limit(&self, total_pairs: usize) -> usize {
        let fraction = self.check_fraction(total_pairs);
        let limit = (total_pairs as f64 * fraction).ceil() as usize;
        limit.min(self.max_checks)
    }
}

fn support_and_candidates(assembly: &JunctionAssembly) -> impl Iterator<Item = &SupportRead> {
    assembly
        .support
        .iter()
        .chain(assembly.candidate_support.iter())
}

/// Count the distinct fragments found in both assemblies
///
pub fn count_shared_fragments(
    a1: &JunctionAssembly,
    a2: &JunctionAssembly,
    include_candidates: bool,
) -> usize {
    let ids = |a: &JunctionAssembly| -> HashSet<String> {
        if include_candidates {
            support_and_candidates(a).map(|x| x.id.clone()).collect()
        } else {
            a.support.iter().map(|x| x.id.clone()).collect()
        }
    };
    let ids1 = ids(a1);
    let ids2 = ids(a2);
    ids1.intersection(&ids2).count()
}

/// Test whether two assemblies share at least `min_shared` fragments
///
/// Read pairs are compared directly, subject to the check budget, and the search stops as soon as
/// enough shared fragments are found.
///
pub fn assemblies_share_reads(
    a1: &JunctionAssembly,
    a2: &JunctionAssembly,
    min_shared: usize,
    budget: &FragmentCheckBudget,
) -> bool {
    if min_shared == 0 {
        return true;
    }

    let reads1 = support_and_candidates(a1).collect::<Vec<_>>();
    let reads2 = support_and_candidates(a2).collect::<Vec<_>>();
    let total_pairs = reads1.len() * reads2.len();
    let check_limit = budget.check_limit(total_pairs);

    let mut shared = HashSet::new();
    let mut checks = 0;
    for r1 in reads1.iter() {
        for r2 in reads2.iter() {
            if checks >= check_limit {
                return false;
            }
            checks += 1;
            if r1.matches_fragment(r2) {
                shared.insert(r1.id.as_str());
                if shared.len() >= min_shared {
                    return true;
                }
            }
        }
    }
    false
}
