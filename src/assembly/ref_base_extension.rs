//! Extend assembly ref bases using newly matched read support
//!

use std::collections::BTreeMap;

use log::debug;

use super::{AssemblyId, AssemblyOutcome, JunctionAssembly, SupportRead};

/// Vote for one position beyond the current ref base boundary
#[derive(Default)]
struct BaseVote {
    /// Base -> (read indexes, max qual)
    votes: BTreeMap<u8, (Vec<usize>, u8)>,
}

impl BaseVote {
    fn add(&mut self, base: u8, qual: u8, read_index: usize) {
        let entry = self.votes.entry(base).or_default();
        entry.0.push(read_index);
        entry.1 = entry.1.max(qual);
    }

    /// Bases sorted by descending read count
    fn ranked(&self) -> Vec<(u8, &Vec<usize>, u8)> {
        let mut x = self
            .votes
            .iter()
            .map(|(base, (reads, qual))| (*base, reads, *qual))
            .collect::<Vec<_>>();
        x.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
        x
    }
}

/// Genomic position `step` bases outward from the current outermost ref base
fn outward_position(assembly: &JunctionAssembly, step: i64) -> i64 {
    if assembly.is_forward_junction() {
        assembly.ref_base_position() - step
    } else {
        assembly.ref_base_position() + step
    }
}

/// Collect outward consensus bases supported by at least `min_reads` of `reads`
///
/// Returns the consensus bases and quals in outward order, and the first position where a
/// competing base also has `min_reads` support, with the reads carrying that base.
///
fn get_outward_consensus(
    assembly: &JunctionAssembly,
    reads: &[&SupportRead],
    min_reads: usize,
) -> (Vec<u8>, Vec<u8>, Option<Vec<usize>>) {
    let mut bases = Vec::new();
    let mut quals = Vec::new();
    let mut step = 1;
    loop {
        let pos = outward_position(assembly, step);
        let mut vote = BaseVote::default();
        for (read_index, read) in reads.iter().enumerate() {
            if let Some((base, qual)) = read.base_at(pos) {
                vote.add(base, qual, read_index);
            }
        }
        let ranked = vote.ranked();
        let Some((top_base, top_reads, top_qual)) = ranked.first() else {
            break;
        };
        if top_reads.len() < min_reads {
            break;
        }
        if let Some((_, alt_reads, _)) = ranked.get(1)
            && alt_reads.len() >= min_reads
        {
            return (bases, quals, Some((*alt_reads).clone()));
        }
        bases.push(*top_base);
        quals.push(*top_qual);
        step += 1;
    }
    (bases, quals, None)
}

/// Extend the ref bases of `assembly` with the consensus of `reads` beyond its current boundary
///
/// When `allow_branching` is set and a competing extension is supported by enough reads, a new
/// branch assembly is returned carrying that alternative extension.
///
pub fn extend_ref_bases(
    assembly: &mut JunctionAssembly,
    reads: &[SupportRead],
    min_reads: usize,
    allow_branching: bool,
    branch_id: impl FnOnce() -> AssemblyId,
) -> Option<JunctionAssembly> {
    let reads = reads
        .iter()
        .filter(|x| x.chromosome == assembly.junction.chromosome && !x.bases.is_empty())
        .collect::<Vec<_>>();
    if reads.len() < min_reads {
        return None;
    }

    let (bases, quals, alt_reads) = get_outward_consensus(assembly, &reads, min_reads);

    // The branch shares the consensus extension up to the point of disagreement
    let branch = match alt_reads {
        Some(alt_reads) if allow_branching => {
            let mut branch = assembly.clone();
            branch.id = branch_id();
            branch.outcome = AssemblyOutcome::DupBranch;
            branch.derived = true;
            branch.extend_ref_bases(&bases, &quals);
            let alt_reads = alt_reads.into_iter().map(|i| reads[i]).collect::<Vec<_>>();
            let (alt_bases, alt_quals, _) = get_outward_consensus(&branch, &alt_reads, min_reads);
            branch.extend_ref_bases(&alt_bases, &alt_quals);
            branch.support = alt_reads.into_iter().cloned().collect();
            branch.candidate_support.clear();
            debug!(
                "Assembly {} branched into {} with {} alternate ref bases",
                assembly.id,
                branch.id,
                alt_bases.len()
            );
            Some(branch)
        }
        _ => None,
    };

    if !bases.is_empty() {
        assembly.extend_ref_bases(&bases, &quals);
    }
    branch
}
