//! Find phasing evidence between assemblies of one junction group
//!

use itertools::Itertools;

use super::PhaseSettings;
use super::assembly_linker::{AssemblyLinker, is_local_assembly_candidate};
use crate::assembly::{AssemblyId, JunctionAssembly};

/// True if a ref-side soft clip of one assembly sits within the other's ref bases, and a read
/// named by the soft clip supports the other assembly
///
fn is_soft_clip_facing_candidate(a1: &JunctionAssembly, a2: &JunctionAssembly) -> bool {
    let test = |a: &JunctionAssembly, other: &JunctionAssembly| {
        let other_range = other.ref_range();
        a.ref_side_soft_clips.iter().any(|soft_clip| {
            other_range.intersect_pos(soft_clip.position)
                && soft_clip.read_ids.iter().any(|x| other.has_fragment(x))
        })
    };
    test(a1, a2) || test(a2, a1)
}

/// Pair forward and reverse junction assemblies of one junction group which are close enough to
/// phase locally
///
/// Forward and reverse assemblies are swept together in position order, and each pair within
/// the proximity window is tested for local candidacy, a shared indel, or facing soft clips.
/// Returns every qualifying pair of assembly ids.
///
pub fn find_local_phasing_evidence(
    linker: &AssemblyLinker,
    assemblies: &[&JunctionAssembly],
) -> Vec<(AssemblyId, AssemblyId)> {
    let settings: &PhaseSettings = linker.settings();
    let window = settings.proximate_del_length;

    let (forward, reverse): (Vec<_>, Vec<_>) = assemblies
        .iter()
        .copied()
        .sorted_by_key(|x| (x.junction.position, x.id))
        .partition(|x| x.is_forward_junction());

    let mut evidence = Vec::new();
    let mut reverse_start = 0;
    for fwd in forward.iter() {
        let position = fwd.junction.position;
        while reverse_start < reverse.len()
            && reverse[reverse_start].junction.position < position - window
        {
            reverse_start += 1;
        }
        for rev in reverse[reverse_start..].iter() {
            if rev.junction.position > position + window {
                break;
            }
            if rev.junction.chromosome != fwd.junction.chromosome {
                continue;
            }
            if is_local_assembly_candidate(settings, fwd, rev, true)
                || linker.try_assembly_indel(fwd, rev).is_some()
                || is_soft_clip_facing_candidate(fwd, rev)
            {
                evidence.push((fwd.id, rev.id));
            }
        }
    }
    evidence
}
