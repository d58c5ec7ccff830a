//! Assembly linking and phasing
//!
//! Junction assemblies are grouped by shared read evidence into phase groups, and each phase group
//! is resolved into phase sets of split and facing links.
//!

pub mod assembly_link;
pub mod assembly_linker;
pub mod junction_group;
pub mod junction_sequence;
pub mod local_group_builder;
pub mod local_sequence_matcher;
pub mod phase_group;
pub mod phase_group_builder;
pub mod phase_set;
pub mod phase_set_builder;
pub mod phase_set_merger;
pub mod phaser;
pub mod remote_group_builder;
pub mod remote_region_assembler;
mod sequence_search;

use serde::{Deserialize, Serialize};

use crate::assembly::read_sharing::FragmentCheckBudget;

/// Action taken when building the phase sets of one phase group fails
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    clap::ValueEnum,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum GroupErrorPolicy {
    /// Stop the run with an error
    #[default]
    Abort,

    /// Mark the group as failed and continue
    Skip,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PhaseSettings {
    pub phased_assembly_min_ti: i64,
    pub phased_assembly_max_ti: i64,

    /// Length of the sequence window used to search for a match between two sequences
    pub link_match_window: usize,

    /// Max ref bases included in an outer extension match window
    pub link_outer_max_ref_bases: usize,

    pub link_min_overlap: usize,
    pub match_subsequence_length: usize,
    pub link_max_mismatch_penalty: u32,

    pub local_min_ref_overlap: usize,
    pub local_min_ext_overlap: usize,

    pub low_base_qual_threshold: u8,

    /// Quality assigned to reference-derived bases
    pub synthetic_base_qual: u8,

    pub proximate_del_length: i64,
    pub proximate_dup_length: i64,

    pub ref_side_soft_clip_tolerance: i64,

    /// Junctions further apart than this start a new junction group
    pub junction_group_distance: i64,

    pub remote_min_shared_reads: usize,
    pub fragment_check_budget: FragmentCheckBudget,

    pub local_match_distance: i64,
    pub local_ref_tail_length: usize,
    pub min_local_indel_length: i64,

    /// Support reads required before an assembly is re-anchored against its remote regions
    pub remote_min_support: usize,
    pub remote_max_regions: usize,

    /// Duplication links shorter than this do not allow ref base branching
    pub small_dup_branch_length: i64,

    pub ref_extension_min_reads: usize,

    pub merge_subsequence_length: usize,
    pub merge_min_overlap: usize,
    pub merge_max_mismatch_penalty: u32,

    /// Phase groups with more assemblies than this are skipped
    pub phase_processing_limit: usize,

    pub group_error_policy: GroupErrorPolicy,

    /// Phase group reported directly to stderr in full detail
    #[serde(default)]
    pub debug_group: Option<usize>,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            phased_assembly_min_ti: 30,
            phased_assembly_max_ti: 1000,
            link_match_window: 50,
            link_outer_max_ref_bases: 20,
            link_min_overlap: 30,
            match_subsequence_length: 20,
            link_max_mismatch_penalty: 3,
            local_min_ref_overlap: 10,
            local_min_ext_overlap: 10,
            low_base_qual_threshold: 26,
            synthetic_base_qual: 26,
            proximate_del_length: 1000,
            proximate_dup_length: 500,
            ref_side_soft_clip_tolerance: 5,
            junction_group_distance: 1000,
            remote_min_shared_reads: 2,
            fragment_check_budget: FragmentCheckBudget::default(),
            local_match_distance: 500,
            local_ref_tail_length: 100,
            min_local_indel_length: 10,
            remote_min_support: 2,
            remote_max_regions: 5,
            small_dup_branch_length: 500,
            ref_extension_min_reads: 2,
            merge_subsequence_length: 20,
            merge_min_overlap: 50,
            merge_max_mismatch_penalty: 5,
            phase_processing_limit: 500,
            group_error_policy: GroupErrorPolicy::Abort,
            debug_group: None,
        }
    }
}

impl PhaseSettings {
    pub fn is_debug_group(&self, group_id: usize) -> bool {
        self.debug_group == Some(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_json_round_trip() {
        let mut settings = PhaseSettings::default();
        settings.group_error_policy = GroupErrorPolicy::Skip;
        settings.fragment_check_budget.max_checks = 100;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer_pretty(&mut file, &settings).unwrap();
        let reader = std::io::BufReader::new(std::fs::File::open(file.path()).unwrap());
        let settings2: PhaseSettings = serde_json::from_reader(reader).unwrap();
        assert_eq!(settings, settings2);
    }
}
