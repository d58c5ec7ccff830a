use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::utils::{check_optional_filename, check_required_filename};
use crate::phase::{GroupErrorPolicy, PhaseSettings};
use crate::run_phase::SETTINGS_FILENAME;

#[derive(Args, Default, Deserialize, Serialize)]
pub struct PhaseCommandSettings {
    /// Directory for all phase command output (must not already exist)
    #[arg(
        long,
        value_name = "DIR",
        default_value = concatcp!(env!("CARGO_PKG_NAME"), "_phase_output")
    )]
    pub output_dir: Utf8PathBuf,

    /// Junction assemblies to link and phase, in JSON format
    #[arg(long = "assemblies", value_name = "FILE")]
    pub assemblies_filename: Utf8PathBuf,

    /// Genome reference in FASTA format
    #[arg(long = "ref", value_name = "FILE")]
    pub ref_filename: Utf8PathBuf,

    /// Alignment file in BAM or CRAM format, used to fetch reads in remote regions
    ///
    /// Without this file, assemblies are not re-anchored in their remote regions. Remote regions
    /// are still used to group assemblies by shared reads.
    ///
    #[arg(long = "bam", value_name = "FILE")]
    pub bam_filename: Option<Utf8PathBuf>,

    /// Phase groups with more assemblies than this are reported without building phase sets
    #[arg(long, default_value_t = 500)]
    pub phase_processing_limit: usize,

    /// Action taken when phase set building fails for one phase group
    #[arg(long, value_enum, default_value_t = GroupErrorPolicy::Abort)]
    pub group_error_policy: GroupErrorPolicy,

    /// Maximum number of read pairings compared when testing two assemblies for shared reads
    #[arg(hide = true, long, default_value_t = 20000)]
    pub max_fragment_checks: usize,

    /// Print all link and phase set decisions for the phase group with this id
    #[arg(hide = true, long, value_name = "GROUP_ID")]
    pub debug_group: Option<usize>,
}

impl PhaseCommandSettings {
    /// Algorithm settings for this run
    pub fn get_phase_settings(&self) -> PhaseSettings {
        let mut settings = PhaseSettings {
            phase_processing_limit: self.phase_processing_limit,
            group_error_policy: self.group_error_policy,
            debug_group: self.debug_group,
            ..Default::default()
        };
        settings.fragment_check_budget.max_checks = self.max_fragment_checks;
        settings
    }
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_phase_settings(
    settings: PhaseCommandSettings,
) -> SimpleResult<PhaseCommandSettings> {
    check_required_filename(&settings.assemblies_filename, "assemblies")?;
    check_required_filename(&settings.ref_filename, "reference")?;
    check_optional_filename(settings.bam_filename.as_deref(), "alignment")?;

    if settings.phase_processing_limit == 0 {
        bail!("--phase-processing-limit argument must be greater than 0");
    }

    // Canonicalize file paths:
    fn canonicalize_path(path: &Utf8Path) -> SimpleResult<Utf8PathBuf> {
        match path.canonicalize_utf8() {
            Ok(x) => Ok(x),
            Err(e) => bail!("Can't canonicalize path '{}': {}", path, e),
        }
    }

    let mut settings = settings;
    settings.assemblies_filename = canonicalize_path(&settings.assemblies_filename)?;
    settings.ref_filename = canonicalize_path(&settings.ref_filename)?;
    settings.bam_filename = match settings.bam_filename {
        Some(x) => Some(canonicalize_path(&x)?),
        None => None,
    };

    Ok(settings)
}

/// Write phase settings out in json format
pub fn write_phase_settings(output_dir: &Utf8Path, settings: &PhaseCommandSettings) {
    use log::info;

    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing phase settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create phase settings json file: '{}'",
        filename
    );

    serde_json::to_writer_pretty(&f, &settings).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_phase_settings() {
        let settings = PhaseCommandSettings {
            phase_processing_limit: 20,
            group_error_policy: GroupErrorPolicy::Skip,
            max_fragment_checks: 100,
            ..Default::default()
        };
        let phase_settings = settings.get_phase_settings();
        assert_eq!(phase_settings.phase_processing_limit, 20);
        assert_eq!(phase_settings.group_error_policy, GroupErrorPolicy::Skip);
        assert_eq!(phase_settings.fragment_check_budget.max_checks, 100);
        assert_eq!(phase_settings.link_min_overlap, 30);
    }

    #[test]
    fn test_missing_input_files() {
        let dir = tempfile::tempdir().unwrap();
        let dirname = Utf8Path::from_path(dir.path()).unwrap();
        let ref_file = dirname.join("ref.fa");
        std::fs::write(&ref_file, ">chr1\nACGT\n").unwrap();

        let settings = PhaseCommandSettings {
            assemblies_filename: dirname.join("not_there.json"),
            ref_filename: ref_file.clone(),
            phase_processing_limit: 500,
            ..Default::default()
        };
        assert!(validate_and_fix_phase_settings(settings).is_err());

        let assemblies_file = dirname.join("assemblies.json");
        std::fs::write(&assemblies_file, "[]").unwrap();
        let settings = PhaseCommandSettings {
            assemblies_filename: assemblies_file,
            ref_filename: ref_file,
            phase_processing_limit: 500,
            ..Default::default()
        };
        let settings = validate_and_fix_phase_settings(settings).unwrap();
        assert!(settings.assemblies_filename.is_absolute());
    }
}
