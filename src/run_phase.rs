//! The phase command: link and phase all junction assemblies of one sample
//!

use std::time::Instant;

use hhmmss::Hhmmss;
use log::info;
use simple_error::SimpleResult;

use crate::cli;
use crate::genome_ref::get_genome_ref_from_fasta;
use crate::input::{check_assembly_chromosomes, read_assemblies};
use crate::output::write_phase_groups;
use crate::phase::phaser::run_phasing;
use crate::run_stats::{PhaseRunStats, write_phase_run_stats};
use crate::seq_compare::QualRepeatComparator;
use crate::worker_thread_data::get_bam_reader_worker_thread_data;

pub const PHASE_GROUPS_FILENAME: &str = "phase_groups.json";
pub const RUN_STATS_FILENAME: &str = "run.stats.json";
pub const SETTINGS_FILENAME: &str = "phase.settings.json";

pub fn run_phase(
    shared_settings: &cli::SharedSettings,
    settings: &cli::PhaseCommandSettings,
) -> SimpleResult<()> {
    cli::write_phase_settings(&settings.output_dir, settings);

    let phase_settings = settings.get_phase_settings();
    let mut run_stats = PhaseRunStats::default();

    let start = Instant::now();
    let genome_ref = get_genome_ref_from_fasta(settings.ref_filename.as_str());
    let assemblies = read_assemblies(
        &settings.assemblies_filename,
        phase_settings.synthetic_base_qual,
    );
    check_assembly_chromosomes(&assemblies, &genome_ref)?;
    let bam_readers = match &settings.bam_filename {
        Some(bam_filename) => Some(get_bam_reader_worker_thread_data(
            shared_settings.thread_count,
            bam_filename.as_str(),
            settings.ref_filename.as_str(),
        )?),
        None => {
            info!("No alignment file given, skipping remote region re-anchoring");
            None
        }
    };
    run_stats.stage_times.input_time_secs = start.elapsed().as_secs_f64();
    info!("Finished reading input. Time: {}", start.elapsed().hhmmssxxx());

    let start = Instant::now();
    let comparator = QualRepeatComparator::new(phase_settings.low_base_qual_threshold);
    let result = run_phasing(
        &phase_settings,
        &genome_ref,
        &comparator,
        bam_readers.as_deref().map(|x| x.as_slice()),
        assemblies,
        shared_settings.thread_count,
    )?;
    run_stats.stage_times.phasing_time_secs = start.elapsed().as_secs_f64();
    info!("Finished phasing. Time: {}", start.elapsed().hhmmssxxx());

    let start = Instant::now();
    write_phase_groups(
        &settings.output_dir.join(PHASE_GROUPS_FILENAME),
        &result.groups,
    );
    run_stats.stage_times.output_time_secs = start.elapsed().as_secs_f64();

    run_stats.phasing = result.stats;
    write_phase_run_stats(&settings.output_dir, &run_stats);
    Ok(())
}
