mod assembly;
mod cli;
mod genome_ref;
mod globals;
mod input;
mod int_range;
mod log_utils;
mod logger;
mod os_utils;
mod output;
mod phase;
mod read_source;
mod run_phase;
mod run_stats;
mod seq_compare;
mod seq_util;
mod worker_thread_data;

use std::{error, process};

use hhmmss::Hhmmss;
use log::{error, info};

use crate::cli::Commands;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::logger::setup_output_dir_and_logger;
use crate::run_phase::run_phase;

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("Running on {} threads", settings.shared.thread_count);

    let start = std::time::Instant::now();

    match &settings.command {
        Commands::Phase(x) => run_phase(&settings.shared, x)?,
    }

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    // Each worker thread may hold its own alignment file handle
    os_utils::attempt_max_open_file_limit();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // The output directory holds the log file, so it is created with the logger
    setup_output_dir_and_logger(
        settings.get_output_dir(),
        settings.shared.clobber,
        settings.shared.debug,
    );

    if let Err(err) = run(&settings) {
        error!("{err}");
        process::exit(2);
    }
}
