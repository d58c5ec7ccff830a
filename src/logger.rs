//! Run logging to stderr and to a log file in the output directory
//!

use camino::{Utf8Path, Utf8PathBuf};

use crate::cli;
use crate::globals::PROGRAM_NAME;
use crate::os_utils::create_dir_all;

pub fn get_log_filename(output_dir: &Utf8Path) -> Utf8PathBuf {
    output_dir.join(format!("{PROGRAM_NAME}.log"))
}

/// Setup the global logger
///
/// Debug level is used when `debug` is set, otherwise info level. Alignment file decoding
/// messages are held to warning level in either case.
///
fn setup_logger(log_filename: Option<&Utf8Path>, debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                PROGRAM_NAME,
                record.level(),
                message
            ))
        })
        .level(level)
        .level_for("rust_htslib", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    let logger = match log_filename {
        Some(x) => logger.chain(fern::log_file(x)?),
        None => logger,
    };

    logger.apply()?;
    Ok(())
}

/// Check and create the output directory, then setup the logger to write there
///
/// An existing output directory is only accepted with `clobber`.
///
pub fn setup_output_dir_and_logger(output_dir: &Utf8Path, clobber: bool, debug: bool) {
    // No logger is available yet, so errors follow the command-line validation pattern
    if let Err(msg) = cli::check_novel_dirname(output_dir, "Output directory")
        && !(clobber && output_dir.is_dir())
    {
        eprintln!("Invalid command-line setting: {}", msg);
        std::process::exit(exitcode::USAGE);
    }
    create_dir_all(output_dir, "output");

    let log_filename = get_log_filename(output_dir);
    if let Err(e) = setup_logger(Some(&log_filename), debug) {
        eprintln!("Can't setup logger with log file '{}': {}", log_filename, e);
        std::process::exit(exitcode::CANTCREAT);
    }
}
