//! Track stats for the whole phase run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::Serialize;
use unwrap::unwrap;

use crate::phase::phaser::PhasingStats;
use crate::run_phase::RUN_STATS_FILENAME;

#[derive(Default, Serialize)]
pub struct StageTimes {
    pub input_time_secs: f64,
    pub phasing_time_secs: f64,
    pub output_time_secs: f64,
}

#[derive(Default, Serialize)]
pub struct PhaseRunStats {
    pub phasing: PhasingStats,
    pub stage_times: StageTimes,
}

/// Write run_stats structure out in json format
pub fn write_phase_run_stats(output_dir: &Utf8Path, run_stats: &PhaseRunStats) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{}'",
        filename
    );

    serde_json::to_writer_pretty(&f, &run_stats).unwrap();
}
