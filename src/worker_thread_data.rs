use std::sync::{Arc, Mutex};

use simple_error::SimpleResult;

use crate::read_source::BamReadSource;

/// For worker threads making indexed bam reads, this provides a persistent worker specific reader
pub type BamReaderWorkerThreadDataSet = Arc<Vec<Mutex<BamReadSource>>>;

pub fn get_bam_reader_worker_thread_data(
    thread_count: usize,
    bam_filename: &str,
    ref_filename: &str,
) -> SimpleResult<BamReaderWorkerThreadDataSet> {
    let mut worker_thread_data = Vec::new();
    for _ in 0..thread_count {
        worker_thread_data.push(Mutex::new(BamReadSource::new(bam_filename, ref_filename)?));
    }
    Ok(Arc::new(worker_thread_data))
}
