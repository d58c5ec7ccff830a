//! Read lookup for remote region re-anchoring
//!

use std::collections::HashSet;

use rust_htslib::bam::{self, Read};
use simple_error::{SimpleResult, bail};

use crate::assembly::{Orientation, SupportRead, SupportType};

/// Source of reads overlapping a genomic region
///
/// Each worker thread holds its own instance, so implementations don't need to be shareable.
///
pub trait RemoteReadSource {
    /// Return all reads overlapping [start, end) on `chromosome` whose read name is in `read_ids`
    fn get_region_reads(
        &mut self,
        chromosome: &str,
        start: i64,
        end: i64,
        read_ids: &HashSet<String>,
    ) -> SimpleResult<Vec<SupportRead>>;
}

pub struct BamReadSource {
    reader: bam::IndexedReader,
}

impl BamReadSource {
    pub fn new(bam_filename: &str, ref_filename: &str) -> SimpleResult<Self> {
        let mut reader = match bam::IndexedReader::from_path(bam_filename) {
            Ok(x) => x,
            Err(e) => bail!("Unable to open indexed alignment file '{}': {}", bam_filename, e),
        };
        if let Err(e) = reader.set_reference(ref_filename) {
            bail!("Unable to set reference '{}' for alignment file: {}", ref_filename, e);
        }
        Ok(Self { reader })
    }
}

/// Convert a bam record into the read representation used during linking
///
fn convert_bam_record(record: &bam::Record, chromosome: &str) -> SupportRead {
    let cigar = record.cigar();
    let aligned_start = record.pos();
    let aligned_end = cigar.end_pos();
    let unclipped_start = aligned_start - cigar.leading_softclips();
    let orientation = if record.is_reverse() {
        Orientation::Reverse
    } else {
        Orientation::Forward
    };
    SupportRead {
        id: String::from_utf8_lossy(record.qname()).to_string(),
        support_type: SupportType::Discordant,
        first_in_pair: record.is_first_in_template() || !record.is_paired(),
        supplementary: record.is_supplementary(),
        chromosome: chromosome.to_string(),
        aligned_start,
        aligned_end,
        unclipped_start: Some(unclipped_start),
        orientation,
        indel_coords: None,
        bases: record
            .seq()
            .as_bytes()
            .into_iter()
            .map(|x| if b"ACGTN".contains(&x) { x } else { b'N' })
            .collect(),
        base_quals: record.qual().to_vec(),
        assembly_index: None,
        full_seq_index: None,
        full_seq_reversed: false,
    }
}

impl RemoteReadSource for BamReadSource {
    fn get_region_reads(
        &mut self,
        chromosome: &str,
        start: i64,
        end: i64,
        read_ids: &HashSet<String>,
    ) -> SimpleResult<Vec<SupportRead>> {
        let tid = match self.reader.header().tid(chromosome.as_bytes()) {
            Some(x) => x,
            None => bail!("Chromosome '{}' not found in alignment file header", chromosome),
        };
        if let Err(e) = self
            .reader
            .fetch(bam::FetchDefinition::Region(tid as i32, start.max(0), end))
        {
            bail!(
                "Failed to fetch alignment region {}:{}-{}: {}",
                chromosome,
                start,
                end,
                e
            );
        }

        let mut reads = Vec::new();
        let mut record = bam::Record::new();
        while let Some(r) = self.reader.read(&mut record) {
            if let Err(e) = r {
                bail!(
                    "Failed to read alignment record in region {}:{}-{}: {}",
                    chromosome,
                    start,
                    end,
                    e
                );
            }
            if record.is_unmapped() || record.is_secondary() || record.is_duplicate() {
                continue;
            }
            let qname = String::from_utf8_lossy(record.qname());
            if !read_ids.contains(qname.as_ref()) {
                continue;
            }
            reads.push(convert_bam_record(&record, chromosome));
        }
        Ok(reads)
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// In-memory read source for tests
    #[derive(Default)]
    pub struct TestReadSource {
        pub reads: Vec<SupportRead>,
        pub query_count: usize,
    }

    impl RemoteReadSource for TestReadSource {
        fn get_region_reads(
            &mut self,
            chromosome: &str,
            start: i64,
            end: i64,
            read_ids: &HashSet<String>,
        ) -> SimpleResult<Vec<SupportRead>> {
            self.query_count += 1;
            Ok(self
                .reads
                .iter()
                .filter(|x| {
                    x.chromosome == chromosome
                        && x.aligned_end > start
                        && x.aligned_start < end
                        && read_ids.contains(&x.id)
                })
                .cloned()
                .collect())
        }
    }
}
