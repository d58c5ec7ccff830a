use std::collections::HashMap;
use std::fs::File;

use bio::io::fasta;
use log::info;
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

/// Reference genome lookups needed during assembly linking
pub trait RefGenomeSource: Sync {
    /// Bases for the 0-indexed range [start, end), clipped to the chromosome bounds
    ///
    /// Returns None for an unknown chromosome or an empty clipped range.
    ///
    fn get_bases(&self, chromosome: &str, start: i64, end: i64) -> Option<&[u8]>;

    fn get_chromosome_length(&self, chromosome: &str) -> Option<i64>;

    /// Same range as `get_bases`, as a string
    fn get_base_string(&self, chromosome: &str, start: i64, end: i64) -> Option<String> {
        self.get_bases(chromosome, start, end)
            .map(|x| String::from_utf8_lossy(x).into_owned())
    }
}

#[derive(Default)]
pub struct GenomeRef {
    /// A map from chrom name to chrom sequence
    pub chroms: HashMap<String, Vec<u8>>,
}

impl GenomeRef {
    /// Convert all bases besides "ACGTN" to "N"
    pub fn simplify_ambiguous_dna_bases(&mut self) {
        const TYPE_WIDTH: usize = (u8::MAX as usize) + 1;
        let mut allowed_lut = [false; TYPE_WIDTH];
        for &c in b"ACGTN".iter() {
            allowed_lut[c as usize] = true;
        }
        for seq in self.chroms.values_mut() {
            for c in seq.iter_mut().filter(|x| !allowed_lut[**x as usize]) {
                *c = b'N';
            }
        }
    }
}

impl RefGenomeSource for GenomeRef {
    fn get_bases(&self, chromosome: &str, start: i64, end: i64) -> Option<&[u8]> {
        let seq = self.chroms.get(chromosome)?;
        let start = start.max(0) as usize;
        let end = (end.max(0) as usize).min(seq.len());
        if start >= end {
            None
        } else {
            Some(&seq[start..end])
        }
    }

    fn get_chromosome_length(&self, chromosome: &str) -> Option<i64> {
        self.chroms.get(chromosome).map(|x| x.len() as i64)
    }
}

/// Read fasta records into GenomeRef, converting all input characters to upper-case
///
pub fn get_genome_ref_from_fasta_fp(file: File) -> SimpleResult<GenomeRef> {
    let reader = fasta::Reader::new(file);

    let mut genome_ref = GenomeRef::default();
    for result in reader.records() {
        let record = match result {
            Ok(x) => x,
            Err(e) => bail!("Error during fasta record parsing: {}", e),
        };
        genome_ref
            .chroms
            .insert(record.id().to_string(), record.seq().to_ascii_uppercase());
    }
    genome_ref.simplify_ambiguous_dna_bases();
    Ok(genome_ref)
}

pub fn get_genome_ref_from_fasta(filename: &str) -> GenomeRef {
    info!("Reading reference genome from file '{filename}'");

    let file = unwrap!(
        File::open(filename),
        "Unable to open reference fasta file: '{}'",
        filename,
    );

    unwrap!(
        get_genome_ref_from_fasta_fp(file),
        "Unable to parse reference fasta file: '{}'",
        filename,
    )
}
