//! Read junction assemblies from the per-junction assembly step
//!

use std::fs::File;
use std::io::{BufReader, Read};

use camino::Utf8Path;
use log::info;
use serde::Deserialize;
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use crate::assembly::{
    AssemblyId, IndelCoords, Junction, JunctionAssembly, RefSideSoftClip, RemoteRegion,
    SupportRead, base_string,
};
use crate::genome_ref::RefGenomeSource;
use crate::seq_util::is_supported_dna;

#[derive(Deserialize)]
struct AssemblyRecord {
    #[serde(default)]
    id: Option<usize>,

    junction: Junction,

    #[serde(with = "base_string")]
    bases: Vec<u8>,

    #[serde(default)]
    base_quals: Vec<u8>,

    junction_index: usize,

    #[serde(default)]
    support: Vec<SupportRead>,

    #[serde(default)]
    candidate_support: Vec<SupportRead>,

    #[serde(default)]
    ref_side_soft_clips: Vec<RefSideSoftClip>,

    #[serde(default)]
    remote_regions: Vec<RemoteRegion>,

    #[serde(default)]
    indel_coords: Option<IndelCoords>,
}

fn convert_record(
    index: usize,
    record: AssemblyRecord,
    synthetic_base_qual: u8,
) -> SimpleResult<JunctionAssembly> {
    if let Some(id) = record.id
        && id != index
    {
        bail!(
            "Assembly record {} has id {}, record ids must match their position in the input",
            index,
            id
        );
    }
    if record.bases.is_empty() {
        bail!("Assembly record {} has no bases", index);
    }
    if !is_supported_dna(&record.bases) {
        bail!("Assembly record {} has unsupported bases", index);
    }
    if let Some(read) = record
        .support
        .iter()
        .chain(record.candidate_support.iter())
        .find(|x| !is_supported_dna(&x.bases))
    {
        bail!(
            "Assembly record {} support read '{}' has unsupported bases",
            index,
            read.id
        );
    }
    if record.junction_index >= record.bases.len() {
        bail!(
            "Assembly record {} junction index {} is outside of its {} bases",
            index,
            record.junction_index,
            record.bases.len()
        );
    }
    let quals = if record.base_quals.is_empty() {
        vec![synthetic_base_qual; record.bases.len()]
    } else if record.base_quals.len() != record.bases.len() {
        bail!(
            "Assembly record {} has {} base quals for {} bases",
            index,
            record.base_quals.len(),
            record.bases.len()
        );
    } else {
        record.base_quals
    };

    let mut assembly = JunctionAssembly::new(
        AssemblyId(index),
        record.junction,
        record.bases,
        quals,
        record.junction_index,
    );
    assembly.support = record.support;
    assembly.candidate_support = record.candidate_support;
    assembly.ref_side_soft_clips = record.ref_side_soft_clips;
    assembly.remote_regions = record.remote_regions;
    assembly.indel_coords = record.indel_coords;
    Ok(assembly)
}

/// Parse junction assemblies from a JSON array of assembly records
///
/// Assembly ids are assigned from each record's position in the array. Lowercase assembly and
/// read bases are converted to uppercase, and missing base quals are set to `synthetic_base_qual`.
///
pub fn parse_assemblies(
    reader: impl Read,
    synthetic_base_qual: u8,
) -> SimpleResult<Vec<JunctionAssembly>> {
    let records: Vec<AssemblyRecord> = match serde_json::from_reader(reader) {
        Ok(x) => x,
        Err(e) => bail!("Can't parse assembly records: {}", e),
    };
    records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            record.bases.make_ascii_uppercase();
            for read in record
                .support
                .iter_mut()
                .chain(record.candidate_support.iter_mut())
            {
                read.bases.make_ascii_uppercase();
            }
            convert_record(index, record, synthetic_base_qual)
        })
        .collect()
}

pub fn read_assemblies(filename: &Utf8Path, synthetic_base_qual: u8) -> Vec<JunctionAssembly> {
    info!("Reading junction assemblies from file: '{filename}'");

    let file = unwrap!(
        File::open(filename),
        "Unable to open junction assembly file: '{}'",
        filename
    );
    let assemblies = unwrap!(
        parse_assemblies(BufReader::new(file), synthetic_base_qual),
        "Unable to read junction assemblies from file: '{}'",
        filename
    );

    info!("Read {} junction assemblies", assemblies.len());
    assemblies
}

/// Check that every assembly junction falls within a reference chromosome
pub fn check_assembly_chromosomes(
    assemblies: &[JunctionAssembly],
    genome_ref: &dyn RefGenomeSource,
) -> SimpleResult<()> {
    for assembly in assemblies.iter() {
        let junction = &assembly.junction;
        let Some(length) = genome_ref.get_chromosome_length(&junction.chromosome) else {
            bail!(
                "Assembly {} junction chromosome '{}' is not in the reference",
                assembly.id,
                junction.chromosome
            );
        };
        if junction.position < 0 || junction.position >= length {
            bail!(
                "Assembly {} junction position {} is outside of chromosome '{}' with length {}",
                assembly.id,
                junction.position,
                junction.chromosome,
                length
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{Orientation, SupportType};

    const TEST_RECORDS: &str = r#"[
  {
    "id": 0,
    "junction": {"chromosome": "chr1", "position": 1000, "orientation": "Forward"},
    "bases": "acgtACGTTTGG",
    "junction_index": 7,
    "support": [
      {
        "id": "r1",
        "support_type": "Junction",
        "chromosome": "chr1",
        "aligned_start": 995,
        "aligned_end": 1001,
        "orientation": "Forward",
        "assembly_index": 2
      }
    ],
    "remote_regions": [
      {
        "chromosome": "chr2",
        "start": 5000,
        "end": 5400,
        "orientation": "Reverse",
        "read_ids": ["r7"]
      }
    ]
  },
  {
    "junction": {"chromosome": "chr1", "position": 1500, "orientation": "Reverse", "indel": true},
    "bases": "TTGGACGT",
    "base_quals": [30, 30, 30, 30, 40, 40, 40, 40],
    "junction_index": 4,
    "indel_coords": {"pos_start": 1000, "pos_end": 1500, "length": 499}
  }
]"#;

    #[test]
    fn test_parse_assemblies() {
        let assemblies = parse_assemblies(TEST_RECORDS.as_bytes(), 26).unwrap();
        assert_eq!(assemblies.len(), 2);

        let a0 = &assemblies[0];
        assert_eq!(a0.id, AssemblyId(0));
        assert_eq!(a0.bases(), b"ACGTACGTTTGG");
        assert_eq!(a0.base_quals(), &[26; 12]);
        assert_eq!(a0.junction_index(), 7);
        assert_eq!(a0.ref_base_length(), 8);
        assert_eq!(a0.junction.orientation, Orientation::Forward);
        assert!(!a0.junction.indel);
        assert_eq!(a0.support.len(), 1);
        assert_eq!(a0.support[0].support_type, SupportType::Junction);
        assert!(a0.support[0].first_in_pair);
        assert_eq!(a0.support[0].assembly_index, Some(2));
        assert_eq!(a0.remote_regions[0].read_count(), 1);

        let a1 = &assemblies[1];
        assert_eq!(a1.id, AssemblyId(1));
        assert!(a1.junction.indel);
        assert_eq!(a1.base_quals()[4], 40);
        assert_eq!(a1.ref_base_length(), 4);
        assert_eq!(a1.indel_coords.as_ref().map(|x| x.length), Some(499));
    }

    /// Single record array at chr1:10 with the given extra fields
    fn get_test_record(fields: &str) -> String {
        let junction = r#"{"chromosome": "chr1", "position": 10, "orientation": "Forward"}"#;
        format!(r#"[{{"junction": {junction}, {fields}}}]"#)
    }

    #[test]
    fn test_invalid_records() {
        let bad_id = get_test_record(r#""id": 3, "bases": "ACGT", "junction_index": 1"#);
        assert!(parse_assemblies(bad_id.as_bytes(), 26).is_err());

        let bad_index = get_test_record(r#""bases": "ACGT", "junction_index": 4"#);
        assert!(parse_assemblies(bad_index.as_bytes(), 26).is_err());

        let bad_quals =
            get_test_record(r#""bases": "ACGT", "base_quals": [30, 30], "junction_index": 1"#);
        assert!(parse_assemblies(bad_quals.as_bytes(), 26).is_err());

        let bad_base = get_test_record(r#""bases": "ACXT", "junction_index": 1"#);
        assert!(parse_assemblies(bad_base.as_bytes(), 26).is_err());

        let valid = get_test_record(r#""bases": "ACGT", "junction_index": 1"#);
        assert!(parse_assemblies(valid.as_bytes(), 26).is_ok());

        assert!(parse_assemblies("{".as_bytes(), 26).is_err());
    }

    #[test]
    fn test_check_assembly_chromosomes() {
        let assemblies = parse_assemblies(TEST_RECORDS.as_bytes(), 26).unwrap();

        let mut genome_ref = crate::genome_ref::GenomeRef::default();
        genome_ref.chroms.insert("chr1".to_string(), vec![b'A'; 2000]);
        assert!(check_assembly_chromosomes(&assemblies, &genome_ref).is_ok());

        genome_ref.chroms.insert("chr1".to_string(), vec![b'A'; 1200]);
        assert!(check_assembly_chromosomes(&assemblies, &genome_ref).is_err());

        genome_ref.chroms.clear();
        genome_ref.chroms.insert("chr2".to_string(), vec![b'A'; 2000]);
        assert!(check_assembly_chromosomes(&assemblies, &genome_ref).is_err());
    }

    #[test]
    fn test_read_assemblies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, TEST_RECORDS.as_bytes()).unwrap();
        let filename = Utf8Path::from_path(file.path()).unwrap();
        let assemblies = read_assemblies(filename, 26);
        assert_eq!(assemblies.len(), 2);
    }
}
