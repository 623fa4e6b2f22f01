//! Appending CONTIGuator excluded contigs to a pseudo-contig record.

use anyhow::{Context, Result, anyhow};
use bio::io::fasta;
use gb_io::seq::{Feature, FeatureKind, Location, Seq};
use log::{debug, warn};
use serde::Serialize;
use std::{fs::File, io::Read};

pub const EXCLUDED_FEATURE_KIND: &str = "Contig";
pub const EXCLUDED_METHOD: &str = "CONTIGuator/Excluded";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppendedContig {
    pub systematic_id: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppendSummary {
    pub contigs: Vec<AppendedContig>,
    pub bases_appended: usize,
    pub final_offset: i64,
}

pub fn excluded_feature(systematic_id: &str, start: i64, end: i64) -> Feature {
    Feature {
        kind: FeatureKind::from(EXCLUDED_FEATURE_KIND),
        location: Location::simple_range(start, end),
        qualifiers: vec![
            ("method".into(), Some(EXCLUDED_METHOD.to_string())),
            ("systematic_id".into(), Some(systematic_id.to_string())),
        ],
    }
}

/// Appends every FASTA record, in file order, to `record` starting at
/// `offset`.
pub fn append_excluded_features<R: Read>(
    reader: R,
    record: &mut Seq,
    offset: i64,
) -> Result<AppendSummary> {
    if offset != record.seq.len() as i64 {
        warn!(
            "Appending from offset {offset} but the record holds {} bases; new features will not line up with the appended sequence",
            record.seq.len()
        );
    }
    let mut summary = AppendSummary {
        final_offset: offset,
        ..Default::default()
    };
    for (record_idx, fasta_record) in fasta::Reader::new(reader).records().enumerate() {
        let fasta_record = fasta_record
            .map_err(|e| anyhow!("Malformed FASTA record #{}: {e}", record_idx + 1))?;
        let bases = fasta_record.seq();
        let start = summary.final_offset;
        let end = start + bases.len() as i64;
        debug!(
            "Appending excluded contig '{}' ({} bp) at [{start}:{end}]",
            fasta_record.id(),
            bases.len()
        );
        record.seq.extend_from_slice(bases);
        record
            .features
            .push(excluded_feature(fasta_record.id(), start, end));
        summary.contigs.push(AppendedContig {
            systematic_id: fasta_record.id().to_string(),
            start,
            end,
        });
        summary.bases_appended += bases.len();
        summary.final_offset = end;
    }
    record.len = Some(record.seq.len());
    Ok(summary)
}

pub fn append_excluded_fasta_file(
    path: &str,
    record: &mut Seq,
    offset: i64,
) -> Result<AppendSummary> {
    let file = File::open(path).with_context(|| format!("Could not open FASTA file '{path}'"))?;
    append_excluded_features(file, record, offset)
        .with_context(|| format!("Could not read excluded contigs from '{path}'"))
}
