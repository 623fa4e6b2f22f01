//! Load, extend and write a CONTIGuator pseudo-contig record.

use crate::{
    embl_reader::parse_embl_file,
    embl_writer::{OutputConfig, write_embl_file},
    error::{ErrorCode, ToolError},
    excluded::{AppendedContig, append_excluded_fasta_file},
    feature_location::{LocationSpan, OffsetPolicy, parse_location},
    paths::normalize_user_path,
};
use gb_io::seq::Seq;
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub embl: String,
    pub fasta: String,
    pub output: OutputConfig,
    pub offset_policy: OffsetPolicy,
    pub strict_single_record: bool,
}

impl Config {
    pub fn new(embl: impl Into<String>, fasta: impl Into<String>) -> Self {
        Self {
            embl: embl.into(),
            fasta: fasta.into(),
            ..Default::default()
        }
    }

    /// Copy of the configuration with every path made absolute.
    pub fn normalized(&self) -> Self {
        Self {
            embl: normalize_user_path(&self.embl),
            fasta: normalize_user_path(&self.fasta),
            output: OutputConfig {
                path: normalize_user_path(&self.output.path),
            },
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub embl: String,
    pub fasta: String,
    pub output: String,
    pub record_name: Option<String>,
    pub offset_policy: OffsetPolicy,
    pub last_feature: Option<LocationSpan>,
    pub append_offset: i64,
    pub input_length: usize,
    pub output_length: usize,
    pub input_features: usize,
    pub output_features: usize,
    pub appended: Vec<AppendedContig>,
}

/// Reads the EMBL file and returns its first record.
pub fn load_record(path: &str, strict_single_record: bool) -> Result<Seq, ToolError> {
    if !std::path::Path::new(path).exists() {
        return Err(ToolError::new(
            ErrorCode::NotFound,
            format!("EMBL file '{path}' does not exist"),
        ));
    }
    let mut records = parse_embl_file(path).map_err(ToolError::format)?;
    if records.len() > 1 {
        if strict_single_record {
            return Err(ToolError::new(
                ErrorCode::InvalidInput,
                format!(
                    "EMBL file '{path}' holds {} records; expected a single pseudo-contig",
                    records.len()
                ),
            ));
        }
        warn!(
            "EMBL file '{path}' holds {} records; using the first and ignoring {} more",
            records.len(),
            records.len() - 1
        );
    }
    Ok(records.swap_remove(0))
}

/// Span of the last feature and the offset appending resumes at.
pub fn resolve_append_offset(
    record: &Seq,
    policy: OffsetPolicy,
) -> Result<(Option<LocationSpan>, i64), ToolError> {
    let Some(last) = record.features.last() else {
        warn!(
            "Record '{}' has no features; appending from the end of its sequence",
            record.name.as_deref().unwrap_or("<unnamed>")
        );
        return Ok((None, record.seq.len() as i64));
    };
    let span = LocationSpan::from_feature(last).map_err(ToolError::format)?;
    let text = span.to_string();
    debug!("Last feature '{}' spans {text}", last.kind);
    let offset = parse_location(&text, policy).map_err(ToolError::format)?;
    Ok((Some(span), offset))
}

pub fn run(config: &Config) -> Result<RunSummary, ToolError> {
    let config = config.normalized();
    info!("Reading pseudo-contig record from '{}'", config.embl);
    let mut record = load_record(&config.embl, config.strict_single_record)?;
    let input_length = record.seq.len();
    let input_features = record.features.len();

    let (last_feature, append_offset) = resolve_append_offset(&record, config.offset_policy)?;
    info!("Appending excluded contigs from '{}' at offset {append_offset}", config.fasta);

    if !std::path::Path::new(&config.fasta).exists() {
        return Err(ToolError::new(
            ErrorCode::NotFound,
            format!("FASTA file '{}' does not exist", config.fasta),
        ));
    }
    let appended = append_excluded_fasta_file(&config.fasta, &mut record, append_offset)
        .map_err(ToolError::format)?;

    write_embl_file(&record, &config.output).map_err(|e| {
        ToolError::new(ErrorCode::Io, format!("{e:#}"))
    })?;
    info!(
        "Wrote {} appended contig(s) to '{}'",
        appended.contigs.len(),
        config.output.path
    );

    Ok(RunSummary {
        embl: config.embl,
        fasta: config.fasta,
        output: config.output.path,
        record_name: record.name.clone(),
        offset_policy: config.offset_policy,
        last_feature,
        append_offset,
        input_length,
        output_length: record.seq.len(),
        input_features,
        output_features: record.features.len(),
        appended: appended.contigs,
    })
}
