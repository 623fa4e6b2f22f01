//! EMBL flat-file writer for `gb_io` records.

use anyhow::{Context, Result};
use gb_io::seq::{Seq, Topology};
use std::{
    fs::File,
    io::{BufWriter, Write},
};

pub const DEFAULT_OUTPUT_PATH: &str = "PseudoContig_Excluded.embl";

const LINE_WIDTH: usize = 80;
const FT_INDENT: &str = "FT                   ";
pub(crate) const FT_VALUE_WIDTH: usize = LINE_WIDTH - FT_INDENT.len();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_OUTPUT_PATH.to_string(),
        }
    }
}

impl OutputConfig {
    pub fn new(path: Option<String>) -> Self {
        path.map(|path| Self { path }).unwrap_or_default()
    }
}

/// Writes `seq` to the configured path, replacing any existing file.
pub fn write_embl_file(seq: &Seq, config: &OutputConfig) -> Result<()> {
    let file = File::create(&config.path)
        .with_context(|| format!("Could not create EMBL file '{}'", config.path))?;
    let mut out = BufWriter::new(file);
    write_embl(&mut out, seq)
        .and_then(|_| out.flush())
        .with_context(|| format!("Could not write EMBL file '{}'", config.path))?;
    Ok(())
}

pub fn embl_to_string(seq: &Seq) -> String {
    let mut out = Vec::new();
    // Writes into a Vec cannot fail.
    let _ = write_embl(&mut out, seq);
    String::from_utf8_lossy(&out).into_owned()
}

pub fn write_embl<W: Write>(out: &mut W, seq: &Seq) -> std::io::Result<()> {
    let name = seq
        .name
        .as_deref()
        .or(seq.accession.as_deref())
        .unwrap_or("unknown");
    let accession = seq.accession.as_deref().unwrap_or(name);
    let version = seq
        .version
        .as_deref()
        .and_then(|v| v.rsplit_once('.').map(|(_, n)| n).or(Some(v)))
        .unwrap_or("1");
    let topology = match seq.topology {
        Topology::Circular => "circular",
        Topology::Linear => "linear",
    };
    let molecule = seq.molecule_type.as_deref().unwrap_or("DNA");
    let division = if seq.division.is_empty() {
        "UNC"
    } else {
        seq.division.as_str()
    };

    writeln!(
        out,
        "ID   {name}; SV {version}; {topology}; {molecule}; STD; {division}; {} BP.",
        seq.seq.len()
    )?;
    writeln!(out, "XX")?;
    writeln!(out, "AC   {accession};")?;
    writeln!(out, "XX")?;
    if let Some(definition) = &seq.definition {
        write_wrapped(out, "DE", definition)?;
        writeln!(out, "XX")?;
    }
    let keywords = seq.keywords.as_deref().unwrap_or_default();
    writeln!(out, "KW   {keywords}.")?;
    writeln!(out, "XX")?;
    if let Some(source) = &seq.source {
        write_wrapped(out, "OS", &source.source)?;
        let lineage = source
            .organism
            .as_deref()
            .and_then(|organism| organism.split_once('\n'))
            .map(|(_, lineage)| lineage);
        if let Some(lineage) = lineage {
            write_wrapped(out, "OC", lineage)?;
        }
        writeln!(out, "XX")?;
    }
    for comment in &seq.comments {
        for line in comment.lines() {
            writeln!(out, "CC   {line}")?;
        }
        writeln!(out, "XX")?;
    }

    writeln!(out, "FH   Key             Location/Qualifiers")?;
    writeln!(out, "FH")?;
    for feature in &seq.features {
        let location = feature.location.to_gb_format();
        let mut chunks = wrap_text(&location, FT_VALUE_WIDTH, &[',']).into_iter();
        writeln!(
            out,
            "FT   {:<16}{}",
            feature.kind.to_string(),
            chunks.next().unwrap_or_default()
        )?;
        for chunk in chunks {
            writeln!(out, "{FT_INDENT}{chunk}")?;
        }
        for (key, value) in &feature.qualifiers {
            let text = format_qualifier(key, value.as_deref());
            for chunk in wrap_text(&text, FT_VALUE_WIDTH, &[' ']) {
                writeln!(out, "{FT_INDENT}{chunk}")?;
            }
        }
    }
    writeln!(out, "XX")?;
    write_sequence(out, &seq.seq)?;
    writeln!(out, "//")
}

fn write_wrapped<W: Write>(out: &mut W, code: &str, text: &str) -> std::io::Result<()> {
    for chunk in wrap_text(text, LINE_WIDTH - 5, &[' ']) {
        writeln!(out, "{code}   {chunk}")?;
    }
    Ok(())
}

fn write_sequence<W: Write>(out: &mut W, seq: &[u8]) -> std::io::Result<()> {
    let count = |base: u8| {
        seq.iter()
            .filter(|b| b.eq_ignore_ascii_case(&base))
            .count()
    };
    let (a, c, g, t) = (count(b'A'), count(b'C'), count(b'G'), count(b'T'));
    let other = seq.len() - a - c - g - t;
    writeln!(
        out,
        "SQ   Sequence {} BP; {a} A; {c} C; {g} G; {t} T; {other} other;",
        seq.len()
    )?;

    let mut written = 0;
    for line in seq.chunks(60) {
        let blocks: Vec<String> = line
            .chunks(10)
            .map(|block| String::from_utf8_lossy(block).to_ascii_lowercase())
            .collect();
        written += line.len();
        writeln!(out, "     {:<66}{written:>9}", blocks.join(" "))?;
    }
    Ok(())
}

fn format_qualifier(key: &impl std::fmt::Display, value: Option<&str>) -> String {
    match value {
        None => format!("/{key}"),
        Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            format!("/{key}={value}")
        }
        Some(value) => format!("/{key}=\"{}\"", value.replace('"', "\"\"")),
    }
}

/// Splits `text` into lines of at most `width` characters, preferring to
/// break at one of `breaks`. A space used as a break is dropped. Only a
/// hard break inside a word yields a line of exactly `width` characters,
/// which is how the reader tells the two apart.
fn wrap_text(text: &str, width: usize, breaks: &[char]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut start = 0;
    while chars.len() - start > width {
        let window = &chars[start..=start + width];
        let cut = window
            .iter()
            .enumerate()
            .rev()
            .find(|(i, ch)| *i > 0 && *i < width && breaks.contains(*ch));
        match cut {
            Some((i, &' ')) => {
                lines.push(window[..i].iter().collect());
                start += i + 1;
            }
            Some((i, _)) => {
                lines.push(window[..=i].iter().collect());
                start += i + 1;
            }
            None => {
                lines.push(window[..width].iter().collect());
                start += width;
            }
        }
    }
    if start < chars.len() || lines.is_empty() {
        lines.push(chars[start..].iter().collect());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embl_reader::parse_embl_text;
    use gb_io::seq::{Feature, FeatureKind, Location};

    fn record() -> Seq {
        let mut seq = Seq::empty();
        seq.name = Some("PC01".to_string());
        seq.accession = Some("PC01".to_string());
        seq.version = Some("PC01.1".to_string());
        seq.molecule_type = Some("genomic DNA".to_string());
        seq.division = "PRO".to_string();
        seq.definition = Some("CONTIGuator pseudo-contig".to_string());
        seq.seq = b"ACGT".repeat(40);
        seq.len = Some(seq.seq.len());
        seq.features = vec![
            Feature {
                kind: FeatureKind::from("Contig"),
                location: Location::simple_range(0, 100),
                qualifiers: vec![
                    ("method".into(), Some("CONTIGuator/Excluded".to_string())),
                    ("systematic_id".into(), Some("ctgA".to_string())),
                    (
                        "note".into(),
                        Some("a rather long note ".repeat(6).trim_end().to_string()),
                    ),
                    ("codon_start".into(), Some("1".to_string())),
                ],
            },
            Feature {
                kind: FeatureKind::from("Contig"),
                location: Location::Complement(Box::new(Location::simple_range(100, 160))),
                qualifiers: vec![("pseudo".into(), None)],
            },
        ];
        seq
    }

    #[test]
    fn test_feature_location_lines() {
        let text = embl_to_string(&record());
        assert!(text.contains("FT   Contig          1..100\n"));
        assert!(text.contains("FT   Contig          complement(101..160)\n"));
    }

    #[test]
    fn test_format_qualifier() {
        assert_eq!(format_qualifier(&"pseudo", None), "/pseudo");
        assert_eq!(format_qualifier(&"codon_start", Some("1")), "/codon_start=1");
        assert_eq!(
            format_qualifier(&"note", Some("say \"hi\"")),
            "/note=\"say \"\"hi\"\"\""
        );
    }

    #[test]
    fn test_wrap_text_respects_width() {
        let text = "word ".repeat(40);
        let lines = wrap_text(text.trim_end(), FT_VALUE_WIDTH, &[' ']);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.chars().count() <= FT_VALUE_WIDTH));
        assert_eq!(lines.join(" "), text.trim_end());
    }

    #[test]
    fn test_wrap_text_hard_break() {
        let text = "x".repeat(130);
        let lines = wrap_text(&text, 59, &[' ']);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.concat(), text);
    }

    #[test]
    fn test_wrap_text_space_breaks_are_short() {
        let text = format!("{} {}", "y".repeat(FT_VALUE_WIDTH - 1), "z".repeat(10));
        let lines = wrap_text(&text, FT_VALUE_WIDTH, &[' ']);
        assert_eq!(lines, vec!["y".repeat(FT_VALUE_WIDTH - 1), "z".repeat(10)]);

        let text = format!("{} {}", "y".repeat(40), "z".repeat(30));
        let lines = wrap_text(&text, FT_VALUE_WIDTH, &[' ']);
        assert_eq!(lines, vec!["y".repeat(40), "z".repeat(30)]);
    }

    #[test]
    fn test_long_systematic_id_round_trips() {
        let ids = [
            "NODE_10_length_123456_cov_123.456789_ID_123456789",
            "contig_without_any_spaces_that_is_much_longer_than_one_feature_table_line",
            "scaffold_0001_exactly_fills_the_line_width",
        ];
        let mut original = record();
        for id in ids {
            original.features.push(Feature {
                kind: FeatureKind::from("Contig"),
                location: Location::simple_range(0, 10),
                qualifiers: vec![("systematic_id".into(), Some(id.to_string()))],
            });
        }
        let text = embl_to_string(&original);
        assert!(text.lines().all(|line| line.chars().count() <= LINE_WIDTH));
        let parsed = parse_embl_text(&text).unwrap().remove(0);
        let parsed_ids: Vec<_> = parsed.features[2..]
            .iter()
            .map(|feature| feature.qualifiers[0].1.clone().unwrap_or_default())
            .collect();
        assert_eq!(parsed_ids, ids);
    }

    #[test]
    fn test_hard_break_before_space_round_trips() {
        let note = format!("{} tail", "w".repeat(FT_VALUE_WIDTH - 7));
        let mut original = record();
        original.features[0].qualifiers = vec![("note".into(), Some(note.clone()))];
        let parsed = parse_embl_text(&embl_to_string(&original))
            .unwrap()
            .remove(0);
        assert_eq!(parsed.features[0].qualifiers[0].1.as_deref(), Some(note.as_str()));
    }

    #[test]
    fn test_lines_fit_in_80_columns() {
        let text = embl_to_string(&record());
        assert!(text.lines().all(|line| line.chars().count() <= LINE_WIDTH));
        assert!(text.starts_with("ID   PC01; SV 1; linear; genomic DNA; STD; PRO; 160 BP."));
        assert!(text.contains("FT   Contig          1..100\n"));
        assert!(text.contains("SQ   Sequence 160 BP; 40 A; 40 C; 40 G; 40 T; 0 other;"));
        assert!(text.trim_end().ends_with("//"));
    }

    #[test]
    fn test_sequence_lines() {
        let text = embl_to_string(&record());
        let first = text
            .lines()
            .find(|line| line.starts_with("     acgt"))
            .unwrap();
        assert_eq!(first.len(), LINE_WIDTH);
        assert!(first.ends_with("60"));
        assert!(first.contains("acgtacgtac gtacgtacgt"));
    }

    #[test]
    fn test_written_record_parses_back() {
        let original = record();
        let parsed = parse_embl_text(&embl_to_string(&original)).unwrap().remove(0);
        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.version, original.version);
        assert_eq!(parsed.seq, original.seq);
        assert_eq!(parsed.features.len(), original.features.len());
        for (a, b) in parsed.features.iter().zip(&original.features) {
            assert_eq!(a.kind.to_string(), b.kind.to_string());
            assert_eq!(a.location.to_gb_format(), b.location.to_gb_format());
            assert_eq!(a.qualifiers, b.qualifiers);
        }
    }

    #[test]
    fn test_output_config_default() {
        assert_eq!(OutputConfig::default().path, DEFAULT_OUTPUT_PATH);
        assert_eq!(OutputConfig::new(None).path, "PseudoContig_Excluded.embl");
        assert_eq!(OutputConfig::new(Some("x.embl".into())).path, "x.embl");
    }
}
