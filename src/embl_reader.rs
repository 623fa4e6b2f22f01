//! EMBL flat-file parser producing `gb_io` records.
//!
//! Handles the line types CONTIGuator and Biopython emit for pseudo-contig
//! records: `ID` (modern and legacy layouts), `AC`, `SV`, `DE`, `KW`, `OS`,
//! `OC`, `CC`, the `FT` feature table and the `SQ` block. References, dates
//! and cross references are skipped.

use anyhow::{Context, Result, anyhow};
use gb_io::seq::{Feature, FeatureKind, Location, QualifierKey, Seq, Source, Topology};
use log::debug;

use crate::embl_writer::FT_VALUE_WIDTH;

/// Column of feature table values, counted after the `FT   ` line code.
const FT_VALUE_COLUMN: usize = 16;

pub fn parse_embl_file(path: &str) -> Result<Vec<Seq>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read EMBL file '{path}'"))?;
    parse_embl_text(&text).with_context(|| format!("Could not parse EMBL file '{path}'"))
}

pub fn parse_embl_text(text: &str) -> Result<Vec<Seq>> {
    let mut records = Vec::new();
    let mut current: Option<RecordBuilder> = None;

    for (line_idx, line) in text.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("//") {
            let builder = current
                .take()
                .ok_or_else(|| anyhow!("line {line_no}: '//' terminator without an ID line"))?;
            records.push(builder.finish(records.len())?);
            continue;
        }

        let (code, content) = split_line(line);
        if code == "ID" {
            if current.is_some() {
                return Err(anyhow!(
                    "line {line_no}: new ID line before '//' terminated the previous record"
                ));
            }
            current = Some(RecordBuilder::from_id_line(content, line_no)?);
            continue;
        }

        let builder = current
            .as_mut()
            .ok_or_else(|| anyhow!("line {line_no}: expected an ID line, found '{code}'"))?;
        builder.push_line(code, content, line, line_no)?;
    }

    if current.is_some() {
        return Err(anyhow!("record is not terminated by '//'"));
    }
    if records.is_empty() {
        return Err(anyhow!("no EMBL records found"));
    }
    Ok(records)
}

fn split_line(line: &str) -> (&str, &str) {
    let code = line.get(..2).unwrap_or(line);
    let content = line.get(5..).or_else(|| line.get(2..)).unwrap_or_default();
    (code, content)
}

#[derive(Default)]
struct RecordBuilder {
    name: Option<String>,
    version: Option<String>,
    topology: Option<Topology>,
    molecule_type: Option<String>,
    division: String,
    declared_len: Option<usize>,
    accession: Option<String>,
    definition: Vec<String>,
    keywords: Vec<String>,
    species: Vec<String>,
    lineage: Vec<String>,
    comments: Vec<String>,
    open_comment: Vec<String>,
    feature_lines: Vec<(usize, String)>,
    in_sequence: bool,
    sequence: Vec<u8>,
}

impl RecordBuilder {
    fn from_id_line(content: &str, line_no: usize) -> Result<Self> {
        let parts: Vec<&str> = content.split(';').map(str::trim).collect();
        let first = parts.first().copied().unwrap_or_default();
        if first.is_empty() {
            return Err(anyhow!("line {line_no}: ID line has no entry name"));
        }
        let mut builder = Self::default();

        // Biopython writes an empty SV field when the record has no version.
        let modern =
            parts.len() >= 7 || parts.get(1).is_some_and(|part| part.starts_with("SV"));
        if modern {
            // ID   X56734; SV 1; linear; mRNA; STD; PLN; 1859 BP.
            builder.name = Some(first.to_string());
            builder.version = parts[1]
                .strip_prefix("SV")
                .map(str::trim)
                .filter(|sv| !sv.is_empty())
                .map(|sv| format!("{first}.{sv}"));
            builder.topology = parts.get(2).map(|raw| parse_topology(raw));
            builder.molecule_type = parts.get(3).and_then(|raw| nonempty_owned(raw));
            builder.division = parts.get(5).copied().unwrap_or_default().to_string();
        } else {
            // ID   PseudoContig standard; DNA; PRO; 1000 BP.
            let mut tokens = first.split_whitespace();
            builder.name = tokens.next().map(str::to_string);
            let mol = parts.get(1).copied().unwrap_or_default();
            if let Some(rest) = mol.strip_prefix("circular") {
                builder.topology = Some(Topology::Circular);
                builder.molecule_type = nonempty_owned(rest);
            } else {
                builder.topology = Some(Topology::Linear);
                builder.molecule_type = nonempty_owned(mol);
            }
            builder.division = parts.get(2).copied().unwrap_or_default().to_string();
        }
        builder.declared_len = parts.last().and_then(|raw| parse_declared_len(raw));
        Ok(builder)
    }

    fn push_line(&mut self, code: &str, content: &str, line: &str, line_no: usize) -> Result<()> {
        if code != "CC" {
            self.flush_comment();
        }
        if self.in_sequence && line.starts_with(' ') {
            self.sequence.extend(
                line.bytes()
                    .filter(u8::is_ascii_alphabetic)
                    .map(|b| b.to_ascii_uppercase()),
            );
            return Ok(());
        }
        match code {
            "AC" => {
                if self.accession.is_none() {
                    self.accession = content
                        .split(';')
                        .map(str::trim)
                        .find(|acc| !acc.is_empty())
                        .map(str::to_string);
                }
            }
            "SV" => {
                if let Some(version) = nonempty_owned(content) {
                    self.version = Some(version);
                }
            }
            "DE" => self.definition.push(content.trim().to_string()),
            "KW" => self.keywords.push(content.trim().to_string()),
            "OS" => self.species.push(content.trim().to_string()),
            "OC" => self.lineage.push(content.trim().to_string()),
            "CC" => self.open_comment.push(content.trim_end().to_string()),
            "FT" => self.feature_lines.push((line_no, content.to_string())),
            "SQ" => self.in_sequence = true,
            "XX" | "FH" => {}
            other => debug!("line {line_no}: skipping EMBL line type '{other}'"),
        }
        Ok(())
    }

    fn flush_comment(&mut self) {
        if !self.open_comment.is_empty() {
            self.comments.push(self.open_comment.join("\n"));
            self.open_comment.clear();
        }
    }

    fn finish(mut self, record_idx: usize) -> Result<Seq> {
        self.flush_comment();
        let label = self
            .name
            .clone()
            .unwrap_or_else(|| format!("record_{}", record_idx + 1));
        if let Some(declared) = self.declared_len {
            if declared != self.sequence.len() {
                return Err(anyhow!(
                    "EMBL record '{label}' declares {declared} BP but contains {} bases",
                    self.sequence.len()
                ));
            }
        }
        let features = parse_feature_table(&self.feature_lines, &label)?;

        let mut seq = Seq::empty();
        seq.name = self.name;
        seq.topology = self.topology.unwrap_or(Topology::Linear);
        seq.molecule_type = self.molecule_type;
        seq.division = self.division;
        seq.accession = self.accession;
        seq.version = self.version;
        seq.definition = nonempty_owned(&self.definition.join(" "));
        seq.keywords = nonempty_owned(self.keywords.join(" ").trim_end_matches('.'));
        seq.source = nonempty_owned(&self.species.join(" ")).map(|species| Source {
            organism: Some(if self.lineage.is_empty() {
                species.clone()
            } else {
                format!("{species}\n{}", self.lineage.join(" "))
            }),
            source: species,
        });
        seq.comments = self.comments;
        seq.len = Some(self.sequence.len());
        seq.seq = self.sequence;
        seq.features = features;
        Ok(seq)
    }
}

struct FeatureBuilder {
    line_no: usize,
    key: String,
    location: String,
    qualifiers: Vec<(String, Option<String>)>,
    open_quote: bool,
    last_line_full: bool,
}

impl FeatureBuilder {
    /// `content` is the line after its `FT` code. A qualifier line that fills
    /// the feature table width was hard-broken inside a word, so the next
    /// line continues it verbatim instead of after a space.
    fn push_qualifier_text(&mut self, content: &str) {
        let raw = content.get(FT_VALUE_COLUMN..).unwrap_or_default().trim_end();
        let text = content.trim();
        let continues_word = self.last_line_full;
        self.last_line_full = raw.chars().count() >= FT_VALUE_WIDTH;

        if text.starts_with('/') && !self.open_quote {
            let body = &text[1..];
            let (key, value) = match body.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.to_string())),
                None => (body.trim().to_string(), None),
            };
            self.open_quote = value.as_deref().is_some_and(has_open_quote);
            self.qualifiers.push((key, value));
        } else if let Some((key, Some(value))) = self.qualifiers.last_mut() {
            if continues_word {
                value.push_str(if raw.is_empty() { text } else { raw });
            } else {
                if key.as_str() != "translation" {
                    value.push(' ');
                }
                value.push_str(text);
            }
            self.open_quote = has_open_quote(value);
        }
    }

    fn build(self, seq_label: &str) -> Result<Feature> {
        let invalid = |reason: String| {
            anyhow!(
                "EMBL '{}' feature '{}' at line {} has invalid location '{}': {}",
                seq_label,
                self.key,
                self.line_no,
                self.location,
                reason
            )
        };
        let location =
            Location::from_gb_format(&self.location).map_err(|e| invalid(e.to_string()))?;
        if !location_text_consumed(&self.location, &location) {
            return Err(invalid(format!(
                "only '{}' could be read",
                location.to_gb_format()
            )));
        }
        let qualifiers = self
            .qualifiers
            .into_iter()
            .map(|(key, value)| (QualifierKey::from(key.as_str()), value.map(|v| unquote(&v))))
            .collect();
        Ok(Feature {
            kind: FeatureKind::from(self.key.as_str()),
            location,
            qualifiers,
        })
    }
}

fn parse_feature_table(lines: &[(usize, String)], seq_label: &str) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    let mut current: Option<FeatureBuilder> = None;

    for (line_no, content) in lines {
        if !content.starts_with(' ') {
            if let Some(done) = current.take() {
                features.push(done.build(seq_label)?);
            }
            let mut tokens = content.splitn(2, char::is_whitespace);
            let key = tokens.next().unwrap_or_default().to_string();
            let location = tokens.next().unwrap_or_default().trim().to_string();
            current = Some(FeatureBuilder {
                line_no: *line_no,
                key,
                location,
                qualifiers: vec![],
                open_quote: false,
                last_line_full: false,
            });
            continue;
        }

        let feature = current.as_mut().ok_or_else(|| {
            anyhow!("line {line_no}: feature table continuation before any feature key")
        })?;
        let text = content.trim();
        if feature.qualifiers.is_empty() && !text.starts_with('/') {
            feature.location.push_str(text);
        } else {
            feature.push_qualifier_text(content);
        }
    }
    if let Some(done) = current.take() {
        features.push(done.build(seq_label)?);
    }
    Ok(features)
}

/// The INSDC location parser stops at the first token it cannot use, so
/// the parsed location has to render back to the whole input text.
fn location_text_consumed(text: &str, location: &Location) -> bool {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if contains_external(location) && !text.contains(':') {
        return false;
    }
    let rendered = location.to_gb_format();
    rendered == text || rendered == collapse_single_base_ranges(&text)
}

fn contains_external(location: &Location) -> bool {
    match location {
        Location::External(..) => true,
        Location::Complement(inner) => contains_external(inner),
        Location::Join(parts)
        | Location::Order(parts)
        | Location::Bond(parts)
        | Location::OneOf(parts) => parts.iter().any(contains_external),
        _ => false,
    }
}

/// Rewrites `7..7` as `7`, the form single-base ranges render in.
fn collapse_single_base_ranges(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("..") {
        let (head, tail) = rest.split_at(idx);
        let tail = &tail[2..];
        let digits_at = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let start = &head[digits_at..];
        let end_len = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        let end = &tail[..end_len];
        out.push_str(head);
        if !start.is_empty() && start == end && !head[..digits_at].ends_with('<') {
            rest = &tail[end_len..];
        } else {
            out.push_str("..");
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

fn has_open_quote(value: &str) -> bool {
    value.starts_with('"') && value.matches('"').count() % 2 == 1
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    match value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => value.to_string(),
    }
}

fn parse_topology(raw: &str) -> Topology {
    if raw.trim().eq_ignore_ascii_case("circular") {
        Topology::Circular
    } else {
        Topology::Linear
    }
}

fn parse_declared_len(raw: &str) -> Option<usize> {
    raw.trim()
        .trim_end_matches('.')
        .strip_suffix("BP")
        .and_then(|n| n.trim().parse().ok())
}

fn nonempty_owned(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then_some(text.to_string())
}
