//! Feature location spans, strands and the append offset derived from them.

use anyhow::{Result, anyhow};
use gb_io::seq::{Feature, Location};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    fn symbol(self) -> &'static str {
        match self {
            Self::Forward => "+",
            Self::Reverse => "-",
            Self::Unknown => "?",
        }
    }
}

/// How the append offset is taken from the last feature's span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetPolicy {
    /// Reverse-strand features resume at their start coordinate, all
    /// others at their end. Matches output of earlier CONTIGuator tools.
    #[default]
    Legacy,
    /// Always resume at the end coordinate.
    End,
}

/// Outer bounds of a feature location, zero-based half-open, with strand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpan {
    pub start: i64,
    pub end: i64,
    pub strand: Option<Strand>,
}

impl LocationSpan {
    pub fn new(start: i64, end: i64, strand: Option<Strand>) -> Self {
        Self { start, end, strand }
    }

    pub fn append_offset(&self, policy: OffsetPolicy) -> i64 {
        match (policy, self.strand) {
            (OffsetPolicy::Legacy, Some(Strand::Reverse)) => {
                warn!(
                    "Last feature {self} is on the reverse strand; resuming at its start ({}) instead of its end ({})",
                    self.start, self.end
                );
                self.start
            }
            _ => self.end,
        }
    }

    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let mut ranges = Vec::new();
        collect_location_ranges_i64(&feature.location, &mut ranges);
        let bounds = if ranges.is_empty() {
            feature
                .location
                .find_bounds()
                .map_err(|_| anyhow!("Feature '{}' has no usable bounds", feature.kind))?
        } else {
            let start = ranges.iter().map(|(s, _)| *s).min().unwrap_or_default();
            let end = ranges.iter().map(|(_, e)| *e).max().unwrap_or_default();
            (start, end)
        };
        let (mut start, mut end) = bounds;
        if end < start {
            std::mem::swap(&mut start, &mut end);
        }
        Ok(Self::new(start, end, location_strand(&feature.location)))
    }
}

impl fmt::Display for LocationSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.start, self.end)?;
        if let Some(strand) = self.strand {
            write!(f, "({})", strand.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for LocationSpan {
    type Err = anyhow::Error;

    /// Parses `[start:end](strand)`; the strand suffix is optional.
    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let body = text
            .strip_prefix('[')
            .ok_or_else(|| anyhow!("Location '{text}' does not start with '['"))?;
        let (start, rest) = body
            .split_once(':')
            .ok_or_else(|| anyhow!("Location '{text}' has no ':' separator"))?;
        let (end, tail) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("Location '{text}' has no closing ']'"))?;
        let start: i64 = start
            .trim()
            .parse()
            .map_err(|e| anyhow!("Location '{text}' has invalid start '{start}': {e}"))?;
        let end: i64 = end
            .trim()
            .parse()
            .map_err(|e| anyhow!("Location '{text}' has invalid end '{end}': {e}"))?;
        if start < 0 || end < start {
            return Err(anyhow!("Location '{text}' is not a valid range"));
        }
        let strand = match tail {
            "" => None,
            "(+)" => Some(Strand::Forward),
            "(-)" => Some(Strand::Reverse),
            "(?)" => Some(Strand::Unknown),
            other => return Err(anyhow!("Location '{text}' has invalid strand '{other}'")),
        };
        Ok(Self::new(start, end, strand))
    }
}

/// Parses a textual location and resolves the offset appending resumes at.
pub fn parse_location(text: &str, policy: OffsetPolicy) -> Result<i64> {
    Ok(text.parse::<LocationSpan>()?.append_offset(policy))
}

pub fn collect_location_strands(location: &Location, reverse: bool, strands: &mut Vec<bool>) {
    match location {
        Location::Range(_, _) | Location::Between(_, _) => strands.push(reverse),
        Location::Complement(inner) => collect_location_strands(inner, !reverse, strands),
        Location::Join(parts)
        | Location::Order(parts)
        | Location::Bond(parts)
        | Location::OneOf(parts) => {
            for part in parts {
                collect_location_strands(part, reverse, strands);
            }
        }
        Location::External(_, maybe_loc) => {
            if let Some(loc) = maybe_loc {
                collect_location_strands(loc, reverse, strands);
            }
        }
        Location::Gap(_) => {}
    }
}

/// `None` for locations without any range, `Unknown` for mixed strands.
pub fn location_strand(location: &Location) -> Option<Strand> {
    let mut strands = Vec::new();
    collect_location_strands(location, false, &mut strands);
    if strands.is_empty() {
        None
    } else if strands.iter().all(|is_reverse| *is_reverse) {
        Some(Strand::Reverse)
    } else if strands.iter().all(|is_reverse| !*is_reverse) {
        Some(Strand::Forward)
    } else {
        Some(Strand::Unknown)
    }
}

pub fn collect_location_ranges_i64(location: &Location, ranges: &mut Vec<(i64, i64)>) {
    match location {
        Location::Range((from, _), (to, _)) | Location::Between(from, to) => {
            if *from < 0 || *to < 0 {
                return;
            }
            let mut start = *from;
            let mut end = *to;
            if end < start {
                std::mem::swap(&mut start, &mut end);
            }
            ranges.push((start, end));
        }
        Location::Complement(inner) => collect_location_ranges_i64(inner, ranges),
        Location::Join(parts)
        | Location::Order(parts)
        | Location::Bond(parts)
        | Location::OneOf(parts) => {
            for part in parts {
                collect_location_ranges_i64(part, ranges);
            }
        }
        Location::External(_, maybe_loc) => {
            if let Some(loc) = maybe_loc {
                collect_location_ranges_i64(loc, ranges);
            }
        }
        Location::Gap(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_io::seq::FeatureKind;

    fn make_feature(location: Location) -> Feature {
        Feature {
            kind: FeatureKind::from("Contig"),
            location,
            qualifiers: vec![],
        }
    }

    #[test]
    fn test_parse_forward_location() {
        assert_eq!(parse_location("[900:1000](+)", OffsetPolicy::Legacy).unwrap(), 1000);
        assert_eq!(parse_location("[900:1000](+)", OffsetPolicy::End).unwrap(), 1000);
    }

    #[test]
    fn test_parse_reverse_location_legacy() {
        assert_eq!(parse_location("[900:1000](-)", OffsetPolicy::Legacy).unwrap(), 900);
        assert_eq!(parse_location("[900:1000](-)", OffsetPolicy::End).unwrap(), 1000);
    }

    #[test]
    fn test_parse_location_without_strand() {
        let span: LocationSpan = "[0:42]".parse().unwrap();
        assert_eq!(span, LocationSpan::new(0, 42, None));
        assert_eq!(span.append_offset(OffsetPolicy::Legacy), 42);
    }

    #[test]
    fn test_parse_malformed_locations() {
        for bad in [
            "900:1000](+)",
            "[9001000](+)",
            "[900:1000(+)",
            "[a:1000](+)",
            "[900:b](+)",
            "[1000:900](+)",
            "[900:1000](x)",
            "join{[0:10](+), [20:30](+)}",
            "",
        ] {
            assert!(
                parse_location(bad, OffsetPolicy::Legacy).is_err(),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_span_display_round_trips() {
        let span = LocationSpan::new(899, 1000, Some(Strand::Reverse));
        assert_eq!(span.to_string(), "[899:1000](-)");
        assert_eq!(span.to_string().parse::<LocationSpan>().unwrap(), span);
    }

    #[test]
    fn test_span_from_simple_feature() {
        let feature = make_feature(Location::simple_range(900, 1000));
        let span = LocationSpan::from_feature(&feature).unwrap();
        assert_eq!(span, LocationSpan::new(900, 1000, Some(Strand::Forward)));
    }

    #[test]
    fn test_span_from_complement_join() {
        let feature = make_feature(Location::Complement(Box::new(Location::Join(vec![
            Location::simple_range(10, 20),
            Location::simple_range(40, 50),
        ]))));
        let span = LocationSpan::from_feature(&feature).unwrap();
        assert_eq!(span, LocationSpan::new(10, 50, Some(Strand::Reverse)));
        assert_eq!(span.append_offset(OffsetPolicy::Legacy), 10);
    }

    #[test]
    fn test_mixed_strands_are_unknown() {
        let location = Location::Join(vec![
            Location::simple_range(10, 20),
            Location::Complement(Box::new(Location::simple_range(40, 50))),
        ]);
        assert_eq!(location_strand(&location), Some(Strand::Unknown));
        let span = LocationSpan::from_feature(&make_feature(location)).unwrap();
        assert_eq!(span.append_offset(OffsetPolicy::Legacy), 50);
    }
}
