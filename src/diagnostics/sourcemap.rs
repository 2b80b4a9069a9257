//! Source maps
//!
//! Maps positions in transpiled code back to the original source. Lines and
//! columns at this boundary are 1-based, matching stack-trace notation.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while loading a source map
#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    Version(u32),

    #[error("invalid VLQ mapping at segment {segment:?}: {reason}")]
    Mapping { segment: String, reason: String },
}

/// A resolved original position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub source: Option<String>,
}

/// Translates transpiled positions to original positions
pub trait SourceMap: Send + Sync + fmt::Debug {
    /// Original position for a transpiled `(line, column)`, if mapped
    fn original_position(&self, line: u32, column: u32) -> Option<Position>;

    /// Original source text, when the map embeds it
    fn original_source(&self) -> Option<&str> {
        None
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    sources_content: Vec<Option<String>>,
    mappings: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Mapping {
    generated_column: u32,
    source: u32,
    original_line: u32,
    original_column: u32,
}

/// Decoded revision-3 source map
#[derive(Clone, Debug)]
pub struct SourceMapV3 {
    sources: Vec<String>,
    content: Option<String>,
    /// Mappings per generated line (0-based), sorted by generated column
    lines: Vec<Vec<Mapping>>,
}

impl SourceMapV3 {
    pub fn from_json(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        if raw.version != 3 {
            return Err(SourceMapError::Version(raw.version));
        }

        let lines = decode_mappings(&raw.mappings)?;
        let content = raw.sources_content.into_iter().flatten().next();

        Ok(Self {
            sources: raw.sources,
            content,
            lines,
        })
    }
}

impl SourceMap for SourceMapV3 {
    fn original_position(&self, line: u32, column: u32) -> Option<Position> {
        let segments = self.lines.get(line.checked_sub(1)? as usize)?;
        let column = column.saturating_sub(1);

        // Greatest mapping whose generated column does not exceed the query.
        let idx = segments.partition_point(|m| m.generated_column <= column);
        let mapping = segments.get(idx.checked_sub(1)?)?;

        Some(Position {
            line: mapping.original_line + 1,
            column: mapping.original_column + 1,
            source: self.sources.get(mapping.source as usize).cloned(),
        })
    }

    fn original_source(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Mapping>>, SourceMapError> {
    let mut lines = Vec::new();
    let (mut source, mut original_line, mut original_column) = (0i64, 0i64, 0i64);

    for line in mappings.split(';') {
        let mut generated_column = 0i64;
        let mut decoded = Vec::new();

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(segment)?;
            let invalid = |reason: &str| SourceMapError::Mapping {
                segment: segment.to_string(),
                reason: reason.to_string(),
            };

            match fields.len() {
                1 => {
                    generated_column += fields[0];
                    continue;
                }
                4 | 5 => {}
                n => return Err(invalid(&format!("expected 1, 4 or 5 fields, got {n}"))),
            }

            generated_column += fields[0];
            source += fields[1];
            original_line += fields[2];
            original_column += fields[3];

            if generated_column < 0 || source < 0 || original_line < 0 || original_column < 0 {
                return Err(invalid("negative position"));
            }

            decoded.push(Mapping {
                generated_column: generated_column as u32,
                source: source as u32,
                original_line: original_line as u32,
                original_column: original_column as u32,
            });
        }

        decoded.sort_by_key(|m| m.generated_column);
        lines.push(decoded);
    }

    Ok(lines)
}

fn decode_vlq(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let mut values = Vec::new();
    let mut value = 0i64;
    let mut shift = 0u32;

    for ch in segment.chars() {
        let digit = base64_value(ch).ok_or_else(|| SourceMapError::Mapping {
            segment: segment.to_string(),
            reason: format!("invalid base64 character {ch:?}"),
        })?;

        if shift > 60 {
            return Err(SourceMapError::Mapping {
                segment: segment.to_string(),
                reason: "value overflow".to_string(),
            });
        }

        value += i64::from(digit & 0b11111) << shift;
        if digit & 0b100000 != 0 {
            shift += 5;
            continue;
        }

        let magnitude = value >> 1;
        values.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(SourceMapError::Mapping {
            segment: segment.to_string(),
            reason: "truncated value".to_string(),
        });
    }

    Ok(values)
}

fn base64_value(ch: char) -> Option<u8> {
    match ch {
        'A'..='Z' => Some(ch as u8 - b'A'),
        'a'..='z' => Some(ch as u8 - b'a' + 26),
        '0'..='9' => Some(ch as u8 - b'0' + 52),
        '+' => Some(62),
        '/' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vlq() {
        assert_eq!(decode_vlq("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_vlq("IACE").unwrap(), vec![4, 0, 1, 2]);
        assert_eq!(decode_vlq("D").unwrap(), vec![-1]);
        // 16 needs a continuation digit: 32 = 0b100000 -> "gB"
        assert_eq!(decode_vlq("gB").unwrap(), vec![16]);
        assert!(decode_vlq("g").is_err());
        assert!(decode_vlq("A*").is_err());
    }

    #[test]
    fn test_lookup_greatest_lower_bound() {
        // line 1: col 0 -> (1,1); line 2: col 0 -> (2,1), col 4 -> (3,3)
        let json = r#"{
            "version": 3,
            "sources": ["a.ts"],
            "sourcesContent": ["one\ntwo\nthree"],
            "mappings": "AAAA;AACA,IACE"
        }"#;
        let map = SourceMapV3::from_json(json).unwrap();

        let pos = map.original_position(2, 7).unwrap();
        assert_eq!((pos.line, pos.column), (3, 3));
        assert_eq!(pos.source.as_deref(), Some("a.ts"));

        let pos = map.original_position(2, 2).unwrap();
        assert_eq!((pos.line, pos.column), (2, 1));

        assert!(map.original_position(9, 1).is_none());
        assert!(map.original_position(0, 1).is_none());
        assert_eq!(map.original_source(), Some("one\ntwo\nthree"));
    }

    #[test]
    fn test_rejects_other_versions() {
        let err = SourceMapV3::from_json(r#"{"version": 2, "mappings": ""}"#).unwrap_err();
        assert!(matches!(err, SourceMapError::Version(2)));
    }

    #[test]
    fn test_empty_line_has_no_mapping() {
        let map = SourceMapV3::from_json(r#"{"version": 3, "mappings": ";AAAA"}"#).unwrap();
        assert!(map.original_position(1, 1).is_none());
        assert!(map.original_position(2, 1).is_some());
        assert!(map.original_source().is_none());
    }
}
