//! Format parsers. Each variant turns a byte chunk into records (text, json)
//! or a binary summary, and can pull named fields out of the same input.

pub mod binary;
pub mod json;
pub mod text;

use crate::errors::ToolError;
use crate::services::sniff::{decode_lossy, SniffInfo};
use crate::utils::text::split_lines;
use serde::Serialize;
use std::str::FromStr;

pub use binary::HexMessage;

pub type FieldMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedLine {
    pub line_number: usize,
    pub format: String,
    pub fields: FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseResult {
    Records {
        parser: LogParser,
        records: Vec<ParsedLine>,
        error_count: usize,
    },
    Binary {
        format: String,
        size: usize,
        hex_preview: String,
        fields: FieldMap,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogParser {
    Text,
    Json,
    Binary,
}

impl FromStr for LogParser {
    type Err = ToolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "text" | "plain" | "kv" | "key_value" => Ok(LogParser::Text),
            "json" | "jsonl" | "ndjson" => Ok(LogParser::Json),
            "binary" | "hex" => Ok(LogParser::Binary),
            other => Err(ToolError::invalid_params(format!(
                "Unknown parser: {}",
                other
            ))
            .with_hint("Use one of: text, json, binary.")),
        }
    }
}

impl LogParser {
    pub fn as_str(self) -> &'static str {
        match self {
            LogParser::Text => "text",
            LogParser::Json => "json",
            LogParser::Binary => "binary",
        }
    }

    /// Binary sniff picks the binary parser; otherwise JSON when most of the
    /// first non-empty lines parse as JSON objects, else text.
    pub fn classify(sniff: &SniffInfo, sample: &[u8]) -> LogParser {
        if sniff.is_binary {
            return LogParser::Binary;
        }
        let text = decode_lossy(sample, &sniff.encoding);
        let probe: Vec<&str> = split_lines(&text)
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(10)
            .collect();
        // The sample may end mid-line; ignore a trailing fragment when there is more.
        let probe = if probe.len() > 1 {
            &probe[..probe.len() - 1]
        } else {
            &probe[..]
        };
        if probe.is_empty() {
            return LogParser::Text;
        }
        let json_lines = probe
            .iter()
            .filter(|line| {
                line.starts_with('{')
                    && serde_json::from_str::<serde_json::Value>(line)
                        .map(|v| v.is_object())
                        .unwrap_or(false)
            })
            .count();
        if json_lines * 2 > probe.len() {
            LogParser::Json
        } else {
            LogParser::Text
        }
    }

    pub fn parse(self, bytes: &[u8], encoding: &str) -> ParseResult {
        match self {
            LogParser::Binary => ParseResult::Binary {
                format: binary::detect_format(bytes).to_string(),
                size: bytes.len(),
                hex_preview: binary::hex_preview(bytes),
                fields: FieldMap::new(),
            },
            LogParser::Text | LogParser::Json => {
                let text = decode_lossy(bytes, encoding);
                let records = if self == LogParser::Json {
                    json::parse(&text)
                } else {
                    text::parse(&text)
                };
                let error_count = records.iter().filter(|r| r.error.is_some()).count();
                ParseResult::Records {
                    parser: self,
                    records,
                    error_count,
                }
            }
        }
    }

    /// One row per line for text/json; a single row for binary input.
    pub fn extract_fields(
        self,
        bytes: &[u8],
        encoding: &str,
        field_names: &[String],
    ) -> Vec<ParsedLine> {
        match self {
            LogParser::Binary => vec![ParsedLine {
                line_number: 1,
                format: binary::detect_format(bytes).to_string(),
                fields: binary::extract_fields(bytes, field_names),
                error: None,
            }],
            LogParser::Json => json::extract_fields(&decode_lossy(bytes, encoding), field_names),
            LogParser::Text => text::extract_fields(&decode_lossy(bytes, encoding), field_names),
        }
    }
}
