use super::FieldMap;
use crate::constants::limits::{HEX_PREVIEW_BYTES, MAX_HEX_PATTERN_BYTES};
use crate::errors::ToolError;
use regex::bytes::Regex;
use serde::Serialize;
use serde_json::Value;

const HEADER_BYTES: usize = 8;

const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x1F, 0x8B], "gzip"),
    (b"PK\x03\x04", "zip"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (&[0xFF, 0xD8, 0xFF], "jpeg"),
    (b"%PDF", "pdf"),
    (b"GIF8", "gif"),
    (b"BZh", "bzip2"),
    (&[0xFD, b'7', b'z', b'X', b'Z', 0x00], "xz"),
    (&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C], "7z"),
    (b"\x7fELF", "elf"),
    (b"SQLite format 3\0", "sqlite"),
];

pub fn detect_format(bytes: &[u8]) -> &'static str {
    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

pub fn hex_preview(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(HEX_PREVIEW_BYTES)])
}

/// Supported names: `header`, `payload`, `format`, `size`. Others come back null.
pub fn extract_fields(bytes: &[u8], field_names: &[String]) -> FieldMap {
    let mut out = FieldMap::new();
    for name in field_names {
        let value = match name.as_str() {
            "header" if bytes.len() >= HEADER_BYTES => serde_json::json!({
                "raw": hex::encode(&bytes[..HEADER_BYTES]),
                "bytes": bytes[..HEADER_BYTES].to_vec(),
            }),
            "payload" if bytes.len() > HEADER_BYTES => serde_json::json!({
                "size": bytes.len() - HEADER_BYTES,
                "raw": hex::encode(&bytes[HEADER_BYTES..]),
            }),
            "format" => Value::String(detect_format(bytes).to_string()),
            "size" => Value::from(bytes.len()),
            _ => Value::Null,
        };
        out.insert(name.clone(), value);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HexMessage {
    pub offset: u64,
    pub length: usize,
    pub hex: String,
}

/// Accepts `48454C4C4F`, `0x48454c4c4f` or `48 45 4C 4C 4F`.
pub fn decode_hex_pattern(raw: &str) -> Result<Vec<u8>, ToolError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(compact.as_str());
    if compact.is_empty() {
        return Err(ToolError::pattern_rejected("hex_pattern must not be empty"));
    }
    let bytes = hex::decode(compact).map_err(|err| {
        ToolError::pattern_rejected(format!("hex_pattern is not valid hex: {}", err))
    })?;
    if bytes.len() > MAX_HEX_PATTERN_BYTES {
        return Err(ToolError::pattern_rejected(format!(
            "hex_pattern is {} bytes, limit is {}",
            bytes.len(),
            MAX_HEX_PATTERN_BYTES
        )));
    }
    Ok(bytes)
}

/// Literal byte matcher; the regex engine gives a linear-time scan.
pub struct HexScanner {
    needle_len: usize,
    regex: Regex,
}

impl HexScanner {
    pub fn new(needle: &[u8]) -> Result<Self, ToolError> {
        let mut source = String::with_capacity(needle.len() * 4 + 5);
        source.push_str("(?-u)");
        for byte in needle {
            source.push_str(&format!("\\x{:02X}", byte));
        }
        let regex = Regex::new(&source)
            .map_err(|err| ToolError::pattern_rejected(format!("Invalid hex pattern: {}", err)))?;
        Ok(Self {
            needle_len: needle.len(),
            regex,
        })
    }

    pub fn needle_len(&self) -> usize {
        self.needle_len
    }

    /// Start positions of non-overlapping occurrences at or after `from`.
    pub fn positions<'a>(&'a self, haystack: &'a [u8], from: usize) -> impl Iterator<Item = usize> + 'a {
        let from = from.min(haystack.len());
        self.regex
            .find_iter(&haystack[from..])
            .map(move |m| m.start() + from)
    }
}

/// Every non-overlapping occurrence of the pattern with up to `message_length`
/// bytes starting at the match, capped at `max_messages`.
pub fn extract_hex_message(
    bytes: &[u8],
    hex_pattern: &str,
    max_messages: usize,
    message_length: usize,
) -> Result<Vec<HexMessage>, ToolError> {
    let needle = decode_hex_pattern(hex_pattern)?;
    let scanner = HexScanner::new(&needle)?;
    let length = message_length.max(needle.len());
    Ok(scanner
        .positions(bytes, 0)
        .take(max_messages)
        .map(|start| message_at(bytes, start, 0, length))
        .collect())
}

pub fn message_at(buffer: &[u8], start: usize, base_offset: u64, length: usize) -> HexMessage {
    let end = start.saturating_add(length).min(buffer.len());
    HexMessage {
        offset: base_offset + start as u64,
        length: end - start,
        hex: hex::encode(&buffer[start..end]),
    }
}
