use crate::constants::sniff::{BINARY_EXTENSIONS, BINARY_RATIO, GENERIC_BINARY_MIME};
use crate::utils::paths::extension_lowercase;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SniffInfo {
    pub mime_type: String,
    pub encoding: String,
    pub is_binary: bool,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

pub fn detect_bom(sample: &[u8]) -> Option<&'static str> {
    if sample.starts_with(UTF8_BOM) {
        return Some("utf-8-sig");
    }
    if sample.starts_with(UTF16_LE_BOM) || sample.starts_with(UTF16_BE_BOM) {
        return Some("utf-16");
    }
    None
}

/// UTF-8, then GBK, then Latin-1. The sample may be cut mid-character, so an
/// incomplete trailing sequence does not disqualify an encoding.
pub fn detect_encoding(sample: &[u8]) -> &'static str {
    if let Some(bom) = detect_bom(sample) {
        return bom;
    }
    if is_utf8_prefix(sample) {
        return "utf-8";
    }
    if is_gbk_prefix(sample) {
        return "gbk";
    }
    "latin-1"
}

fn is_utf8_prefix(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && sample.len() - err.valid_up_to() < 4,
    }
}

fn is_gbk_prefix(sample: &[u8]) -> bool {
    let strict = |bytes: &[u8]| {
        encoding_rs::GBK
            .decode_without_bom_handling_and_without_replacement(bytes)
            .is_some()
    };
    if strict(sample) {
        return true;
    }
    match sample.split_last() {
        Some((last, rest)) if *last >= 0x81 => strict(rest),
        _ => false,
    }
}

/// NUL bytes, or more than 30% control bytes other than common whitespace.
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let suspicious = sample
        .iter()
        .filter(|b| {
            let b = **b;
            (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B)) || b == 0x7F
        })
        .count();
    suspicious as f64 / sample.len() as f64 > BINARY_RATIO
}

pub fn extension_is_binary(path: &str) -> bool {
    extension_lowercase(path)
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn mime_is_binary(mime: &str) -> bool {
    let lowered = mime.trim().to_lowercase();
    if lowered.contains("charset=binary") {
        return true;
    }
    let essence = lowered.split(';').next().unwrap_or("").trim();
    if essence.starts_with("text/") || essence == "inode/x-empty" || essence.is_empty() {
        return false;
    }
    const TEXTUAL_APPLICATION: &[&str] = &[
        "application/json",
        "application/x-ndjson",
        "application/xml",
        "application/javascript",
        "application/x-empty",
        "application/csv",
    ];
    if TEXTUAL_APPLICATION.contains(&essence) {
        return false;
    }
    ["application/", "image/", "audio/", "video/", "font/"]
        .iter()
        .any(|prefix| essence.starts_with(prefix))
}

/// Combines the byte heuristics with an optional MIME string from the remote
/// `file` utility. Without one the type falls back to the generic binary MIME
/// and binary-ness is decided by content alone.
pub fn classify(path: &str, sample: &[u8], mime: Option<&str>) -> SniffInfo {
    let bom = detect_bom(sample);
    let utf16 = bom == Some("utf-16");
    let mut is_binary = extension_is_binary(path) || (!utf16 && looks_binary(sample));
    if let Some(mime) = mime {
        is_binary |= mime_is_binary(mime);
    }
    let encoding = if is_binary {
        "binary"
    } else {
        detect_encoding(sample)
    };
    let mime_type = match mime {
        Some(m) if !m.trim().is_empty() => m.trim().to_string(),
        _ => GENERIC_BINARY_MIME.to_string(),
    };
    SniffInfo {
        mime_type,
        encoding: encoding.to_string(),
        is_binary,
    }
}

/// Decodes with the named encoding, replacing anything undecodable.
pub fn decode_lossy(bytes: &[u8], encoding: &str) -> String {
    match encoding {
        "utf-8-sig" => String::from_utf8_lossy(bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes))
            .into_owned(),
        "utf-16" => encoding_rs::UTF_16LE.decode(bytes).0.into_owned(),
        "gbk" => encoding_rs::GBK.decode(bytes).0.into_owned(),
        "latin-1" => bytes.iter().map(|b| *b as char).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_chain_prefers_utf8_then_gbk_then_latin1() {
        assert_eq!(detect_encoding("plain ascii".as_bytes()), "utf-8");
        assert_eq!(detect_encoding("日志".as_bytes()), "utf-8");
        let (gbk, _, _) = encoding_rs::GBK.encode("错误日志");
        assert_eq!(detect_encoding(&gbk), "gbk");
        assert_eq!(detect_encoding(&[b'a', 0xFF, 0xFF, b'b']), "latin-1");
    }

    #[test]
    fn truncated_utf8_tail_is_still_utf8() {
        let text = "température".as_bytes();
        let cut = &text[..text.len() - 7];
        assert!(std::str::from_utf8(cut).is_err());
        assert_eq!(detect_encoding(cut), "utf-8");
    }

    #[test]
    fn boms_are_detected() {
        assert_eq!(detect_encoding(&[0xEF, 0xBB, 0xBF, b'a']), "utf-8-sig");
        assert_eq!(detect_encoding(&[0xFF, 0xFE, b'a', 0]), "utf-16");
        assert_eq!(decode_lossy(&[0xFF, 0xFE, b'h', 0, b'i', 0], "utf-16"), "hi");
        assert_eq!(decode_lossy(&[0xEF, 0xBB, 0xBF, b'o', b'k'], "utf-8-sig"), "ok");
    }

    #[test]
    fn binary_heuristics() {
        assert!(looks_binary(b"abc\0def"));
        assert!(looks_binary(&[1, 2, 3, 4, b'a']));
        assert!(!looks_binary(b"2024-01-01 INFO ok\n\tindent\r\n"));
        assert!(!looks_binary(b""));
        assert!(extension_is_binary("/var/log/archive.GZ"));
        assert!(!extension_is_binary("/var/log/syslog"));
    }

    #[test]
    fn mime_classification() {
        assert!(mime_is_binary("application/gzip"));
        assert!(mime_is_binary("text/plain; charset=binary"));
        assert!(!mime_is_binary("text/plain"));
        assert!(!mime_is_binary("application/json"));
        assert!(!mime_is_binary("inode/x-empty"));
    }

    #[test]
    fn classify_falls_back_to_generic_mime() {
        let info = classify("/var/log/app.log", b"hello\n", None);
        assert_eq!(info.mime_type, GENERIC_BINARY_MIME);
        assert!(!info.is_binary);
        assert_eq!(info.encoding, "utf-8");

        let info = classify("/var/log/app.log", b"hello\n", Some("application/octet-stream"));
        assert!(info.is_binary);
        assert_eq!(info.encoding, "binary");
    }
}
