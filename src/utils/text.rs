pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Last `max_bytes` of `value`, moved forward to a char boundary.
pub fn utf8_suffix(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut start = value.len() - max_bytes;
    while start < value.len() && !value.is_char_boundary(start) {
        start += 1;
    }
    &value[start..]
}

pub fn human_readable_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}

/// Splits on `\n`, dropping one trailing `\r` per line and the empty segment
/// after a final newline.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{human_readable_size, split_lines, truncate_utf8_prefix, utf8_suffix};

    #[test]
    fn truncate_utf8_prefix_does_not_split_utf8() {
        assert_eq!(truncate_utf8_prefix("héllo", 2), "h");
        assert_eq!(truncate_utf8_prefix("héllo", 3), "hé");
    }

    #[test]
    fn utf8_suffix_does_not_split_utf8() {
        assert_eq!(utf8_suffix("abc", 5), "abc");
        assert_eq!(utf8_suffix("héllo", 4), "llo");
        assert_eq!(utf8_suffix("héllo", 5), "éllo");
    }

    #[test]
    fn human_readable_size_scales_units() {
        assert_eq!(human_readable_size(512), "512.00 B");
        assert_eq!(human_readable_size(1536), "1.50 KB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn split_lines_handles_crlf_and_missing_trailing_newline() {
        assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("\n"), vec![""]);
        assert!(split_lines("").is_empty());
    }
}
