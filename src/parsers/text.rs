use super::{FieldMap, ParsedLine};
use crate::utils::text::split_lines;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

struct Template {
    name: &'static str,
    regex: Regex,
    fields: &'static [&'static str],
}

static TEMPLATES: Lazy<Vec<Template>> = Lazy::new(|| {
    vec![
        Template {
            name: "standard",
            regex: Regex::new(
                r"^(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\s+\[?([A-Z]+)\]?:?\s+(.*)$",
            )
            .expect("standard log regex"),
            fields: &["timestamp", "level", "message"],
        },
        Template {
            name: "nginx",
            regex: Regex::new(
                r#"^(\S+) - (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\d+|-) "([^"]*)" "([^"]*)""#,
            )
            .expect("nginx log regex"),
            fields: &[
                "ip",
                "user",
                "time",
                "request",
                "status",
                "size",
                "referer",
                "user_agent",
            ],
        },
        Template {
            name: "apache",
            regex: Regex::new(r#"^(\S+) \S+ (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\d+|-)"#)
                .expect("apache log regex"),
            fields: &["ip", "user", "time", "request", "status", "size"],
        },
    ]
});

static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w[\w.\-]*)=("[^"]*"|\S+)"#).expect("key=value regex"));

pub const UNSTRUCTURED: &str = "unstructured";

/// Tries each template in order; the first match wins. Lines that match
/// nothing come back as a lone `message` field.
pub fn parse_line(line: &str) -> (&'static str, FieldMap) {
    for template in TEMPLATES.iter() {
        if let Some(caps) = template.regex.captures(line) {
            let mut fields = FieldMap::new();
            for (idx, name) in template.fields.iter().enumerate() {
                let value = caps
                    .get(idx + 1)
                    .map(|m| Value::String(m.as_str().to_string()))
                    .unwrap_or(Value::Null);
                fields.insert(name.to_string(), value);
            }
            return (template.name, fields);
        }
    }
    let mut pairs = FieldMap::new();
    for caps in KEY_VALUE.captures_iter(line) {
        let value = caps[2].trim_matches('"').to_string();
        pairs.insert(caps[1].to_string(), Value::String(value));
    }
    if !pairs.is_empty() {
        return ("key_value", pairs);
    }
    let mut fields = FieldMap::new();
    fields.insert("message".to_string(), Value::String(line.to_string()));
    (UNSTRUCTURED, fields)
}

pub fn parse(text: &str) -> Vec<ParsedLine> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let (format, fields) = parse_line(line);
            ParsedLine {
                line_number: idx + 1,
                format: format.to_string(),
                fields,
                error: None,
            }
        })
        .collect()
}

/// Requested fields per line. A field the template did not produce is looked
/// up as `name=value` / `name: value` in the raw line, else reported as null.
pub fn extract_fields(text: &str, field_names: &[String]) -> Vec<ParsedLine> {
    let fallbacks: Vec<Option<Regex>> = field_names
        .iter()
        .map(|name| Regex::new(&format!(r"\b{}[=:]\s*([^\s,;]+)", regex::escape(name))).ok())
        .collect();
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let (format, parsed) = parse_line(line);
            let mut fields = FieldMap::new();
            for (name, fallback) in field_names.iter().zip(fallbacks.iter()) {
                let value = match parsed.get(name) {
                    Some(value) => value.clone(),
                    None => fallback
                        .as_ref()
                        .and_then(|re| re.captures(line))
                        .map(|caps| Value::String(caps[1].to_string()))
                        .unwrap_or(Value::Null),
                };
                fields.insert(name.clone(), value);
            }
            ParsedLine {
                line_number: idx + 1,
                format: format.to_string(),
                fields,
                error: None,
            }
        })
        .collect()
}
