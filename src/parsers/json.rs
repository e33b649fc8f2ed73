use super::{FieldMap, ParsedLine};
use crate::utils::text::split_lines;
use serde_json::Value;

/// One record per JSON line. When no line parses on its own the whole payload
/// is tried as a single document (an array yields one record per element).
pub fn parse(text: &str) -> Vec<ParsedLine> {
    let lines = split_lines(text);
    let mut records = Vec::with_capacity(lines.len());
    let mut parsed_any = false;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                parsed_any = true;
                records.push(ParsedLine {
                    line_number: idx + 1,
                    format: "json".to_string(),
                    fields: into_fields(value),
                    error: None,
                });
            }
            Err(err) => records.push(ParsedLine {
                line_number: idx + 1,
                format: "invalid_json".to_string(),
                fields: FieldMap::new(),
                error: Some(err.to_string()),
            }),
        }
    }
    if parsed_any {
        return records;
    }
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| ParsedLine {
                line_number: idx + 1,
                format: "json".to_string(),
                fields: into_fields(item),
                error: None,
            })
            .collect(),
        Ok(value) => vec![ParsedLine {
            line_number: 1,
            format: "json".to_string(),
            fields: into_fields(value),
            error: None,
        }],
        Err(_) => records,
    }
}

fn into_fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = FieldMap::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Walks a dotted path such as `user.name`; numeric segments index arrays.
pub fn lookup<'a>(fields: &'a FieldMap, path: &str) -> Option<&'a Value> {
    if let Some(direct) = fields.get(path) {
        return Some(direct);
    }
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn extract_fields(text: &str, field_names: &[String]) -> Vec<ParsedLine> {
    parse(text)
        .into_iter()
        .map(|record| {
            if record.error.is_some() {
                return record;
            }
            let mut fields = FieldMap::new();
            for name in field_names {
                let value = lookup(&record.fields, name).cloned().unwrap_or(Value::Null);
                fields.insert(name.clone(), value);
            }
            ParsedLine { fields, ..record }
        })
        .collect()
}
