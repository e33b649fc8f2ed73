use crate::errors::{ErrorCode, McpError};
use crate::utils::suggest::suggest;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .filter_map(|tool| {
            JSONSchema::compile(&tool.input_schema)
                .ok()
                .map(|schema| (tool.name.clone(), schema))
        })
        .collect()
});

/// Executor-level fields accepted by every tool on top of its own schema.
const SHARED_FIELDS: &[&str] = &["trace_id"];

pub fn tool_catalog() -> &'static [ToolDef] {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Unknown tools pass through; the executor reports them with suggestions.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let (Some(tool), Some(schema)) = (tool_by_name(tool_name), TOOL_VALIDATORS.get(tool_name))
    else {
        return Ok(());
    };
    let mut args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    if let Value::Object(map) = &mut args {
        for field in SHARED_FIELDS {
            map.remove(*field);
        }
    }
    if let Err(errors) = schema.validate(&args) {
        let known: Vec<&str> = tool
            .input_schema
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let mut lines = vec![format!("Invalid arguments for {}", tool_name)];
        for err in errors.take(10) {
            let at = err.instance_path.to_string();
            let at = if at.is_empty() { "(root)".to_string() } else { at };
            match &err.kind {
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for field in unexpected {
                        let close = suggest(field, &known, 2);
                        if close.is_empty() {
                            lines.push(format!("- {}: unknown field '{}'", at, field));
                        } else {
                            lines.push(format!(
                                "- {}: unknown field '{}' (did you mean {}?)",
                                at,
                                field,
                                close.join(", ")
                            ));
                        }
                    }
                }
                ValidationErrorKind::Required { property } => {
                    let name = property
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| property.to_string());
                    lines.push(format!("- {}: missing required field '{}'", at, name));
                }
                ValidationErrorKind::Type { kind } => {
                    lines.push(format!("- {}: expected {}", at, describe_type(kind)));
                }
                _ => lines.push(format!("- {}: {}", at, err)),
            }
        }
        return Err(McpError::new(ErrorCode::InvalidParams, lines.join("\n")));
    }
    Ok(())
}

fn describe_type(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(primitive) => primitive.to_string(),
        TypeKind::Multiple(types) => {
            let names: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if names.is_empty() {
                "unknown".to_string()
            } else {
                names.join(" | ")
            }
        }
    }
}
