use crate::constants::limits::{MAX_FIELDS, MAX_PORT, MIN_PORT};
use crate::errors::ToolError;
use serde_json::Value;

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    /// Accepts integers or numeric strings; negatives are rejected rather than clamped.
    pub fn ensure_optional_u64(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<u64>, ToolError> {
        let Some(value) = value else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        let numeric = value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
            .ok_or_else(|| {
                ToolError::invalid_params(format!("{} must be a non-negative integer", label))
            })?;
        if numeric < 0 {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-negative integer",
                label
            )));
        }
        Ok(Some(numeric as u64))
    }

    pub fn ensure_optional_bool(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<bool>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(ToolError::invalid_params(format!("{} must be a boolean", label))),
            },
            Some(_) => Err(ToolError::invalid_params(format!("{} must be a boolean", label))),
        }
    }

    /// Field lists arrive either as a JSON array or a comma separated string.
    pub fn ensure_field_list(&self, value: Option<&Value>) -> Result<Vec<String>, ToolError> {
        let fields: Vec<String> = match value {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::String(text)) => text
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.ensure_identifier(
                        item.as_str().unwrap_or_default(),
                        "fields[]",
                    )?);
                }
                out
            }
            Some(_) => {
                return Err(ToolError::invalid_params(
                    "fields must be an array of strings or a comma separated string",
                ))
            }
        };
        if fields.len() > MAX_FIELDS {
            return Err(ToolError::invalid_params(format!(
                "fields supports at most {} names",
                MAX_FIELDS
            )));
        }
        Ok(fields)
    }

    pub fn ensure_port(
        &self,
        value: Option<&Value>,
        fallback: Option<u16>,
    ) -> Result<u16, ToolError> {
        let Some(value) = value else {
            return Ok(fallback.unwrap_or(MIN_PORT));
        };
        if value.is_null() {
            return Ok(fallback.unwrap_or(MIN_PORT));
        }
        let numeric = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse::<i64>().ok()))
            .ok_or_else(|| {
                ToolError::invalid_params(format!(
                    "Port must be an integer between {} and {}",
                    MIN_PORT, MAX_PORT
                ))
            })?;
        if numeric < MIN_PORT as i64 || numeric > MAX_PORT as i64 {
            return Err(ToolError::invalid_params(format!(
                "Port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }
        Ok(numeric as u16)
    }

    pub fn ensure_identifier(&self, value: &str, label: &str) -> Result<String, ToolError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        if trimmed.contains('\0') {
            return Err(ToolError::invalid_params(format!(
                "{} must not contain null bytes",
                label
            )));
        }
        Ok(trimmed.to_string())
    }
}
