use crate::errors::ToolError;
use crate::utils::suggest::suggest;

pub fn unknown_tool_error(tool: &str, known_tools: &[&str]) -> ToolError {
    let did_you_mean = suggest(tool, known_tools, 3);
    let mut hint = format!("Available tools: {}.", known_tools.join(", "));
    if !did_you_mean.is_empty() {
        hint = format!("Did you mean: {}? {}", did_you_mean.join(", "), hint);
    }
    ToolError::invalid_params(format!("Unknown tool: {}", tool))
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_tools": known_tools,
            "did_you_mean": did_you_mean,
        }))
}
