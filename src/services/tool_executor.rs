use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;
use crate::utils::tool_errors::unknown_tool_error;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

/// Fields the executor consumes itself; handlers never see them.
const EXECUTOR_FIELDS: &[&str] = &["trace_id"];

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    /// Runs one tool call and wraps it as `{result, meta}`.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            return Err(unknown_tool_error(tool, &self.tool_names()));
        };
        let started = chrono::Utc::now();
        let trace_id = args
            .get("trace_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        if let Value::Object(map) = &mut args {
            for field in EXECUTOR_FIELDS {
                map.remove(*field);
            }
        }

        self.logger.debug(
            "Tool call",
            Some(&serde_json::json!({
                "tool": tool,
                "trace_id": trace_id,
                "args": redact_object(&args, 512, None),
            })),
        );
        let outcome = handler.handle(args).await;
        let duration_ms = (chrono::Utc::now() - started).num_milliseconds();
        match outcome {
            Ok(result) => {
                self.logger.info(
                    "Tool call finished",
                    Some(&serde_json::json!({
                        "tool": tool,
                        "trace_id": trace_id,
                        "duration_ms": duration_ms,
                        "error_code": result.get("error_code"),
                    })),
                );
                Ok(serde_json::json!({
                    "result": result,
                    "meta": {
                        "tool": tool,
                        "trace_id": trace_id,
                        "started_at": started.to_rfc3339(),
                        "duration_ms": duration_ms,
                    },
                }))
            }
            Err(err) => {
                let err = err.redacted();
                self.logger.warn(
                    "Tool call rejected",
                    Some(&serde_json::json!({
                        "tool": tool,
                        "trace_id": trace_id,
                        "code": err.code,
                        "error": err.message,
                    })),
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    fn executor() -> ToolExecutor {
        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("tail_log_file".to_string(), Arc::new(Echo));
        ToolExecutor::new(Logger::new("test"), handlers)
    }

    #[tokio::test]
    async fn wraps_result_and_strips_trace_id() {
        let payload = executor()
            .execute("tail_log_file", serde_json::json!({"lines": 3, "trace_id": "t-1"}))
            .await
            .expect("execute");
        assert_eq!(payload["meta"]["trace_id"], "t-1");
        assert_eq!(payload["result"]["lines"], 3);
        assert!(payload["result"].get("trace_id").is_none());
    }

    #[tokio::test]
    async fn unknown_tool_suggests_neighbours() {
        let executor = executor();
        assert!(executor.has_tool("tail_log_file"));
        assert!(!executor.has_tool("tail_log"));
        let err = executor
            .execute("tail_log", Value::Null)
            .await
            .expect_err("unknown");
        assert_eq!(err.code, "INVALID_PARAMS");
        assert!(err.hint.unwrap_or_default().contains("tail_log_file"));
    }
}
