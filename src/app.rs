use crate::errors::ToolError;
use crate::managers::logs::{LogManager, LogTool, LOG_TOOLS};
use crate::mcp::catalog::tool_catalog;
use crate::services::accessor::RemoteFileAccessor;
use crate::services::cache::CacheService;
use crate::services::config::{LogViewerConfig, SshCredentials};
use crate::services::logger::Logger;
use crate::services::remote::RemoteHost;
use crate::services::security::Security;
use crate::services::ssh::SshTransport;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::validation::Validation;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: Arc<LogViewerConfig>,
    pub cache: CacheService,
    pub log_manager: Arc<LogManager>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json needs a handler.")
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    /// Reads configuration and SSH credentials from the environment.
    pub async fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("logview");
        let config = LogViewerConfig::from_env()?.normalized(&logger);
        let credentials = SshCredentials::from_env()?.ok_or_else(|| {
            ToolError::invalid_params("SSH host is not configured")
                .with_hint("Set LOGVIEW_SSH_HOST, LOGVIEW_SSH_USER and a password or private key.")
        })?;
        let transport = SshTransport::new(logger.clone(), credentials.clone(), &config);
        match transport.probe().await {
            Ok(()) => logger.info(
                "SSH connection verified",
                Some(&serde_json::json!({"address": credentials.address()})),
            ),
            Err(err) => logger.warn(
                "SSH probe failed; calls will retry the connection",
                Some(&serde_json::json!({
                    "address": credentials.address(),
                    "code": err.code,
                    "error": err.message,
                })),
            ),
        }
        Self::with_remote(logger, config, Arc::new(transport))
    }

    /// Wires every component around an already constructed remote host.
    pub fn with_remote(
        logger: Logger,
        config: LogViewerConfig,
        remote: Arc<dyn RemoteHost>,
    ) -> Result<Self, ToolError> {
        let config = Arc::new(config);
        let security = Security::new(logger.clone(), &config);
        let cache = CacheService::new(logger.clone(), config.cache_size);
        let accessor = RemoteFileAccessor::new(
            logger.clone(),
            remote,
            security.clone(),
            cache.clone(),
            &config,
        );
        let log_manager = Arc::new(LogManager::new(
            logger.clone(),
            Validation::new(),
            security,
            accessor,
            config.clone(),
        ));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for tool in LOG_TOOLS {
            handlers.insert(
                tool.to_string(),
                Arc::new(LogTool::new(log_manager.clone(), *tool)),
            );
        }
        Self::validate_tool_wiring(&handlers)?;
        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));

        logger.info(
            "Log viewer ready",
            Some(&serde_json::json!({
                "log_path": config.default_log_path,
                "chunk_size": config.chunk_size,
                "cache_size": config.cache_size,
            })),
        );
        Ok(Self {
            logger,
            config,
            cache,
            log_manager,
            tool_executor,
        })
    }
}
