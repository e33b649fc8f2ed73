use crate::constants::limits::{MAX_PORT, MIN_PORT};
use crate::constants::{defaults, limits, network};
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::redact::MASK;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

fn default_log_path() -> String {
    defaults::LOG_PATH.to_string()
}

fn default_denied_paths() -> Vec<String> {
    defaults::DENIED_PATHS.iter().map(|s| s.to_string()).collect()
}

fn default_max_file_size() -> u64 {
    defaults::MAX_FILE_SIZE
}

fn default_max_preview_lines() -> usize {
    defaults::MAX_PREVIEW_LINES
}

fn default_chunk_size() -> u64 {
    defaults::CHUNK_SIZE
}

fn default_cache_size() -> u64 {
    defaults::CACHE_SIZE
}

fn default_connection_timeout_secs() -> u64 {
    network::TIMEOUT_CONNECTION_SECS
}

fn default_command_timeout_secs() -> u64 {
    network::TIMEOUT_COMMAND_SECS
}

fn default_max_download_size() -> u64 {
    defaults::MAX_DOWNLOAD_SIZE
}

fn default_max_search_bytes() -> u64 {
    defaults::MAX_SEARCH_BYTES
}

fn default_max_pattern_length() -> usize {
    defaults::MAX_PATTERN_LENGTH
}

fn default_pattern_time_budget_ms() -> u64 {
    defaults::PATTERN_TIME_BUDGET_MS
}

fn default_search_time_budget_ms() -> u64 {
    defaults::SEARCH_TIME_BUDGET_MS
}

fn default_sniff_sample_bytes() -> u64 {
    defaults::SNIFF_SAMPLE_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogViewerConfig {
    #[serde(default = "default_log_path")]
    pub default_log_path: String,
    #[serde(default)]
    pub extra_allowed_roots: Vec<String>,
    #[serde(default = "default_denied_paths")]
    pub denied_paths: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_preview_lines")]
    pub max_preview_lines: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_download_size")]
    pub max_download_size: u64,
    #[serde(default = "default_max_search_bytes")]
    pub max_search_bytes: u64,
    #[serde(default = "default_max_pattern_length")]
    pub max_pattern_length: usize,
    #[serde(default = "default_pattern_time_budget_ms")]
    pub pattern_time_budget_ms: u64,
    #[serde(default = "default_search_time_budget_ms")]
    pub search_time_budget_ms: u64,
    #[serde(default = "default_sniff_sample_bytes")]
    pub sniff_sample_bytes: u64,
}

impl Default for LogViewerConfig {
    fn default() -> Self {
        Self {
            default_log_path: default_log_path(),
            extra_allowed_roots: Vec::new(),
            denied_paths: default_denied_paths(),
            max_file_size: default_max_file_size(),
            max_preview_lines: default_max_preview_lines(),
            chunk_size: default_chunk_size(),
            cache_size: default_cache_size(),
            connection_timeout_secs: default_connection_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            max_download_size: default_max_download_size(),
            max_search_bytes: default_max_search_bytes(),
            max_pattern_length: default_max_pattern_length(),
            pattern_time_budget_ms: default_pattern_time_budget_ms(),
            search_time_budget_ms: default_search_time_budget_ms(),
            sniff_sample_bytes: default_sniff_sample_bytes(),
        }
    }
}

impl LogViewerConfig {
    pub fn from_value(value: &Value) -> Result<Self, ToolError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|err| {
            ToolError::invalid_params(format!("Invalid configuration: {}", err))
        })
    }

    /// Defaults, then the JSON file named by `LOGVIEW_CONFIG`, then `LOGVIEW_*` overrides.
    pub fn from_env() -> Result<Self, ToolError> {
        let mut config = match std::env::var("LOGVIEW_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                let raw = std::fs::read_to_string(path.trim()).map_err(|err| {
                    ToolError::invalid_params(format!("LOGVIEW_CONFIG must be readable: {}", err))
                })?;
                let value: Value = serde_json::from_str(&raw).map_err(|err| {
                    ToolError::invalid_params(format!("LOGVIEW_CONFIG must be JSON: {}", err))
                })?;
                Self::from_value(&value)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(path) = env_string("LOGVIEW_DEFAULT_LOG_PATH") {
            self.default_log_path = path;
        }
        if let Some(roots) = env_string("LOGVIEW_EXTRA_ALLOWED_ROOTS") {
            self.extra_allowed_roots = roots
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        override_u64("LOGVIEW_MAX_FILE_SIZE", &mut self.max_file_size);
        override_u64("LOGVIEW_CHUNK_SIZE", &mut self.chunk_size);
        override_u64("LOGVIEW_CACHE_SIZE", &mut self.cache_size);
        override_u64("LOGVIEW_CONNECTION_TIMEOUT", &mut self.connection_timeout_secs);
        override_u64("LOGVIEW_COMMAND_TIMEOUT", &mut self.command_timeout_secs);
        override_u64("LOGVIEW_MAX_DOWNLOAD_SIZE", &mut self.max_download_size);
        override_u64("LOGVIEW_PATTERN_TIME_BUDGET_MS", &mut self.pattern_time_budget_ms);
        if let Some(lines) = env_string("LOGVIEW_MAX_PREVIEW_LINES").and_then(|v| v.parse().ok()) {
            self.max_preview_lines = lines;
        }
    }

    /// Clamps every bound into its supported range, warning about each correction.
    pub fn normalized(mut self, logger: &Logger) -> Self {
        if !self.default_log_path.starts_with('/') {
            logger.warn(
                "default_log_path is not absolute, falling back to default",
                Some(&serde_json::json!({"value": self.default_log_path, "default": defaults::LOG_PATH})),
            );
            self.default_log_path = defaults::LOG_PATH.to_string();
        }
        self.extra_allowed_roots.retain(|root| {
            let keep = root.starts_with('/');
            if !keep {
                logger.warn(
                    "Ignoring non-absolute extra_allowed_root",
                    Some(&serde_json::json!({"value": root})),
                );
            }
            keep
        });
        self.max_file_size = clamp_u64(
            logger,
            "max_file_size",
            self.max_file_size,
            1,
            defaults::MAX_FILE_SIZE_CEILING,
            defaults::MAX_FILE_SIZE,
        );
        self.max_preview_lines = clamp_u64(
            logger,
            "max_preview_lines",
            self.max_preview_lines as u64,
            1,
            defaults::MAX_PREVIEW_LINES_CEILING as u64,
            defaults::MAX_PREVIEW_LINES as u64,
        ) as usize;
        self.chunk_size = clamp_u64(
            logger,
            "chunk_size",
            self.chunk_size,
            defaults::MIN_CHUNK_SIZE,
            defaults::MAX_CHUNK_SIZE,
            defaults::CHUNK_SIZE,
        );
        self.connection_timeout_secs = clamp_u64(
            logger,
            "connection_timeout_secs",
            self.connection_timeout_secs,
            1,
            network::MAX_CONNECTION_TIMEOUT_SECS,
            network::TIMEOUT_CONNECTION_SECS,
        );
        self.command_timeout_secs = clamp_u64(
            logger,
            "command_timeout_secs",
            self.command_timeout_secs,
            1,
            network::MAX_COMMAND_TIMEOUT_SECS,
            network::TIMEOUT_COMMAND_SECS,
        );
        self.max_download_size = clamp_u64(
            logger,
            "max_download_size",
            self.max_download_size,
            1,
            defaults::MAX_DOWNLOAD_SIZE_CEILING,
            defaults::MAX_DOWNLOAD_SIZE,
        );
        if self.max_pattern_length == 0 {
            self.max_pattern_length = defaults::MAX_PATTERN_LENGTH;
        }
        if self.sniff_sample_bytes == 0 {
            self.sniff_sample_bytes = defaults::SNIFF_SAMPLE_BYTES;
        }
        self
    }

    /// Overrides the max chunk size without clamping; used to exercise chunk
    /// boundaries with tiny files.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn pattern_time_budget(&self) -> Duration {
        Duration::from_millis(self.pattern_time_budget_ms)
    }

    pub fn search_time_budget(&self) -> Duration {
        Duration::from_millis(self.search_time_budget_ms)
    }

    pub fn max_list_depth(&self) -> usize {
        limits::MAX_LIST_DEPTH
    }
}

/// Connection settings for the SSH transport, read from `LOGVIEW_SSH_*`.
#[derive(Clone, Serialize, Deserialize)]
pub struct SshCredentials {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    network::SSH_DEFAULT_PORT
}

impl std::fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| MASK))
            .field("private_key", &self.private_key.as_ref().map(|_| MASK))
            .finish()
    }
}

impl SshCredentials {
    /// `None` when no host is configured at all.
    pub fn from_env() -> Result<Option<Self>, ToolError> {
        let Some(host) = env_string("LOGVIEW_SSH_HOST") else {
            return Ok(None);
        };
        let validation = Validation::new();
        let port = validation.ensure_port(
            env_string("LOGVIEW_SSH_PORT").map(Value::String).as_ref(),
            Some(network::SSH_DEFAULT_PORT),
        )?;
        let private_key = match env_string("LOGVIEW_SSH_PRIVATE_KEY_PATH") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|err| {
                ToolError::invalid_params(format!(
                    "LOGVIEW_SSH_PRIVATE_KEY_PATH must be readable: {}",
                    err
                ))
            })?),
            None => env_string("LOGVIEW_SSH_PRIVATE_KEY"),
        };
        let creds = Self {
            host,
            port,
            username: env_string("LOGVIEW_SSH_USER").unwrap_or_default(),
            password: env_string("LOGVIEW_SSH_PASSWORD"),
            private_key,
            passphrase: env_string("LOGVIEW_SSH_PASSPHRASE"),
        };
        creds.validate()?;
        Ok(Some(creds))
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        if self.host.trim().is_empty() {
            return Err(ToolError::invalid_params("SSH host must be set"));
        }
        if self.username.trim().is_empty() {
            return Err(ToolError::invalid_params("SSH username must be set")
                .with_hint("Set LOGVIEW_SSH_USER."));
        }
        if self.port < MIN_PORT {
            return Err(ToolError::invalid_params(format!(
                "Port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }
        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        let has_key = self.private_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if !has_password && !has_key {
            return Err(ToolError::invalid_params(
                "SSH credentials need a password or a private key",
            )
            .with_hint("Set LOGVIEW_SSH_PASSWORD or LOGVIEW_SSH_PRIVATE_KEY_PATH."));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn override_u64(name: &str, target: &mut u64) {
    if let Some(value) = env_string(name).and_then(|v| v.parse::<u64>().ok()) {
        *target = value;
    }
}

fn clamp_u64(logger: &Logger, field: &str, value: u64, min: u64, max: u64, fallback: u64) -> u64 {
    if value < min {
        logger.warn(
            &format!("{} must be at least {}, using default", field, min),
            Some(&serde_json::json!({"value": value, "default": fallback})),
        );
        return fallback;
    }
    if value > max {
        logger.warn(
            &format!("{} exceeds limit, using maximum", field),
            Some(&serde_json::json!({"value": value, "max": max})),
        );
        return max;
    }
    value
}
