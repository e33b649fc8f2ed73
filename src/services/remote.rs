use crate::errors::ToolError;
use crate::services::security::SafeToken;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStat {
    pub size: u64,
    /// Seconds since the epoch.
    pub mtime: Option<u64>,
    /// Full mode bits as reported by SFTP.
    pub permissions: Option<u32>,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub stat: RemoteStat,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// What the log engine needs from a remote host. Paths handed to these methods
/// have already been through the security guard.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    async fn stat(&self, path: &str) -> Result<RemoteStat, ToolError>;

    /// Direct children of `path`, without `.` and `..`.
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, ToolError>;

    /// Up to `len` bytes starting at `offset`; shorter only at end of file.
    async fn read_range(&self, path: &str, offset: u64, len: u64) -> Result<Vec<u8>, ToolError>;

    /// Runs a program with discrete arguments. The first token is the program.
    async fn exec(&self, argv: &[SafeToken], timeout: Duration) -> Result<ExecOutput, ToolError>;
}
