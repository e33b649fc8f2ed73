#![allow(dead_code)]

use async_trait::async_trait;
use logview::app::App;
use logview::errors::ToolError;
use logview::services::accessor::RemoteFileAccessor;
use logview::services::cache::CacheService;
use logview::services::config::LogViewerConfig;
use logview::services::logger::Logger;
use logview::services::remote::{ExecOutput, RemoteEntry, RemoteHost, RemoteStat};
use logview::services::security::{RemotePath, SafeToken, Security};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const FILE_MODE: u32 = 0o100644;
const DIR_MODE: u32 = 0o040755;

#[derive(Clone)]
struct Node {
    data: Vec<u8>,
    mtime: u64,
    mode: u32,
    is_dir: bool,
}

impl Node {
    fn stat(&self) -> RemoteStat {
        RemoteStat {
            size: self.data.len() as u64,
            mtime: Some(self.mtime),
            permissions: Some(self.mode),
            is_dir: self.is_dir,
        }
    }
}

/// In-memory stand-in for an SFTP host. Directory links let a test build a
/// cycle the way a symlink to an ancestor would.
pub struct FakeRemote {
    nodes: StdMutex<BTreeMap<String, Node>>,
    links: StdMutex<HashMap<String, String>>,
    read_failures: StdMutex<HashMap<String, ToolError>>,
    mime: StdMutex<Option<String>>,
    mime_overrides: StdMutex<HashMap<String, String>>,
    reads: AtomicUsize,
    execs: AtomicUsize,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl FakeRemote {
    pub fn new() -> Self {
        let remote = Self {
            nodes: StdMutex::new(BTreeMap::new()),
            links: StdMutex::new(HashMap::new()),
            read_failures: StdMutex::new(HashMap::new()),
            mime: StdMutex::new(Some("text/plain".to_string())),
            mime_overrides: StdMutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            execs: AtomicUsize::new(0),
        };
        remote.add_dir("/var/log");
        remote
    }

    pub fn add_dir(&self, path: &str) {
        let mut nodes = self.nodes.lock().expect("nodes");
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            nodes.entry(current.clone()).or_insert(Node {
                data: Vec::new(),
                mtime: 1_700_000_000,
                mode: DIR_MODE,
                is_dir: true,
            });
        }
    }

    pub fn add_file(&self, path: &str, data: impl AsRef<[u8]>) {
        self.add_file_at(path, data, 1_700_000_000);
    }

    pub fn add_file_at(&self, path: &str, data: impl AsRef<[u8]>, mtime: u64) {
        self.add_dir(parent_of(path));
        self.nodes.lock().expect("nodes").insert(
            path.to_string(),
            Node {
                data: data.as_ref().to_vec(),
                mtime,
                mode: FILE_MODE,
                is_dir: false,
            },
        );
    }

    /// Replaces the content and bumps the modification time.
    pub fn rewrite(&self, path: &str, data: impl AsRef<[u8]>) {
        let mut nodes = self.nodes.lock().expect("nodes");
        if let Some(node) = nodes.get_mut(path) {
            node.data = data.as_ref().to_vec();
            node.mtime += 1;
        }
    }

    /// Makes `path` a directory whose listing is that of `target`.
    pub fn link_dir(&self, path: &str, target: &str) {
        self.add_dir(path);
        self.links
            .lock()
            .expect("links")
            .insert(path.to_string(), target.to_string());
    }

    pub fn fail_reads(&self, path: &str, err: ToolError) {
        self.read_failures
            .lock()
            .expect("failures")
            .insert(path.to_string(), err);
    }

    /// `None` makes every `file` invocation fail.
    pub fn set_mime(&self, mime: Option<&str>) {
        *self.mime.lock().expect("mime") = mime.map(|m| m.to_string());
    }

    pub fn set_mime_for(&self, path: &str, mime: &str) {
        self.mime_overrides
            .lock()
            .expect("mime")
            .insert(path.to_string(), mime.to_string());
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn execs(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }

    fn resolve(&self, path: &str) -> String {
        let links = self.links.lock().expect("links");
        let mut current = path.to_string();
        for _ in 0..32 {
            let hit = links.iter().find(|(link, _)| {
                current == **link || current.starts_with(&format!("{}/", link))
            });
            match hit {
                Some((link, target)) => current = format!("{}{}", target, &current[link.len()..]),
                None => break,
            }
        }
        current
    }
}

#[async_trait]
impl RemoteHost for FakeRemote {
    async fn stat(&self, path: &str) -> Result<RemoteStat, ToolError> {
        let nodes = self.nodes.lock().expect("nodes");
        nodes
            .get(path)
            .map(Node::stat)
            .ok_or_else(|| ToolError::not_found(format!("No such file: {}", path)))
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, ToolError> {
        let dir = self.resolve(path);
        let nodes = self.nodes.lock().expect("nodes");
        match nodes.get(&dir) {
            Some(node) if node.is_dir => {}
            _ => return Err(ToolError::not_found(format!("No such directory: {}", path))),
        }
        let links = self.links.lock().expect("links");
        Ok(nodes
            .iter()
            .filter(|(key, _)| key.as_str() != dir && parent_of(key) == dir)
            .map(|(key, node)| {
                let mut stat = node.stat();
                if links.contains_key(key.as_str()) {
                    stat.is_dir = true;
                }
                RemoteEntry {
                    name: name_of(key).to_string(),
                    stat,
                }
            })
            .collect())
    }

    async fn read_range(&self, path: &str, offset: u64, len: u64) -> Result<Vec<u8>, ToolError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.read_failures.lock().expect("failures").get(path) {
            return Err(err.clone());
        }
        let nodes = self.nodes.lock().expect("nodes");
        let node = nodes
            .get(path)
            .ok_or_else(|| ToolError::not_found(format!("No such file: {}", path)))?;
        let start = (offset as usize).min(node.data.len());
        let end = start.saturating_add(len as usize).min(node.data.len());
        Ok(node.data[start..end].to_vec())
    }

    async fn exec(&self, argv: &[SafeToken], _timeout: Duration) -> Result<ExecOutput, ToolError> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        let target = argv.last().map(|t| t.raw().to_string()).unwrap_or_default();
        if let Some(mime) = self.mime_overrides.lock().expect("mime").get(&target) {
            return Ok(ExecOutput {
                exit_code: 0,
                stdout: format!("{}\n", mime).into_bytes(),
                stderr: Vec::new(),
            });
        }
        match self.mime.lock().expect("mime").clone() {
            Some(mime) => Ok(ExecOutput {
                exit_code: 0,
                stdout: format!("{}\n", mime).into_bytes(),
                stderr: Vec::new(),
            }),
            None => Err(ToolError::command_timeout("file did not finish in time")),
        }
    }
}

/// Tiny chunks so multi-line fixtures cross chunk boundaries.
pub fn small_chunk_config(chunk_size: u64) -> LogViewerConfig {
    LogViewerConfig::default().with_chunk_size(chunk_size)
}

pub fn app_with(remote: Arc<FakeRemote>, config: LogViewerConfig) -> App {
    App::with_remote(Logger::new("test"), config, remote).expect("app wiring")
}

pub fn accessor_with(remote: Arc<FakeRemote>, config: &LogViewerConfig) -> RemoteFileAccessor {
    let logger = Logger::new("test");
    let security = Security::new(logger.clone(), config);
    let cache = CacheService::new(logger.clone(), config.cache_size);
    RemoteFileAccessor::new(logger, remote, security, cache, config)
}

pub fn remote_path(config: &LogViewerConfig, raw: &str) -> RemotePath {
    Security::new(Logger::new("test"), config)
        .validate_path(raw, &config.default_log_path)
        .expect("path inside log root")
}

pub fn numbered_lines(count: usize) -> String {
    (1..=count).map(|n| format!("line-{:02}\n", n)).collect()
}
