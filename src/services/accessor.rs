use crate::constants::defaults::SNIFF_SAMPLE_BYTES;
use crate::errors::ToolError;
use crate::services::cache::{CacheService, CachedValue};
use crate::services::config::LogViewerConfig;
use crate::services::logger::Logger;
use crate::services::remote::{RemoteEntry, RemoteHost, RemoteStat};
use crate::services::security::{RemotePath, Security};
use crate::services::sniff::{self, SniffInfo};
use crate::utils::paths::join_remote;
use crate::utils::text::split_lines;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const TAIL_STEP: u64 = 64 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub path: String,
    pub size_bytes: u64,
    pub permissions: Option<String>,
    pub modified_at: Option<String>,
    #[serde(skip)]
    pub mtime: Option<u64>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub is_binary: bool,
    pub is_dir: bool,
}

impl FileMetadata {
    fn from_stat(path: &str, stat: &RemoteStat) -> Self {
        Self {
            path: path.to_string(),
            size_bytes: stat.size,
            permissions: stat.permissions.map(|mode| format!("{:03o}", mode & 0o777)),
            modified_at: stat.mtime.and_then(format_mtime),
            mtime: stat.mtime,
            mime_type: None,
            encoding: None,
            is_binary: false,
            is_dir: stat.is_dir,
        }
    }

    fn with_sniff(mut self, info: &SniffInfo) -> Self {
        self.mime_type = Some(info.mime_type.clone());
        self.encoding = Some(info.encoding.clone());
        self.is_binary = info.is_binary;
        self
    }

    pub fn name(&self) -> &str {
        crate::utils::paths::file_name(&self.path)
    }
}

fn format_mtime(secs: u64) -> Option<String> {
    chrono::DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.to_rfc3339())
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub path: String,
    pub offset: u64,
    pub length: u64,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct TailLines {
    pub lines: Vec<String>,
    /// Bytes read from the end of the file.
    pub bytes_read: u64,
    /// The backward scan stopped at its byte bound before start of file.
    pub hit_scan_limit: bool,
}

#[derive(Clone)]
pub struct RemoteFileAccessor {
    remote: Arc<dyn RemoteHost>,
    security: Security,
    cache: CacheService,
    logger: Logger,
    max_chunk: u64,
    sniff_sample: u64,
    max_scan_bytes: u64,
    command_timeout: Duration,
}

impl RemoteFileAccessor {
    pub fn new(
        logger: Logger,
        remote: Arc<dyn RemoteHost>,
        security: Security,
        cache: CacheService,
        config: &LogViewerConfig,
    ) -> Self {
        Self {
            remote,
            security,
            cache,
            logger: logger.child("accessor"),
            max_chunk: config.chunk_size.max(1),
            sniff_sample: if config.sniff_sample_bytes == 0 {
                SNIFF_SAMPLE_BYTES
            } else {
                config.sniff_sample_bytes
            },
            max_scan_bytes: config.max_search_bytes.max(1),
            command_timeout: config.command_timeout(),
        }
    }

    pub fn max_chunk(&self) -> u64 {
        self.max_chunk
    }

    pub async fn stat_raw(&self, path: &RemotePath) -> Result<RemoteStat, ToolError> {
        self.remote.stat(path.as_str()).await
    }

    /// Stat plus sniff. Directories are not sniffed.
    pub async fn stat(&self, path: &RemotePath) -> Result<FileMetadata, ToolError> {
        let stat = self.stat_raw(path).await?;
        let meta = FileMetadata::from_stat(path.as_str(), &stat);
        if stat.is_dir {
            return Ok(meta);
        }
        let info = self.sniff_with_stat(path, &stat).await;
        Ok(meta.with_sniff(&info))
    }

    /// Lazy depth-first walk below `root`. The root counts as depth 1 and
    /// subdirectories are entered only while the depth is below `max_depth`.
    pub async fn list_dir(
        &self,
        root: &RemotePath,
        allowed_root: &str,
        name_pattern: Option<glob::Pattern>,
        recursive: bool,
        max_depth: usize,
    ) -> Result<DirWalk, ToolError> {
        let stat = self.stat_raw(root).await?;
        if !stat.is_dir {
            return Err(ToolError::invalid_params(format!(
                "{} is not a directory",
                root
            )));
        }
        let entries = self.remote.list(root.as_str()).await?;
        let max_depth = if recursive { max_depth.max(1) } else { 1 };
        Ok(DirWalk {
            accessor: self.clone(),
            allowed_root: allowed_root.to_string(),
            name_pattern,
            max_depth,
            frames: vec![Frame {
                dir: root.as_str().to_string(),
                depth: 1,
                entries: entries.into(),
            }],
            total_files: 0,
            filtered_files: 0,
        })
    }

    pub async fn read_chunk(
        &self,
        path: &RemotePath,
        offset: u64,
        length: u64,
    ) -> Result<Chunk, ToolError> {
        let stat = self.stat_raw(path).await?;
        self.read_chunk_with_stat(path, &stat, offset, length).await
    }

    pub async fn read_chunk_with_stat(
        &self,
        path: &RemotePath,
        stat: &RemoteStat,
        offset: u64,
        length: u64,
    ) -> Result<Chunk, ToolError> {
        if stat.is_dir {
            return Err(ToolError::invalid_params(format!("{} is a directory", path)));
        }
        if offset >= stat.size {
            return Err(ToolError::out_of_range(format!(
                "Offset {} is beyond end of file ({} bytes)",
                offset, stat.size
            ))
            .with_details(serde_json::json!({"offset": offset, "file_size": stat.size})));
        }
        let length = length.min(self.max_chunk).min(stat.size - offset);
        let key = self.cache.build_key(&serde_json::json!({
            "op": "chunk",
            "path": path.as_str(),
            "offset": offset,
            "length": length,
        }));
        if let Some(CachedValue::Chunk(bytes)) = self.cache.get_fresh(&key, stat.mtime) {
            return Ok(Chunk {
                path: path.as_str().to_string(),
                offset,
                length: bytes.len() as u64,
                bytes,
            });
        }
        let mut data = self.remote.read_range(path.as_str(), offset, length).await?;
        data.truncate(length as usize);
        let bytes = Bytes::from(data);
        self.cache.put(
            &key,
            CachedValue::Chunk(bytes.clone()),
            bytes.len() as u64,
            stat.mtime,
        );
        Ok(Chunk {
            path: path.as_str().to_string(),
            offset,
            length: bytes.len() as u64,
            bytes,
        })
    }

    /// Reads `[offset, offset + len)` as a sequence of chunks, stopping early at end of file.
    pub async fn read_span(
        &self,
        path: &RemotePath,
        stat: &RemoteStat,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, ToolError> {
        let end = offset.saturating_add(len).min(stat.size);
        if offset >= end {
            return Ok(Bytes::new());
        }
        let step = self.optimize_chunk_size(stat.size);
        let mut out = BytesMut::with_capacity((end - offset) as usize);
        let mut cursor = offset;
        while cursor < end {
            let chunk = self
                .read_chunk_with_stat(path, stat, cursor, step.min(end - cursor))
                .await?;
            if chunk.bytes.is_empty() {
                break;
            }
            cursor += chunk.length;
            out.extend_from_slice(&chunk.bytes);
        }
        Ok(out.freeze())
    }

    pub async fn read_whole(&self, path: &RemotePath, max_size: u64) -> Result<Bytes, ToolError> {
        let stat = self.stat_raw(path).await?;
        if stat.is_dir {
            return Err(ToolError::invalid_params(format!("{} is a directory", path)));
        }
        if stat.size > max_size {
            return Err(ToolError::too_large(format!(
                "File is {} bytes, limit is {}",
                stat.size, max_size
            ))
            .with_details(serde_json::json!({"file_size": stat.size, "max_size": max_size})));
        }
        if stat.size == 0 {
            return Ok(Bytes::new());
        }
        self.read_span(path, &stat, 0, stat.size).await
    }

    /// Last `line_count` lines, read backward one chunk at a time.
    pub async fn tail(
        &self,
        path: &RemotePath,
        stat: &RemoteStat,
        line_count: usize,
        encoding: &str,
    ) -> Result<TailLines, ToolError> {
        if line_count == 0 || stat.size == 0 {
            return Ok(TailLines::default());
        }
        let step = self.max_chunk.min(TAIL_STEP);
        let mut pos = stat.size;
        let mut buf: Vec<u8> = Vec::new();
        let mut hit_scan_limit = false;
        loop {
            let start = pos.saturating_sub(step);
            let chunk = self.read_span(path, stat, start, pos - start).await?;
            let mut joined = Vec::with_capacity(chunk.len() + buf.len());
            joined.extend_from_slice(&chunk);
            joined.extend_from_slice(&buf);
            buf = joined;
            pos = start;
            if pos == 0 || count_line_breaks(&buf) >= line_count {
                break;
            }
            if stat.size - pos >= self.max_scan_bytes {
                hit_scan_limit = true;
                break;
            }
        }
        let text = sniff::decode_lossy(&buf, encoding);
        let all = split_lines(&text);
        // With pos > 0 the first segment may be a partial line.
        let complete = if pos > 0 && !all.is_empty() {
            &all[1..]
        } else {
            &all[..]
        };
        let skip = complete.len().saturating_sub(line_count);
        Ok(TailLines {
            lines: complete[skip..].iter().map(|s| s.to_string()).collect(),
            bytes_read: stat.size - pos,
            hit_scan_limit,
        })
    }

    pub async fn sniff(&self, path: &RemotePath) -> Result<SniffInfo, ToolError> {
        let stat = self.stat_raw(path).await?;
        Ok(self.sniff_with_stat(path, &stat).await)
    }

    /// Never fails: sample or MIME errors degrade to a best-effort classification.
    pub async fn sniff_with_stat(&self, path: &RemotePath, stat: &RemoteStat) -> SniffInfo {
        let key = self
            .cache
            .build_key(&serde_json::json!({"op": "sniff", "path": path.as_str()}));
        if let Some(CachedValue::Sniff(info)) = self.cache.get_fresh(&key, stat.mtime) {
            return info;
        }
        let sample = if stat.size == 0 {
            Bytes::new()
        } else {
            match self
                .read_chunk_with_stat(path, stat, 0, self.sniff_sample)
                .await
            {
                Ok(chunk) => chunk.bytes,
                Err(err) => {
                    self.logger.warn(
                        "Sniff sample read failed",
                        Some(&serde_json::json!({"path": path.as_str(), "error": err.message})),
                    );
                    Bytes::new()
                }
            }
        };
        let mime = self.detect_mime(path).await;
        let info = sniff::classify(path.as_str(), &sample, mime.as_deref());
        let size = (info.mime_type.len() + info.encoding.len() + path.as_str().len()) as u64;
        self.cache
            .put(&key, CachedValue::Sniff(info.clone()), size, stat.mtime);
        info
    }

    async fn detect_mime(&self, path: &RemotePath) -> Option<String> {
        let argv = ["file", "--mime-type", "-b", "--", path.as_str()]
            .iter()
            .map(|arg| self.security.sanitize_for_shell(arg))
            .collect::<Result<Vec<_>, _>>();
        let argv = match argv {
            Ok(argv) => argv,
            Err(err) => {
                self.logger.warn(
                    "MIME sniff skipped",
                    Some(&serde_json::json!({"path": path.as_str(), "error": err.message})),
                );
                return None;
            }
        };
        match self.remote.exec(&argv, self.command_timeout).await {
            Ok(output) if output.exit_code == 0 => {
                let mime = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if mime.is_empty() {
                    None
                } else {
                    Some(mime)
                }
            }
            Ok(output) => {
                let sniff_err = ToolError::sniff_failure(format!(
                    "file exited with {}: {}",
                    output.exit_code,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
                self.logger.warn(
                    "MIME sniff failed",
                    Some(&serde_json::json!({"path": path.as_str(), "error": sniff_err.message})),
                );
                None
            }
            Err(err) => {
                self.logger.warn(
                    "MIME sniff failed",
                    Some(&serde_json::json!({"path": path.as_str(), "error": err.message, "code": err.code})),
                );
                None
            }
        }
    }

    /// Chunk size scaled to the file, capped by the configured maximum.
    pub fn optimize_chunk_size(&self, file_size: u64) -> u64 {
        let preferred = if file_size < MIB {
            file_size.max(1)
        } else if file_size < 10 * MIB {
            MIB
        } else if file_size < 100 * MIB {
            5 * MIB
        } else {
            10 * MIB
        };
        preferred.min(self.max_chunk)
    }
}

fn count_line_breaks(buf: &[u8]) -> usize {
    let body = buf.strip_suffix(b"\n").unwrap_or(buf);
    body.iter().filter(|b| **b == b'\n').count()
}

struct Frame {
    dir: String,
    depth: usize,
    entries: VecDeque<RemoteEntry>,
}

/// Pull-based directory walk returned by [`RemoteFileAccessor::list_dir`].
pub struct DirWalk {
    accessor: RemoteFileAccessor,
    allowed_root: String,
    name_pattern: Option<glob::Pattern>,
    max_depth: usize,
    frames: Vec<Frame>,
    total_files: usize,
    filtered_files: usize,
}

impl DirWalk {
    /// Files seen so far, matching or not.
    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Files seen so far that the name pattern excluded.
    pub fn filtered_files(&self) -> usize {
        self.filtered_files
    }

    pub async fn next(&mut self) -> Option<FileMetadata> {
        loop {
            let frame = self.frames.last_mut()?;
            let Some(entry) = frame.entries.pop_front() else {
                self.frames.pop();
                continue;
            };
            let depth = frame.depth;
            let full = join_remote(&frame.dir, &entry.name);
            let child = match self
                .accessor
                .security
                .validate_path(&full, &self.allowed_root)
            {
                Ok(child) => child,
                Err(err) => {
                    self.accessor.logger.debug(
                        "Skipping entry rejected by path policy",
                        Some(&serde_json::json!({"path": full, "error": err.message})),
                    );
                    continue;
                }
            };
            if entry.stat.is_dir {
                if depth < self.max_depth {
                    match self.accessor.remote.list(child.as_str()).await {
                        Ok(entries) => self.frames.push(Frame {
                            dir: child.as_str().to_string(),
                            depth: depth + 1,
                            entries: entries.into(),
                        }),
                        Err(err) => self.accessor.logger.warn(
                            "Skipping unreadable directory",
                            Some(&serde_json::json!({"path": child.as_str(), "error": err.message})),
                        ),
                    }
                }
                continue;
            }
            self.total_files += 1;
            if let Some(pattern) = self.name_pattern.as_ref() {
                if !pattern.matches(&entry.name) {
                    self.filtered_files += 1;
                    continue;
                }
            }
            let mut meta = FileMetadata::from_stat(child.as_str(), &entry.stat);
            meta.is_binary = sniff::extension_is_binary(child.as_str());
            return Some(meta);
        }
    }
}
