use crate::constants::defaults::{MAX_FILE_SIZE_CEILING, MAX_PREVIEW_LINES_CEILING};
use crate::constants::limits::{
    DEFAULT_MAX_MATCHES, DEFAULT_MAX_MESSAGES, DEFAULT_MESSAGE_LENGTH, DEFAULT_TAIL_LINES,
    LOG_SUBSTRING_LENGTH, MAX_CONTEXT_LINES, MAX_LINE_BYTES, MAX_LIST_ENTRIES, MAX_MATCHES,
    MAX_MESSAGES, MAX_MESSAGE_LENGTH, MAX_QUICK_MATCHES, MAX_TAIL_LINES,
};
use crate::errors::ToolError;
use crate::parsers::binary::{self, decode_hex_pattern, message_at, HexMessage, HexScanner};
use crate::parsers::{LogParser, ParseResult, ParsedLine};
use crate::services::accessor::RemoteFileAccessor;
use crate::services::config::LogViewerConfig;
use crate::services::logger::Logger;
use crate::services::remote::RemoteStat;
use crate::services::security::{CompiledPattern, RemotePath, Security};
use crate::services::sniff::{decode_lossy, SniffInfo};
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::paths::join_remote;
use crate::utils::text::{human_readable_size, split_lines, truncate_utf8_prefix, utf8_suffix};
use crate::utils::tool_errors::unknown_tool_error;
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

pub const LOG_TOOLS: &[&str] = &[
    "list_log_files",
    "read_log_file",
    "read_log_chunk",
    "search_log_file",
    "tail_log_file",
    "extract_binary_message",
    "download_file",
];

/// Fields returned with whatever the binary parser is asked for by default.
const DEFAULT_BINARY_FIELDS: &[&str] = &["format", "size", "header"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct OpStatus {
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl OpStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub log_path: Option<String>,
    pub file_pattern: Option<String>,
    pub recursive: bool,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ReadParams {
    pub file_path: String,
    pub max_file_size: Option<u64>,
    pub max_preview_lines: Option<usize>,
    pub search_pattern: Option<String>,
    pub parser: Option<LogParser>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkParams {
    pub file_path: String,
    pub offset: u64,
    pub length: Option<u64>,
    pub parser: Option<LogParser>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub file_path: String,
    pub pattern: String,
    pub context_lines: usize,
    pub max_matches: Option<usize>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TailParams {
    pub file_path: String,
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractParams {
    pub file_path: String,
    pub hex_pattern: String,
    pub max_messages: Option<usize>,
    pub message_length: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadParams {
    pub file_path: String,
    pub max_download_size: Option<u64>,
}

fn optional_usize(
    validation: &Validation,
    args: &Value,
    key: &str,
) -> Result<Option<usize>, ToolError> {
    Ok(validation
        .ensure_optional_u64(args.get(key), key)?
        .map(|v| v.min(usize::MAX as u64) as usize))
}

fn optional_parser(validation: &Validation, args: &Value) -> Result<Option<LogParser>, ToolError> {
    validation
        .ensure_optional_string(args.get("parser"), "parser", true)?
        .map(|raw| raw.parse::<LogParser>())
        .transpose()
}

fn required_path(validation: &Validation, args: &Value) -> Result<String, ToolError> {
    let value = args
        .get("file_path")
        .ok_or_else(|| ToolError::invalid_params("file_path is required"))?;
    validation.ensure_string(value, "file_path", true)
}

impl ListParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            log_path: validation.ensure_optional_string(args.get("log_path"), "log_path", true)?,
            file_pattern: validation.ensure_optional_string(
                args.get("file_pattern"),
                "file_pattern",
                true,
            )?,
            recursive: validation
                .ensure_optional_bool(args.get("recursive"), "recursive")?
                .unwrap_or(false),
            max_depth: optional_usize(validation, args, "max_depth")?,
        })
    }
}

impl ReadParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            file_path: required_path(validation, args)?,
            max_file_size: validation.ensure_optional_u64(args.get("max_file_size"), "max_file_size")?,
            max_preview_lines: optional_usize(validation, args, "max_preview_lines")?,
            search_pattern: validation.ensure_optional_string(
                args.get("search_pattern"),
                "search_pattern",
                false,
            )?,
            parser: optional_parser(validation, args)?,
            fields: validation.ensure_field_list(args.get("fields"))?,
        })
    }
}

impl ChunkParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            file_path: required_path(validation, args)?,
            offset: validation
                .ensure_optional_u64(args.get("offset"), "offset")?
                .unwrap_or(0),
            length: validation.ensure_optional_u64(args.get("length"), "length")?,
            parser: optional_parser(validation, args)?,
            fields: validation.ensure_field_list(args.get("fields"))?,
        })
    }
}

impl SearchParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        let pattern = args
            .get("pattern")
            .ok_or_else(|| ToolError::invalid_params("pattern is required"))?;
        Ok(Self {
            file_path: required_path(validation, args)?,
            pattern: validation.ensure_string(pattern, "pattern", false)?,
            context_lines: optional_usize(validation, args, "context_lines")?.unwrap_or(0),
            max_matches: optional_usize(validation, args, "max_matches")?,
            case_insensitive: validation
                .ensure_optional_bool(args.get("case_insensitive"), "case_insensitive")?
                .unwrap_or(false),
        })
    }
}

impl TailParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            file_path: required_path(validation, args)?,
            lines: optional_usize(validation, args, "lines")?,
        })
    }
}

impl ExtractParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        let hex_pattern = args
            .get("hex_pattern")
            .ok_or_else(|| ToolError::invalid_params("hex_pattern is required"))?;
        Ok(Self {
            file_path: required_path(validation, args)?,
            hex_pattern: validation.ensure_string(hex_pattern, "hex_pattern", true)?,
            max_messages: optional_usize(validation, args, "max_messages")?,
            message_length: optional_usize(validation, args, "message_length")?,
        })
    }
}

impl DownloadParams {
    pub fn from_args(validation: &Validation, args: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            file_path: required_path(validation, args)?,
            max_download_size: validation
                .ensure_optional_u64(args.get("max_download_size"), "max_download_size")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListedFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub human_size: String,
    pub modified_time: Option<String>,
    pub permissions: Option<String>,
    pub is_binary: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListResult {
    pub log_path: String,
    pub file_list: Vec<ListedFile>,
    pub total_files: usize,
    pub total_size: u64,
    pub filtered_files: usize,
    pub is_truncated: bool,
    pub execution_time_ms: u64,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineMatch {
    pub line_number: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadResult {
    pub file_path: String,
    pub content: String,
    pub preview: String,
    pub matches: Vec<LineMatch>,
    pub total_lines: usize,
    pub is_truncated: bool,
    pub too_large: bool,
    pub encoding: Option<String>,
    pub is_binary: bool,
    pub mime_type: Option<String>,
    pub file_size: u64,
    pub parser: Option<LogParser>,
    pub records: Vec<ParsedLine>,
    pub parse_errors: usize,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Text,
    Hex,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkResult {
    pub file_path: String,
    pub offset: u64,
    pub length: u64,
    pub file_size: u64,
    pub content: String,
    pub content_encoding: ContentEncoding,
    pub encoding: Option<String>,
    pub is_binary: bool,
    pub mime_type: Option<String>,
    pub has_more: bool,
    pub next_offset: Option<u64>,
    pub parser: Option<LogParser>,
    pub records: Vec<ParsedLine>,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub line_number: usize,
    pub line: String,
    pub matched_text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    pub file_path: String,
    pub pattern: String,
    pub matches: Vec<SearchMatch>,
    pub match_count: usize,
    pub lines_scanned: usize,
    pub bytes_scanned: u64,
    pub is_truncated: bool,
    pub encoding: Option<String>,
    pub is_binary: bool,
    pub mime_type: Option<String>,
    pub file_size: u64,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TailResult {
    pub file_path: String,
    pub lines: Vec<String>,
    pub line_count: usize,
    pub is_truncated: bool,
    pub encoding: Option<String>,
    pub is_binary: bool,
    pub mime_type: Option<String>,
    pub file_size: u64,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractResult {
    pub file_path: String,
    pub hex_pattern: String,
    pub messages: Vec<HexMessage>,
    pub message_count: usize,
    pub format: Option<String>,
    pub file_size: u64,
    pub bytes_scanned: u64,
    pub is_truncated: bool,
    #[serde(flatten)]
    pub status: OpStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadResult {
    pub success: bool,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_content_base64: Option<String>,
    pub mime_type: Option<String>,
    pub too_large: bool,
    #[serde(flatten)]
    pub status: OpStatus,
}

enum Flow {
    Continue,
    Stop,
}

struct LineScan<'p> {
    pattern: &'p CompiledPattern,
    context_lines: usize,
    max_matches: usize,
    before: VecDeque<String>,
    awaiting_context: Vec<usize>,
    line_number: usize,
    capped: bool,
    /// Preview of the line being scanned; it joins `before` once the next line starts.
    current: Option<String>,
    current_matched: bool,
    /// Trailing bytes of a line whose newline has not been read yet.
    open_tail: Option<String>,
}

impl<'p> LineScan<'p> {
    fn new(pattern: &'p CompiledPattern, context_lines: usize, max_matches: usize) -> Self {
        Self {
            pattern,
            context_lines,
            max_matches,
            before: VecDeque::with_capacity(context_lines + 1),
            awaiting_context: Vec::new(),
            line_number: 0,
            capped: false,
            current: None,
            current_matched: false,
            open_tail: None,
        }
    }

    /// Feeds one piece of text. `ends_open` marks a piece cut before its
    /// newline; the next piece is then scanned as the rest of the same line,
    /// joined to the cut piece's last `MAX_LINE_BYTES` bytes.
    fn feed(
        &mut self,
        raw: &str,
        ends_open: bool,
        result: &mut SearchResult,
    ) -> Result<Flow, ToolError> {
        match self.open_tail.take() {
            Some(tail) => {
                let joined = format!("{}{}", tail, raw);
                if ends_open {
                    self.open_tail = Some(utf8_suffix(&joined, MAX_LINE_BYTES).to_string());
                }
                self.continue_line(raw, &joined, result)
            }
            None => {
                if ends_open {
                    self.open_tail = Some(utf8_suffix(raw, MAX_LINE_BYTES).to_string());
                }
                self.start_line(raw, result)
            }
        }
    }

    /// Once the cap is reached only trailing context is collected; the first
    /// line after that marks the result truncated and ends the scan.
    fn start_line(&mut self, raw: &str, result: &mut SearchResult) -> Result<Flow, ToolError> {
        if self.capped && self.awaiting_context.is_empty() {
            result.is_truncated = true;
            return Ok(Flow::Stop);
        }
        let wanted = self.context_lines;
        if let Some(previous) = self.current.take() {
            if wanted > 0 {
                self.before.push_back(previous);
                if self.before.len() > wanted {
                    self.before.pop_front();
                }
            }
        }
        self.line_number += 1;
        result.lines_scanned += 1;
        let line = truncate_utf8_prefix(raw, MAX_LINE_BYTES);

        for idx in &self.awaiting_context {
            result.matches[*idx].context_after.push(line.clone());
        }
        let matches = &result.matches;
        self.awaiting_context
            .retain(|idx| matches[*idx].context_after.len() < wanted);

        self.current_matched = false;
        if !self.capped {
            self.try_match(raw, &line, result)?;
        }
        self.current = Some(line);
        Ok(Flow::Continue)
    }

    fn continue_line(
        &mut self,
        raw: &str,
        joined: &str,
        result: &mut SearchResult,
    ) -> Result<Flow, ToolError> {
        let mut line = self.current.take().unwrap_or_default();
        if line.len() < MAX_LINE_BYTES {
            line.push_str(&truncate_utf8_prefix(raw, MAX_LINE_BYTES - line.len()));
        }
        if self.current_matched {
            if let Some(last) = result.matches.last_mut() {
                if last.line_number == self.line_number {
                    last.line = line.clone();
                }
            }
        } else if !self.capped {
            self.try_match(joined, &line, result)?;
        }
        self.current = Some(line);
        Ok(Flow::Continue)
    }

    fn try_match(
        &mut self,
        haystack: &str,
        line: &str,
        result: &mut SearchResult,
    ) -> Result<(), ToolError> {
        let found = match self.pattern.find(haystack)? {
            Some(found) => found,
            None => return Ok(()),
        };
        result.matches.push(SearchMatch {
            line_number: self.line_number,
            line: line.to_string(),
            matched_text: truncate_utf8_prefix(found.as_str(), MAX_LINE_BYTES),
            context_before: self.before.iter().cloned().collect(),
            context_after: Vec::new(),
        });
        result.match_count = result.matches.len();
        self.current_matched = true;
        if self.context_lines > 0 {
            self.awaiting_context.push(result.matches.len() - 1);
        }
        if result.matches.len() >= self.max_matches {
            self.capped = true;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct LogManager {
    logger: Logger,
    validation: Validation,
    security: Security,
    accessor: RemoteFileAccessor,
    config: Arc<LogViewerConfig>,
}

impl LogManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        security: Security,
        accessor: RemoteFileAccessor,
        config: Arc<LogViewerConfig>,
    ) -> Self {
        Self {
            logger: logger.child("logs"),
            validation,
            security,
            accessor,
            config,
        }
    }

    pub fn config(&self) -> &LogViewerConfig {
        &self.config
    }

    /// Parses the raw arguments for `tool` and serializes the typed result.
    pub async fn handle_tool(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let v = &self.validation;
        match tool {
            "list_log_files" => to_value(self.list_log_files(ListParams::from_args(v, &args)?).await?),
            "read_log_file" => to_value(self.read_log_file(ReadParams::from_args(v, &args)?).await?),
            "read_log_chunk" => {
                to_value(self.read_log_chunk(ChunkParams::from_args(v, &args)?).await?)
            }
            "search_log_file" => {
                to_value(self.search_log_file(SearchParams::from_args(v, &args)?).await?)
            }
            "tail_log_file" => to_value(self.tail_log_file(TailParams::from_args(v, &args)?).await?),
            "extract_binary_message" => to_value(
                self.extract_binary_message(ExtractParams::from_args(v, &args)?)
                    .await?,
            ),
            "download_file" => {
                to_value(self.download_file(DownloadParams::from_args(v, &args)?).await?)
            }
            other => Err(unknown_tool_error(other, LOG_TOOLS)),
        }
    }

    pub async fn list_log_files(&self, params: ListParams) -> Result<ListResult, ToolError> {
        let raw_root = params
            .log_path
            .clone()
            .unwrap_or_else(|| self.config.default_log_path.clone());
        let root = self.resolve_path(&raw_root)?;
        let pattern_src = params.file_pattern.as_deref().unwrap_or("*");
        let pattern = glob::Pattern::new(pattern_src).map_err(|err| {
            ToolError::invalid_params(format!("file_pattern is not a valid glob: {}", err))
        })?;
        let max_depth = params
            .max_depth
            .unwrap_or(1)
            .clamp(1, self.config.max_list_depth());

        let mut result = ListResult {
            log_path: root.to_string(),
            ..ListResult::default()
        };
        let started = Instant::now();
        let outcome = self
            .list_into(&root, pattern, params.recursive, max_depth, &mut result)
            .await;
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        self.settle("list_log_files", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn list_into(
        &self,
        root: &RemotePath,
        pattern: glob::Pattern,
        recursive: bool,
        max_depth: usize,
        result: &mut ListResult,
    ) -> Result<(), ToolError> {
        let mut walk = self
            .accessor
            .list_dir(root, &self.config.default_log_path, Some(pattern), recursive, max_depth)
            .await?;
        while let Some(meta) = walk.next().await {
            if result.file_list.len() >= MAX_LIST_ENTRIES {
                result.is_truncated = true;
                break;
            }
            result.total_size += meta.size_bytes;
            result.file_list.push(ListedFile {
                name: meta.name().to_string(),
                path: meta.path.clone(),
                size: meta.size_bytes,
                human_size: human_readable_size(meta.size_bytes),
                modified_time: meta.modified_at.clone(),
                permissions: meta.permissions.clone(),
                is_binary: meta.is_binary,
            });
        }
        result.total_files = walk.total_files();
        result.filtered_files = walk.filtered_files();
        result
            .file_list
            .sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        self.logger.debug(
            "Listed directory",
            Some(&serde_json::json!({
                "path": root.as_str(),
                "files": result.file_list.len(),
                "total_files": result.total_files,
            })),
        );
        Ok(())
    }

    pub async fn read_log_file(&self, params: ReadParams) -> Result<ReadResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let pattern = params
            .search_pattern
            .as_deref()
            .map(|src| self.security.validate_pattern(src, false))
            .transpose()?;
        let mut result = ReadResult {
            file_path: path.to_string(),
            ..ReadResult::default()
        };
        let outcome = self
            .read_into(&path, &params, pattern.as_ref(), &mut result)
            .await;
        self.settle("read_log_file", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn read_into(
        &self,
        path: &RemotePath,
        params: &ReadParams,
        pattern: Option<&CompiledPattern>,
        result: &mut ReadResult,
    ) -> Result<(), ToolError> {
        let (stat, info) = self.inspect(path).await?;
        result.file_size = stat.size;
        apply_sniff(&info, &mut result.encoding, &mut result.mime_type, &mut result.is_binary);
        if info.is_binary && params.parser != Some(LogParser::Binary) {
            return Ok(());
        }

        let max_size = params
            .max_file_size
            .unwrap_or(self.config.max_file_size)
            .clamp(1, MAX_FILE_SIZE_CEILING);
        let max_preview = params
            .max_preview_lines
            .unwrap_or(self.config.max_preview_lines)
            .clamp(1, MAX_PREVIEW_LINES_CEILING);
        if stat.size > max_size {
            result.too_large = true;
            result.is_truncated = true;
            self.logger.info(
                "File exceeds read limit; returning prefix",
                Some(&serde_json::json!({
                    "path": path.as_str(),
                    "size": stat.size,
                    "limit": max_size,
                })),
            );
        }
        let bytes = self.accessor.read_span(path, &stat, 0, max_size).await?;

        let parser = self.select_parser(params.parser, &params.fields, &info, &bytes);
        result.parser = parser;
        if let Some(parser) = parser {
            let (records, errors) = run_parser(parser, &bytes, &info.encoding, &params.fields);
            result.records = records;
            result.parse_errors = errors;
        }
        if info.is_binary {
            return Ok(());
        }

        let text = decode_lossy(&bytes, &info.encoding);
        let lines = split_lines(&text);
        result.total_lines = lines.len();
        result.preview = lines
            .iter()
            .take(max_preview)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if let Some(pattern) = pattern {
            for (idx, line) in lines.iter().enumerate() {
                if result.matches.len() >= MAX_QUICK_MATCHES {
                    break;
                }
                if pattern.is_match(line)? {
                    result.matches.push(LineMatch {
                        line_number: idx + 1,
                        content: truncate_utf8_prefix(line, MAX_LINE_BYTES),
                    });
                }
            }
        }
        result.content = text;
        Ok(())
    }

    pub async fn read_log_chunk(&self, params: ChunkParams) -> Result<ChunkResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let mut result = ChunkResult {
            file_path: path.to_string(),
            offset: params.offset,
            ..ChunkResult::default()
        };
        let outcome = self.chunk_into(&path, &params, &mut result).await;
        self.settle("read_log_chunk", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn chunk_into(
        &self,
        path: &RemotePath,
        params: &ChunkParams,
        result: &mut ChunkResult,
    ) -> Result<(), ToolError> {
        let (stat, info) = self.inspect(path).await?;
        result.file_size = stat.size;
        apply_sniff(&info, &mut result.encoding, &mut result.mime_type, &mut result.is_binary);

        let length = params.length.unwrap_or_else(|| self.accessor.max_chunk());
        let chunk = self
            .accessor
            .read_chunk_with_stat(path, &stat, params.offset, length)
            .await?;
        result.length = chunk.length;
        let end = chunk.offset + chunk.length;
        result.has_more = end < stat.size;
        result.next_offset = result.has_more.then_some(end);

        if info.is_binary {
            result.content_encoding = ContentEncoding::Hex;
            result.content = hex::encode(&chunk.bytes);
        } else {
            result.content_encoding = ContentEncoding::Text;
            result.content = decode_lossy(&chunk.bytes, &info.encoding);
        }

        let parser = self.select_parser(params.parser, &params.fields, &info, &chunk.bytes);
        result.parser = parser;
        if let Some(parser) = parser {
            result.records = run_parser(parser, &chunk.bytes, &info.encoding, &params.fields).0;
        }
        Ok(())
    }

    pub async fn search_log_file(&self, params: SearchParams) -> Result<SearchResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let pattern = self
            .security
            .validate_pattern(&params.pattern, params.case_insensitive)?;
        let mut result = SearchResult {
            file_path: path.to_string(),
            pattern: params.pattern.clone(),
            ..SearchResult::default()
        };
        let outcome = self.search_into(&path, &pattern, &params, &mut result).await;
        self.settle("search_log_file", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn search_into(
        &self,
        path: &RemotePath,
        pattern: &CompiledPattern,
        params: &SearchParams,
        result: &mut SearchResult,
    ) -> Result<(), ToolError> {
        let (stat, info) = self.inspect(path).await?;
        result.file_size = stat.size;
        apply_sniff(&info, &mut result.encoding, &mut result.mime_type, &mut result.is_binary);
        if info.is_binary {
            return Ok(());
        }

        let max_matches = params
            .max_matches
            .unwrap_or(DEFAULT_MAX_MATCHES)
            .clamp(1, MAX_MATCHES);
        let context_lines = params.context_lines.min(MAX_CONTEXT_LINES);
        let mut scan = LineScan::new(pattern, context_lines, max_matches);

        let scan_limit = stat.size.min(self.config.max_search_bytes);
        let step = self.accessor.optimize_chunk_size(stat.size);
        let flush_at = self.accessor.max_chunk().saturating_mul(4) as usize;
        // UTF-16 text has no standalone newline byte, so it is decoded in one piece.
        let split_on_newline = info.encoding != "utf-16";
        let budget = self.config.search_time_budget();
        let started = Instant::now();
        let mut offset = 0u64;
        let mut carry: Vec<u8> = Vec::new();

        'scan: while offset < scan_limit {
            let chunk = self
                .accessor
                .read_chunk_with_stat(path, &stat, offset, step.min(scan_limit - offset))
                .await?;
            if chunk.bytes.is_empty() {
                break;
            }
            offset += chunk.length;
            result.bytes_scanned = offset;
            carry.extend_from_slice(&chunk.bytes);

            let at_end = offset >= scan_limit;
            let forced = !at_end && carry.len() >= flush_at;
            let complete = if at_end || forced {
                carry.len()
            } else if !split_on_newline {
                continue;
            } else {
                match carry.iter().rposition(|b| *b == b'\n') {
                    Some(idx) => idx + 1,
                    None => continue,
                }
            };
            let segment: Vec<u8> = carry.drain(..complete).collect();
            let cut_mid_line = forced && split_on_newline && segment.last() != Some(&b'\n');
            let text = decode_lossy(&segment, &info.encoding);
            let lines = split_lines(&text);
            let last = lines.len().saturating_sub(1);
            for (idx, line) in lines.into_iter().enumerate() {
                if let Flow::Stop = scan.feed(line, cut_mid_line && idx == last, result)? {
                    break 'scan;
                }
            }

            if !at_end && started.elapsed() >= budget {
                result.is_truncated = true;
                return Err(ToolError::pattern_timeout(format!(
                    "Search stopped after {} ms with {} of {} bytes scanned",
                    budget.as_millis(),
                    offset,
                    stat.size
                ))
                .with_hint("Narrow the pattern or raise search_time_budget_ms."));
            }
        }

        if stat.size > scan_limit {
            result.is_truncated = true;
        }
        self.logger.debug(
            "Search finished",
            Some(&serde_json::json!({
                "path": path.as_str(),
                "pattern": truncate_utf8_prefix(pattern.as_str(), LOG_SUBSTRING_LENGTH),
                "matches": result.match_count,
                "lines": result.lines_scanned,
            })),
        );
        Ok(())
    }

    pub async fn tail_log_file(&self, params: TailParams) -> Result<TailResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let mut result = TailResult {
            file_path: path.to_string(),
            ..TailResult::default()
        };
        let outcome = self.tail_into(&path, &params, &mut result).await;
        self.settle("tail_log_file", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn tail_into(
        &self,
        path: &RemotePath,
        params: &TailParams,
        result: &mut TailResult,
    ) -> Result<(), ToolError> {
        let (stat, info) = self.inspect(path).await?;
        result.file_size = stat.size;
        apply_sniff(&info, &mut result.encoding, &mut result.mime_type, &mut result.is_binary);
        if info.is_binary {
            return Ok(());
        }
        let wanted = params
            .lines
            .unwrap_or(DEFAULT_TAIL_LINES)
            .clamp(1, MAX_TAIL_LINES);
        let tail = self
            .accessor
            .tail(path, &stat, wanted, &info.encoding)
            .await?;
        result.line_count = tail.lines.len();
        result.is_truncated = tail.hit_scan_limit;
        result.lines = tail.lines;
        Ok(())
    }

    pub async fn extract_binary_message(
        &self,
        params: ExtractParams,
    ) -> Result<ExtractResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let needle = decode_hex_pattern(&params.hex_pattern)?;
        let scanner = HexScanner::new(&needle)?;
        let mut result = ExtractResult {
            file_path: path.to_string(),
            hex_pattern: hex::encode_upper(&needle),
            ..ExtractResult::default()
        };
        let outcome = self.extract_into(&path, &scanner, &params, &mut result).await;
        self.settle("extract_binary_message", &mut result.status, outcome)?;
        Ok(result)
    }

    /// Streams the file through a window that keeps enough trailing bytes for
    /// a match, or a message, that straddles two chunks.
    async fn extract_into(
        &self,
        path: &RemotePath,
        scanner: &HexScanner,
        params: &ExtractParams,
        result: &mut ExtractResult,
    ) -> Result<(), ToolError> {
        let stat = self.stat_file(path).await?;
        result.file_size = stat.size;
        if stat.size == 0 {
            result.format = Some(binary::detect_format(&[]).to_string());
            return Ok(());
        }

        let max_messages = params
            .max_messages
            .unwrap_or(DEFAULT_MAX_MESSAGES)
            .clamp(1, MAX_MESSAGES);
        let needle_len = scanner.needle_len();
        let length = params
            .message_length
            .unwrap_or(DEFAULT_MESSAGE_LENGTH)
            .clamp(needle_len, MAX_MESSAGE_LENGTH.max(needle_len));

        let scan_limit = stat.size.min(self.config.max_search_bytes);
        let step = self.accessor.optimize_chunk_size(stat.size);
        let mut window: Vec<u8> = Vec::new();
        let mut window_base = 0u64;
        let mut resume_at = 0u64;
        let mut offset = 0u64;

        'scan: while offset < scan_limit {
            let chunk = self
                .accessor
                .read_chunk_with_stat(path, &stat, offset, step.min(scan_limit - offset))
                .await?;
            if chunk.bytes.is_empty() {
                break;
            }
            if offset == 0 {
                result.format = Some(binary::detect_format(&chunk.bytes).to_string());
            }
            offset += chunk.length;
            result.bytes_scanned = offset;
            window.extend_from_slice(&chunk.bytes);
            let at_end = offset >= scan_limit;

            let from = (resume_at - window_base) as usize;
            let found: Vec<usize> = scanner.positions(&window, from).collect();
            let mut waiting = false;
            for start in found {
                if result.messages.len() >= max_messages {
                    result.is_truncated = true;
                    break 'scan;
                }
                if start + length > window.len() && !at_end {
                    resume_at = window_base + start as u64;
                    waiting = true;
                    break;
                }
                result.messages.push(message_at(&window, start, window_base, length));
                result.message_count = result.messages.len();
                resume_at = window_base + (start + needle_len) as u64;
            }
            if !waiting {
                let tail_start = window_base + window.len().saturating_sub(needle_len - 1) as u64;
                resume_at = resume_at.max(tail_start);
            }
            let drop = ((resume_at - window_base) as usize).min(window.len());
            window.drain(..drop);
            window_base += drop as u64;
        }

        if stat.size > scan_limit {
            result.is_truncated = true;
        }
        Ok(())
    }

    pub async fn download_file(&self, params: DownloadParams) -> Result<DownloadResult, ToolError> {
        let path = self.resolve_path(&params.file_path)?;
        let mut result = DownloadResult {
            file_path: path.to_string(),
            file_name: path.file_name().to_string(),
            ..DownloadResult::default()
        };
        let outcome = self.download_into(&path, &params, &mut result).await;
        self.settle("download_file", &mut result.status, outcome)?;
        Ok(result)
    }

    async fn download_into(
        &self,
        path: &RemotePath,
        params: &DownloadParams,
        result: &mut DownloadResult,
    ) -> Result<(), ToolError> {
        let (stat, info) = self.inspect(path).await?;
        result.file_size = stat.size;
        result.mime_type = Some(info.mime_type.clone());
        let limit = params
            .max_download_size
            .map(|requested| requested.min(self.config.max_download_size))
            .unwrap_or(self.config.max_download_size);
        if stat.size > limit {
            result.too_large = true;
            return Ok(());
        }
        let bytes = self.accessor.read_whole(path, limit).await?;
        result.file_content_base64 = Some(base64::engine::general_purpose::STANDARD.encode(&bytes));
        result.success = true;
        self.logger.info(
            "Prepared download",
            Some(&serde_json::json!({"path": path.as_str(), "bytes": bytes.len()})),
        );
        Ok(())
    }

    /// Relative paths resolve against the default log directory.
    fn resolve_path(&self, raw: &str) -> Result<RemotePath, ToolError> {
        let root = &self.config.default_log_path;
        let trimmed = raw.trim();
        let candidate = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            join_remote(root, trimmed)
        };
        self.security
            .validate_path(&candidate, root)
            .map_err(|err| err.redacted())
    }

    async fn stat_file(&self, path: &RemotePath) -> Result<RemoteStat, ToolError> {
        let stat = self.accessor.stat_raw(path).await?;
        if stat.is_dir {
            return Err(ToolError::invalid_params(format!("{} is a directory", path)));
        }
        Ok(stat)
    }

    async fn inspect(&self, path: &RemotePath) -> Result<(RemoteStat, SniffInfo), ToolError> {
        let stat = self.stat_file(path).await?;
        let info = self.accessor.sniff_with_stat(path, &stat).await;
        Ok((stat, info))
    }

    fn select_parser(
        &self,
        requested: Option<LogParser>,
        fields: &[String],
        info: &SniffInfo,
        bytes: &[u8],
    ) -> Option<LogParser> {
        match requested {
            Some(parser) => Some(parser),
            None if !fields.is_empty() => Some(LogParser::classify(info, bytes)),
            None => None,
        }
    }

    /// Rejections propagate as errors; every other failure is reported on the
    /// result so fields gathered before it still reach the caller.
    fn settle(
        &self,
        tool: &str,
        status: &mut OpStatus,
        outcome: Result<(), ToolError>,
    ) -> Result<(), ToolError> {
        let Err(err) = outcome else {
            return Ok(());
        };
        let err = err.redacted();
        if err.kind.is_rejection() {
            self.logger.warn(
                "Rejected request",
                Some(&serde_json::json!({"tool": tool, "code": err.code, "error": err.message})),
            );
            return Err(err);
        }
        self.logger.warn(
            "Operation failed",
            Some(&serde_json::json!({"tool": tool, "code": err.code, "error": err.message})),
        );
        status.error = Some(err.message);
        status.error_code = Some(err.code);
        Ok(())
    }
}

/// Executor entry for one log tool, bound to a shared manager.
pub struct LogTool {
    manager: Arc<LogManager>,
    tool: &'static str,
}

impl LogTool {
    pub fn new(manager: Arc<LogManager>, tool: &'static str) -> Self {
        Self { manager, tool }
    }
}

#[async_trait]
impl ToolHandler for LogTool {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.manager.handle_tool(self.tool, args).await
    }
}

fn apply_sniff(
    info: &SniffInfo,
    encoding: &mut Option<String>,
    mime_type: &mut Option<String>,
    is_binary: &mut bool,
) {
    *encoding = Some(info.encoding.clone());
    *mime_type = Some(info.mime_type.clone());
    *is_binary = info.is_binary;
}

fn run_parser(
    parser: LogParser,
    bytes: &[u8],
    encoding: &str,
    fields: &[String],
) -> (Vec<ParsedLine>, usize) {
    if !fields.is_empty() {
        let rows = parser.extract_fields(bytes, encoding, fields);
        let errors = rows.iter().filter(|row| row.error.is_some()).count();
        return (rows, errors);
    }
    match parser.parse(bytes, encoding) {
        ParseResult::Records {
            records,
            error_count,
            ..
        } => (records, error_count),
        ParseResult::Binary { .. } => {
            let defaults: Vec<String> = DEFAULT_BINARY_FIELDS.iter().map(|s| s.to_string()).collect();
            (parser.extract_fields(bytes, encoding, &defaults), 0)
        }
    }
}

fn to_value<T: Serialize>(result: T) -> Result<Value, ToolError> {
    serde_json::to_value(result).map_err(|err| ToolError::internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::security::compile_pattern;
    use std::time::Duration;

    fn scan_lines(lines: &[&str], pattern: &str, context: usize, max: usize) -> SearchResult {
        let compiled = compile_pattern(pattern, 512, Duration::from_secs(5), false).expect("pattern");
        let mut scan = LineScan::new(&compiled, context, max);
        let mut result = SearchResult::default();
        for line in lines {
            if let Flow::Stop = scan.feed(line, false, &mut result).expect("feed") {
                break;
            }
        }
        result
    }

    #[test]
    fn context_windows_surround_each_match() {
        let lines = ["a", "b", "ERR 1", "c", "d", "ERR 2", "e"];
        let result = scan_lines(&lines, "ERR", 1, 10);
        assert_eq!(result.match_count, 2);
        assert_eq!(result.matches[0].context_before, vec!["b"]);
        assert_eq!(result.matches[0].context_after, vec!["c"]);
        assert_eq!(result.matches[1].line_number, 6);
        assert_eq!(result.matches[1].context_after, vec!["e"]);
        assert!(!result.is_truncated);
    }

    #[test]
    fn cap_stops_scan_after_trailing_context() {
        let lines = ["x1", "x2", "x3", "x4", "x5"];
        let result = scan_lines(&lines, "x", 1, 2);
        assert_eq!(result.match_count, 2);
        assert_eq!(result.matches[1].context_after, vec!["x3"]);
        assert!(result.is_truncated);
        assert_eq!(result.lines_scanned, 3);
    }

    #[test]
    fn cap_on_final_line_is_not_truncation() {
        let result = scan_lines(&["x1", "y", "x2"], "x", 0, 2);
        assert_eq!(result.match_count, 2);
        assert!(!result.is_truncated);
    }

    #[test]
    fn open_pieces_continue_the_same_line() {
        let compiled = compile_pattern("NEEDLE", 512, Duration::from_secs(5), false).expect("pattern");
        let mut scan = LineScan::new(&compiled, 0, 10);
        let mut result = SearchResult::default();
        let pieces = [
            ("first", false),
            ("zzNEE", true),
            ("DLE", false),
            ("NEEDLE again", false),
            ("NEEDLE", true),
            ("NEEDLE tail", false),
        ];
        for (piece, open) in pieces {
            scan.feed(piece, open, &mut result).expect("feed");
        }
        assert_eq!(result.lines_scanned, 4);
        let lines: Vec<usize> = result.matches.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert_eq!(result.matches[0].line, "zzNEEDLE");
        assert_eq!(result.matches[2].line, "NEEDLENEEDLE tail");
    }

    #[test]
    fn status_serializes_flat() {
        let result = TailResult {
            status: OpStatus {
                error: Some("boom".to_string()),
                error_code: Some("NOT_FOUND".to_string()),
            },
            ..TailResult::default()
        };
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["error_code"], "NOT_FOUND");
        assert!(value.get("status").is_none());
    }
}
