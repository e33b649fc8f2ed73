use crate::constants::defaults::REGEX_SIZE_LIMIT;
use crate::errors::ToolError;
use crate::services::config::LogViewerConfig;
use crate::services::logger::Logger;
use crate::utils::paths::{is_within, normalize_remote_path, self_and_ancestors};
use crate::utils::redact::redact_text;
use regex::{Match, Regex, RegexBuilder};
use std::fmt;
use std::time::{Duration, Instant};

const PATH_METACHARACTERS: &[char] = &['*', '?', '|', '>', '<', ';', '&', '$', '`', '\\'];

/// Absolute, normalized remote path that passed the allow-list and deny-list checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        crate::utils::paths::file_name(&self.0)
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single argument that is safe to hand to the remote command runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeToken {
    raw: String,
}

impl SafeToken {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Single-quoted form, for transports that only accept one command string.
    pub fn quoted(&self) -> String {
        format!("'{}'", self.raw.replace('\'', "'\\''"))
    }
}

/// Regex that passed the shape checks, carrying its per-attempt time budget.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    budget: Duration,
}

impl CompiledPattern {
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn find<'h>(&self, haystack: &'h str) -> Result<Option<Match<'h>>, ToolError> {
        let started = Instant::now();
        let found = self.regex.find(haystack);
        self.check_budget(started, haystack.len())?;
        Ok(found)
    }

    pub fn is_match(&self, haystack: &str) -> Result<bool, ToolError> {
        let started = Instant::now();
        let matched = self.regex.is_match(haystack);
        self.check_budget(started, haystack.len())?;
        Ok(matched)
    }

    fn check_budget(&self, started: Instant, haystack_len: usize) -> Result<(), ToolError> {
        let elapsed = started.elapsed();
        if elapsed >= self.budget {
            return Err(ToolError::pattern_timeout(format!(
                "Pattern exceeded its {} ms match budget",
                self.budget.as_millis()
            ))
            .with_details(serde_json::json!({
                "elapsed_ms": elapsed.as_millis() as u64,
                "input_bytes": haystack_len,
            })));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Security {
    logger: Logger,
    extra_roots: Vec<String>,
    denied: Vec<glob::Pattern>,
    max_pattern_length: usize,
    pattern_budget: Duration,
}

impl Security {
    pub fn new(logger: Logger, config: &LogViewerConfig) -> Self {
        let logger = logger.child("security");
        let mut denied = Vec::with_capacity(config.denied_paths.len());
        for raw in &config.denied_paths {
            match glob::Pattern::new(raw.trim_end_matches('/')) {
                Ok(pattern) => denied.push(pattern),
                Err(err) => logger.warn(
                    "Ignoring invalid denied path pattern",
                    Some(&serde_json::json!({"pattern": raw, "error": err.to_string()})),
                ),
            }
        }
        let extra_roots = config
            .extra_allowed_roots
            .iter()
            .filter_map(|root| normalize_remote_path(root).ok())
            .collect();
        Self {
            logger,
            extra_roots,
            denied,
            max_pattern_length: config.max_pattern_length,
            pattern_budget: config.pattern_time_budget(),
        }
    }

    pub fn validate_path(&self, raw: &str, allowed_root: &str) -> Result<RemotePath, ToolError> {
        if let Some(bad) = raw.chars().find(|c| PATH_METACHARACTERS.contains(c)) {
            self.logger.warn(
                "Rejected path with shell metacharacter",
                Some(&serde_json::json!({"path": raw, "char": bad.to_string()})),
            );
            return Err(ToolError::path_violation(format!(
                "Path contains a forbidden character: {:?}",
                bad
            )));
        }
        let normalized = normalize_remote_path(raw)
            .map_err(|err| ToolError::path_violation(err.describe()))?;
        let root = normalize_remote_path(allowed_root)
            .map_err(|err| ToolError::path_violation(format!("allowed root: {}", err.describe())))?;

        let inside = is_within(&normalized, &root)
            || self.extra_roots.iter().any(|extra| is_within(&normalized, extra));
        if !inside {
            self.logger.warn(
                "Rejected path outside allowed roots",
                Some(&serde_json::json!({"path": normalized, "root": root})),
            );
            return Err(ToolError::path_violation(format!(
                "Path {} is outside the allowed root {}",
                normalized, root
            ))
            .with_hint("Use a path under the configured log directory."));
        }

        if let Some(pattern) = self.denied_match(&normalized) {
            self.logger.warn(
                "Rejected denied path",
                Some(&serde_json::json!({"path": normalized, "rule": pattern})),
            );
            return Err(ToolError::path_violation(format!(
                "Access to {} is denied",
                normalized
            )));
        }
        Ok(RemotePath(normalized))
    }

    fn denied_match(&self, path: &str) -> Option<String> {
        for candidate in self_and_ancestors(path) {
            if let Some(pattern) = self.denied.iter().find(|p| p.matches(candidate)) {
                return Some(pattern.as_str().to_string());
            }
        }
        None
    }

    /// Fails closed on control characters instead of trying to escape them.
    pub fn sanitize_for_shell(&self, value: &str) -> Result<SafeToken, ToolError> {
        if value.is_empty() {
            return Err(ToolError::invalid_params("Command argument must not be empty"));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(ToolError::invalid_params(
                "Command argument contains control characters",
            ));
        }
        Ok(SafeToken {
            raw: value.to_string(),
        })
    }

    pub fn validate_pattern(
        &self,
        source: &str,
        case_insensitive: bool,
    ) -> Result<CompiledPattern, ToolError> {
        compile_pattern(
            source,
            self.max_pattern_length,
            self.pattern_budget,
            case_insensitive,
        )
    }

    pub fn redact(&self, text: &str) -> String {
        redact_text(text, usize::MAX, None)
    }
}

pub fn compile_pattern(
    source: &str,
    max_len: usize,
    budget: Duration,
    case_insensitive: bool,
) -> Result<CompiledPattern, ToolError> {
    if source.is_empty() {
        return Err(ToolError::pattern_rejected("Pattern must not be empty"));
    }
    if source.len() > max_len {
        return Err(ToolError::pattern_rejected(format!(
            "Pattern is {} bytes, limit is {}",
            source.len(),
            max_len
        )));
    }
    if has_nested_unbounded_quantifier(source) {
        return Err(ToolError::pattern_rejected(
            "Pattern repeats a group that already contains an unbounded quantifier",
        )
        .with_hint("Rewrite nested repetition like (a+)+ as a+."));
    }
    let regex = RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|err| ToolError::pattern_rejected(format!("Invalid pattern: {}", err)))?;
    Ok(CompiledPattern { regex, budget })
}

fn has_nested_unbounded_quantifier(source: &str) -> bool {
    let chars: Vec<char> = source.chars().collect();
    // One flag per open group: does it contain an unbounded repetition?
    let mut groups: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let mut atom_unbounded = false;
        match chars[i] {
            '\\' => i += 2,
            '[' => i = skip_class(&chars, i),
            '(' => {
                groups.push(false);
                i += 1;
                continue;
            }
            ')' => {
                atom_unbounded = groups.pop().unwrap_or(false);
                i += 1;
            }
            _ => i += 1,
        }
        if let Some((unbounded, len)) = quantifier_at(&chars, i) {
            if unbounded && atom_unbounded {
                return true;
            }
            i += len;
            if matches!(chars.get(i), Some('?') | Some('+')) {
                i += 1;
            }
            atom_unbounded |= unbounded;
        }
        if atom_unbounded {
            if let Some(top) = groups.last_mut() {
                *top = true;
            }
        }
    }
    false
}

fn quantifier_at(chars: &[char], i: usize) -> Option<(bool, usize)> {
    match chars.get(i)? {
        '*' | '+' => Some((true, 1)),
        '?' => Some((false, 1)),
        '{' => {
            let end = chars[i..].iter().position(|c| *c == '}')? + i;
            let body: String = chars[i + 1..end].iter().collect();
            let (min, max) = match body.split_once(',') {
                Some((min, max)) => (min, Some(max)),
                None => (body.as_str(), None),
            };
            min.trim().parse::<u32>().ok()?;
            let unbounded = max.map(|m| m.trim().is_empty()).unwrap_or(false);
            Some((unbounded, end - i + 1))
        }
        _ => None,
    }
}

fn skip_class(chars: &[char], start: usize) -> usize {
    let mut j = start + 1;
    if chars.get(j) == Some(&'^') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' => return j + 1,
            _ => j += 1,
        }
    }
    j
}
