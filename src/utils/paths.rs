//! Lexical helpers for POSIX paths on the remote host. Nothing here touches a
//! filesystem; the remote side is only reachable through the accessor.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathShapeError {
    Empty,
    NullByte,
    ControlChar,
    NotAbsolute,
    Traversal,
}

impl PathShapeError {
    pub fn describe(self) -> &'static str {
        match self {
            PathShapeError::Empty => "path must be a non-empty string",
            PathShapeError::NullByte => "path must not contain null bytes",
            PathShapeError::ControlChar => "path must not contain control characters",
            PathShapeError::NotAbsolute => "path must be absolute",
            PathShapeError::Traversal => "path must not contain '..' segments",
        }
    }
}

/// Collapses duplicate separators and `.` segments; rejects `..` outright.
pub fn normalize_remote_path(raw: &str) -> Result<String, PathShapeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathShapeError::Empty);
    }
    if trimmed.contains('\0') {
        return Err(PathShapeError::NullByte);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(PathShapeError::ControlChar);
    }
    if !trimmed.starts_with('/') {
        return Err(PathShapeError::NotAbsolute);
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathShapeError::Traversal),
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", parts.join("/")))
}

/// True when `path` equals `root` or lies below it. Both must already be normalized.
pub fn is_within(path: &str, root: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    path == root
        || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

/// The path itself followed by each ancestor, closest first, ending at `/`.
pub fn self_and_ancestors(path: &str) -> Vec<&str> {
    let mut out = vec![path];
    let mut current = path;
    while let Some(idx) = current.rfind('/') {
        if idx == 0 {
            if current != "/" {
                out.push("/");
            }
            break;
        }
        current = &current[..idx];
        out.push(current);
    }
    out
}

pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn extension_lowercase(path: &str) -> Option<String> {
    let name = file_name(path);
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(name[idx + 1..].to_lowercase())
}
