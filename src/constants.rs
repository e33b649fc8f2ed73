pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_CONNECTION_SECS: u64 = 30;
    pub const TIMEOUT_COMMAND_SECS: u64 = 60;
    pub const MAX_CONNECTION_TIMEOUT_SECS: u64 = 300;
    pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;
    pub const KEEPALIVE_INTERVAL_SECS: u32 = 30;
    pub const EXEC_POLL_MS: u64 = 20;
}

pub mod limits {
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
    pub const MAX_LIST_DEPTH: usize = 5;
    pub const MAX_LIST_ENTRIES: usize = 1_000;
    pub const MAX_TAIL_LINES: usize = 1_000;
    pub const DEFAULT_TAIL_LINES: usize = 10;
    pub const MAX_CONTEXT_LINES: usize = 20;
    pub const DEFAULT_MAX_MATCHES: usize = 100;
    pub const MAX_MATCHES: usize = 1_000;
    pub const MAX_QUICK_MATCHES: usize = 100;
    pub const DEFAULT_MAX_MESSAGES: usize = 100;
    pub const MAX_MESSAGES: usize = 1_000;
    pub const MAX_HEX_PATTERN_BYTES: usize = 4_096;
    pub const MAX_MESSAGE_LENGTH: usize = 64 * 1024;
    pub const DEFAULT_MESSAGE_LENGTH: usize = 64;
    pub const MAX_LINE_BYTES: usize = 8 * 1024;
    pub const MAX_FIELDS: usize = 64;
    pub const HEX_PREVIEW_BYTES: usize = 256;
    pub const LOG_SUBSTRING_LENGTH: usize = 200;
}

pub mod defaults {
    pub const LOG_PATH: &str = "/var/log";
    pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
    pub const MAX_FILE_SIZE_CEILING: u64 = 100 * 1024 * 1024;
    pub const MAX_PREVIEW_LINES: usize = 50;
    pub const MAX_PREVIEW_LINES_CEILING: usize = 1_000;
    pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;
    pub const MIN_CHUNK_SIZE: u64 = 4 * 1024;
    pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;
    pub const CACHE_SIZE: u64 = 100 * 1024 * 1024;
    pub const MAX_DOWNLOAD_SIZE: u64 = 10 * 1024 * 1024;
    pub const MAX_DOWNLOAD_SIZE_CEILING: u64 = 100 * 1024 * 1024;
    pub const MAX_SEARCH_BYTES: u64 = 100 * 1024 * 1024;
    pub const MAX_PATTERN_LENGTH: usize = 512;
    pub const PATTERN_TIME_BUDGET_MS: u64 = 250;
    pub const SEARCH_TIME_BUDGET_MS: u64 = 10_000;
    pub const SNIFF_SAMPLE_BYTES: u64 = 4_096;
    pub const REGEX_SIZE_LIMIT: usize = 1024 * 1024;

    pub const DENIED_PATHS: &[&str] = &[
        "/etc/shadow",
        "/etc/passwd",
        "/etc/sudoers",
        "/etc/ssh",
        "/root/.ssh",
        "/home/*/.ssh",
        "/etc/ssl/private",
        "/var/lib/mysql",
    ];
}

pub mod sniff {
    /// Share of non-text bytes above which a sample is treated as binary.
    pub const BINARY_RATIO: f64 = 0.30;
    pub const GENERIC_BINARY_MIME: &str = "application/octet-stream";

    pub const BINARY_EXTENSIONS: &[&str] = &[
        "bin", "exe", "dll", "so", "dylib", "obj", "o", "pyc", "pyd", "pyo", "class", "jar",
        "war", "zip", "tar", "gz", "bz2", "xz", "rar", "7z", "pdf", "doc", "docx", "xls", "xlsx",
        "ppt", "pptx", "jpg", "jpeg", "png", "gif", "bmp", "ico", "tif", "tiff", "mp3", "mp4",
        "avi", "mov", "flv", "wmv", "wav", "ogg", "db", "sqlite", "mdb", "accdb",
    ];
}
