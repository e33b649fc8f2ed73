pub mod accessor;
pub mod cache;
pub mod config;
pub mod logger;
pub mod remote;
pub mod security;
pub mod sniff;
pub mod ssh;
pub mod tool_executor;
pub mod validation;
