//! Default values for configuration

/// Default API request timeout in seconds
pub fn default_http_timeout() -> u64 {
    30
}

/// Default user agent for API crawls
pub fn default_http_user_agent() -> String {
    format!("metacrawl/{}", env!("CARGO_PKG_VERSION"))
}

/// Default database kind label
pub fn default_database_kind() -> String {
    "sqlite".to_string()
}

/// Default pool size for introspection connections
pub fn default_database_max_connections() -> u32 {
    2
}

/// Default connection acquire timeout in seconds
pub fn default_database_acquire_timeout() -> u64 {
    10
}

/// Default number of rows sampled from tabular files
pub fn default_files_sample_rows() -> usize {
    5
}

/// Default sample truncation length (characters)
pub fn default_files_max_sample_chars() -> usize {
    100
}

/// Default: only the top level of a directory is crawled
pub fn default_files_recursive() -> bool {
    false
}

/// Default session polling interval (milliseconds)
pub fn default_session_poll_interval() -> u64 {
    100
}

/// Default export destination
pub fn default_export_path() -> String {
    "metadata_export.xlsx".to_string()
}
