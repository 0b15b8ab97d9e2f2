//! Source crawlers
//!
//! This module provides:
//! - Database introspection over sqlx (SQLite and PostgreSQL)
//! - Single-request JSON API crawling
//! - File crawling for CSV, spreadsheet and JSON files
//!
//! Crawlers never mutate shared state. Each crawl returns a [`CrawlOutcome`]
//! holding the record (on success), the lineage operations performed so far,
//! and the result; the catalog applies it.

mod api;
mod database;
mod file;
mod introspect;

pub use api::*;
pub use database::*;
pub use file::*;
pub use introspect::*;

use crate::error::Result;
use crate::lineage::LineageOp;
use crate::meta::{MetadataRecord, SourceType};
use serde::{Deserialize, Serialize};

/// User-facing result of one crawl or export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStatus {
    pub success: bool,
    pub message: String,
}

impl CrawlStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.success { "✓" } else { "✗" };
        write!(f, "{} {}", mark, self.message)
    }
}

/// Everything one crawl produced
#[derive(Debug)]
pub struct CrawlOutcome {
    pub source_type: SourceType,
    /// Present only when the crawl succeeded
    pub record: Option<MetadataRecord>,
    /// Lineage operations performed before completion or failure
    pub lineage: Vec<LineageOp>,
    /// Success message or the error that ended the crawl
    pub result: Result<String>,
}

impl CrawlOutcome {
    pub fn succeeded(
        source_type: SourceType,
        record: MetadataRecord,
        lineage: Vec<LineageOp>,
        message: String,
    ) -> Self {
        Self {
            source_type,
            record: Some(record),
            lineage,
            result: Ok(message),
        }
    }

    pub fn failed(source_type: SourceType, lineage: Vec<LineageOp>, error: crate::Error) -> Self {
        Self {
            source_type,
            record: None,
            lineage,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Convert the result into a status line
    pub fn status(&self) -> CrawlStatus {
        match &self.result {
            Ok(message) => CrawlStatus::ok(message.clone()),
            Err(e) => CrawlStatus::failed(format!("{} crawl error: {}", self.label(), e)),
        }
    }

    fn label(&self) -> &'static str {
        match self.source_type {
            SourceType::Database => "Database",
            SourceType::Api => "API",
            SourceType::File => "File",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_failed_outcome_status() {
        let outcome = CrawlOutcome::failed(
            SourceType::Api,
            Vec::new(),
            Error::HttpStatus {
                status: 404,
                url: "https://example.com/x".to_string(),
            },
        );
        let status = outcome.status();
        assert!(!status.success);
        assert_eq!(
            status.message,
            "API crawl error: HTTP 404: https://example.com/x"
        );
        assert!(outcome.record.is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CrawlStatus::ok("done").to_string(), "✓ done");
        assert_eq!(CrawlStatus::failed("nope").to_string(), "✗ nope");
    }
}
