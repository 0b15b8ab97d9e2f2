//! metacrawl - crawl databases, APIs and files into one metadata catalog
//!
//! This crate provides:
//! - Read-only schema crawlers for SQLite/PostgreSQL, JSON APIs and flat files
//! - Schema inference for JSON trees and tabular samples
//! - A data dictionary and lineage graph aggregated across sources
//! - Workbook export and an interactive crawling session

pub mod catalog;
pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod export;
pub mod infer;
pub mod lineage;
pub mod meta;
pub mod progress;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{Error, Result};
