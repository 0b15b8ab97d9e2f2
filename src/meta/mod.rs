//! Normalized metadata records produced by the crawlers
//!
//! One [`MetadataRecord`] is created per successful crawl:
//! - Databases carry their table list (columns, keys, indexes)
//! - APIs and files carry an inferred [`Schema`]

use crate::infer::Schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Database,
    Api,
    File,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Database => "database",
            SourceType::Api => "api",
            SourceType::File => "file",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub autoincrement: bool,
}

/// Primary key constraint of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// A foreign key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

/// A secondary index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// One introspected table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: PrimaryKey,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexInfo>,
}

/// Database crawl payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Declared kind (label only)
    pub db_kind: String,
    /// Connection descriptor with credentials redacted
    pub connection: String,
    pub tables: Vec<TableInfo>,
}

/// API crawl payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMetadata {
    pub url: String,
    pub status_code: u16,
    pub schema: Schema,
}

/// File crawl payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<DateTime<Utc>>,
    /// Absent for unsupported extensions
    pub schema: Option<Schema>,
}

impl FileMetadata {
    /// File name without directories, used as the entity name
    pub fn basename(&self) -> String {
        file_basename(&self.path)
    }
}

/// Type-specific part of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "lowercase")]
pub enum RecordPayload {
    Database(DatabaseMetadata),
    Api(ApiMetadata),
    File(FileMetadata),
}

/// One normalized summary of a single crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

impl MetadataRecord {
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self.payload {
            RecordPayload::Database(_) => SourceType::Database,
            RecordPayload::Api(_) => SourceType::Api,
            RecordPayload::File(_) => SourceType::File,
        }
    }
}

/// Basename of a path, falling back to the full path
pub fn file_basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_source_type_tag() {
        let record = MetadataRecord::new(RecordPayload::File(FileMetadata {
            path: PathBuf::from("/data/users.csv"),
            extension: ".csv".to_string(),
            size: 12,
            modified: None,
            schema: None,
        }));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["source_type"], "file");
        assert_eq!(value["size"], 12);
        assert_eq!(record.source_type(), SourceType::File);
    }

    #[test]
    fn test_basename() {
        assert_eq!(file_basename(Path::new("/a/b/orders.json")), "orders.json");
        assert_eq!(file_basename(Path::new("orders.json")), "orders.json");
    }
}
