//! Data dictionary derived from crawled records

use crate::meta::{MetadataRecord, RecordPayload, SourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dictionary keyed by `<entity>.<field>`, sorted by key
pub type DataDictionary = BTreeMap<String, DictionaryEntry>;

/// Where an entry came from within its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryContext {
    /// A database column
    Column {
        table: String,
        column: String,
        nullable: bool,
    },
    /// An inferred file or API field path
    Field { field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub source: String,
    pub source_type: SourceType,
    pub data_type: String,
    #[serde(flatten)]
    pub context: EntryContext,
}

impl DictionaryEntry {
    /// Table name for columns, field path otherwise
    pub fn table_or_field(&self) -> &str {
        match &self.context {
            EntryContext::Column { table, .. } => table,
            EntryContext::Field { field } => field,
        }
    }

    pub fn column(&self) -> &str {
        match &self.context {
            EntryContext::Column { column, .. } => column,
            EntryContext::Field { .. } => "",
        }
    }

    pub fn nullable(&self) -> Option<bool> {
        match &self.context {
            EntryContext::Column { nullable, .. } => Some(*nullable),
            EntryContext::Field { .. } => None,
        }
    }
}

/// Flatten every record into one dictionary.
///
/// Records are visited in crawl order with no de-duplication, so a later
/// record overwrites any earlier entry with the same key.
pub fn build_dictionary<'a>(records: impl IntoIterator<Item = &'a MetadataRecord>) -> DataDictionary {
    let mut dictionary = DataDictionary::new();

    for record in records {
        match &record.payload {
            RecordPayload::Database(db) => {
                for table in &db.tables {
                    for column in &table.columns {
                        dictionary.insert(
                            format!("{}.{}", table.name, column.name),
                            DictionaryEntry {
                                source: db.connection.clone(),
                                source_type: SourceType::Database,
                                data_type: column.data_type.clone(),
                                context: EntryContext::Column {
                                    table: table.name.clone(),
                                    column: column.name.clone(),
                                    nullable: column.nullable,
                                },
                            },
                        );
                    }
                }
            }
            RecordPayload::File(file) => {
                let basename = file.basename();
                let source = file.path.display().to_string();
                for (field, info) in file.schema.iter().flatten() {
                    dictionary.insert(
                        format!("{}.{}", basename, field),
                        DictionaryEntry {
                            source: source.clone(),
                            source_type: SourceType::File,
                            data_type: info.kind.to_string(),
                            context: EntryContext::Field {
                                field: field.clone(),
                            },
                        },
                    );
                }
            }
            RecordPayload::Api(api) => {
                for (field, info) in &api.schema {
                    dictionary.insert(
                        format!("{}.{}", api.url, field),
                        DictionaryEntry {
                            source: api.url.clone(),
                            source_type: SourceType::Api,
                            data_type: info.kind.to_string(),
                            context: EntryContext::Field {
                                field: field.clone(),
                            },
                        },
                    );
                }
            }
        }
    }

    dictionary
}

/// Records per source type, in order of first appearance
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a MetadataRecord>) -> Vec<(SourceType, usize)> {
    let mut counts: Vec<(SourceType, usize)> = Vec::new();
    for record in records {
        let source_type = record.source_type();
        match counts.iter_mut().find(|(t, _)| *t == source_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((source_type, 1)),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::infer_json;
    use crate::meta::{ApiMetadata, ColumnInfo, DatabaseMetadata, FileMetadata, TableInfo};
    use serde_json::json;
    use std::path::PathBuf;

    fn db_record(table: &str, columns: &[(&str, &str)]) -> MetadataRecord {
        MetadataRecord::new(RecordPayload::Database(DatabaseMetadata {
            db_kind: "sqlite".to_string(),
            connection: "sqlite://shop.db".to_string(),
            tables: vec![TableInfo {
                name: table.to_string(),
                columns: columns
                    .iter()
                    .map(|(name, ty)| ColumnInfo {
                        name: name.to_string(),
                        data_type: ty.to_string(),
                        nullable: true,
                        default: None,
                        autoincrement: false,
                    })
                    .collect(),
                primary_key: Default::default(),
                foreign_keys: Vec::new(),
                indexes: Vec::new(),
            }],
        }))
    }

    fn file_record(path: &str, data: serde_json::Value) -> MetadataRecord {
        MetadataRecord::new(RecordPayload::File(FileMetadata {
            path: PathBuf::from(path),
            extension: ".json".to_string(),
            size: 10,
            modified: None,
            schema: Some(infer_json(&data)),
        }))
    }

    #[test]
    fn test_keys_per_source_type() {
        let records = vec![
            db_record("orders", &[("order_id", "INTEGER"), ("customer_id", "INTEGER")]),
            file_record("/data/users.json", json!({"user": {"id": 1}})),
            MetadataRecord::new(RecordPayload::Api(ApiMetadata {
                url: "https://api.example.com/items".to_string(),
                status_code: 200,
                schema: infer_json(&json!({"sku": "A1"})),
            })),
        ];

        let dictionary = build_dictionary(&records);
        let keys: Vec<&str> = dictionary.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "https://api.example.com/items.sku",
                "orders.customer_id",
                "orders.order_id",
                "users.json.user",
                "users.json.user.id",
            ]
        );

        let column = &dictionary["orders.customer_id"];
        assert_eq!(column.source_type, SourceType::Database);
        assert_eq!(column.table_or_field(), "orders");
        assert_eq!(column.column(), "customer_id");
        assert_eq!(column.nullable(), Some(true));

        let field = &dictionary["users.json.user.id"];
        assert_eq!(field.source, "/data/users.json");
        assert_eq!(field.data_type, "number");
        assert_eq!(field.table_or_field(), "user.id");
        assert_eq!(field.nullable(), None);
    }

    #[test]
    fn test_later_record_wins() {
        let records = vec![
            db_record("users", &[("id", "INTEGER")]),
            db_record("users", &[("id", "BIGINT")]),
        ];
        let dictionary = build_dictionary(&records);
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary["users.id"].data_type, "BIGINT");
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            db_record("orders", &[("id", "INTEGER")]),
            file_record("a.json", json!({"x": [1, 2]})),
        ];
        assert_eq!(build_dictionary(&records), build_dictionary(&records));
    }

    #[test]
    fn test_file_without_schema_contributes_nothing() {
        let record = MetadataRecord::new(RecordPayload::File(FileMetadata {
            path: PathBuf::from("notes.txt"),
            extension: ".txt".to_string(),
            size: 3,
            modified: None,
            schema: None,
        }));
        assert!(build_dictionary([&record]).is_empty());
    }

    #[test]
    fn test_summary_first_appearance_order() {
        let records = vec![
            file_record("a.json", json!({})),
            db_record("t", &[]),
            file_record("b.json", json!({})),
        ];
        assert_eq!(
            summarize(&records),
            vec![(SourceType::File, 2), (SourceType::Database, 1)]
        );
    }
}
