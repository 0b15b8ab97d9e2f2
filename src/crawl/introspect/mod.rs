//! Read-only schema introspection behind a dialect-neutral trait

mod postgres;
mod sqlite;

pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::meta::{ColumnInfo, ForeignKey, IndexInfo, PrimaryKey, TableInfo};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Schema catalog of one connected database
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Dialect name, for logging
    fn dialect(&self) -> &'static str;

    /// Every table visible to the connection, sorted by name
    async fn table_names(&self) -> Result<Vec<String>>;

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    async fn primary_key(&self, table: &str) -> Result<PrimaryKey>;

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;

    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>>;

    /// Release pooled connections
    async fn close(&self);

    /// Full description of one table
    async fn describe_table(&self, table: &str) -> Result<TableInfo> {
        Ok(TableInfo {
            name: table.to_string(),
            primary_key: self.primary_key(table).await?,
            foreign_keys: self.foreign_keys(table).await?,
            indexes: self.indexes(table).await?,
            columns: self.columns(table).await?,
        })
    }
}

/// Open an introspector for the dialect named by the URL scheme
pub async fn connect_introspector(
    url: &str,
    config: &DatabaseConfig,
) -> Result<Box<dyn SchemaIntrospector>> {
    let scheme = url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| Error::UnsupportedDatabase(redact_credentials(url)))?;

    debug!("Opening {} introspector for {}", scheme, redact_credentials(url));

    match scheme.as_str() {
        "sqlite" => Ok(Box::new(SqliteIntrospector::connect(url, config).await?)),
        "postgres" | "postgresql" => Ok(Box::new(PostgresIntrospector::connect(url, config).await?)),
        _ => Err(Error::UnsupportedDatabase(redact_credentials(url))),
    }
}

/// Mask the password of a connection URL
pub fn redact_credentials(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}

/// Group `(key, value)` rows by key, keeping first-appearance order
pub(crate) fn group_ordered<K: PartialEq, V>(rows: impl IntoIterator<Item = (K, V)>) -> Vec<(K, Vec<V>)> {
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    for (key, value) in rows {
        match groups.last_mut() {
            Some((last, values)) if *last == key => values.push(value),
            _ => groups.push((key, vec![value])),
        }
    }
    groups
}
