//! SQLite introspection through the `pragma_*` table-valued functions

use super::{group_ordered, SchemaIntrospector};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::meta::{ColumnInfo, ForeignKey, IndexInfo, PrimaryKey};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

pub struct SqliteIntrospector {
    pool: SqlitePool,
}

impl SqliteIntrospector {
    /// Connect read-only; a missing database file is an error
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaIntrospector for SqliteIntrospector {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let pk_columns = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").map(|pk| pk > 0).unwrap_or(false))
            .count();

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let data_type: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;
            // A lone INTEGER primary key aliases the rowid
            let autoincrement = pk > 0 && pk_columns == 1 && data_type.eq_ignore_ascii_case("INTEGER");

            columns.push(ColumnInfo {
                name: row.try_get("name")?,
                // Only the rowid alias is implicitly NOT NULL
                nullable: not_null == 0 && !autoincrement,
                default: row.try_get("dflt_value")?,
                autoincrement,
                data_type,
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, table: &str) -> Result<PrimaryKey> {
        let columns = sqlx::query_scalar::<_, String>(
            "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(PrimaryKey {
            name: None,
            columns,
        })
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows = sqlx::query(
            r#"SELECT id, "table" AS referred_table, "from" AS column_name, "to" AS referred_column
               FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut flat = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let referred_table: String = row.try_get("referred_table")?;
            let column: String = row.try_get("column_name")?;
            let referred_column: Option<String> = row.try_get("referred_column")?;
            flat.push((id, (referred_table, column, referred_column)));
        }

        Ok(group_ordered(flat)
            .into_iter()
            .filter_map(|(_, parts)| {
                let referred_table = parts.first()?.0.clone();
                let columns = parts.iter().map(|(_, c, _)| c.clone()).collect();
                // `to` is NULL when the reference targets the implicit primary key
                let referred_columns = parts.iter().filter_map(|(_, _, r)| r.clone()).collect();
                Some(ForeignKey {
                    name: None,
                    columns,
                    referred_table,
                    referred_columns,
                })
            })
            .collect())
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows = sqlx::query(
            r#"SELECT name, "unique" AS is_unique, origin FROM pragma_index_list(?1) ORDER BY name"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let origin: String = row.try_get("origin")?;
            if origin == "pk" || name.starts_with("sqlite_autoindex") {
                continue;
            }
            let unique: i64 = row.try_get("is_unique")?;

            let columns = sqlx::query_scalar::<_, Option<String>>(
                "SELECT name FROM pragma_index_info(?1) ORDER BY seqno",
            )
            .bind(&name)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .flatten()
            .collect();

            indexes.push(IndexInfo {
                name,
                columns,
                unique: unique != 0,
            });
        }
        Ok(indexes)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
