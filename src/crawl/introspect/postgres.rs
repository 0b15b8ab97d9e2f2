//! PostgreSQL introspection over `pg_catalog`, limited to the current schema

use super::{group_ordered, SchemaIntrospector};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::meta::{ColumnInfo, ForeignKey, IndexInfo, PrimaryKey};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

const TABLES_SQL: &str = r#"
SELECT c.relname::text AS name
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p') AND n.nspname = current_schema()
ORDER BY c.relname
"#;

const COLUMNS_SQL: &str = r#"
SELECT a.attname::text AS name,
       pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
       NOT a.attnotnull AS nullable,
       pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expr,
       (a.attidentity <> '' OR COALESCE(pg_catalog.pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS autoincrement
FROM pg_catalog.pg_attribute a
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE a.attrelid = (quote_ident(current_schema()) || '.' || quote_ident($1))::regclass
  AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const PRIMARY_KEY_SQL: &str = r#"
SELECT con.conname::text AS constraint_name, a.attname::text AS column_name
FROM pg_catalog.pg_constraint con
CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
WHERE con.contype = 'p'
  AND con.conrelid = (quote_ident(current_schema()) || '.' || quote_ident($1))::regclass
ORDER BY k.ord
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT con.conname::text AS constraint_name,
       ref.relname::text AS referred_table,
       a.attname::text AS column_name,
       ra.attname::text AS referred_column
FROM pg_catalog.pg_constraint con
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord)
JOIN pg_catalog.pg_class ref ON ref.oid = con.confrelid
JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refnum
WHERE con.contype = 'f'
  AND con.conrelid = (quote_ident(current_schema()) || '.' || quote_ident($1))::regclass
ORDER BY con.conname, k.ord
"#;

const INDEXES_SQL: &str = r#"
SELECT i.relname::text AS index_name, ix.indisunique AS is_unique, a.attname::text AS column_name
FROM pg_catalog.pg_index ix
JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = ix.indrelid AND a.attnum = k.attnum
WHERE NOT ix.indisprimary
  AND ix.indrelid = (quote_ident(current_schema()) || '.' || quote_ident($1))::regclass
ORDER BY i.relname, k.ord
"#;

pub struct PostgresIntrospector {
    pool: PgPool,
}

impl PostgresIntrospector {
    /// Connect with every transaction forced read-only
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?
            .options([("default_transaction_read_only", "on")]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SchemaIntrospector for PostgresIntrospector {
    fn dialect(&self) -> &'static str {
        "postgres"
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: row.try_get("nullable")?,
                    default: row.try_get("default_expr")?,
                    autoincrement: row.try_get::<Option<bool>, _>("autoincrement")?.unwrap_or(false),
                })
            })
            .collect()
    }

    async fn primary_key(&self, table: &str) -> Result<PrimaryKey> {
        let rows = sqlx::query(PRIMARY_KEY_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut pk = PrimaryKey::default();
        for row in rows {
            pk.name = Some(row.try_get("constraint_name")?);
            pk.columns.push(row.try_get("column_name")?);
        }
        Ok(pk)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows = sqlx::query(FOREIGN_KEYS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut flat = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("constraint_name")?;
            let referred_table: String = row.try_get("referred_table")?;
            let column: String = row.try_get("column_name")?;
            let referred_column: String = row.try_get("referred_column")?;
            flat.push((name, (referred_table, column, referred_column)));
        }

        Ok(foreign_keys_from_rows(flat))
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows = sqlx::query(INDEXES_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut flat = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("index_name")?;
            let unique: bool = row.try_get("is_unique")?;
            let column: String = row.try_get("column_name")?;
            flat.push((name, (unique, column)));
        }

        Ok(indexes_from_rows(flat))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fold `(constraint, (referred_table, column, referred_column))` rows into keys
fn foreign_keys_from_rows(rows: Vec<(String, (String, String, String))>) -> Vec<ForeignKey> {
    group_ordered(rows)
        .into_iter()
        .filter_map(|(name, parts)| {
            let referred_table = parts.first()?.0.clone();
            Some(ForeignKey {
                name: Some(name),
                columns: parts.iter().map(|(_, c, _)| c.clone()).collect(),
                referred_columns: parts.iter().map(|(_, _, r)| r.clone()).collect(),
                referred_table,
            })
        })
        .collect()
}

/// Fold `(index, (unique, column))` rows into indexes
fn indexes_from_rows(rows: Vec<(String, (bool, String))>) -> Vec<IndexInfo> {
    group_ordered(rows)
        .into_iter()
        .map(|(name, parts)| IndexInfo {
            unique: parts.first().map(|(u, _)| *u).unwrap_or(false),
            columns: parts.into_iter().map(|(_, c)| c).collect(),
            name,
        })
        .collect()
}
