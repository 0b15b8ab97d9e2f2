//! Relational database crawling

use super::{connect_introspector, redact_credentials, CrawlOutcome, SchemaIntrospector};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::lineage::{LineageOp, NodeType, Relationship};
use crate::meta::{DatabaseMetadata, MetadataRecord, RecordPayload, SourceType, TableInfo};
use tracing::{debug, info, warn};

/// Crawls every table of one database connection
pub struct DatabaseCrawler {
    config: DatabaseConfig,
}

impl DatabaseCrawler {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Connect to `url` and describe every table. `db_kind` is recorded as a
    /// label; the dialect always comes from the URL scheme.
    pub async fn crawl(&self, url: &str, db_kind: &str) -> CrawlOutcome {
        let connection = redact_credentials(url);
        info!("Crawling database: {}", connection);

        let introspector = match connect_introspector(url, &self.config).await {
            Ok(i) => i,
            Err(e) => {
                warn!("Database connection failed for {}: {}", connection, e);
                return CrawlOutcome::failed(SourceType::Database, Vec::new(), e);
            }
        };

        let mut lineage = Vec::new();
        let result = describe_all(introspector.as_ref(), &connection, &mut lineage).await;
        introspector.close().await;

        match result {
            Ok(tables) => {
                let message = format!("Successfully crawled {} tables", tables.len());
                info!("{} from {}", message, connection);
                let record = MetadataRecord::new(RecordPayload::Database(DatabaseMetadata {
                    db_kind: db_kind.to_string(),
                    connection,
                    tables,
                }));
                CrawlOutcome::succeeded(SourceType::Database, record, lineage, message)
            }
            Err(e) => {
                warn!("Database crawl of {} failed: {}", connection, e);
                CrawlOutcome::failed(SourceType::Database, lineage, e)
            }
        }
    }
}

/// Describe tables in name order, recording lineage as each one completes
async fn describe_all(
    introspector: &dyn SchemaIntrospector,
    source: &str,
    lineage: &mut Vec<LineageOp>,
) -> Result<Vec<TableInfo>> {
    let names = introspector.table_names().await?;
    debug!("{} tables found via {}", names.len(), introspector.dialect());

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let table = introspector.describe_table(&name).await?;
        debug!(
            table = %table.name,
            columns = table.columns.len(),
            foreign_keys = table.foreign_keys.len(),
            "Described table"
        );
        lineage.extend(table_lineage(&table, source));
        tables.push(table);
    }
    Ok(tables)
}

/// Node for the table plus one edge per foreign key
pub fn table_lineage(table: &TableInfo, source: &str) -> Vec<LineageOp> {
    let mut ops = Vec::with_capacity(table.foreign_keys.len() + 1);
    ops.push(LineageOp::Node {
        name: table.name.clone(),
        node_type: NodeType::Table,
        source: source.to_string(),
    });
    for fk in &table.foreign_keys {
        ops.push(LineageOp::Edge {
            from: table.name.clone(),
            to: fk.referred_table.clone(),
            relationship: Relationship::ForeignKey,
        });
    }
    ops
}
