//! Aggregation context for one crawling session
//!
//! A [`Catalog`] owns the ordered metadata records and the lineage graph.
//! Crawlers hand back [`CrawlOutcome`]s and the catalog applies them:
//! lineage operations are always applied, records only on success.
//! Clearing replaces both with fresh state.

mod dictionary;

pub use dictionary::*;

use crate::config::Config;
use crate::crawl::{ApiCrawler, CrawlOutcome, CrawlStatus, DatabaseCrawler, FileCrawler};
use crate::export::export_xlsx;
use crate::infer::SchemaInferrer;
use crate::lineage::{EdgeView, LineageGraph, LineageView};
use crate::meta::{MetadataRecord, SourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Record count for one source type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source_type: SourceType,
    pub count: usize,
}

/// Catalog-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub total_sources: usize,
    pub sources: Vec<SourceCount>,
    pub dictionary_entries: usize,
    pub lineage_nodes: usize,
    pub lineage_edges: usize,
}

pub struct Catalog {
    config: Config,
    records: Vec<MetadataRecord>,
    lineage: LineageGraph,
}

impl Catalog {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            records: Vec::new(),
            lineage: LineageGraph::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn lineage(&self) -> &LineageGraph {
        &self.lineage
    }

    /// True when nothing has been crawled successfully
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discard all records and lineage
    pub fn clear(&mut self) {
        debug!("Clearing catalog ({} records)", self.records.len());
        self.records.clear();
        self.lineage = LineageGraph::new();
    }

    /// Fold one crawl result into the catalog
    pub fn apply(&mut self, outcome: CrawlOutcome) -> CrawlStatus {
        let status = outcome.status();
        for op in &outcome.lineage {
            self.lineage.apply(op);
        }
        if let Some(record) = outcome.record {
            self.records.push(record);
        }
        status
    }

    pub async fn crawl_database(&mut self, url: &str, db_kind: Option<&str>) -> CrawlStatus {
        let db_kind = db_kind
            .unwrap_or(self.config.database.default_kind.as_str())
            .to_string();
        let outcome = DatabaseCrawler::new(self.config.database.clone())
            .crawl(url, &db_kind)
            .await;
        self.apply(outcome)
    }

    pub async fn crawl_api(&mut self, url: &str, headers: &BTreeMap<String, String>) -> CrawlStatus {
        match self.api_crawler() {
            Ok(crawler) => {
                let outcome = crawler.crawl(url, headers).await;
                self.apply(outcome)
            }
            Err(e) => {
                warn!("Could not build HTTP client: {}", e);
                self.apply(CrawlOutcome::failed(SourceType::Api, Vec::new(), e))
            }
        }
    }

    pub fn crawl_file(&mut self, path: &Path) -> CrawlStatus {
        let outcome = self.file_crawler().crawl(path);
        self.apply(outcome)
    }

    /// Crawl a batch of files and directories; one status per file
    pub fn crawl_files(&mut self, paths: &[PathBuf]) -> Vec<CrawlStatus> {
        self.file_crawler()
            .crawl_files(paths)
            .into_iter()
            .map(|outcome| self.apply(outcome))
            .collect()
    }

    pub fn api_crawler(&self) -> crate::Result<ApiCrawler> {
        ApiCrawler::new(
            &self.config.http,
            SchemaInferrer::new(self.config.files.max_sample_chars),
        )
    }

    pub fn file_crawler(&self) -> FileCrawler {
        FileCrawler::new(&self.config.files)
    }

    /// Data dictionary recomputed from every record
    pub fn data_dictionary(&self) -> DataDictionary {
        build_dictionary(&self.records)
    }

    /// Record counts per source type, in order of first crawl
    pub fn summary(&self) -> Vec<(SourceType, usize)> {
        summarize(&self.records)
    }

    pub fn statistics(&self) -> CatalogStatistics {
        CatalogStatistics {
            total_sources: self.records.len(),
            sources: self
                .summary()
                .into_iter()
                .map(|(source_type, count)| SourceCount { source_type, count })
                .collect(),
            dictionary_entries: self.data_dictionary().len(),
            lineage_nodes: self.lineage.node_count(),
            lineage_edges: self.lineage.edge_count(),
        }
    }

    pub fn lineage_view(&self) -> LineageView {
        self.lineage.view()
    }

    pub fn lineage_edges(&self) -> Vec<EdgeView> {
        self.lineage.edges()
    }

    /// Export the workbook. An empty catalog yields headers only.
    pub fn export(&self, path: &Path) -> CrawlStatus {
        match export_xlsx(path, &self.data_dictionary(), &self.summary(), &self.lineage_edges()) {
            Ok(()) => CrawlStatus::ok(format!("Successfully exported to {}", path.display())),
            Err(e) => {
                warn!("Export to {} failed: {}", path.display(), e);
                CrawlStatus::failed(format!("Export error: {}", e))
            }
        }
    }
}
