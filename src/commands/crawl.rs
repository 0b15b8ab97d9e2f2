//! One-shot crawl command and shared report printers

use crate::catalog::{Catalog, CatalogStatistics, DataDictionary};
use crate::config::Config;
use crate::crawl::CrawlStatus;
use crate::error::Result;
use crate::lineage::LineageView;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// How the lineage graph is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LineageFormat {
    /// Node and edge lists
    Text,
    /// Graphviz DOT
    Dot,
}

/// Sources and outputs of a one-shot crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub databases: Vec<String>,
    /// Label recorded for every database (config default when absent)
    pub db_kind: Option<String>,
    pub apis: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub files: Vec<PathBuf>,
    pub show_dictionary: bool,
    pub lineage: Option<LineageFormat>,
    pub export: Option<PathBuf>,
}

impl CrawlOptions {
    pub fn has_sources(&self) -> bool {
        !self.databases.is_empty() || !self.apis.is_empty() || !self.files.is_empty()
    }
}

/// Everything a one-shot crawl produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub statuses: Vec<CrawlStatus>,
    pub statistics: CatalogStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<DataDictionary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<LineageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage_dot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<CrawlStatus>,
}

impl CrawlReport {
    pub fn failures(&self) -> usize {
        self.statuses.iter().filter(|s| !s.success).count()
            + self.export.iter().filter(|s| !s.success).count()
    }
}

/// Status returned when exporting an empty catalog is requested
pub fn nothing_to_export() -> CrawlStatus {
    CrawlStatus::failed("Export skipped: no sources have been crawled")
}

/// Crawl every source in order, then build the requested outputs
pub async fn cmd_crawl(config: Config, options: CrawlOptions) -> Result<CrawlReport> {
    let mut catalog = Catalog::new(config);
    let mut statuses = Vec::new();

    for url in &options.databases {
        statuses.push(catalog.crawl_database(url, options.db_kind.as_deref()).await);
    }

    for url in &options.apis {
        statuses.push(catalog.crawl_api(url, &options.headers).await);
    }

    if !options.files.is_empty() {
        statuses.extend(catalog.crawl_files(&options.files));
    }

    let export = options.export.as_ref().map(|path| {
        if catalog.is_empty() {
            nothing_to_export()
        } else {
            catalog.export(path)
        }
    });

    let report = CrawlReport {
        statistics: catalog.statistics(),
        dictionary: options.show_dictionary.then(|| catalog.data_dictionary()),
        lineage: (options.lineage == Some(LineageFormat::Text)).then(|| catalog.lineage_view()),
        lineage_dot: (options.lineage == Some(LineageFormat::Dot)).then(|| catalog.lineage().to_dot()),
        statuses,
        export,
    };

    info!(
        "Crawl finished: {} sources, {} failures",
        report.statistics.total_sources,
        report.failures()
    );
    Ok(report)
}

pub fn print_crawl_report(report: &CrawlReport) {
    for status in &report.statuses {
        println!("{}", status);
    }

    if let Some(dictionary) = &report.dictionary {
        print_dictionary(dictionary);
    }
    if let Some(lineage) = &report.lineage {
        print_lineage(lineage);
    }
    if let Some(dot) = &report.lineage_dot {
        println!("{}", dot);
    }

    print_statistics(&report.statistics);

    if let Some(export) = &report.export {
        println!("\n{}", export);
    }
}

pub fn print_statistics(stats: &CatalogStatistics) {
    println!("\n📊 Metadata Statistics\n");
    println!("Sources Crawled: {}", stats.total_sources);
    for source in &stats.sources {
        println!("  • {}: {}", capitalize(source.source_type.as_str()), source.count);
    }
    println!("\nData Dictionary Entries: {}", stats.dictionary_entries);
    println!("Lineage Entities: {}", stats.lineage_nodes);
    println!("Lineage Relationships: {}", stats.lineage_edges);
}

pub fn print_dictionary(dictionary: &DataDictionary) {
    println!("\n📖 Data Dictionary ({} entries)\n", dictionary.len());

    if dictionary.is_empty() {
        println!("No entries. Crawl a source first.");
        return;
    }

    for (key, entry) in dictionary {
        let nullable = match entry.nullable() {
            Some(true) => " NULL",
            Some(false) => " NOT NULL",
            None => "",
        };
        println!(
            "{:<50} {:<10} {}{}",
            key,
            entry.source_type.as_str(),
            entry.data_type,
            nullable
        );
    }
}

pub fn print_lineage(lineage: &LineageView) {
    println!(
        "\n🔗 Lineage Map ({} entities, {} relationships)\n",
        lineage.nodes.len(),
        lineage.edges.len()
    );

    if lineage.nodes.is_empty() {
        println!("No lineage information available.");
        return;
    }

    println!("Entities:");
    for node in &lineage.nodes {
        println!("  • {} [{}] {}", node.id, node.node_type, node.source);
    }

    if !lineage.edges.is_empty() {
        println!("\nRelationships:");
        for edge in &lineage.edges {
            println!("  {} → {} ({})", edge.from, edge.to, edge.relationship);
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
