//! Flat file crawling (CSV, spreadsheets, JSON)

use super::CrawlOutcome;
use crate::config::FilesConfig;
use crate::error::{Error, Result};
use crate::infer::{Schema, SchemaInferrer, TabularCell};
use crate::lineage::{LineageOp, NodeType};
use crate::meta::{file_basename, FileMetadata, MetadataRecord, RecordPayload, SourceType};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions with schema inference support
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx", ".xls", ".json"];

/// Lowercased extension with its leading dot, or empty
pub fn normalized_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&normalized_extension(path).as_str())
}

/// Crawls files one at a time
#[derive(Debug, Clone)]
pub struct FileCrawler {
    sample_rows: usize,
    recursive: bool,
    inferrer: SchemaInferrer,
}

impl FileCrawler {
    pub fn new(config: &FilesConfig) -> Self {
        Self {
            sample_rows: config.sample_rows,
            recursive: config.recursive,
            inferrer: SchemaInferrer::new(config.max_sample_chars),
        }
    }

    /// Crawl a single file
    pub fn crawl(&self, path: &Path) -> CrawlOutcome {
        let name = file_basename(path);
        debug!("Crawling file: {}", path.display());

        match self.describe(path) {
            Ok(metadata) => {
                let lineage = vec![LineageOp::Node {
                    name: name.clone(),
                    node_type: NodeType::File,
                    source: path.display().to_string(),
                }];
                let record = MetadataRecord::new(RecordPayload::File(metadata));
                CrawlOutcome::succeeded(
                    SourceType::File,
                    record,
                    lineage,
                    format!("Successfully crawled file: {}", name),
                )
            }
            Err(e) => {
                warn!("File crawl of {} failed: {}", path.display(), e);
                CrawlOutcome::failed(SourceType::File, Vec::new(), e)
            }
        }
    }

    /// Crawl every file independently; one failure never stops the batch
    pub fn crawl_files(&self, paths: &[PathBuf]) -> Vec<CrawlOutcome> {
        let files = self.expand_paths(paths);
        info!("Crawling {} files", files.len());

        let progress = start_progress_bar(files.len(), "Crawling files");
        let mut outcomes = Vec::with_capacity(files.len());
        for file in &files {
            outcomes.push(self.crawl(file));
            advance_progress(&progress);
        }
        finish_progress(progress, "Files crawled");

        outcomes
    }

    /// Replace directories with the supported files they contain
    pub fn expand_paths(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in paths {
            if !path.is_dir() {
                files.push(path.clone());
                continue;
            }

            let walker = WalkDir::new(path)
                .max_depth(if self.recursive { usize::MAX } else { 1 })
                .sort_by_file_name();
            for entry in walker {
                match entry {
                    Ok(e) if e.file_type().is_file() && is_supported(e.path()) => {
                        files.push(e.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable entry under {}: {}", path.display(), e),
                }
            }
        }
        files
    }

    fn describe(&self, path: &Path) -> Result<FileMetadata> {
        let stat = fs::metadata(path)?;
        let modified = stat.modified().ok().map(DateTime::<Utc>::from);
        let extension = normalized_extension(path);

        let schema = match extension.as_str() {
            ".csv" => Some(self.csv_schema(path)?),
            ".xlsx" | ".xls" => Some(self.spreadsheet_schema(path)?),
            ".json" => Some(self.json_schema(path)?),
            _ => None,
        };

        Ok(FileMetadata {
            path: path.to_path_buf(),
            extension,
            size: stat.len(),
            modified,
            schema,
        })
    }

    fn csv_schema(&self, path: &Path) -> Result<Schema> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = unique_headers(reader.headers()?.iter().map(str::to_string));

        let mut rows = Vec::with_capacity(self.sample_rows);
        for record in reader.records().take(self.sample_rows) {
            let record = record?;
            rows.push(record.iter().map(TabularCell::parse).collect());
        }
        Ok(self.inferrer.infer_tabular(&headers, &rows))
    }

    fn spreadsheet_schema(&self, path: &Path) -> Result<Schema> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Spreadsheet(format!("{} has no worksheets", path.display())))??;

        let mut rows_iter = range.rows();
        let Some(header_row) = rows_iter.next() else {
            return Ok(Schema::new());
        };
        let headers = unique_headers(header_row.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        }));

        let rows: Vec<Vec<TabularCell>> = rows_iter
            .take(self.sample_rows)
            .map(|row| row.iter().map(spreadsheet_cell).collect())
            .collect();
        Ok(self.inferrer.infer_tabular(&headers, &rows))
    }

    fn json_schema(&self, path: &Path) -> Result<Schema> {
        let reader = BufReader::new(fs::File::open(path)?);
        let data: serde_json::Value = serde_json::from_reader(reader)?;
        Ok(self.inferrer.infer_json(&data))
    }
}

fn spreadsheet_cell(cell: &Data) -> TabularCell {
    match cell {
        Data::Empty => TabularCell::Empty,
        Data::Bool(b) => TabularCell::Bool(*b),
        Data::Int(i) => TabularCell::Int(*i),
        Data::Float(f) => TabularCell::Float(*f),
        Data::String(s) if s.trim().is_empty() => TabularCell::Empty,
        Data::String(s) => TabularCell::Text(s.clone()),
        other => TabularCell::Text(other.to_string()),
    }
}

/// Name blank headers by position and suffix repeated ones (`id`, `id.1`)
fn unique_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (idx, header) in raw.enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}
