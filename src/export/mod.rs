//! Workbook export
//!
//! The catalog is rendered into three sheets with fixed headers:
//! - "Data Dictionary": one row per dictionary entry
//! - "Metadata Summary": one row per source type
//! - "Lineage Map": one row per lineage edge
//!
//! Sheets are written through a [`WorkbookSink`]; [`XlsxSink`] renders the
//! workbook in memory and moves it into place only once it is complete.

use crate::catalog::DataDictionary;
use crate::error::{Error, Result};
use crate::lineage::EdgeView;
use crate::meta::SourceType;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DICTIONARY_SHEET: &str = "Data Dictionary";
pub const SUMMARY_SHEET: &str = "Metadata Summary";
pub const LINEAGE_SHEET: &str = "Lineage Map";

pub const DICTIONARY_HEADERS: &[&str] = &[
    "Field",
    "Source",
    "Type",
    "Table/File",
    "Column",
    "Data Type",
    "Nullable",
];
pub const SUMMARY_HEADERS: &[&str] = &["Source Type", "Count", "Details"];
pub const LINEAGE_HEADERS: &[&str] = &["From", "To", "Relationship"];

const HEADER_FILL: u32 = 0x366092;
const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// One sheet: a header row followed by data rows
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    /// Width per column: longest value plus padding, capped
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(idx) {
                    *width = (*width).max(cell.display_len());
                }
            }
        }
        widths
            .into_iter()
            .map(|w| (w + 2).min(MAX_COLUMN_WIDTH))
            .collect()
    }
}

/// Destination for rendered sheets
pub trait WorkbookSink {
    fn write_sheet(&mut self, sheet: &SheetData) -> Result<()>;

    /// Persist every sheet written so far
    fn save(&mut self, path: &Path) -> Result<()>;
}

/// `.xlsx` sink backed by rust_xlsxwriter
pub struct XlsxSink {
    workbook: Workbook,
    header_format: Format,
}

impl Default for XlsxSink {
    fn default() -> Self {
        Self::new()
    }
}

impl XlsxSink {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            header_format: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_align(FormatAlign::Center),
        }
    }
}

impl WorkbookSink for XlsxSink {
    fn write_sheet(&mut self, sheet: &SheetData) -> Result<()> {
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &self.header_format)?;
        }

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let row_num = row_idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Text(s) => {
                        worksheet.write_string(row_num, col as u16, s)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(row_num, col as u16, *n)?;
                    }
                }
            }
        }

        for (col, width) in sheet.column_widths().into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width as f64)?;
        }

        debug!("Wrote sheet '{}' with {} rows", sheet.name, sheet.rows.len());
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.workbook.save_to_buffer()?;
        write_atomic(path, &bytes)
    }
}

/// Write through a sibling temporary file, then rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path)?;
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
    Ok(path.with_file_name(format!(".{}.tmp", name.to_string_lossy())))
}

pub fn dictionary_sheet(dictionary: &DataDictionary) -> SheetData {
    let rows = dictionary
        .iter()
        .map(|(key, entry)| {
            vec![
                CellValue::from(key.as_str()),
                CellValue::from(entry.source.as_str()),
                CellValue::from(entry.source_type.as_str()),
                CellValue::from(entry.table_or_field()),
                CellValue::from(entry.column()),
                CellValue::from(entry.data_type.as_str()),
                CellValue::from(entry.nullable().map(|n| n.to_string()).unwrap_or_default()),
            ]
        })
        .collect();

    SheetData {
        name: DICTIONARY_SHEET,
        headers: DICTIONARY_HEADERS,
        rows,
    }
}

pub fn summary_sheet(summary: &[(SourceType, usize)]) -> SheetData {
    let rows = summary
        .iter()
        .map(|(source_type, count)| {
            vec![
                CellValue::from(source_type.as_str()),
                CellValue::Number(*count as f64),
                CellValue::from(format!("{} {}(s) crawled", count, source_type)),
            ]
        })
        .collect();

    SheetData {
        name: SUMMARY_SHEET,
        headers: SUMMARY_HEADERS,
        rows,
    }
}

pub fn lineage_sheet(edges: &[EdgeView]) -> SheetData {
    let rows = edges
        .iter()
        .map(|edge| {
            vec![
                CellValue::from(edge.from.as_str()),
                CellValue::from(edge.to.as_str()),
                CellValue::from(edge.relationship.to_string()),
            ]
        })
        .collect();

    SheetData {
        name: LINEAGE_SHEET,
        headers: LINEAGE_HEADERS,
        rows,
    }
}

/// Render all three sheets into `sink` and save to `path`
pub fn write_workbook<S: WorkbookSink>(
    sink: &mut S,
    path: &Path,
    dictionary: &DataDictionary,
    summary: &[(SourceType, usize)],
    edges: &[EdgeView],
) -> Result<()> {
    sink.write_sheet(&dictionary_sheet(dictionary))?;
    sink.write_sheet(&summary_sheet(summary))?;
    sink.write_sheet(&lineage_sheet(edges))?;
    sink.save(path)?;

    info!(
        "Exported {} dictionary entries and {} lineage edges to {}",
        dictionary.len(),
        edges.len(),
        path.display()
    );
    Ok(())
}

/// Export to an `.xlsx` file
pub fn export_xlsx(
    path: &Path,
    dictionary: &DataDictionary,
    summary: &[(SourceType, usize)],
    edges: &[EdgeView],
) -> Result<()> {
    write_workbook(&mut XlsxSink::new(), path, dictionary, summary, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DictionaryEntry, EntryContext};
    use crate::lineage::Relationship;
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        sheets: Vec<SheetData>,
        saved: Option<PathBuf>,
    }

    impl WorkbookSink for RecordingSink {
        fn write_sheet(&mut self, sheet: &SheetData) -> Result<()> {
            self.sheets.push(sheet.clone());
            Ok(())
        }

        fn save(&mut self, path: &Path) -> Result<()> {
            self.saved = Some(path.to_path_buf());
            Ok(())
        }
    }

    fn sample_dictionary() -> DataDictionary {
        let mut dictionary = DataDictionary::new();
        dictionary.insert(
            "orders.customer_id".to_string(),
            DictionaryEntry {
                source: "sqlite://shop.db".to_string(),
                source_type: SourceType::Database,
                data_type: "INTEGER".to_string(),
                context: EntryContext::Column {
                    table: "orders".to_string(),
                    column: "customer_id".to_string(),
                    nullable: false,
                },
            },
        );
        dictionary.insert(
            "users.csv.email".to_string(),
            DictionaryEntry {
                source: "/data/users.csv".to_string(),
                source_type: SourceType::File,
                data_type: "string".to_string(),
                context: EntryContext::Field {
                    field: "email".to_string(),
                },
            },
        );
        dictionary
    }

    fn sample_edges() -> Vec<EdgeView> {
        vec![EdgeView {
            from: "orders".to_string(),
            to: "customers".to_string(),
            relationship: Relationship::ForeignKey,
        }]
    }

    #[test]
    fn test_sheet_rows() {
        let mut sink = RecordingSink::default();
        write_workbook(
            &mut sink,
            Path::new("out.xlsx"),
            &sample_dictionary(),
            &[(SourceType::Database, 1), (SourceType::File, 1)],
            &sample_edges(),
        )
        .unwrap();

        assert_eq!(sink.saved, Some(PathBuf::from("out.xlsx")));
        let names: Vec<&str> = sink.sheets.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![DICTIONARY_SHEET, SUMMARY_SHEET, LINEAGE_SHEET]);

        let dictionary = &sink.sheets[0];
        assert_eq!(dictionary.rows[0][3], CellValue::from("orders"));
        assert_eq!(dictionary.rows[0][6], CellValue::from("false"));
        assert_eq!(dictionary.rows[1][3], CellValue::from("email"));
        assert_eq!(dictionary.rows[1][4], CellValue::from(""));
        assert_eq!(dictionary.rows[1][6], CellValue::from(""));

        let summary = &sink.sheets[1];
        assert_eq!(summary.rows[0][1], CellValue::Number(1.0));
        assert_eq!(summary.rows[0][2], CellValue::from("1 database(s) crawled"));

        assert_eq!(
            sink.sheets[2].rows[0],
            vec![
                CellValue::from("orders"),
                CellValue::from("customers"),
                CellValue::from("foreign_key"),
            ]
        );
    }

    #[test]
    fn test_column_widths_capped() {
        let sheet = SheetData {
            name: LINEAGE_SHEET,
            headers: LINEAGE_HEADERS,
            rows: vec![vec![
                CellValue::from("x".repeat(80)),
                CellValue::from("ab"),
                CellValue::from("foreign_key"),
            ]],
        };
        assert_eq!(sheet.column_widths(), vec![50, 4, 14]);
    }

    #[test]
    fn test_xlsx_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("export.xlsx");

        export_xlsx(
            &path,
            &sample_dictionary(),
            &[(SourceType::Database, 1)],
            &sample_edges(),
        )
        .unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![DICTIONARY_SHEET, SUMMARY_SHEET, LINEAGE_SHEET]
        );

        let range = workbook.worksheet_range(DICTIONARY_SHEET).unwrap();
        assert_eq!(range.height(), 3);
        assert_eq!(range.get((0, 0)), Some(&Data::String("Field".to_string())));
        assert_eq!(
            range.get((1, 0)),
            Some(&Data::String("orders.customer_id".to_string()))
        );

        let lineage = workbook.worksheet_range(LINEAGE_SHEET).unwrap();
        assert_eq!(lineage.get((1, 2)), Some(&Data::String("foreign_key".to_string())));

        // No temporary file is left behind
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_export_has_headers_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.xlsx");

        export_xlsx(&path, &DataDictionary::new(), &[], &[]).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        for (sheet, headers) in [
            (DICTIONARY_SHEET, DICTIONARY_HEADERS),
            (SUMMARY_SHEET, SUMMARY_HEADERS),
            (LINEAGE_SHEET, LINEAGE_HEADERS),
        ] {
            let range = workbook.worksheet_range(sheet).unwrap();
            assert_eq!(range.height(), 1);
            assert_eq!(range.width(), headers.len());
            assert_eq!(range.get((0, 0)), Some(&Data::String(headers[0].to_string())));
        }
    }

    #[test]
    fn test_failed_save_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        // A directory occupies the target path, so the rename fails
        let path = tmp.path().join("taken.xlsx");
        std::fs::create_dir(&path).unwrap();

        let result = export_xlsx(&path, &DataDictionary::new(), &[], &[]);
        assert!(result.is_err());
        assert!(!tmp.path().join(".taken.xlsx.tmp").exists());
    }
}
