//! Column inference over small tabular samples

use super::{InferredField, Schema, SchemaInferrer, ValueKind};

static EMPTY_CELL: TabularCell = TabularCell::Empty;

/// A single sampled cell
#[derive(Debug, Clone, PartialEq)]
pub enum TabularCell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl TabularCell {
    /// Classify a raw text cell (CSV input)
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return TabularCell::Empty;
        }
        match trimmed {
            "true" | "True" | "TRUE" => return TabularCell::Bool(true),
            "false" | "False" | "FALSE" => return TabularCell::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return TabularCell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return TabularCell::Float(f);
            }
        }
        TabularCell::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TabularCell::Empty)
    }

    fn kind(&self) -> ValueKind {
        match self {
            TabularCell::Empty => ValueKind::Null,
            TabularCell::Bool(_) => ValueKind::Boolean,
            TabularCell::Int(_) | TabularCell::Float(_) => ValueKind::Number,
            TabularCell::Text(_) => ValueKind::String,
        }
    }

    fn render(&self) -> Option<String> {
        match self {
            TabularCell::Empty => None,
            TabularCell::Bool(b) => Some(b.to_string()),
            TabularCell::Int(i) => Some(i.to_string()),
            TabularCell::Float(f) => Some(f.to_string()),
            TabularCell::Text(s) => Some(s.clone()),
        }
    }
}

/// Column kind over all sampled cells
fn column_kind<'a>(cells: impl Iterator<Item = &'a TabularCell>) -> ValueKind {
    let mut kind = ValueKind::Null;
    for cell in cells {
        let cell_kind = cell.kind();
        kind = match (kind, cell_kind) {
            (k, ValueKind::Null) => k,
            (ValueKind::Null, k) => k,
            (a, b) if a == b => a,
            _ => return ValueKind::String,
        };
    }
    kind
}

impl SchemaInferrer {
    /// Infer one field per column from sampled rows.
    ///
    /// Rows shorter than the header are padded with empty cells.
    pub fn infer_tabular(&self, headers: &[String], rows: &[Vec<TabularCell>]) -> Schema {
        let mut schema = Schema::new();
        for (idx, header) in headers.iter().enumerate() {
            let column = || {
                rows.iter()
                    .map(move |row| row.get(idx).unwrap_or(&EMPTY_CELL))
            };

            let null_count = column().filter(|cell| cell.is_empty()).count();
            let sample = rows
                .first()
                .and_then(|row| row.get(idx))
                .and_then(TabularCell::render)
                .map(|s| self.truncate(&s));

            schema.insert(
                header.clone(),
                InferredField {
                    kind: column_kind(column()),
                    sample,
                    null_count: Some(null_count),
                },
            );
        }
        schema
    }
}

/// Infer a tabular schema with default settings
pub fn infer_tabular(headers: &[String], rows: &[Vec<TabularCell>]) -> Schema {
    SchemaInferrer::default().infer_tabular(headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(raw: &[&str]) -> Vec<TabularCell> {
        raw.iter().map(|s| TabularCell::parse(s)).collect()
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(TabularCell::parse(""), TabularCell::Empty);
        assert_eq!(TabularCell::parse("  "), TabularCell::Empty);
        assert_eq!(TabularCell::parse("42"), TabularCell::Int(42));
        assert_eq!(TabularCell::parse("4.5"), TabularCell::Float(4.5));
        assert_eq!(TabularCell::parse("True"), TabularCell::Bool(true));
        assert_eq!(TabularCell::parse("NaN"), TabularCell::Text("NaN".into()));
        assert_eq!(TabularCell::parse("abc"), TabularCell::Text("abc".into()));
    }

    #[test]
    fn test_column_kinds_and_null_counts() {
        let schema = infer_tabular(
            &headers(&["id", "price", "active", "name", "empty", "mixed"]),
            &[
                row(&["1", "9.99", "true", "Widget", "", "7"]),
                row(&["2", "", "false", "Gadget", "", "seven"]),
                row(&["3", "4", "", "", "", "8"]),
            ],
        );

        assert_eq!(schema["id"].kind, ValueKind::Number);
        assert_eq!(schema["id"].null_count, Some(0));
        assert_eq!(schema["price"].kind, ValueKind::Number);
        assert_eq!(schema["price"].null_count, Some(1));
        assert_eq!(schema["active"].kind, ValueKind::Boolean);
        assert_eq!(schema["name"].kind, ValueKind::String);
        assert_eq!(schema["empty"].kind, ValueKind::Null);
        assert_eq!(schema["empty"].null_count, Some(3));
        assert_eq!(schema["mixed"].kind, ValueKind::String);
    }

    #[test]
    fn test_sample_comes_from_first_row() {
        let schema = infer_tabular(
            &headers(&["a", "b"]),
            &[row(&["", "x"]), row(&["5", "y"])],
        );
        assert_eq!(schema["a"].sample, None);
        assert_eq!(schema["b"].sample.as_deref(), Some("x"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let schema = infer_tabular(&headers(&["a", "b"]), &[row(&["1"])]);
        assert_eq!(schema["b"].null_count, Some(1));
        assert_eq!(schema["b"].kind, ValueKind::Null);
    }

    #[test]
    fn test_headers_without_rows() {
        let schema = infer_tabular(&headers(&["a"]), &[]);
        assert_eq!(schema["a"].kind, ValueKind::Null);
        assert_eq!(schema["a"].sample, None);
        assert_eq!(schema["a"].null_count, Some(0));
    }
}
