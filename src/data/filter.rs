use serde_json::{Map, Value as JsonValue};

use super::model::{projection, CellValue, ColumnId, Table};

// ---------------------------------------------------------------------------
// QuerySpec – the user's keyword
// ---------------------------------------------------------------------------

/// A trimmed, non-blank keyword. A blank input is "no query yet", so the
/// caller shows a prompt instead of filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    keyword: String,
    needle: String,
}

impl QuerySpec {
    pub fn new(raw: &str) -> Option<Self> {
        let keyword = raw.trim();
        if keyword.is_empty() {
            return None;
        }
        Some(Self {
            keyword: keyword.to_string(),
            needle: keyword.to_lowercase(),
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Case-insensitive plain substring test against the cell's text form.
    /// Nulls never match.
    pub fn matches(&self, cell: &CellValue) -> bool {
        if cell.is_null() {
            return false;
        }
        cell.to_string().to_lowercase().contains(&self.needle)
    }
}

// ---------------------------------------------------------------------------
// ResultSet – matching rows in display order
// ---------------------------------------------------------------------------

/// Matching rows projected to [`projection`]. An empty result is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Vec<ColumnId>,
    rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The lone matching row as an ordered `{column: value}` object.
    pub fn single_record(&self) -> Option<JsonValue> {
        let [row] = self.rows.as_slice() else {
            return None;
        };
        let record: Map<String, JsonValue> = self
            .columns
            .iter()
            .zip(row)
            .map(|(col, cell)| {
                (
                    col.to_string(),
                    serde_json::to_value(cell).unwrap_or_default(),
                )
            })
            .collect();
        Some(JsonValue::Object(record))
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Indices of rows whose key column contains the keyword, in source order.
pub fn matching_indices(table: &Table, query: &QuerySpec) -> Vec<usize> {
    let Some(key_idx) = table.column_index(&ColumnId::key()) else {
        return Vec::new();
    };
    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| query.matches(&row[key_idx]))
        .map(|(i, _)| i)
        .collect()
}

/// Filter `table` by `query` and project the fixed output columns.
///
/// Columns the table lacks (possible only when load-time validation is off)
/// come out as nulls so the column order never changes.
pub fn filter(table: &Table, query: &QuerySpec) -> ResultSet {
    let columns = projection();
    let sources: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();

    let rows = matching_indices(table, query)
        .into_iter()
        .map(|i| {
            let row = &table.rows()[i];
            sources
                .iter()
                .map(|src| src.map_or(CellValue::Null, |j| row[j].clone()))
                .collect()
        })
        .collect();

    ResultSet { columns, rows }
}
