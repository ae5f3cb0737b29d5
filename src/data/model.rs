use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::encoding::TextEncoding;

/// Header label of the column matched against the keyword.
pub const KEY_COLUMN: &str = "載運數量";

/// Header label of the low-quantity subsidy column.
pub const SUBSIDY_COLUMN: &str = "低米數補貼";

/// Highest pricing tier; tiers run `1..=MAX_TIER`.
pub const MAX_TIER: u8 = 8;

// ---------------------------------------------------------------------------
// ColumnId – a header cell
// ---------------------------------------------------------------------------

/// Price lists mix named columns with bare tier numbers `1`–`8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnId {
    Named(String),
    Tier(u8),
}

impl ColumnId {
    pub fn key() -> Self {
        ColumnId::Named(KEY_COLUMN.to_string())
    }

    pub fn subsidy() -> Self {
        ColumnId::Named(SUBSIDY_COLUMN.to_string())
    }

    /// Classify a header label. `"3"` (or `"3.0"` from spreadsheet tools)
    /// becomes `Tier(3)`; anything else keeps its trimmed text.
    pub fn parse(label: &str) -> Self {
        let label = label.trim_start_matches('\u{feff}').trim();
        if let Some(tier) = tier_from_str(label) {
            return ColumnId::Tier(tier);
        }
        ColumnId::Named(label.to_string())
    }

    /// Header for a numeric cell, as spreadsheets store `1`..`8` as numbers.
    pub fn from_number(n: f64) -> Self {
        if n.fract() == 0.0 && (1.0..=f64::from(MAX_TIER)).contains(&n) {
            ColumnId::Tier(n as u8)
        } else {
            ColumnId::Named(CellValue::Float(n).to_string())
        }
    }
}

fn tier_from_str(s: &str) -> Option<u8> {
    if let Ok(i) = s.parse::<u8>() {
        return (1..=MAX_TIER).contains(&i).then_some(i);
    }
    // Float headers like "8.0" only; "8.5" stays a name.
    let f = s.parse::<f64>().ok()?;
    (f.fract() == 0.0 && (1.0..=f64::from(MAX_TIER)).contains(&f)).then_some(f as u8)
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnId::Named(s) => write!(f, "{s}"),
            ColumnId::Tier(t) => write!(f, "{t}"),
        }
    }
}

/// Output columns, in display order: key, tiers 8 down to 1, subsidy.
pub fn projection() -> Vec<ColumnId> {
    let mut cols = Vec::with_capacity(MAX_TIER as usize + 2);
    cols.push(ColumnId::key());
    cols.extend((1..=MAX_TIER).rev().map(ColumnId::Tier));
    cols.push(ColumnId::subsidy());
    cols
}

// ---------------------------------------------------------------------------
// CellValue – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a dataframe would infer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// How every non-null cell of a column reads once written out as text.
///
/// A column is numeric only when all of its cells are; one label such as
/// `"0800"` or `"宜蘭市"` keeps the whole column as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn of<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut kind = ColumnKind::Integer;
        for field in fields {
            if has_leading_zero(field) {
                return ColumnKind::Text;
            }
            if kind == ColumnKind::Integer && field.parse::<i64>().is_ok() {
                continue;
            }
            // Reject "NaN"/"inf" spellings so place names never turn numeric.
            match field.parse::<f64>() {
                Ok(f) if f.is_finite() => kind = ColumnKind::Float,
                _ => return ColumnKind::Text,
            }
        }
        kind
    }

    fn cell(self, field: String) -> CellValue {
        match self {
            ColumnKind::Integer => match field.parse() {
                Ok(i) => CellValue::Integer(i),
                Err(_) => CellValue::Text(field),
            },
            ColumnKind::Float => match field.parse() {
                Ok(f) => CellValue::Float(f),
                Err(_) => CellValue::Text(field),
            },
            ColumnKind::Text => CellValue::Text(field),
        }
    }
}

/// Zero-padded codes like `0800` are labels, not numbers.
fn has_leading_zero(field: &str) -> bool {
    let digits = field.strip_prefix('-').unwrap_or(field).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

/// Empty for `Null`; floats always carry a decimal point so they read back as floats.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:?}"),
            CellValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the loaded price list
// ---------------------------------------------------------------------------

/// Row-major table. Every row holds exactly `columns.len()` cells, and each
/// column holds a single kind of value: all integers, all floats or all
/// text, with `Null` for blanks. Location names are always text.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<ColumnId>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, padding short rows with `Null` and typing each column
    /// as a whole from the text form of its cells. Empty text is `Null`, and
    /// the key column is always text.
    ///
    /// The result is exactly what its own delimited-text rendering reads back
    /// as, whatever format the cells came from.
    ///
    /// Returns the index of the first row that is wider than the header.
    pub fn new(columns: Vec<ColumnId>, rows: Vec<Vec<CellValue>>) -> Result<Self, usize> {
        let width = columns.len();
        let mut fields: Vec<Vec<Option<String>>> = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(i);
            }
            let mut texts: Vec<Option<String>> = row
                .into_iter()
                .map(|cell| match cell {
                    CellValue::Null => None,
                    CellValue::Text(s) if s.is_empty() => None,
                    CellValue::Text(s) => Some(s),
                    other => Some(other.to_string()),
                })
                .collect();
            texts.resize(width, None);
            fields.push(texts);
        }

        let key = ColumnId::key();
        let kinds: Vec<ColumnKind> = columns
            .iter()
            .enumerate()
            .map(|(col, id)| {
                if *id == key {
                    ColumnKind::Text
                } else {
                    ColumnKind::of(fields.iter().filter_map(|row| row[col].as_deref()))
                }
            })
            .collect();
        let rows = fields
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&kinds)
                    .map(|(field, kind)| field.map_or(CellValue::Null, |f| kind.cell(f)))
                    .collect()
            })
            .collect();
        Ok(Table { columns, rows })
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Position of a column; the first one wins if a header repeats.
    pub fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c == id)
    }

    /// Required columns absent from this table, in projection order.
    pub fn missing_columns(&self, required: &[ColumnId]) -> Vec<ColumnId> {
        required
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SourceDescriptor – a table plus where it came from
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub table: Arc<Table>,
    /// File name shown in the caption.
    pub source_name: String,
    /// Resolved path when the table came from a directory scan.
    pub path: Option<PathBuf>,
    /// Text encoding that decoded the file (delimited text only).
    pub encoding: Option<TextEncoding>,
}
