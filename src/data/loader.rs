use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::encoding::{EncodingStrategy, TextEncoding};
use super::model::{projection, CellValue, ColumnId, SourceDescriptor, Table};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// On-disk formats a price list can come in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    Csv,
    Xlsx,
    Parquet,
}

impl SourceFormat {
    /// File-name glob used when scanning the search directory.
    pub fn default_pattern(self) -> &'static str {
        match self {
            SourceFormat::Csv => "新報價*.csv",
            SourceFormat::Xlsx => "新報價*.xlsx",
            SourceFormat::Parquet => "新報價*.parquet",
        }
    }

    /// Dispatch by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" => Some(SourceFormat::Xlsx),
            "parquet" | "pq" => Some(SourceFormat::Parquet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub format: SourceFormat,
    pub encoding: EncodingStrategy,
    /// Reject tables lacking the key, tier or subsidy columns.
    pub validate_columns: bool,
    /// Overrides the format's default file-name glob.
    pub pattern: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            format: SourceFormat::Csv,
            encoding: EncodingStrategy::default(),
            validate_columns: true,
            pattern: None,
        }
    }
}

impl LoaderConfig {
    pub fn pattern(&self) -> &str {
        self.pattern
            .as_deref()
            .unwrap_or_else(|| self.format.default_pattern())
    }
}

// ---------------------------------------------------------------------------
// Source providers
// ---------------------------------------------------------------------------

/// Where the next table comes from.
#[derive(Debug, Clone)]
pub enum SourceProvider {
    /// An uploaded payload with its declared format.
    FromBytes {
        name: String,
        bytes: Vec<u8>,
        format: SourceFormat,
    },
    /// The newest file in `dir` whose name matches `pattern`.
    FromDirectoryScan { dir: PathBuf, pattern: String },
}

impl SourceProvider {
    pub fn scan(dir: impl Into<PathBuf>, config: &LoaderConfig) -> Self {
        SourceProvider::FromDirectoryScan {
            dir: dir.into(),
            pattern: config.pattern().to_string(),
        }
    }

    /// Read a user-picked file into memory, taking its format from the extension.
    pub fn upload(path: &Path) -> Result<Self, LoadError> {
        let name = display_name(path);
        let format = SourceFormat::from_path(path).ok_or_else(|| {
            LoadError::malformed(&name, "unsupported file type (expected .csv, .xlsx or .parquet)")
        })?;
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SourceProvider::FromBytes {
            name,
            bytes,
            format,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Directory discovery
// ---------------------------------------------------------------------------

/// A file that matched the search pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

/// List regular files in `dir` whose name matches `pattern`.
/// A missing directory simply has no candidates.
pub fn scan_directory(dir: &Path, pattern: &str) -> Result<Vec<Candidate>, LoadError> {
    let matcher = glob::Pattern::new(pattern).map_err(|source| LoadError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_err)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !matcher.matches(name) {
            continue;
        }
        // Follow symlinks so a linked price list still counts.
        let meta = std::fs::metadata(&path).map_err(io_err)?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().map_err(io_err)?;
        candidates.push(Candidate {
            path,
            modified,
            len: meta.len(),
        });
    }
    Ok(candidates)
}

/// Newest candidate by modification time; equal times go to the
/// lexicographically greatest file name.
pub fn select_latest(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    })
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    File {
        path: PathBuf,
        modified: SystemTime,
        len: u64,
    },
    Payload {
        name: String,
        len: usize,
        digest: u64,
    },
}

impl CacheKey {
    fn payload(name: &str, bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        CacheKey::Payload {
            name: name.to_string(),
            len: bytes.len(),
            digest: hasher.finish(),
        }
    }

    /// Same path on disk, or same upload name.
    fn same_source(&self, other: &CacheKey) -> bool {
        match (self, other) {
            (CacheKey::File { path: a, .. }, CacheKey::File { path: b, .. }) => a == b,
            (CacheKey::Payload { name: a, .. }, CacheKey::Payload { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Cached {
    table: Arc<Table>,
    encoding: Option<TextEncoding>,
}

/// Parsed tables keyed by file identity. A file that changes on disk, or an
/// upload re-sent under the same name with new bytes, gets a new key and
/// evicts the entry for its old version.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: HashMap<CacheKey, Cached>,
}

impl LoadCache {
    fn get(&self, key: &CacheKey) -> Option<&Cached> {
        self.entries.get(key)
    }

    /// The newest version of a file or upload replaces any older one.
    fn insert(&mut self, key: CacheKey, value: Cached) {
        self.entries.retain(|k, _| !k.same_source(&key));
        self.entries.insert(key, value);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub struct Loader {
    config: LoaderConfig,
    cache: LoadCache,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            cache: LoadCache::default(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    /// Resolve `provider` to a validated table.
    pub fn load(&mut self, provider: &SourceProvider) -> Result<SourceDescriptor, LoadError> {
        match provider {
            SourceProvider::FromBytes {
                name,
                bytes,
                format,
            } => {
                let key = CacheKey::payload(name, bytes);
                self.load_with(key, name, None, *format, || Ok(Cow::Borrowed(bytes.as_slice())))
            }
            SourceProvider::FromDirectoryScan { dir, pattern } => {
                let latest = select_latest(scan_directory(dir, pattern)?).ok_or_else(|| {
                    LoadError::NoSourceFound {
                        dir: dir.clone(),
                        pattern: pattern.clone(),
                    }
                })?;
                log::debug!("Newest match for `{pattern}`: {}", latest.path.display());

                let name = display_name(&latest.path);
                let format = SourceFormat::from_path(&latest.path).unwrap_or(self.config.format);
                let key = CacheKey::File {
                    path: latest.path.clone(),
                    modified: latest.modified,
                    len: latest.len,
                };
                let path = latest.path;
                self.load_with(key, &name, Some(path.clone()), format, || {
                    std::fs::read(&path)
                        .map(Cow::Owned)
                        .map_err(|source| LoadError::Io {
                            path: path.clone(),
                            source,
                        })
                })
            }
        }
    }

    fn load_with<'a>(
        &mut self,
        key: CacheKey,
        name: &str,
        path: Option<PathBuf>,
        format: SourceFormat,
        read: impl FnOnce() -> Result<Cow<'a, [u8]>, LoadError>,
    ) -> Result<SourceDescriptor, LoadError> {
        let cached = match self.cache.get(&key) {
            Some(hit) => {
                log::debug!("Cache hit for {name}");
                hit.clone()
            }
            None => {
                let bytes = read()?;
                let (table, encoding) = parse_bytes(&bytes, name, format, &self.config.encoding)?;
                let entry = Cached {
                    table: Arc::new(table),
                    encoding,
                };
                self.cache.insert(key, entry.clone());
                entry
            }
        };

        if self.config.validate_columns {
            validate_columns(&cached.table, name)?;
        }

        log::info!(
            "Loaded {} rows x {} columns from {name}{}",
            cached.table.len(),
            cached.table.columns().len(),
            cached
                .encoding
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );

        Ok(SourceDescriptor {
            table: cached.table,
            source_name: name.to_string(),
            path,
            encoding: cached.encoding,
        })
    }
}

/// The table must carry every projected column.
pub fn validate_columns(table: &Table, source_name: &str) -> Result<(), LoadError> {
    let missing = table.missing_columns(&projection());
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns {
            source_name: source_name.to_string(),
            missing,
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_bytes(
    bytes: &[u8],
    name: &str,
    format: SourceFormat,
    encoding: &EncodingStrategy,
) -> Result<(Table, Option<TextEncoding>), LoadError> {
    match format {
        SourceFormat::Csv => {
            parse_delimited(bytes, name, encoding).map(|(table, enc)| (table, Some(enc)))
        }
        SourceFormat::Xlsx => parse_spreadsheet(bytes, name).map(|t| (t, None)),
        SourceFormat::Parquet => parse_parquet(bytes, name).map(|t| (t, None)),
    }
}

/// Decode with each candidate encoding in turn; the first that yields a
/// well-formed table wins.
fn parse_delimited(
    bytes: &[u8],
    name: &str,
    strategy: &EncodingStrategy,
) -> Result<(Table, TextEncoding), LoadError> {
    let mut structural = None;
    for &enc in strategy.candidates() {
        let Some(text) = enc.decode(bytes) else {
            log::debug!("{name}: not valid {enc}");
            continue;
        };
        match parse_csv(&text, name) {
            Ok(table) => return Ok((table, enc)),
            Err(e) => {
                log::warn!("{name}: decoded as {enc} but did not parse: {e}");
                structural = Some(e);
            }
        }
    }
    Err(structural.unwrap_or_else(|| LoadError::UnreadableEncoding {
        source_name: name.to_string(),
        tried: strategy.candidates().to_vec(),
    }))
}

/// Header row plus cells, typed per column by [`Table::new`]. Short rows are
/// padded with nulls.
pub(crate) fn parse_csv(text: &str, name: &str) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LoadError::malformed(name, format!("reading header: {e}")))?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::malformed(name, "no header row"));
    }
    let columns: Vec<ColumnId> = headers.iter().map(ColumnId::parse).collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| LoadError::malformed(name, format!("row {}: {e}", row_no + 1)))?;
        rows.push(record.iter().map(|f| CellValue::Text(f.to_string())).collect());
    }

    into_table(columns, rows, name)
}

fn into_table(
    columns: Vec<ColumnId>,
    rows: Vec<Vec<CellValue>>,
    name: &str,
) -> Result<Table, LoadError> {
    Table::new(columns, rows).map_err(|row| {
        LoadError::malformed(name, format!("row {} has more fields than the header", row + 1))
    })
}

// -- Spreadsheet --

/// First worksheet; its first row is the header.
fn parse_spreadsheet(bytes: &[u8], name: &str) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::malformed(name, format!("opening spreadsheet: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::malformed(name, "workbook has no worksheets"))?
        .map_err(|e| LoadError::malformed(name, format!("reading first worksheet: {e}")))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| LoadError::malformed(name, "no header row"))?;
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_from_cell(cell, i))
        .collect();
    let body = rows
        .map(|row| row.iter().map(cell_from_spreadsheet).collect())
        .collect();

    into_table(columns, body, name)
}

fn header_from_cell(cell: &Data, index: usize) -> ColumnId {
    match cell {
        Data::Int(i) => ColumnId::from_number(*i as f64),
        Data::Float(f) => ColumnId::from_number(*f),
        Data::Empty => ColumnId::Named(format!("Unnamed: {index}")),
        other => ColumnId::parse(&other.to_string()),
    }
}

fn cell_from_spreadsheet(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Integer(*i),
        // Spreadsheets store every number as a float; keep whole prices integral.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

// -- Parquet --

fn parse_parquet(bytes: &[u8], name: &str) -> Result<Table, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes.to_vec()))
        .map_err(|e| LoadError::malformed(name, format!("reading parquet metadata: {e}")))?;
    let columns: Vec<ColumnId> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| ColumnId::parse(f.name()))
        .collect();
    let reader = builder
        .build()
        .map_err(|e| LoadError::malformed(name, format!("building parquet reader: {e}")))?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| LoadError::malformed(name, format!("reading record batch: {e}")))?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| cell_from_arrow(col, row))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LoadError::malformed(name, format!("row {}: {e}", rows.len() + 1)))?;
            rows.push(cells);
        }
    }

    into_table(columns, rows, name)
}

/// Every type goes through its display form; the table types the column.
fn cell_from_arrow(col: &ArrayRef, row: usize) -> Result<CellValue, arrow::error::ArrowError> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    match col.data_type() {
        DataType::Utf8 => Ok(CellValue::Text(col.as_string::<i32>().value(row).to_string())),
        DataType::LargeUtf8 => Ok(CellValue::Text(col.as_string::<i64>().value(row).to_string())),
        _ => array_value_to_string(col, row).map(CellValue::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{filter, QuerySpec};
    use crate::data::fixtures::{big5_bytes, parquet_bytes, xlsx_bytes, SAMPLE_CSV};
    use filetime::{set_file_mtime, FileTime};
    use std::time::Duration;
    use tempfile::TempDir;

    fn from_bytes(name: &str, bytes: Vec<u8>) -> SourceProvider {
        SourceProvider::FromBytes {
            name: name.to_string(),
            bytes,
            format: SourceFormat::Csv,
        }
    }

    fn write_at(dir: &Path, name: &str, content: &[u8], unix_secs: i64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
        path
    }

    #[test]
    fn test_load_csv_payload() {
        let mut loader = Loader::new(LoaderConfig::default());
        let source = loader
            .load(&from_bytes("upload.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();

        assert_eq!(source.source_name, "upload.csv");
        assert_eq!(source.encoding, Some(TextEncoding::Utf8));
        assert_eq!(source.table.len(), 2);
        assert_eq!(source.table.columns()[0], ColumnId::key());
        assert_eq!(source.table.columns()[1], ColumnId::Tier(1));
        assert_eq!(source.table.rows()[0][1], CellValue::Integer(100));
        // Blank subsidy on the second row
        assert_eq!(source.table.rows()[1][9], CellValue::Null);
    }

    #[test]
    fn test_fallback_tables_equal_across_encodings() {
        let mut loader = Loader::new(LoaderConfig::default());
        let utf8 = loader
            .load(&from_bytes("a.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        let with_bom = loader
            .load(&from_bytes(
                "b.csv",
                [b"\xEF\xBB\xBF".as_slice(), SAMPLE_CSV.as_bytes()].concat(),
            ))
            .unwrap();
        let big5 = loader
            .load(&from_bytes("c.csv", big5_bytes(SAMPLE_CSV)))
            .unwrap();

        assert_eq!(utf8.encoding, Some(TextEncoding::Utf8));
        assert_eq!(with_bom.encoding, Some(TextEncoding::Utf8Sig));
        assert_eq!(big5.encoding, Some(TextEncoding::Big5));
        assert_eq!(*utf8.table, *with_bom.table);
        assert_eq!(*utf8.table, *big5.table);
    }

    #[test]
    fn test_strict_mode_rejects_legacy_encoding() {
        let config = LoaderConfig {
            encoding: EncodingStrategy::strict(),
            ..LoaderConfig::default()
        };
        let mut loader = Loader::new(config);
        let err = loader
            .load(&from_bytes("c.csv", big5_bytes(SAMPLE_CSV)))
            .unwrap_err();
        match err {
            LoadError::UnreadableEncoding { tried, .. } => {
                assert_eq!(tried, vec![TextEncoding::Utf8Sig])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_undecodable_bytes() {
        let mut loader = Loader::new(LoaderConfig::default());
        let err = loader
            .load(&from_bytes("junk.csv", vec![0xFF, 0xFF, 0xFF, b'\n']))
            .unwrap_err();
        assert!(matches!(err, LoadError::UnreadableEncoding { ref tried, .. } if tried.len() == 3));
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn test_missing_subsidy_column() {
        let text = "載運數量,1,2,3,4,5,6,7,8\n宜蘭市A,1,2,3,4,5,6,7,8\n";
        let mut loader = Loader::new(LoaderConfig::default());
        let err = loader
            .load(&from_bytes("old.csv", text.as_bytes().to_vec()))
            .unwrap_err();
        match err {
            LoadError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec![ColumnId::subsidy()])
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut lenient = Loader::new(LoaderConfig {
            validate_columns: false,
            ..LoaderConfig::default()
        });
        assert!(lenient
            .load(&from_bytes("old.csv", text.as_bytes().to_vec()))
            .is_ok());
    }

    #[test]
    fn test_malformed_rows_and_header() {
        let mut loader = Loader::new(LoaderConfig::default());
        let wide = format!("{SAMPLE_CSV}多,1,2,3,4,5,6,7,8,9,10\n");
        let err = loader
            .load(&from_bytes("wide.csv", wide.into_bytes()))
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedFile { ref reason, .. } if reason.contains("row 3")));

        let err = loader.load(&from_bytes("empty.csv", Vec::new())).unwrap_err();
        assert!(matches!(err, LoadError::MalformedFile { .. }));
    }

    #[test]
    fn test_directory_scan_picks_newest() {
        let tmp = TempDir::new().unwrap();
        // Name order and age disagree: age decides.
        write_at(tmp.path(), "新報價2026.csv", SAMPLE_CSV.as_bytes(), 1_600_000_000);
        write_at(tmp.path(), "新報價2024.csv", SAMPLE_CSV.as_bytes(), 1_700_000_000);
        write_at(tmp.path(), "舊報價2030.csv", SAMPLE_CSV.as_bytes(), 1_800_000_000);

        let config = LoaderConfig::default();
        let mut loader = Loader::new(config.clone());
        let source = loader
            .load(&SourceProvider::scan(tmp.path(), &config))
            .unwrap();
        assert_eq!(source.source_name, "新報價2024.csv");
        assert_eq!(source.path, Some(tmp.path().join("新報價2024.csv")));
    }

    #[test]
    fn test_select_latest_breaks_ties_by_name() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let candidate = |name: &str, modified| Candidate {
            path: PathBuf::from("/prices").join(name),
            modified,
            len: 0,
        };
        let picked = select_latest(vec![
            candidate("新報價2024.csv", t),
            candidate("新報價2025.csv", t),
            candidate("新報價2023.csv", t - Duration::from_secs(1)),
        ])
        .unwrap();
        assert_eq!(picked.path, PathBuf::from("/prices/新報價2025.csv"));
        assert_eq!(select_latest(Vec::new()), None);
    }

    #[test]
    fn test_no_source_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let config = LoaderConfig::default();
        let mut loader = Loader::new(config.clone());

        let err = loader
            .load(&SourceProvider::scan(tmp.path(), &config))
            .unwrap_err();
        assert!(matches!(err, LoadError::NoSourceFound { ref pattern, .. } if pattern == "新報價*.csv"));

        let err = loader
            .load(&SourceProvider::scan(tmp.path().join("absent"), &config))
            .unwrap_err();
        assert!(matches!(err, LoadError::NoSourceFound { .. }));
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let tmp = TempDir::new().unwrap();
        let err = scan_directory(tmp.path(), "新報價[*.csv").unwrap_err();
        assert!(matches!(err, LoadError::InvalidPattern { .. }));
    }

    #[test]
    fn test_cache_follows_file_changes() {
        let tmp = TempDir::new().unwrap();
        write_at(tmp.path(), "新報價2025.csv", SAMPLE_CSV.as_bytes(), 1_700_000_000);
        let config = LoaderConfig::default();
        let provider = SourceProvider::scan(tmp.path(), &config);
        let mut loader = Loader::new(config);

        let first = loader.load(&provider).unwrap();
        let again = loader.load(&provider).unwrap();
        assert!(Arc::ptr_eq(&first.table, &again.table));
        assert_eq!(loader.cache().len(), 1);

        let updated = SAMPLE_CSV.replace("宜蘭市A,100", "宜蘭市A,105");
        write_at(tmp.path(), "新報價2025.csv", updated.as_bytes(), 1_700_000_100);
        let fresh = loader.load(&provider).unwrap();
        assert!(!Arc::ptr_eq(&first.table, &fresh.table));
        assert_eq!(fresh.table.rows()[0][1], CellValue::Integer(105));
        assert_eq!(loader.cache().len(), 1);
    }

    fn sample_parquet(tier_one: ArrayRef, subsidy: ArrayRef) -> Vec<u8> {
        use arrow::array::{Int64Array, StringArray};

        let keys: ArrayRef = Arc::new(StringArray::from(vec!["宜蘭市A", "台北市"]));
        let mut columns = vec![("載運數量", keys), ("1", tier_one)];
        const NAMES: [&str; 7] = ["2", "3", "4", "5", "6", "7", "8"];
        for (tier, name) in (2..=8i64).zip(NAMES) {
            let prices: ArrayRef = Arc::new(Int64Array::from(vec![tier * 100, tier * 90]));
            columns.push((name, prices));
        }
        columns.push(("低米數補貼", subsidy));
        parquet_bytes(columns)
    }

    #[test]
    fn test_parquet_payload() {
        use arrow::array::Int64Array;

        let buf = sample_parquet(
            Arc::new(Int64Array::from(vec![100, 90])),
            Arc::new(Int64Array::from(vec![Some(50), None])),
        );
        let mut loader = Loader::new(LoaderConfig::default());
        let source = loader
            .load(&SourceProvider::FromBytes {
                name: "新報價.parquet".into(),
                bytes: buf,
                format: SourceFormat::Parquet,
            })
            .unwrap();
        let csv = loader
            .load(&from_bytes("新報價.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(source.encoding, None);
        assert_eq!(*source.table, *csv.table);
    }

    #[test]
    fn test_parquet_text_columns() {
        use arrow::array::StringArray;

        let buf = sample_parquet(
            Arc::new(StringArray::from(vec!["0800", "0900"])),
            Arc::new(StringArray::from(vec!["", "50"])),
        );
        let mut loader = Loader::new(LoaderConfig::default());
        let source = loader
            .load(&SourceProvider::FromBytes {
                name: "新報價.parquet".into(),
                bytes: buf,
                format: SourceFormat::Parquet,
            })
            .unwrap();
        let rows = source.table.rows();
        assert_eq!(rows[0][1], CellValue::Text("0800".into()));
        // Empty strings are blanks; the rest of the column is numeric.
        assert_eq!(rows[0][9], CellValue::Null);
        assert_eq!(rows[1][9], CellValue::Integer(50));
    }

    #[test]
    fn test_xlsx_payload() {
        let mut loader = Loader::new(LoaderConfig::default());
        let source = loader
            .load(&SourceProvider::FromBytes {
                name: "新報價2025.xlsx".into(),
                bytes: xlsx_bytes(SAMPLE_CSV),
                format: SourceFormat::Xlsx,
            })
            .unwrap();

        assert_eq!(source.encoding, None);
        let tiers: Vec<&ColumnId> = source.table.columns()[1..9].iter().collect();
        let expected: Vec<ColumnId> = (1..=8).map(ColumnId::Tier).collect();
        assert_eq!(tiers, expected.iter().collect::<Vec<_>>());

        let csv = loader
            .load(&from_bytes("新報價.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(*source.table, *csv.table);

        let result = filter(&source.table, &QuerySpec::new("宜蘭").unwrap());
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0][0], CellValue::Text("宜蘭市A".into()));
        assert_eq!(result.rows()[0][1], CellValue::Integer(800));
        assert_eq!(result.rows()[0][9], CellValue::Integer(50));
    }

    #[test]
    fn test_xlsx_without_header_is_malformed() {
        let mut loader = Loader::new(LoaderConfig::default());
        let err = loader
            .load(&SourceProvider::FromBytes {
                name: "blank.xlsx".into(),
                bytes: xlsx_bytes(""),
                format: SourceFormat::Xlsx,
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedFile { .. }));

        let err = loader
            .load(&SourceProvider::FromBytes {
                name: "not-a-workbook.xlsx".into(),
                bytes: SAMPLE_CSV.as_bytes().to_vec(),
                format: SourceFormat::Xlsx,
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedFile { .. }));
    }

    #[test]
    fn test_zero_padded_codes_stay_text() {
        let text = "載運數量,1,2,3,4,5,6,7,8,低米數補貼
                    0800,1,2,3,4,5,6,7,8,0
                    宜蘭市,1,2,3,4,5,6,7,8,0
";
        let mut loader = Loader::new(LoaderConfig::default());
        let source = loader
            .load(&from_bytes("codes.csv", text.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(source.table.rows()[0][0], CellValue::Text("0800".into()));

        let result = filter(&source.table, &QuerySpec::new("0800").unwrap());
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0][0], CellValue::Text("0800".into()));
    }

    #[test]
    fn test_cache_replaces_reuploaded_payload() {
        let mut loader = Loader::new(LoaderConfig::default());
        let first = loader
            .load(&from_bytes("upload.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        let again = loader
            .load(&from_bytes("upload.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        assert!(Arc::ptr_eq(&first.table, &again.table));

        let updated = SAMPLE_CSV.replace("宜蘭市A,100", "宜蘭市A,105");
        let fresh = loader
            .load(&from_bytes("upload.csv", updated.into_bytes()))
            .unwrap();
        assert_eq!(fresh.table.rows()[0][1], CellValue::Integer(105));
        assert_eq!(loader.cache().len(), 1);

        loader
            .load(&from_bytes("other.csv", SAMPLE_CSV.as_bytes().to_vec()))
            .unwrap();
        assert_eq!(loader.cache().len(), 2);
    }

    #[test]
    fn test_spreadsheet_cells() {
        assert_eq!(header_from_cell(&Data::Float(8.0), 1), ColumnId::Tier(8));
        assert_eq!(header_from_cell(&Data::Int(1), 2), ColumnId::Tier(1));
        assert_eq!(
            header_from_cell(&Data::String("低米數補貼".into()), 3),
            ColumnId::subsidy()
        );
        assert_eq!(
            header_from_cell(&Data::Empty, 4),
            ColumnId::Named("Unnamed: 4".into())
        );
        assert_eq!(cell_from_spreadsheet(&Data::Float(120.0)), CellValue::Integer(120));
        assert_eq!(cell_from_spreadsheet(&Data::Float(12.5)), CellValue::Float(12.5));
        assert_eq!(cell_from_spreadsheet(&Data::Empty), CellValue::Null);
    }

    #[test]
    fn test_upload_takes_format_from_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("報價.CSV");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        match SourceProvider::upload(&path).unwrap() {
            SourceProvider::FromBytes { name, format, .. } => {
                assert_eq!(name, "報價.CSV");
                assert_eq!(format, SourceFormat::Csv);
            }
            other => panic!("unexpected provider: {other:?}"),
        }

        let txt = tmp.path().join("報價.txt");
        std::fs::write(&txt, SAMPLE_CSV).unwrap();
        assert!(matches!(
            SourceProvider::upload(&txt),
            Err(LoadError::MalformedFile { .. })
        ));
    }
}
