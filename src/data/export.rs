use anyhow::{Context, Result};

use super::filter::{QuerySpec, ResultSet};

/// Byte-order mark so spreadsheet tools detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize a result as comma-delimited UTF-8 text with a signature:
/// one header line of column ids, then one line per row.
pub fn to_delimited_bytes(result: &ResultSet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer
        .write_record(result.columns().iter().map(|c| c.to_string()))
        .context("writing CSV header")?;
    for (i, row) in result.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .with_context(|| format!("writing CSV row {i}"))?;
    }
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flushing CSV output")
}

/// Suggested download name, e.g. `宜蘭_報價.csv`.
pub fn export_file_name(query: &QuerySpec) -> String {
    let stem: String = query
        .keyword()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{stem}_報價.csv")
}
