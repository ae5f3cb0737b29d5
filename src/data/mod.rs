/// Data layer: core types, loading, filtering and export.
///
/// Architecture:
/// ```text
///  新報價*.csv / .xlsx / .parquet   or an uploaded payload
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  discover → decode → parse → validate → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  keyword match on 載運數量 → projected ResultSet
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  ResultSet → UTF-8-with-BOM CSV bytes
///   └──────────┘
/// ```

pub mod encoding;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
