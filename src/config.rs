use std::path::PathBuf;

use clap::Parser;

use crate::data::encoding::EncodingStrategy;
use crate::data::loader::{LoaderConfig, SourceFormat, SourceProvider};
use crate::error::LoadError;

/// Freight quote lookup: filter a price list by location keyword.
#[derive(Debug, Parser)]
#[command(name = "quote-lookup", version, about)]
pub struct Cli {
    /// Folder scanned for the newest price list.
    #[arg(long, env = "QUOTE_SEARCH_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Price-list format to look for when scanning.
    #[arg(long, value_enum, default_value_t = SourceFormat::Csv)]
    pub format: SourceFormat,

    /// File-name glob overriding the format's default (`新報價*.csv` etc.).
    #[arg(long)]
    pub pattern: Option<String>,

    /// Load this file instead of scanning the folder.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Decode text only as UTF-8 (with or without signature).
    #[arg(long)]
    pub strict_encoding: bool,

    /// Skip the required-column check.
    #[arg(long)]
    pub no_validate: bool,

    /// Run without a window: print rows matching this keyword and exit.
    #[arg(long)]
    pub query: Option<String>,

    /// With --query, also write the result CSV here.
    #[arg(long, requires = "query")]
    pub export: Option<PathBuf>,
}

impl Cli {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            format: self.format,
            encoding: if self.strict_encoding {
                EncodingStrategy::strict()
            } else {
                EncodingStrategy::default()
            },
            validate_columns: !self.no_validate,
            pattern: self.pattern.clone(),
        }
    }

    /// `--file` wins over the folder scan.
    pub fn provider(&self, config: &LoaderConfig) -> Result<SourceProvider, LoadError> {
        match &self.file {
            Some(path) => SourceProvider::upload(path),
            None => Ok(SourceProvider::scan(&self.dir, config)),
        }
    }
}
