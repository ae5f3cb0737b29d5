use std::path::PathBuf;

use thiserror::Error;

use crate::data::encoding::TextEncoding;
use crate::data::model::ColumnId;

/// Why a price list could not be loaded. Every variant ends the current
/// load attempt; the user recovers by uploading or fixing a file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no file matching `{pattern}` in {}; add one to the folder or upload a file", .dir.display())]
    NoSourceFound { dir: PathBuf, pattern: String },

    #[error("{source_name}: could not decode text with any of [{}]", join(.tried))]
    UnreadableEncoding {
        source_name: String,
        tried: Vec<TextEncoding>,
    },

    #[error("{source_name}: missing required columns [{}]", join(.missing))]
    MissingColumns {
        source_name: String,
        missing: Vec<ColumnId>,
    },

    #[error("{source_name}: {reason}")]
    MalformedFile { source_name: String, reason: String },

    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl LoadError {
    pub(crate) fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        LoadError::MalformedFile {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
