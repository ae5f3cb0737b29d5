use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::data::export::{export_file_name, to_delimited_bytes};
use crate::data::filter::{filter, QuerySpec, ResultSet};
use crate::data::loader::{Loader, SourceProvider};
use crate::data::model::SourceDescriptor;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Query outcome
// ---------------------------------------------------------------------------

/// What the result area shows for the current keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryView {
    /// Blank keyword: ask the user to type one.
    Prompt,
    /// A keyword that matched nothing.
    NoMatch(QuerySpec),
    Matches(QuerySpec, ResultSet),
}

/// A result ready to be saved.
pub struct Export {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub loader: Loader,

    /// Folder scanned for the newest price list.
    pub search_dir: PathBuf,

    /// Loaded price list (None until a load succeeds, or after one fails).
    pub source: Option<SourceDescriptor>,

    /// Raw text of the keyword box.
    pub keyword: String,

    /// Outcome for `keyword` (cached, recomputed on change).
    pub view: QueryView,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(loader: Loader, search_dir: PathBuf) -> Self {
        Self {
            loader,
            search_dir,
            source: None,
            keyword: String::new(),
            view: QueryView::Prompt,
            status_message: None,
        }
    }

    /// Load the newest matching file from the search directory.
    pub fn load_latest(&mut self) {
        let provider = SourceProvider::scan(&self.search_dir, self.loader.config());
        self.load(&provider);
    }

    /// Load a file the user picked or dropped.
    pub fn upload(&mut self, path: &Path) {
        match SourceProvider::upload(path) {
            Ok(provider) => self.load(&provider),
            Err(e) => self.fail(e),
        }
    }

    pub fn load(&mut self, provider: &SourceProvider) {
        match self.loader.load(provider) {
            Ok(source) => self.set_source(source),
            Err(e) => self.fail(e),
        }
    }

    /// A failed load drops the previous table; nothing is queried until
    /// the user supplies a usable file.
    fn fail(&mut self, e: LoadError) {
        log::error!("Failed to load price list: {e}");
        self.status_message = Some(format!("Error: {e}"));
        self.source = None;
        self.view = QueryView::Prompt;
    }

    /// Ingest a newly loaded table and re-run the current keyword.
    pub fn set_source(&mut self, source: SourceDescriptor) {
        self.source = Some(source);
        self.status_message = None;
        self.refilter();
    }

    pub fn set_keyword(&mut self, keyword: String) {
        self.keyword = keyword;
        self.refilter();
    }

    /// Recompute `view` after a keyword or table change.
    pub fn refilter(&mut self) {
        let (Some(source), Some(query)) = (&self.source, QuerySpec::new(&self.keyword)) else {
            self.view = QueryView::Prompt;
            return;
        };
        let result = filter(&source.table, &query);
        log::debug!("`{}` matched {} rows", query.keyword(), result.len());
        self.view = if result.is_empty() {
            QueryView::NoMatch(query)
        } else {
            QueryView::Matches(query, result)
        };
    }

    /// Serialized download for the current matches, if any.
    pub fn export(&self) -> Result<Option<Export>> {
        let QueryView::Matches(query, result) = &self.view else {
            return Ok(None);
        };
        Ok(Some(Export {
            file_name: export_file_name(query),
            bytes: to_delimited_bytes(result)?,
        }))
    }
}
