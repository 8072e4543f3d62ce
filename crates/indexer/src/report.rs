use serde::{Deserialize, Serialize};

/// A file that produced no extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: String,
    pub error: String,
}

/// Outcome of one rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files run through an extractor successfully
    pub files_processed: usize,
    /// Files without an extractor, indexed as whole-file documents
    pub files_skipped: usize,
    pub extraction_errors: Vec<FileError>,
    pub resolution_warnings: usize,
    pub nodes: usize,
    pub edges: usize,
    pub documents: usize,
    /// Documents removed because their entity disappeared
    pub documents_pruned: usize,
    pub snapshot_version: u64,
    pub time_ms: u64,
}

impl IngestReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, path: impl Into<String>, error: impl ToString) {
        self.extraction_errors.push(FileError {
            path: path.into(),
            error: error.to_string(),
        });
    }
}
