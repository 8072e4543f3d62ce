//! Pluggable per-language extraction.
//!
//! An [`Extractor`] turns one file into the uniform `{nodes, relations}`
//! schema the graph builder consumes. Supporting a new language means
//! registering another extractor; nothing else changes.

use crate::error::ExtractionError;
use codescope_graph::Extraction;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Extractor: Send + Sync {
    /// Language id, e.g. `rust`
    fn language(&self) -> &str;

    /// File extensions without the leading dot (`rs`, `d.ts`)
    fn extensions(&self) -> &[&str];

    fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractionError>;
}

/// Extractors keyed by language id and file extension
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    by_language: HashMap<String, Arc<dyn Extractor>>,
    by_extension: HashMap<String, String>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extractor`; a later registration for the same language or
    /// extension replaces the earlier one
    pub fn register(&mut self, extractor: impl Extractor + 'static) {
        self.register_arc(Arc::new(extractor));
    }

    pub fn register_arc(&mut self, extractor: Arc<dyn Extractor>) {
        let language = extractor.language().to_string();
        for ext in extractor.extensions() {
            self.by_extension
                .insert(ext.trim_start_matches('.').to_ascii_lowercase(), language.clone());
        }
        log::debug!(
            "Registered extractor '{language}' for {:?}",
            extractor.extensions()
        );
        self.by_language.insert(language, extractor);
    }

    #[must_use]
    pub fn for_language(&self, language: &str) -> Option<Arc<dyn Extractor>> {
        self.by_language.get(language).cloned()
    }

    /// Extractor for `path` by its longest registered extension
    #[must_use]
    pub fn for_path(&self, path: &str) -> Option<Arc<dyn Extractor>> {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
        file_name
            .match_indices('.')
            .map(|(i, _)| &file_name[i + 1..])
            .find_map(|ext| self.by_extension.get(ext))
            .and_then(|language| self.for_language(language))
    }

    #[must_use]
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.by_language.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_language.is_empty()
    }
}

/// Reads extractor output that was produced out of process and stored as
/// JSON next to the sources (`*.extraction.json`)
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn language(&self) -> &str {
        "extraction-json"
    }

    fn extensions(&self) -> &[&str] {
        &["extraction.json"]
    }

    fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractionError> {
        serde_json::from_str(content).map_err(|e| ExtractionError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}
