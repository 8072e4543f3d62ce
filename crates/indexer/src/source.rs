use crate::error::{IndexerError, Result};
use codescope_graph::LineRange;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One file handed to ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Project-relative path with `/` separators
    pub path: String,
    pub content: String,
    /// Language id overriding extension lookup
    #[serde(default)]
    pub language: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: None,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Read `path` and record it relative to `root`
    pub async fn load(root: &Path, path: &Path) -> Result<Self> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let relative = full.strip_prefix(root).map_err(|_| {
            IndexerError::InvalidPath(format!(
                "{} is outside {}",
                full.display(),
                root.display()
            ))
        })?;
        let content = tokio::fs::read_to_string(&full).await?;
        Ok(Self::new(normalize_path(relative), content))
    }

    /// Text of a 1-based inclusive line range; `None` when the range is unknown
    #[must_use]
    pub fn excerpt(&self, lines: LineRange) -> Option<String> {
        if lines.start == 0 || lines.end < lines.start {
            return None;
        }
        let text: Vec<&str> = self
            .content
            .lines()
            .skip(lines.start - 1)
            .take(lines.end - lines.start + 1)
            .collect();
        (!text.is_empty()).then(|| text.join("\n"))
    }
}

fn normalize_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
