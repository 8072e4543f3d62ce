use codescope_protocol::SearchType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, Value>;

/// Vector similarity function of the dense field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Cosine,
}

/// Shape of a backing index: analyzed text fields, one dense vector field
/// and a free-form metadata object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub dimension: usize,
    #[serde(default = "default_similarity")]
    pub similarity: Similarity,
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
}

const fn default_similarity() -> Similarity {
    Similarity::Cosine
}

fn default_analyzer() -> String {
    "code".to_string()
}

impl IndexSchema {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            similarity: default_similarity(),
            analyzer: default_analyzer(),
        }
    }

    /// Whether an index created with `self` can serve `other`
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.similarity == other.similarity
    }
}

/// Searchable text fields of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Content,
    Identifier,
    Path,
}

impl Field {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Identifier => "identifier",
            Self::Path => "path",
        }
    }
}

/// Field with its score multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    pub field: Field,
    pub boost: f32,
}

/// Default multi-field boosts: content first, then the identifier, then the path
pub const DEFAULT_FIELD_BOOSTS: [FieldBoost; 3] = [
    FieldBoost {
        field: Field::Content,
        boost: 2.0,
    },
    FieldBoost {
        field: Field::Identifier,
        boost: 1.5,
    },
    FieldBoost {
        field: Field::Path,
        boost: 1.0,
    },
];

/// A document stored in the backing index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    /// Raw symbol name
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            identifier: String::new(),
            path: String::new(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Content => &self.content,
            Field::Identifier => &self.identifier,
            Field::Path => &self.path,
        }
    }
}

/// Metadata equality filter; every entry must match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilter(pub Metadata);

impl SearchFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(key, value)
    }

    #[must_use]
    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordQuery {
    pub text: String,
    pub fields: Vec<FieldBoost>,
    pub limit: usize,
    #[serde(default)]
    pub filter: Option<SearchFilter>,
}

impl KeywordQuery {
    /// Query over the default boosted fields
    pub fn multi_field(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            fields: DEFAULT_FIELD_BOOSTS.to_vec(),
            limit,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnQuery {
    pub vector: Vec<f32>,
    pub limit: usize,
    #[serde(default)]
    pub filter: Option<SearchFilter>,
}

/// One ranked hit from a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Metadata,
    pub search_type: SearchType,
}
