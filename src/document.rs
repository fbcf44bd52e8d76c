//! Threat model document
//!
//! The document is held as a `serde_yaml::Value` rather than a typed record:
//! entities are open-ended, unknown fields must survive an edit/export cycle,
//! and `Mapping` keeps key insertion order. Everything in the crate addresses
//! into it through [`FieldPath`].

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

use crate::error::CodecError;

pub const TECHNICAL_ASSETS: &str = "technical_assets";
pub const DATA_ASSETS: &str = "data_assets";
pub const TRUST_BOUNDARIES: &str = "trust_boundaries";
pub const SHARED_RUNTIMES: &str = "shared_runtimes";
pub const RISK_TRACKING: &str = "risk_tracking";

/// The machine identifier field carried by every asset and boundary
pub const ID_FIELD: &str = "id";

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Location of a value inside the document, from the root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The document root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path of mapping keys
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(|k| PathSegment::Key(k.into())).collect())
    }

    /// Extend with a mapping key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    /// Extend with a sequence index
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    /// This path followed by relative `segments`
    pub fn join(&self, segments: &[PathSegment]) -> Self {
        let mut joined = self.0.clone();
        joined.extend_from_slice(segments);
        Self(joined)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<FieldPath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Name of the field this path points at, if its last step is a key
    pub fn field_name(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Top-level section this path lives in
    pub fn section(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Segments remaining after `prefix`, or `None` if `prefix` does not lead here
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<&[PathSegment]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i > 0 => write!(f, ".{}", key)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

/// Short type name of a YAML value, for diagnostics
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Follow `path` from `root`
pub fn value_at<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| match (segment, current) {
        (PathSegment::Key(key), Value::Mapping(map)) => map.get(key.as_str()),
        (PathSegment::Index(index), Value::Sequence(items)) => items.get(*index),
        _ => None,
    })
}

/// Follow `path` from `root`, mutably
pub fn value_at_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Mapping(map)) => map.get_mut(key.as_str())?,
            (PathSegment::Index(index), Value::Sequence(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// The one threat model being edited
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Wrap a parsed value; the root must be a mapping
    pub fn from_value(root: Value) -> Result<Self, CodecError> {
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            other => Err(CodecError::NotAMapping(kind_name(&other))),
        }
    }

    pub fn empty() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        value_at(&self.root, path.segments())
    }

    /// Entities of a section as `(key, entity)` in document order.
    /// Entries whose key is not a string cannot be addressed by a path and are skipped.
    pub fn entities<'a>(&'a self, section: &str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.root
            .get(section)
            .and_then(Value::as_mapping)
            .into_iter()
            .flat_map(|map| map.iter())
            .filter_map(|(key, entity)| key.as_str().map(|k| (k, entity)))
    }

    /// Mutable entities of a section in document order
    pub fn entities_mut<'a>(
        &'a mut self,
        section: &str,
    ) -> impl Iterator<Item = (&'a str, &'a mut Value)> + 'a {
        self.root
            .get_mut(section)
            .and_then(Value::as_mapping_mut)
            .into_iter()
            .flat_map(|map| map.iter_mut())
            .filter_map(|(key, entity)| key.as_str().map(|k| (k, entity)))
    }

    /// The `id` field of an entity
    pub fn entity_id(entity: &Value) -> Option<&str> {
        entity.get(ID_FIELD).and_then(Value::as_str)
    }
}

/// Which kind of entity an identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    TechnicalAsset,
    DataAsset,
    TrustBoundary,
}

impl IdentifierKind {
    pub fn section(&self) -> &'static str {
        match self {
            IdentifierKind::TechnicalAsset => TECHNICAL_ASSETS,
            IdentifierKind::DataAsset => DATA_ASSETS,
            IdentifierKind::TrustBoundary => TRUST_BOUNDARIES,
        }
    }

    pub fn from_section(section: &str) -> Option<Self> {
        match section {
            TECHNICAL_ASSETS => Some(IdentifierKind::TechnicalAsset),
            DATA_ASSETS => Some(IdentifierKind::DataAsset),
            TRUST_BOUNDARIES => Some(IdentifierKind::TrustBoundary),
            _ => None,
        }
    }
}

/// Live list of every identifier currently in the document, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentifierIndex {
    pub technical_assets: Vec<String>,
    pub data_assets: Vec<String>,
    pub trust_boundaries: Vec<String>,
}

impl IdentifierIndex {
    pub fn collect(document: &Document) -> Self {
        let ids = |section: &str| {
            let mut ids: Vec<String> = Vec::new();
            for (_, entity) in document.entities(section) {
                if let Some(id) = Document::entity_id(entity) {
                    if !ids.iter().any(|known| known == id) {
                        ids.push(id.to_string());
                    }
                }
            }
            ids
        };

        Self {
            technical_assets: ids(TECHNICAL_ASSETS),
            data_assets: ids(DATA_ASSETS),
            trust_boundaries: ids(TRUST_BOUNDARIES),
        }
    }

    pub fn ids(&self, kind: IdentifierKind) -> &[String] {
        match kind {
            IdentifierKind::TechnicalAsset => &self.technical_assets,
            IdentifierKind::DataAsset => &self.data_assets,
            IdentifierKind::TrustBoundary => &self.trust_boundaries,
        }
    }

    pub fn kind_of(&self, id: &str) -> Option<IdentifierKind> {
        [
            IdentifierKind::TechnicalAsset,
            IdentifierKind::DataAsset,
            IdentifierKind::TrustBoundary,
        ]
        .into_iter()
        .find(|kind| self.ids(*kind).iter().any(|known| known == id))
    }

    pub fn len(&self) -> usize {
        self.technical_assets.len() + self.data_assets.len() + self.trust_boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
