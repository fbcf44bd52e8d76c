//! Schema Tree Editor
//!
//! Turns a [`SchemaNode`] subtree plus the document value at a path into a
//! tree of field editors, and applies committed edits back to the document.
//!
//! The editor holds no rendering state. A tree is built from scratch on
//! every render pass, and edits arrive as [`EditAction`]s that carry only a
//! path and the raw input, so nothing can act on a stale widget:
//!
//! ```text
//! (document, schema) --build--> EditorTree --user--> EditAction
//!        ^                                               |
//!        +---------------- apply -> ChangeEvent <--------+
//! ```

pub mod coerce;
pub mod tree;

pub use coerce::{coerce, display_text, parse_number, FieldInput};
pub use tree::{EditorField, EditorTree, FieldEditor, ListItem};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::document::{
    kind_name, value_at_mut, FieldPath, IdentifierIndex, IdentifierKind, PathSegment, ID_FIELD,
};
use crate::error::EditError;
use crate::schema::{ObjectSchema, SchemaNode};

/// Fields whose values name an entity of another section
const REFERENCE_FIELDS: &[(&str, IdentifierKind)] = &[
    ("target", IdentifierKind::TechnicalAsset),
    ("technical_assets_inside", IdentifierKind::TechnicalAsset),
    ("technical_assets_running", IdentifierKind::TechnicalAsset),
    ("data_assets_processed", IdentifierKind::DataAsset),
    ("data_assets_stored", IdentifierKind::DataAsset),
    ("data_assets_sent", IdentifierKind::DataAsset),
    ("data_assets_received", IdentifierKind::DataAsset),
    ("trust_boundaries_nested", IdentifierKind::TrustBoundary),
];

/// Candidate lists supplied per render pass, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DynamicEnums(IndexMap<String, Vec<String>>);

impl DynamicEnums {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every reference field to the live identifiers it may name
    pub fn from_identifiers(index: &IdentifierIndex) -> Self {
        let mut enums = Self::new();
        for (field, kind) in REFERENCE_FIELDS {
            enums.bind(*field, index.ids(*kind).to_vec());
        }
        enums
    }

    pub fn bind(&mut self, field: impl Into<String>, candidates: Vec<String>) {
        self.0.insert(field.into(), candidates);
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Caller-supplied presentation options for one editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorOptions {
    /// Fields of the root entity that are not rendered
    #[serde(default)]
    pub hidden_fields: Vec<String>,
    /// Open-keyed object fields rendered as a key list, with their add-button caption
    #[serde(default)]
    pub extendable: IndexMap<String, String>,
    #[serde(skip)]
    pub dynamic_enums: DynamicEnums,
}

impl EditorOptions {
    pub fn hide(mut self, field: impl Into<String>) -> Self {
        self.hidden_fields.push(field.into());
        self
    }

    pub fn extendable(mut self, field: impl Into<String>, caption: impl Into<String>) -> Self {
        self.extendable.insert(field.into(), caption.into());
        self
    }

    pub fn with_dynamic_enums(mut self, enums: DynamicEnums) -> Self {
        self.dynamic_enums = enums;
        self
    }
}

/// One committed edit, addressed by document path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    /// Set a scalar field or list item
    SetField { path: FieldPath, input: FieldInput },
    /// Add an entry to an extendable map
    AddKey { path: FieldPath, key: String },
    /// Rename an entry of an extendable map, keeping its value and position
    RenameKey { path: FieldPath, from: String, to: String },
    /// Remove an entry from an extendable map
    RemoveKey { path: FieldPath, key: String },
    /// Append a zero value to a list
    AppendItem { path: FieldPath },
    /// Remove one list item; later items shift down by one
    RemoveItem { path: FieldPath, index: usize },
}

impl EditAction {
    pub fn path(&self) -> &FieldPath {
        match self {
            EditAction::SetField { path, .. }
            | EditAction::AddKey { path, .. }
            | EditAction::RenameKey { path, .. }
            | EditAction::RemoveKey { path, .. }
            | EditAction::AppendItem { path }
            | EditAction::RemoveItem { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Set,
    KeyAdded,
    KeyRenamed,
    KeyRemoved,
    ItemAppended,
    ItemRemoved,
}

/// Notification for one committed edit.
///
/// `path` names the changed value: the field for `Set`, the entry for key
/// operations (the new key after a rename), the item for list operations.
/// Absent values are `Null`; a rename carries the keys as string values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub path: FieldPath,
    pub kind: ChangeKind,
    pub new_value: Value,
    pub old_value: Value,
}

impl ChangeEvent {
    pub fn field_name(&self) -> Option<&str> {
        self.path.field_name()
    }

    /// True when an `id` field was assigned
    pub fn is_identifier_edit(&self) -> bool {
        self.kind == ChangeKind::Set && self.field_name() == Some(ID_FIELD)
    }
}

/// Editor over the object at `root`, described by `schema`
#[derive(Debug, Clone, Copy)]
pub struct SchemaTreeEditor<'a> {
    schema: &'a SchemaNode,
    root: &'a FieldPath,
    options: &'a EditorOptions,
}

impl<'a> SchemaTreeEditor<'a> {
    pub fn new(
        schema: &'a SchemaNode,
        root: &'a FieldPath,
        options: &'a EditorOptions,
    ) -> Result<Self, EditError> {
        match schema {
            SchemaNode::Object(_) => Ok(Self {
                schema,
                root,
                options,
            }),
            other => Err(EditError::WrongKind {
                path: root.to_string(),
                actual: other.kind_name(),
                operation: "root an editor at",
            }),
        }
    }

    pub fn root(&self) -> &FieldPath {
        self.root
    }

    /// Create every absent closed-object field as an empty mapping,
    /// recursively, so nested editors always have an entity to write into.
    pub fn materialize(&self, document: &mut Value) {
        let Some(entity) = value_at_mut(document, self.root.segments()) else {
            return;
        };
        if let SchemaNode::Object(object) = self.schema {
            self.materialize_object(object, entity, &[]);
        }
    }

    fn materialize_object(&self, object: &ObjectSchema, entity: &mut Value, rel: &[PathSegment]) {
        if entity.is_null() {
            *entity = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = entity else {
            return;
        };

        for (name, node) in &object.properties {
            if rel.is_empty() && self.options.hidden_fields.contains(name) {
                continue;
            }
            let mut child_rel = rel.to_vec();
            child_rel.push(PathSegment::Key(name.clone()));
            match node {
                SchemaNode::Object(child) if !self.is_extendable(&child_rel) => {
                    let slot = map
                        .entry(Value::String(name.clone()))
                        .or_insert(Value::Null);
                    self.materialize_object(child, slot, &child_rel);
                }
                _ => {
                    if let Some(value) = map.get_mut(name.as_str()) {
                        self.materialize_nested(node, value, &child_rel);
                    }
                }
            }
        }
    }

    /// Descend into existing key-list entries and list items
    fn materialize_nested(&self, node: &SchemaNode, value: &mut Value, rel: &[PathSegment]) {
        match (node, value) {
            (SchemaNode::Object(object), Value::Mapping(map)) => {
                let Some(entry_node) = object.additional_properties.as_deref() else {
                    return;
                };
                let SchemaNode::Object(entry_object) = entry_node else {
                    return;
                };
                for (key, entry) in map.iter_mut() {
                    let Some(key) = key.as_str() else { continue };
                    let mut entry_rel = rel.to_vec();
                    entry_rel.push(PathSegment::Key(key.to_string()));
                    if entry.is_mapping() || entry.is_null() {
                        self.materialize_object(entry_object, entry, &entry_rel);
                    }
                }
            }
            (SchemaNode::Array(array), Value::Sequence(items)) => {
                let SchemaNode::Object(item_object) = array.items.as_ref() else {
                    return;
                };
                for (index, item) in items.iter_mut().enumerate() {
                    let mut item_rel = rel.to_vec();
                    item_rel.push(PathSegment::Index(index));
                    if item.is_mapping() {
                        self.materialize_object(item_object, item, &item_rel);
                    }
                }
            }
            _ => {}
        }
    }

    /// Apply one action in place. Returns the change that was committed,
    /// or `None` when the action was a silent no-op (duplicate or empty key,
    /// unsupported list item kind).
    pub fn apply(
        &self,
        document: &mut Value,
        action: EditAction,
    ) -> Result<Option<ChangeEvent>, EditError> {
        let rel = self.relative(action.path())?.to_vec();

        match action {
            EditAction::SetField { path, input } => {
                let node = self.node_at(&path, &rel)?;
                let value = coerce(node, input, self.candidates(&rel), &path)?;
                let slot = slot_mut(document, &path)?;
                let old_value = std::mem::replace(slot, value.clone());
                Ok(Some(ChangeEvent {
                    path,
                    kind: ChangeKind::Set,
                    new_value: value,
                    old_value,
                }))
            }

            EditAction::AddKey { path, key } => {
                let value_node = self.keyed_value_node(&path, &rel, "add keys to")?;
                if key.trim().is_empty() {
                    debug!(path = %path, "ignoring empty key");
                    return Ok(None);
                }
                let map = mapping_mut(document, &path)?;
                if map.contains_key(key.as_str()) {
                    debug!(path = %path, key = %key, "ignoring duplicate key");
                    return Ok(None);
                }
                let value = value_node.zero_value(None).unwrap_or(Value::Null);
                map.insert(Value::String(key.clone()), value.clone());
                Ok(Some(ChangeEvent {
                    path: path.key(key),
                    kind: ChangeKind::KeyAdded,
                    new_value: value,
                    old_value: Value::Null,
                }))
            }

            EditAction::RenameKey { path, from, to } => {
                self.keyed_value_node(&path, &rel, "rename keys of")?;
                if existing_slot(document, &path)?.is_none() {
                    debug!(path = %path, key = %from, "rename in absent map ignored");
                    return Ok(None);
                }
                let map = mapping_mut(document, &path)?;
                if from == to || to.trim().is_empty() || map.contains_key(to.as_str()) {
                    debug!(path = %path, from = %from, to = %to, "ignoring key rename");
                    return Ok(None);
                }
                if !map.contains_key(from.as_str()) {
                    debug!(path = %path, key = %from, "rename of missing key ignored");
                    return Ok(None);
                }
                let renamed: Mapping = std::mem::take(map)
                    .into_iter()
                    .map(|(key, value)| {
                        if key.as_str() == Some(from.as_str()) {
                            (Value::String(to.clone()), value)
                        } else {
                            (key, value)
                        }
                    })
                    .collect();
                *map = renamed;
                Ok(Some(ChangeEvent {
                    path: path.key(to.clone()),
                    kind: ChangeKind::KeyRenamed,
                    new_value: Value::String(to),
                    old_value: Value::String(from),
                }))
            }

            EditAction::RemoveKey { path, key } => {
                self.keyed_value_node(&path, &rel, "remove keys from")?;
                if existing_slot(document, &path)?.is_none() {
                    debug!(path = %path, key = %key, "remove from absent map ignored");
                    return Ok(None);
                }
                let map = mapping_mut(document, &path)?;
                match map.shift_remove(key.as_str()) {
                    Some(old_value) => Ok(Some(ChangeEvent {
                        path: path.key(key),
                        kind: ChangeKind::KeyRemoved,
                        new_value: Value::Null,
                        old_value,
                    })),
                    None => {
                        debug!(path = %path, key = %key, "remove of missing key ignored");
                        Ok(None)
                    }
                }
            }

            EditAction::AppendItem { path } => {
                let items_node = self.items_node(&path, &rel, "append to")?;
                if self.candidates(&rel).is_some_and(<[String]>::is_empty) {
                    debug!(path = %path, "no identifiers to reference, append ignored");
                    return Ok(None);
                }
                let Some(value) = items_node.zero_value(self.candidates(&rel)) else {
                    warn!(path = %path, kind = items_node.kind_name(), "unsupported item type for addition");
                    return Ok(None);
                };
                let items = sequence_mut(document, &path)?;
                items.push(value.clone());
                let index = items.len() - 1;
                Ok(Some(ChangeEvent {
                    path: path.index(index),
                    kind: ChangeKind::ItemAppended,
                    new_value: value,
                    old_value: Value::Null,
                }))
            }

            EditAction::RemoveItem { path, index } => {
                self.items_node(&path, &rel, "remove items from")?;
                if existing_slot(document, &path)?.is_none() {
                    return Err(EditError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len: 0,
                    });
                }
                let items = sequence_mut(document, &path)?;
                if index >= items.len() {
                    return Err(EditError::IndexOutOfRange {
                        path: path.to_string(),
                        index,
                        len: items.len(),
                    });
                }
                let old_value = items.remove(index);
                Ok(Some(ChangeEvent {
                    path: path.index(index),
                    kind: ChangeKind::ItemRemoved,
                    new_value: Value::Null,
                    old_value,
                }))
            }
        }
    }

    fn relative<'p>(&self, path: &'p FieldPath) -> Result<&'p [PathSegment], EditError> {
        path.strip_prefix(self.root)
            .ok_or_else(|| EditError::OutsideRoot {
                path: path.to_string(),
                root: self.root.to_string(),
            })
    }

    fn node_at(&self, path: &FieldPath, rel: &[PathSegment]) -> Result<&'a SchemaNode, EditError> {
        if rel.is_empty() {
            return Err(EditError::WrongKind {
                path: path.to_string(),
                actual: self.schema.kind_name(),
                operation: "set the editor root",
            });
        }
        self.schema
            .resolve(rel)
            .ok_or_else(|| EditError::NotInSchema(path.to_string()))
    }

    /// Value schema of the extendable map at `rel`
    fn keyed_value_node(
        &self,
        path: &FieldPath,
        rel: &[PathSegment],
        operation: &'static str,
    ) -> Result<&'a SchemaNode, EditError> {
        let node = self.node_at(path, rel)?;
        match node {
            SchemaNode::Object(ObjectSchema {
                additional_properties: Some(value_node),
                ..
            }) if self.is_extendable(rel) => Ok(value_node.as_ref()),
            other => Err(EditError::WrongKind {
                path: path.to_string(),
                actual: other.kind_name(),
                operation,
            }),
        }
    }

    fn items_node(
        &self,
        path: &FieldPath,
        rel: &[PathSegment],
        operation: &'static str,
    ) -> Result<&'a SchemaNode, EditError> {
        match self.node_at(path, rel)? {
            SchemaNode::Array(array) => Ok(array.items.as_ref()),
            other => Err(EditError::WrongKind {
                path: path.to_string(),
                actual: other.kind_name(),
                operation,
            }),
        }
    }

    /// Whether the field at `rel` is a named property of its parent object
    fn named_property<'r>(&self, rel: &'r [PathSegment]) -> Option<&'r str> {
        let (PathSegment::Key(name), parent) = rel.split_last()? else {
            return None;
        };
        let parent = self.schema.resolve(parent)?.as_object()?;
        parent.properties.contains_key(name).then_some(name.as_str())
    }

    pub(crate) fn is_extendable(&self, rel: &[PathSegment]) -> bool {
        self.named_property(rel)
            .map(|name| self.options.extendable.contains_key(name))
            .unwrap_or(false)
    }

    pub(crate) fn caption(&self, rel: &[PathSegment]) -> Option<&'a str> {
        let name = self.named_property(rel)?;
        self.options.extendable.get(name).map(String::as_str)
    }

    /// Dynamic candidates for the field at `rel`; list items use the list's binding
    pub(crate) fn candidates(&self, rel: &[PathSegment]) -> Option<&'a [String]> {
        match rel.last()? {
            PathSegment::Index(_) => self.candidates(&rel[..rel.len() - 1]),
            PathSegment::Key(_) => {
                let name = self.named_property(rel)?;
                self.options.dynamic_enums.get(name)
            }
        }
    }
}

/// Value at `path` when present. Fails where `slot_mut` would, without
/// touching the document: an index into an absent or short list, or a step
/// through a scalar.
fn existing_slot<'v>(document: &'v Value, path: &FieldPath) -> Result<Option<&'v Value>, EditError> {
    let mut current = Some(document);
    for segment in path.segments() {
        let absent = matches!(current, None | Some(Value::Null));
        current = match (segment, current) {
            (PathSegment::Key(_), _) if absent => None,
            (PathSegment::Key(key), Some(Value::Mapping(map))) => map.get(key.as_str()),
            (PathSegment::Index(index), Some(Value::Sequence(items))) => match items.get(*index) {
                Some(item) => Some(item),
                None => {
                    return Err(EditError::IndexOutOfRange {
                        path: path.to_string(),
                        index: *index,
                        len: items.len(),
                    })
                }
            },
            (PathSegment::Index(index), _) if absent => {
                return Err(EditError::IndexOutOfRange {
                    path: path.to_string(),
                    index: *index,
                    len: 0,
                })
            }
            _ => return Err(EditError::NotAContainer(path.to_string())),
        };
    }
    Ok(current.filter(|value| !value.is_null()))
}

/// Slot for `path`, creating absent intermediate mappings once the whole
/// path is known to be reachable
fn slot_mut<'v>(document: &'v mut Value, path: &FieldPath) -> Result<&'v mut Value, EditError> {
    existing_slot(document, path)?;

    let mut current = document;
    for segment in path.segments() {
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Mapping(map)) => map
                .entry(Value::String(key.clone()))
                .or_insert(Value::Null),
            (PathSegment::Index(index), Value::Sequence(items)) => {
                let len = items.len();
                items.get_mut(*index).ok_or_else(|| EditError::IndexOutOfRange {
                    path: path.to_string(),
                    index: *index,
                    len,
                })?
            }
            _ => return Err(EditError::NotAContainer(path.to_string())),
        };
    }
    Ok(current)
}

/// Fail with `WrongKind` before anything is created when `path` holds a
/// value that `accepts` rejects
fn expect_kind(
    document: &Value,
    path: &FieldPath,
    accepts: fn(&Value) -> bool,
    operation: &'static str,
) -> Result<(), EditError> {
    match existing_slot(document, path)? {
        Some(other) if !accepts(other) => Err(EditError::WrongKind {
            path: path.to_string(),
            actual: kind_name(other),
            operation,
        }),
        _ => Ok(()),
    }
}

fn mapping_mut<'v>(document: &'v mut Value, path: &FieldPath) -> Result<&'v mut Mapping, EditError> {
    expect_kind(document, path, Value::is_mapping, "edit keys of")?;
    let slot = slot_mut(document, path)?;
    if slot.is_null() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(map) => Ok(map),
        other => Err(EditError::WrongKind {
            path: path.to_string(),
            actual: kind_name(other),
            operation: "edit keys of",
        }),
    }
}

fn sequence_mut<'v>(document: &'v mut Value, path: &FieldPath) -> Result<&'v mut Vec<Value>, EditError> {
    expect_kind(document, path, Value::is_sequence, "edit items of")?;
    let slot = slot_mut(document, path)?;
    if slot.is_null() {
        *slot = Value::Sequence(Vec::new());
    }
    match slot {
        Value::Sequence(items) => Ok(items),
        other => Err(EditError::WrongKind {
            path: path.to_string(),
            actual: kind_name(other),
            operation: "edit items of",
        }),
    }
}
