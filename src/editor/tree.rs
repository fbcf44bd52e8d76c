//! Editor tree construction
//!
//! Pure recursive construction of `(entity, schema) -> EditorTree`. Nothing
//! here mutates the document or keeps state between passes.

use serde::Serialize;
use serde_yaml::Value;

use super::{display_text, SchemaTreeEditor};
use crate::document::{value_at, FieldPath, PathSegment};
use crate::schema::{ObjectSchema, SchemaNode};

/// Editors for every visible field of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorTree {
    pub root: FieldPath,
    pub fields: Vec<EditorField>,
}

impl EditorTree {
    /// Find the editor for `path` anywhere in the tree
    pub fn find(&self, path: &FieldPath) -> Option<&FieldEditor> {
        find_in_fields(&self.fields, path)
    }
}

fn find_in_fields<'t>(fields: &'t [EditorField], path: &FieldPath) -> Option<&'t FieldEditor> {
    fields.iter().find_map(|field| {
        if field.path == *path {
            Some(&field.editor)
        } else {
            find_in_editor(&field.editor, path)
        }
    })
}

fn find_in_editor<'t>(editor: &'t FieldEditor, path: &FieldPath) -> Option<&'t FieldEditor> {
    match editor {
        FieldEditor::Group { fields, .. } => find_in_fields(fields, path),
        FieldEditor::KeyedList { entries, .. } => find_in_fields(entries, path),
        FieldEditor::List { items, .. } => items.iter().find_map(|item| {
            if item.path == *path {
                Some(&item.editor)
            } else {
                find_in_editor(&item.editor, path)
            }
        }),
        _ => None,
    }
}

/// One labelled field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorField {
    pub name: String,
    pub path: FieldPath,
    pub editor: FieldEditor,
}

/// One item of a list editor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub index: usize,
    pub path: FieldPath,
    pub editor: FieldEditor,
}

/// Widget descriptor for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FieldEditor {
    /// Closed choice; `selected` is whatever is stored, even if no longer offered
    Choice {
        selected: Option<String>,
        options: Vec<String>,
    },
    /// Free-text date, not validated
    Date { value: String },
    Text { value: String },
    Numeric {
        value: Option<f64>,
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Toggle { checked: bool },
    /// Nested sub-editor
    Group {
        collapsed: bool,
        fields: Vec<EditorField>,
    },
    /// Extendable map: add, rename and remove keys
    KeyedList {
        caption: String,
        entries: Vec<EditorField>,
    },
    /// Ordered list: append, remove and edit items
    List {
        items: Vec<ListItem>,
        appendable: bool,
    },
    /// Schema type the editor cannot handle
    Placeholder { type_name: String },
}

impl<'a> SchemaTreeEditor<'a> {
    /// Build the editor tree for the current document
    pub fn build(&self, document: &Value) -> EditorTree {
        let entity = value_at(document, self.root.segments());
        let fields = match self.schema {
            SchemaNode::Object(object) => self.object_fields(object, entity, &[], true),
            _ => Vec::new(),
        };
        EditorTree {
            root: self.root.clone(),
            fields,
        }
    }

    fn object_fields(
        &self,
        object: &ObjectSchema,
        entity: Option<&Value>,
        rel: &[PathSegment],
        at_root: bool,
    ) -> Vec<EditorField> {
        object
            .properties
            .iter()
            .filter(|(name, _)| !(at_root && self.options.hidden_fields.contains(*name)))
            .map(|(name, node)| {
                let child_rel = child(rel, PathSegment::Key(name.clone()));
                let value = entity.and_then(|e| e.get(name.as_str()));
                EditorField {
                    name: name.clone(),
                    path: self.root.join(&child_rel),
                    editor: self.field_editor(node, value, &child_rel),
                }
            })
            .collect()
    }

    fn field_editor(&self, node: &SchemaNode, value: Option<&Value>, rel: &[PathSegment]) -> FieldEditor {
        match node {
            SchemaNode::String(string) => {
                if let Some(options) = self.candidates(rel).or(string.enumeration.as_deref()) {
                    FieldEditor::Choice {
                        selected: value.and_then(Value::as_str).map(String::from),
                        options: options.to_vec(),
                    }
                } else if string.is_date() {
                    FieldEditor::Date {
                        value: display_text(value),
                    }
                } else {
                    FieldEditor::Text {
                        value: display_text(value),
                    }
                }
            }
            SchemaNode::Integer(numeric) | SchemaNode::Number(numeric) => FieldEditor::Numeric {
                value: value.and_then(Value::as_f64),
                integer: matches!(node, SchemaNode::Integer(_)),
                minimum: numeric.minimum,
                maximum: numeric.maximum,
            },
            SchemaNode::Boolean => FieldEditor::Toggle {
                checked: value.and_then(Value::as_bool).unwrap_or(false),
            },
            SchemaNode::Object(object) => match object.additional_properties.as_deref() {
                Some(entry_node) if self.is_extendable(rel) => FieldEditor::KeyedList {
                    caption: self.caption(rel).unwrap_or_default().to_string(),
                    entries: self.keyed_entries(entry_node, value, rel),
                },
                _ => FieldEditor::Group {
                    collapsed: true,
                    fields: self.object_fields(object, value, rel, false),
                },
            },
            SchemaNode::Array(array) => FieldEditor::List {
                items: value
                    .and_then(Value::as_sequence)
                    .map(|items| {
                        items
                            .iter()
                            .enumerate()
                            .map(|(index, item)| {
                                let item_rel = child(rel, PathSegment::Index(index));
                                ListItem {
                                    index,
                                    path: self.root.join(&item_rel),
                                    editor: expanded(self.field_editor(&array.items, Some(item), &item_rel)),
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                appendable: array.items.zero_value(None).is_some()
                    && !self.candidates(rel).is_some_and(<[String]>::is_empty),
            },
            SchemaNode::Unsupported { type_name } => FieldEditor::Placeholder {
                type_name: type_name.clone(),
            },
        }
    }

    fn keyed_entries(&self, entry_node: &SchemaNode, value: Option<&Value>, rel: &[PathSegment]) -> Vec<EditorField> {
        let Some(map) = value.and_then(Value::as_mapping) else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(key, entry)| {
                let key = key.as_str()?;
                let entry_rel = child(rel, PathSegment::Key(key.to_string()));
                Some(EditorField {
                    name: key.to_string(),
                    path: self.root.join(&entry_rel),
                    editor: self.field_editor(entry_node, Some(entry), &entry_rel),
                })
            })
            .collect()
    }
}

fn child(rel: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut path = rel.to_vec();
    path.push(segment);
    path
}

/// List items render their nested fields inline
fn expanded(editor: FieldEditor) -> FieldEditor {
    match editor {
        FieldEditor::Group { fields, .. } => FieldEditor::Group {
            collapsed: false,
            fields,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{DynamicEnums, EditorOptions};
    use crate::schema::SchemaModel;

    fn build(yaml: &str, options: &EditorOptions) -> EditorTree {
        let model = SchemaModel::builtin().unwrap();
        let document: Value = serde_yaml::from_str(yaml).unwrap();
        let root = FieldPath::root();
        SchemaTreeEditor::new(model.root(), &root, options)
            .unwrap()
            .build(&document)
    }

    fn asset_tree(yaml: &str, options: &EditorOptions) -> EditorTree {
        let model = SchemaModel::builtin().unwrap();
        let document: Value = serde_yaml::from_str(yaml).unwrap();
        let root = FieldPath::from_keys(["technical_assets", "Web"]);
        SchemaTreeEditor::new(model.entity("technical_assets").unwrap(), &root, options)
            .unwrap()
            .build(&document)
    }

    #[test]
    fn test_one_field_per_schema_property_in_order() {
        let tree = build("title: Shop\nunknown_field: 1\n", &EditorOptions::default());
        let names: Vec<_> = tree.fields.iter().map(|f| f.name.as_str()).take(3).collect();
        assert_eq!(names, vec!["threagile_version", "title", "date"]);
        assert!(tree.fields.iter().all(|f| f.name != "unknown_field"));
        assert_eq!(
            tree.find(&FieldPath::from_keys(["title"])),
            Some(&FieldEditor::Text { value: "Shop".into() })
        );
    }

    #[test]
    fn test_hidden_fields_skipped_at_root() {
        let options = EditorOptions::default().hide("title").hide("technical_assets");
        let tree = build("{}", &options);
        assert!(tree.fields.iter().all(|f| f.name != "title" && f.name != "technical_assets"));
    }

    #[test]
    fn test_date_and_enum_and_toggle() {
        let tree = build("date: not-a-date\nbusiness_criticality: critical\n", &EditorOptions::default());
        assert_eq!(
            tree.find(&FieldPath::from_keys(["date"])),
            Some(&FieldEditor::Date { value: "not-a-date".into() })
        );
        match tree.find(&FieldPath::from_keys(["business_criticality"])) {
            Some(FieldEditor::Choice { selected, options }) => {
                assert_eq!(selected.as_deref(), Some("critical"));
                assert_eq!(options.len(), 5);
            }
            other => panic!("Expected Choice, got {:?}", other),
        }
        assert_eq!(
            tree.find(&FieldPath::from_keys(["diagram_tweak_layout_left_to_right"])),
            Some(&FieldEditor::Toggle { checked: false })
        );
    }

    #[test]
    fn test_closed_object_is_collapsed_group() {
        let tree = build("author: {name: Ann}\n", &EditorOptions::default());
        match tree.find(&FieldPath::from_keys(["author"])) {
            Some(FieldEditor::Group { collapsed, fields }) => {
                assert!(*collapsed);
                assert_eq!(fields[0].path, FieldPath::from_keys(["author", "name"]));
            }
            other => panic!("Expected Group, got {:?}", other),
        }
    }

    #[test]
    fn test_extendable_section_renders_keyed_list() {
        let options = EditorOptions::default().extendable("risk_tracking", "Add risk tracking");
        let tree = build("risk_tracking:\n  r1: {status: accepted}\n  r2:\n", &options);
        match tree.find(&FieldPath::from_keys(["risk_tracking"])) {
            Some(FieldEditor::KeyedList { caption, entries }) => {
                assert_eq!(caption, "Add risk tracking");
                let keys: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(keys, vec!["r1", "r2"]);
            }
            other => panic!("Expected KeyedList, got {:?}", other),
        }
        assert!(tree
            .find(&FieldPath::from_keys(["risk_tracking", "r1", "status"]))
            .is_some());
    }

    #[test]
    fn test_open_object_without_extendable_is_empty_group() {
        let tree = build("questions: {q1: answer}\n", &EditorOptions::default());
        assert_eq!(
            tree.find(&FieldPath::from_keys(["questions"])),
            Some(&FieldEditor::Group {
                collapsed: true,
                fields: vec![]
            })
        );
    }

    #[test]
    fn test_dynamic_enum_on_link_target_and_list_items() {
        let mut enums = DynamicEnums::new();
        enums.bind("target", vec!["ta1".into(), "ta2".into()]);
        enums.bind("data_assets_processed", vec!["customers".into()]);
        let options = EditorOptions::default()
            .extendable("communication_links", "Add link")
            .with_dynamic_enums(enums);
        let tree = asset_tree(
            "technical_assets:\n  Web:\n    id: ta1\n    data_assets_processed: [customers]\n    communication_links:\n      c1: {target: ta2}\n",
            &options,
        );
        let target = FieldPath::from_keys(["technical_assets", "Web", "communication_links", "c1", "target"]);
        assert_eq!(
            tree.find(&target),
            Some(&FieldEditor::Choice {
                selected: Some("ta2".into()),
                options: vec!["ta1".into(), "ta2".into()]
            })
        );
        let item = FieldPath::from_keys(["technical_assets", "Web", "data_assets_processed"]).index(0);
        assert!(matches!(tree.find(&item), Some(FieldEditor::Choice { .. })));
    }

    #[test]
    fn test_reference_list_without_identifiers_is_not_appendable() {
        let mut enums = DynamicEnums::new();
        enums.bind("data_assets_processed", vec![]);
        enums.bind("data_assets_stored", vec!["customers".into()]);
        let options = EditorOptions::default().with_dynamic_enums(enums);
        let tree = asset_tree("technical_assets:\n  Web:\n    id: ta1\n", &options);

        let web = FieldPath::from_keys(["technical_assets", "Web"]);
        match tree.find(&web.clone().key("data_assets_processed")) {
            Some(FieldEditor::List { appendable, .. }) => assert!(!*appendable),
            other => panic!("Expected List, got {:?}", other),
        }
        match tree.find(&web.key("data_assets_stored")) {
            Some(FieldEditor::List { appendable, .. }) => assert!(*appendable),
            other => panic!("Expected List, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_field_shows_nan_and_bounds() {
        let tree = asset_tree(
            "technical_assets:\n  Web:\n    diagram_tweak_order: .nan\n",
            &EditorOptions::default(),
        );
        match tree.find(&FieldPath::from_keys(["technical_assets", "Web", "diagram_tweak_order"])) {
            Some(FieldEditor::Numeric { value, integer, minimum, .. }) => {
                assert!(value.unwrap().is_nan());
                assert!(*integer);
                assert_eq!(*minimum, Some(0.0));
            }
            other => panic!("Expected Numeric, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_kind_renders_placeholder() {
        let model = SchemaModel::from_str(r#"{"type": "object", "properties": {"blob": {"type": "null"}, "name": {"type": "string"}}}"#).unwrap();
        let root = FieldPath::root();
        let options = EditorOptions::default();
        let tree = SchemaTreeEditor::new(model.root(), &root, &options)
            .unwrap()
            .build(&Value::Null);
        assert_eq!(
            tree.fields[0].editor,
            FieldEditor::Placeholder { type_name: "null".into() }
        );
        assert_eq!(tree.fields[1].editor, FieldEditor::Text { value: String::new() });
    }
}
