//! Property tests for repair, projection and list edits

use proptest::prelude::*;
use proptest::sample::Index;
use serde_yaml::{Mapping, Value};
use threat_model_editor::graph::NodeKind;
use threat_model_editor::{
    project, Document, EditAction, EditSession, EditorOptions, FieldInput, FieldPath,
    ProjectionOptions, SchemaModel,
};

/// Generated model: asset count, links as (source, target), boundary and runtime memberships
#[derive(Debug, Clone)]
struct Model {
    assets: usize,
    links: Vec<(usize, usize)>,
    boundaries: Vec<Vec<usize>>,
    runtimes: Vec<Vec<usize>>,
}

fn model_strategy() -> impl Strategy<Value = Model> {
    (1..6usize).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n), 0..8),
            prop::collection::vec(prop::collection::vec(0..n, 0..4), 0..4),
            prop::collection::vec(prop::collection::vec(0..n, 0..3), 0..3),
        )
            .prop_map(|(assets, links, boundaries, runtimes)| Model {
                assets,
                links,
                boundaries,
                runtimes,
            })
    })
}

fn key(text: String) -> Value {
    Value::String(text)
}

fn id_list(members: &[usize]) -> Value {
    Value::Sequence(members.iter().map(|i| key(format!("ta{}", i))).collect())
}

fn build(model: &Model) -> Document {
    let mut assets = Mapping::new();
    for i in 0..model.assets {
        let mut asset = Mapping::new();
        asset.insert(key("id".into()), key(format!("ta{}", i)));
        let mut links = Mapping::new();
        for (j, (_, target)) in model.links.iter().enumerate().filter(|(_, (from, _))| *from == i) {
            let mut link = Mapping::new();
            link.insert(key("target".into()), key(format!("ta{}", target)));
            links.insert(key(format!("link{}", j)), Value::Mapping(link));
        }
        asset.insert(key("communication_links".into()), Value::Mapping(links));
        assets.insert(key(format!("Asset{}", i)), Value::Mapping(asset));
    }

    let mut boundaries = Mapping::new();
    for (b, members) in model.boundaries.iter().enumerate() {
        let mut boundary = Mapping::new();
        boundary.insert(key("id".into()), key(format!("tb{}", b)));
        boundary.insert(key("technical_assets_inside".into()), id_list(members));
        boundaries.insert(key(format!("Boundary{}", b)), Value::Mapping(boundary));
    }

    let mut runtimes = Mapping::new();
    for (r, members) in model.runtimes.iter().enumerate() {
        let mut runtime = Mapping::new();
        runtime.insert(key("technical_assets_running".into()), id_list(members));
        runtimes.insert(key(format!("Runtime{}", r)), Value::Mapping(runtime));
    }

    let mut root = Mapping::new();
    root.insert(key("technical_assets".into()), Value::Mapping(assets));
    root.insert(key("trust_boundaries".into()), Value::Mapping(boundaries));
    root.insert(key("shared_runtimes".into()), Value::Mapping(runtimes));
    Document::from_value(Value::Mapping(root)).unwrap()
}

/// Every value at the technical asset reference sites
fn referenced_ids(document: &Document) -> Vec<String> {
    let mut ids = Vec::new();
    let strings = |value: Option<&Value>| -> Vec<String> {
        value
            .and_then(Value::as_sequence)
            .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default()
    };
    for (_, boundary) in document.entities("trust_boundaries") {
        ids.extend(strings(boundary.get("technical_assets_inside")));
    }
    for (_, runtime) in document.entities("shared_runtimes") {
        ids.extend(strings(runtime.get("technical_assets_running")));
    }
    for (_, asset) in document.entities("technical_assets") {
        if let Some(links) = asset.get("communication_links").and_then(Value::as_mapping) {
            for (_, link) in links {
                if let Some(target) = link.get("target").and_then(Value::as_str) {
                    ids.push(target.to_string());
                }
            }
        }
    }
    ids
}

fn session_for(document: Document) -> EditSession {
    let mut session = EditSession::new(SchemaModel::builtin().unwrap());
    session.load_document(document).unwrap();
    session
}

proptest! {
    #[test]
    fn prop_rename_leaves_no_old_references(model in model_strategy(), pick in any::<Index>()) {
        let renamed = pick.index(model.assets);
        let before = referenced_ids(&build(&model));
        let mut session = session_for(build(&model));

        let root = FieldPath::from_keys(["technical_assets".to_string(), format!("Asset{}", renamed)]);
        let action = EditAction::SetField {
            path: root.clone().key("id"),
            input: FieldInput::text("renamed"),
        };
        session.apply(&root, &EditorOptions::default(), action).unwrap();

        let old_id = format!("ta{}", renamed);
        let after = referenced_ids(session.document().unwrap());
        prop_assert!(!after.contains(&old_id));
        prop_assert_eq!(after.len(), before.len());
        prop_assert_eq!(
            after.iter().filter(|id| *id == "renamed").count(),
            before.iter().filter(|id| **id == old_id).count()
        );
    }

    #[test]
    fn prop_projection_is_deterministic(model in model_strategy(), show_data_assets in any::<bool>()) {
        let document = build(&model);
        let options = ProjectionOptions { show_data_assets };
        let first = project(&document, &options);
        let second = project(&document, &options);
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_one_node_per_technical_asset(model in model_strategy()) {
        let graph = project(&build(&model), &ProjectionOptions::default());
        for i in 0..model.assets {
            let id = format!("ta{}", i);
            prop_assert_eq!(graph.nodes.iter().filter(|n| n.id == id).count(), 1);
        }
        prop_assert_eq!(graph.nodes_of(NodeKind::TechnicalAsset).count(), model.assets);
        prop_assert_eq!(graph.edges.len(), model.links.len());
    }

    #[test]
    fn prop_last_listing_boundary_wins(model in model_strategy()) {
        let graph = project(&build(&model), &ProjectionOptions::default());
        for i in 0..model.assets {
            let expected = model
                .boundaries
                .iter()
                .rposition(|members| members.contains(&i))
                .map(|b| format!("tb{}", b));
            let node = graph.node(&format!("ta{}", i)).unwrap();
            prop_assert_eq!(&node.group_id, &expected);
        }
    }

    #[test]
    fn prop_append_and_remove_item(tags in prop::collection::vec("[a-z]{1,6}", 0..8), pick in any::<Index>()) {
        let mut root = Mapping::new();
        root.insert(key("tags_available".into()), Value::Sequence(tags.iter().cloned().map(Value::String).collect()));
        let mut session = session_for(Document::from_value(Value::Mapping(root)).unwrap());
        let list = FieldPath::from_keys(["tags_available"]);
        let items = |session: &EditSession| -> Vec<String> {
            session
                .document()
                .unwrap()
                .get(&list)
                .and_then(Value::as_sequence)
                .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default()
        };

        session
            .apply(&FieldPath::root(), &EditorOptions::default(), EditAction::AppendItem { path: list.clone() })
            .unwrap();
        let appended = items(&session);
        prop_assert_eq!(appended.len(), tags.len() + 1);
        prop_assert_eq!(&appended[..tags.len()], &tags[..]);

        let index = pick.index(appended.len());
        session
            .apply(&FieldPath::root(), &EditorOptions::default(), EditAction::RemoveItem { path: list.clone(), index })
            .unwrap();
        let mut expected = appended.clone();
        expected.remove(index);
        prop_assert_eq!(items(&session), expected);
    }
}
