//! End-to-end edit flows through the session

use std::cell::RefCell;
use std::rc::Rc;

use serde_yaml::{Mapping, Value};
use threat_model_editor::analysis::AnalysisResponse;
use threat_model_editor::editor::ChangeKind;
use threat_model_editor::{
    AnalysisError, Document, EditAction, EditSession, EditorConfig, EditorOptions, FieldEditor,
    FieldInput, FieldPath, ProjectionOptions, RepairPolicy, RiskAnalyzer, SchemaModel,
};

const WEB_DB: &str = r#"
technical_assets:
  Web:
    id: ta1
    communication_links:
      c1:
        target: ta2
  DB:
    id: ta2
"#;

fn session(text: &str) -> EditSession {
    let mut session = EditSession::new(SchemaModel::builtin().unwrap());
    session.load(text).unwrap();
    session
}

fn node_ids(session: &EditSession) -> Vec<String> {
    session
        .graph()
        .unwrap()
        .nodes
        .iter()
        .map(|n| n.id.clone())
        .collect()
}

fn edge_pairs(session: &EditSession) -> Vec<(String, String)> {
    session
        .graph()
        .unwrap()
        .edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect()
}

fn set(path: FieldPath, value: &str) -> EditAction {
    EditAction::SetField {
        path,
        input: FieldInput::text(value),
    }
}

#[test]
fn test_projection_then_source_rename() {
    let mut session = session(WEB_DB);
    assert_eq!(node_ids(&session), vec!["ta1", "ta2"]);
    assert_eq!(edge_pairs(&session), vec![("ta1".to_string(), "ta2".to_string())]);

    let root = FieldPath::from_keys(["technical_assets", "Web"]);
    let outcome = session
        .apply(&root, &EditorOptions::default(), set(root.clone().key("id"), "ta1-new"))
        .unwrap()
        .unwrap();
    assert!(outcome.repair.unwrap().is_empty());

    let target = root.key("communication_links").key("c1").key("target");
    assert_eq!(
        session.document().unwrap().get(&target).and_then(Value::as_str),
        Some("ta2")
    );
    assert_eq!(node_ids(&session), vec!["ta1-new", "ta2"]);
    assert_eq!(edge_pairs(&session), vec![("ta1-new".to_string(), "ta2".to_string())]);
}

#[test]
fn test_target_rename_rewires_link() {
    let mut session = session(WEB_DB);
    let root = FieldPath::from_keys(["technical_assets", "DB"]);
    session
        .apply(&root, &EditorOptions::default(), set(root.clone().key("id"), "database"))
        .unwrap();
    assert_eq!(edge_pairs(&session), vec![("ta1".to_string(), "database".to_string())]);
    assert!(session.graph().unwrap().dangling_edges().is_empty());
}

#[test]
fn test_add_risk_tracking_key_once() {
    let mut session = session("title: Shop\n");
    let root = FieldPath::root();
    let options = EditorOptions::default().extendable("risk_tracking", "Add risk tracking");
    let add = EditAction::AddKey {
        path: FieldPath::from_keys(["risk_tracking"]),
        key: "newRisk".into(),
    };

    let outcome = session.apply(&root, &options, add.clone()).unwrap().unwrap();
    assert_eq!(outcome.event.kind, ChangeKind::KeyAdded);
    assert!(session.apply(&root, &options, add).unwrap().is_none());

    let section = session
        .document()
        .unwrap()
        .get(&FieldPath::from_keys(["risk_tracking"]))
        .and_then(Value::as_mapping)
        .unwrap()
        .clone();
    assert_eq!(section.len(), 1);
    assert_eq!(section.get("newRisk"), Some(&Value::Mapping(Mapping::new())));
}

#[test]
fn test_rendered_tree_follows_edits() {
    let mut session = session(&format!("{}data_assets:\n  Customers:\n    id: customers\n", WEB_DB));
    let root = FieldPath::from_keys(["technical_assets", "Web"]);
    let options = EditorOptions::default().extendable("communication_links", "Add link");

    session
        .apply(
            &root,
            &options,
            EditAction::AppendItem {
                path: root.clone().key("data_assets_processed"),
            },
        )
        .unwrap();
    let tree = session.render(&root, &options).unwrap();
    match tree.find(&root.clone().key("data_assets_processed")) {
        Some(FieldEditor::List { items, appendable }) => {
            assert_eq!(items.len(), 1);
            assert!(*appendable);
        }
        other => panic!("Expected List, got {:?}", other),
    }
    match tree.find(&root.clone().key("communication_links").key("c1").key("target")) {
        Some(FieldEditor::Choice { selected, options }) => {
            assert_eq!(selected.as_deref(), Some("ta2"));
            assert_eq!(options, &vec!["ta1".to_string(), "ta2".to_string()]);
        }
        other => panic!("Expected Choice, got {:?}", other),
    }
}

#[test]
fn test_project_panel_render_leaves_hidden_sections_alone() {
    let text = "title: Shop\nauthor:\n  name: Ann\nbusiness_overview:\n  description: shop\ntechnical_overview:\n  description: web\n";
    let mut session = session(text);
    let options = EditorConfig::default().editor.project_options();

    let tree = session.render(&FieldPath::root(), &options).unwrap();
    assert!(tree.find(&FieldPath::from_keys(["technical_assets"])).is_none());
    assert_eq!(session.export().unwrap(), text);
    assert!(!session.is_modified().unwrap());

    let mut bare = crate::session("title: Shop\n");
    bare.render(&FieldPath::root(), &options).unwrap();
    let exported = bare.export().unwrap();
    for hidden in ["technical_assets", "data_assets", "trust_boundaries", "shared_runtimes"] {
        assert!(!exported.contains(hidden), "{} written by render", hidden);
    }
}

#[test]
fn test_data_asset_rename_follows_policy() {
    let model = r#"
data_assets:
  Customers:
    id: customers
technical_assets:
  Web:
    id: web
    data_assets_processed: [customers]
"#;
    let root = FieldPath::from_keys(["data_assets", "Customers"]);
    let projection = ProjectionOptions {
        show_data_assets: true,
    };

    let mut plain = session(model);
    plain.set_projection(projection).unwrap();
    plain
        .apply(&root, &EditorOptions::default(), set(root.clone().key("id"), "clients"))
        .unwrap();
    assert_eq!(plain.graph().unwrap().dangling_edges().len(), 1);

    let mut repairing = EditSession::new(SchemaModel::builtin().unwrap())
        .with_projection(projection)
        .with_repair_policy(RepairPolicy {
            propagate_data_asset_ids: true,
            ..Default::default()
        });
    repairing.load(model).unwrap();
    repairing
        .apply(&root, &EditorOptions::default(), set(root.clone().key("id"), "clients"))
        .unwrap();
    assert!(repairing.graph().unwrap().dangling_edges().is_empty());
}

#[test]
fn test_graph_published_on_load_and_edit() {
    let mut session = EditSession::new(SchemaModel::builtin().unwrap());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    session.subscribe(move |graph| sink.borrow_mut().push(graph.nodes.len()));

    session.load(WEB_DB).unwrap();
    let root = FieldPath::root();
    let options = EditorOptions::default().extendable("technical_assets", "Add asset");
    session
        .apply(
            &root,
            &options,
            EditAction::AddKey {
                path: FieldPath::from_keys(["technical_assets"]),
                key: "Cache".into(),
            },
        )
        .unwrap();

    assert_eq!(*seen.borrow(), vec![2, 3]);
}

#[test]
fn test_export_round_trips_unknown_fields() {
    let text = "title: Shop\ncustom_extension:\n  owner: team-a\ntechnical_assets:\n  Web:\n    id: ta1\n    vendor_note: keep me\n";
    let mut session = session(text);
    session
        .apply(
            &FieldPath::root(),
            &EditorOptions::default(),
            set(FieldPath::from_keys(["title"]), "Store"),
        )
        .unwrap();
    assert_eq!(session.export().unwrap(), text.replace("Shop", "Store"));
}

struct CannedAnalyzer(&'static str);

impl RiskAnalyzer for CannedAnalyzer {
    fn analyze(&self, _document: &Document) -> Result<AnalysisResponse, AnalysisError> {
        AnalysisResponse::from_json(self.0)
    }
}

#[test]
fn test_analysis_joins_tracking_with_configured_default() {
    let mut config = EditorConfig::default();
    config.risk.default_status = "unchecked".into();
    let mut session = EditSession::from_config(&config).unwrap();
    session
        .load("risk_tracking:\n  missing-waf@web:\n    status: mitigated\n")
        .unwrap();

    let report = session
        .analyze(&CannedAnalyzer(
            r#"{"missing-waf": [
                {"synthetic_id": "missing-waf@web", "title": "t", "severity": "low",
                 "exploitation_likelihood": "likely", "exploitation_impact": "low"},
                {"synthetic_id": "missing-waf@api", "title": "t", "severity": "low",
                 "exploitation_likelihood": "likely", "exploitation_impact": "low"}
            ]}"#,
        ))
        .unwrap();

    let statuses: Vec<_> = report.risks.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["mitigated", "unchecked"]);
}
