//! Edit session
//!
//! Owns the one document being edited and sequences every committed edit:
//! change listeners, reference repair for identifier edits, re-projection of
//! the graph, then publication to graph subscribers. Single-threaded; the
//! session is the only owner of the document.

use tracing::{debug, info};

use crate::analysis::{RiskAnalyzer, RiskReport, DEFAULT_STATUS};
use crate::checksum::Checksum;
use crate::codec::{DocumentCodec, YamlCodec};
use crate::config::EditorConfig;
use crate::document::{Document, FieldPath, IdentifierIndex, IdentifierKind};
use crate::editor::{
    ChangeEvent, DynamicEnums, EditAction, EditorOptions, EditorTree, SchemaTreeEditor,
};
use crate::error::{EditError, Result, SchemaError, SessionError};
use crate::graph::{project, ProjectionOptions, ThreatGraph};
use crate::integrity::{ReferenceIntegrityEngine, RepairPolicy, RepairReport};
use crate::schema::{SchemaModel, SchemaNode};

/// Called once per committed edit, before repair
pub type ChangeListener = Box<dyn FnMut(&ChangeEvent)>;

/// Called with every freshly projected graph
pub type GraphSubscriber = Box<dyn FnMut(&ThreatGraph)>;

/// What one committed edit did
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub event: ChangeEvent,
    /// Present when the edit renamed an identifier
    pub repair: Option<RepairReport>,
}

struct Loaded {
    document: Document,
    graph: ThreatGraph,
    baseline: Checksum,
}

enum SessionState {
    Idle,
    Ready(Loaded),
}

impl SessionState {
    fn loaded(&self) -> Result<&Loaded> {
        match self {
            SessionState::Ready(loaded) => Ok(loaded),
            SessionState::Idle => Err(SessionError::NoDocument),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded> {
        match self {
            SessionState::Ready(loaded) => Ok(loaded),
            SessionState::Idle => Err(SessionError::NoDocument),
        }
    }
}

pub struct EditSession<C = YamlCodec> {
    codec: C,
    schema: SchemaModel,
    engine: ReferenceIntegrityEngine,
    projection: ProjectionOptions,
    default_status: String,
    state: SessionState,
    listeners: Vec<ChangeListener>,
    subscribers: Vec<GraphSubscriber>,
}

impl EditSession<YamlCodec> {
    pub fn new(schema: SchemaModel) -> Self {
        Self::with_codec(schema, YamlCodec)
    }

    /// Session configured from `config`, loading the configured schema
    pub fn from_config(config: &EditorConfig) -> std::result::Result<Self, SchemaError> {
        Ok(Self::new(config.schema.load()?)
            .with_projection(config.graph)
            .with_repair_policy(config.repair)
            .with_default_status(config.risk.default_status.clone()))
    }
}

impl<C: DocumentCodec> EditSession<C> {
    pub fn with_codec(schema: SchemaModel, codec: C) -> Self {
        Self {
            codec,
            schema,
            engine: ReferenceIntegrityEngine::default(),
            projection: ProjectionOptions::default(),
            default_status: DEFAULT_STATUS.to_string(),
            state: SessionState::Idle,
            listeners: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_projection(mut self, projection: ProjectionOptions) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.engine = ReferenceIntegrityEngine::new(policy);
        self
    }

    pub fn with_default_status(mut self, status: impl Into<String>) -> Self {
        self.default_status = status.into();
        self
    }

    pub fn on_change(&mut self, listener: impl FnMut(&ChangeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&ThreatGraph) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Parse `text` and replace the current document with it.
    /// On failure the previous document, if any, stays loaded.
    pub fn load(&mut self, text: &str) -> Result<&ThreatGraph> {
        let document = self.codec.parse(text).map_err(SessionError::Load)?;
        self.load_document(document)
    }

    pub fn load_document(&mut self, document: Document) -> Result<&ThreatGraph> {
        let baseline = Checksum::from_document(&document);
        let graph = project(&document, &self.projection);
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "loaded threat model"
        );
        self.state = SessionState::Ready(Loaded {
            document,
            graph,
            baseline,
        });
        self.publish()?;
        Ok(&self.state.loaded()?.graph)
    }

    pub fn document(&self) -> Result<&Document> {
        Ok(&self.state.loaded()?.document)
    }

    pub fn graph(&self) -> Result<&ThreatGraph> {
        Ok(&self.state.loaded()?.graph)
    }

    pub fn identifiers(&self) -> Result<IdentifierIndex> {
        Ok(IdentifierIndex::collect(self.document()?))
    }

    /// Change projection options and re-project
    pub fn set_projection(&mut self, projection: ProjectionOptions) -> Result<&ThreatGraph> {
        self.projection = projection;
        self.reproject()?;
        Ok(&self.state.loaded()?.graph)
    }

    /// Build the editor tree for the object at `root`.
    ///
    /// Absent closed-object fields are created first, so nested editors have
    /// something to write into. Reference fields offer the identifiers that
    /// exist right now.
    pub fn render(&mut self, root: &FieldPath, options: &EditorOptions) -> Result<EditorTree> {
        let loaded = self.state.loaded_mut()?;
        let options = live_options(options, &loaded.document);
        let editor = SchemaTreeEditor::new(panel_schema(&self.schema, root)?, root, &options)?;
        editor.materialize(loaded.document.as_value_mut());
        Ok(editor.build(loaded.document.as_value()))
    }

    /// Commit one edit made in the editor rooted at `root`.
    /// Returns `None` when the editor treated the action as a no-op.
    pub fn apply(
        &mut self,
        root: &FieldPath,
        options: &EditorOptions,
        action: EditAction,
    ) -> Result<Option<EditOutcome>> {
        let loaded = self.state.loaded_mut()?;
        let options = live_options(options, &loaded.document);
        let editor = SchemaTreeEditor::new(panel_schema(&self.schema, root)?, root, &options)?;
        let Some(event) = editor.apply(loaded.document.as_value_mut(), action)? else {
            return Ok(None);
        };
        let repair = self.handle_change(&event)?;
        Ok(Some(EditOutcome { event, repair }))
    }

    /// Serialize the document as it is; the graph is not touched
    pub fn export(&self) -> Result<String> {
        self.codec
            .serialize(&self.state.loaded()?.document)
            .map_err(SessionError::Export)
    }

    /// Whether the document differs from what was loaded
    pub fn is_modified(&self) -> Result<bool> {
        let loaded = self.state.loaded()?;
        Ok(!loaded.baseline.verify(&loaded.document))
    }

    /// Run the analysis on the current document and join tracking status.
    /// A failing analyzer leaves the session as it was.
    pub fn analyze(&self, analyzer: &dyn RiskAnalyzer) -> Result<RiskReport> {
        let document = self.document()?;
        let response = analyzer.analyze(document)?;
        Ok(RiskReport::join(&response, document, &self.default_status))
    }

    fn handle_change(&mut self, event: &ChangeEvent) -> Result<Option<RepairReport>> {
        for listener in &mut self.listeners {
            listener(event);
        }

        let repair = match identifier_rename(event) {
            Some((kind, old_id, new_id)) => {
                let loaded = self.state.loaded_mut()?;
                let report = self.engine.repair(&mut loaded.document, kind, old_id, new_id);
                debug!(path = %event.path, rewritten = report.rewritten.len(), "identifier renamed");
                Some(report)
            }
            None => None,
        };

        self.reproject()?;
        Ok(repair)
    }

    fn reproject(&mut self) -> Result<()> {
        let loaded = self.state.loaded_mut()?;
        loaded.graph = project(&loaded.document, &self.projection);
        self.publish()
    }

    fn publish(&mut self) -> Result<()> {
        let loaded = self.state.loaded()?;
        for subscriber in &mut self.subscribers {
            subscriber(&loaded.graph);
        }
        Ok(())
    }
}

/// Schema node for an editor rooted at `root`
fn panel_schema<'s>(schema: &'s SchemaModel, root: &FieldPath) -> std::result::Result<&'s SchemaNode, EditError> {
    schema
        .resolve(root.segments())
        .ok_or_else(|| EditError::NotInSchema(root.to_string()))
}

/// Caller options with reference fields bound to the live identifiers
fn live_options(options: &EditorOptions, document: &Document) -> EditorOptions {
    options
        .clone()
        .with_dynamic_enums(DynamicEnums::from_identifiers(&IdentifierIndex::collect(document)))
}

/// `(kind, old, new)` when `event` renamed the id of a top-level entity
fn identifier_rename(event: &ChangeEvent) -> Option<(IdentifierKind, &str, &str)> {
    if !event.is_identifier_edit() || event.path.len() != 3 {
        return None;
    }
    let kind = IdentifierKind::from_section(event.path.section()?)?;
    let old_id = event.old_value.as_str()?;
    let new_id = event.new_value.as_str()?;
    (old_id != new_id).then_some((kind, old_id, new_id))
}
