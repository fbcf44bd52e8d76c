//! Threat Model Editor
//!
//! Core of a schema-driven threat model editor. A JSON schema describes the
//! model; the editor turns it into field editors over the in-memory document,
//! identifier renames are repaired across sections, and a node/edge/group
//! graph is re-derived after every edit.
//!
//! ## Features
//!
//! - **Schema Tree Editor**: stateless editor trees and edit actions for any object schema
//! - **Reference Repair**: technical asset renames follow into boundaries, runtimes and links
//! - **Graph Projection**: deterministic graph with trust boundary grouping, DOT and JSON export
//! - **Risk Join**: analysis responses joined with the model's risk tracking
//!
//! ## Architecture
//!
//! ```text
//! text ──codec──▶ EditSession ──render──▶ EditorTree
//!                     │  ▲
//!              apply  │  │ ChangeEvent
//!                     ▼  │
//!             SchemaTreeEditor
//!                     │
//!                     ├──▶ ReferenceIntegrityEngine (id edits)
//!                     └──▶ project ──▶ ThreatGraph ──▶ subscribers
//! ```

pub mod analysis;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod graph;
pub mod integrity;
pub mod schema;
pub mod session;

pub use analysis::{AnalysisResponse, RiskAnalyzer, RiskRecord, RiskReport};
pub use checksum::Checksum;
pub use codec::{DocumentCodec, YamlCodec};
pub use config::EditorConfig;
pub use document::{Document, FieldPath, IdentifierIndex, IdentifierKind, PathSegment};
pub use editor::{
    ChangeEvent, ChangeKind, DynamicEnums, EditAction, EditorOptions, EditorTree, FieldEditor,
    FieldInput, SchemaTreeEditor,
};
pub use error::{AnalysisError, CodecError, EditError, Result, SchemaError, SessionError};
pub use graph::{project, GraphEdge, GraphNode, ProjectionOptions, ThreatGraph};
pub use integrity::{ReferenceIntegrityEngine, RepairPolicy, RepairReport};
pub use schema::{SchemaModel, SchemaNode};
pub use session::{EditOutcome, EditSession};
