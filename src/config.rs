//! Configuration for the threat model editor
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (threat-editor.toml)
//! - Environment variables (THREAT_EDITOR__*)
//!
//! ## Example config file (threat-editor.toml):
//! ```toml
//! [schema]
//! path = "schema/threat-model.schema.json"
//!
//! [graph]
//! show_data_assets = true
//!
//! [repair]
//! propagate_data_asset_ids = false
//! propagate_trust_boundary_ids = false
//!
//! [editor]
//! hidden_fields = ["technical_assets", "data_assets", "trust_boundaries"]
//!
//! [editor.extendable]
//! risk_tracking = "Add risk tracking"
//! communication_links = "Add communication link"
//!
//! [risk]
//! default_status = "Unchecked"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::DEFAULT_STATUS;
use crate::editor::EditorOptions;
use crate::graph::ProjectionOptions;
use crate::integrity::RepairPolicy;
use crate::schema::SchemaModel;
use crate::error::SchemaError;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub schema: SchemaSource,

    #[serde(default)]
    pub graph: ProjectionOptions,

    #[serde(default)]
    pub repair: RepairPolicy,

    #[serde(default)]
    pub editor: PanelConfig,

    #[serde(default)]
    pub risk: RiskConfig,
}

/// Where the model schema comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSource {
    /// JSON schema file; the built-in schema when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SchemaSource {
    pub fn load(&self) -> Result<SchemaModel, SchemaError> {
        match &self.path {
            Some(path) => SchemaModel::from_path(path),
            None => SchemaModel::builtin(),
        }
    }
}

/// Editor panel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Root fields not shown in the project panel
    #[serde(default = "default_hidden_fields")]
    pub hidden_fields: Vec<String>,

    /// Extendable field name → add-button caption
    #[serde(default = "default_extendable")]
    pub extendable: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Status for risks with no tracking entry
    #[serde(default = "default_status")]
    pub default_status: String,
}

// Default value functions
fn default_hidden_fields() -> Vec<String> {
    ["technical_assets", "data_assets", "trust_boundaries", "shared_runtimes"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_extendable() -> IndexMap<String, String> {
    [
        ("questions", "Add question"),
        ("abuse_cases", "Add abuse case"),
        ("security_requirements", "Add security requirement"),
        ("risk_tracking", "Add risk tracking"),
        ("communication_links", "Add communication link"),
    ]
    .into_iter()
    .map(|(field, caption)| (field.to_string(), caption.to_string()))
    .collect()
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            hidden_fields: default_hidden_fields(),
            extendable: default_extendable(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_status: default_status(),
        }
    }
}

impl PanelConfig {
    /// Options for an editor rooted at the document root
    pub fn project_options(&self) -> EditorOptions {
        let options = self
            .hidden_fields
            .iter()
            .fold(EditorOptions::default(), |options, field| options.hide(field.as_str()));
        self.with_extendable(options)
    }

    /// Options for an editor rooted at one entity; nothing is hidden
    pub fn entity_options(&self) -> EditorOptions {
        self.with_extendable(EditorOptions::default())
    }

    fn with_extendable(&self, options: EditorOptions) -> EditorOptions {
        self.extendable
            .iter()
            .fold(options, |options, (field, caption)| options.extendable(field.as_str(), caption.as_str()))
    }
}

impl EditorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "threat-editor.toml",
            ".threat-editor.toml",
            "config/threat-editor.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "threat-editor") {
            let xdg_config = config_dir.config_dir().join("threat-editor.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // THREAT_EDITOR__GRAPH__SHOW_DATA_ASSETS=true
        builder = builder.add_source(
            Environment::with_prefix("THREAT_EDITOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
