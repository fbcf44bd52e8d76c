//! Reference repair
//!
//! Identifiers are referenced by value from other sections. When an `id` is
//! renamed the engine rewrites every exact match at the known reference
//! sites. Technical-asset ids are always repaired; data-asset and
//! trust-boundary ids only when the [`RepairPolicy`] asks for it.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::document::{
    Document, FieldPath, IdentifierKind, SHARED_RUNTIMES, TECHNICAL_ASSETS, TRUST_BOUNDARIES,
};

const COMMUNICATION_LINKS: &str = "communication_links";

/// Which identifier kinds beyond technical assets get repaired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPolicy {
    pub propagate_data_asset_ids: bool,
    pub propagate_trust_boundary_ids: bool,
}

impl RepairPolicy {
    pub fn propagates(&self, kind: IdentifierKind) -> bool {
        match kind {
            IdentifierKind::TechnicalAsset => true,
            IdentifierKind::DataAsset => self.propagate_data_asset_ids,
            IdentifierKind::TrustBoundary => self.propagate_trust_boundary_ids,
        }
    }
}

/// Every value rewritten by one repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub kind: IdentifierKind,
    pub old_id: String,
    pub new_id: String,
    pub rewritten: Vec<FieldPath>,
}

impl RepairReport {
    fn new(kind: IdentifierKind, old_id: &str, new_id: &str) -> Self {
        Self {
            kind,
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
            rewritten: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty()
    }
}

/// Where one identifier kind is referenced
enum Site {
    /// A list field of every entity in a section
    EntityList { section: &'static str, field: &'static str },
    /// A scalar field of every communication link
    LinkScalar { field: &'static str },
    /// A list field of every communication link
    LinkList { field: &'static str },
}

const TECHNICAL_ASSET_SITES: &[Site] = &[
    Site::EntityList {
        section: TRUST_BOUNDARIES,
        field: "technical_assets_inside",
    },
    Site::EntityList {
        section: SHARED_RUNTIMES,
        field: "technical_assets_running",
    },
    Site::LinkScalar { field: "target" },
];

const DATA_ASSET_SITES: &[Site] = &[
    Site::EntityList {
        section: TECHNICAL_ASSETS,
        field: "data_assets_processed",
    },
    Site::EntityList {
        section: TECHNICAL_ASSETS,
        field: "data_assets_stored",
    },
    Site::LinkList {
        field: "data_assets_sent",
    },
    Site::LinkList {
        field: "data_assets_received",
    },
];

const TRUST_BOUNDARY_SITES: &[Site] = &[Site::EntityList {
    section: TRUST_BOUNDARIES,
    field: "trust_boundaries_nested",
}];

fn sites(kind: IdentifierKind) -> &'static [Site] {
    match kind {
        IdentifierKind::TechnicalAsset => TECHNICAL_ASSET_SITES,
        IdentifierKind::DataAsset => DATA_ASSET_SITES,
        IdentifierKind::TrustBoundary => TRUST_BOUNDARY_SITES,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIntegrityEngine {
    policy: RepairPolicy,
}

impl ReferenceIntegrityEngine {
    pub fn new(policy: RepairPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RepairPolicy {
        &self.policy
    }

    /// Rewrite references to `old_id` as `new_id`. Only exact matches are touched.
    pub fn repair(
        &self,
        document: &mut Document,
        kind: IdentifierKind,
        old_id: &str,
        new_id: &str,
    ) -> RepairReport {
        let mut report = RepairReport::new(kind, old_id, new_id);
        if old_id == new_id || !self.policy.propagates(kind) {
            return report;
        }

        for site in sites(kind) {
            match site {
                Site::EntityList { section, field } => {
                    for (key, entity) in document.entities_mut(section) {
                        let base = FieldPath::from_keys([*section, key, *field]);
                        rewrite_list(entity.get_mut(*field), &base, old_id, new_id, &mut report);
                    }
                }
                Site::LinkScalar { field } => {
                    for_each_link(document, |base, link| {
                        if let Some(value) = link.get_mut(*field) {
                            if value.as_str() == Some(old_id) {
                                *value = Value::String(new_id.to_string());
                                report.rewritten.push(base.key(*field));
                            }
                        }
                    });
                }
                Site::LinkList { field } => {
                    for_each_link(document, |base, link| {
                        let base = base.key(*field);
                        rewrite_list(link.get_mut(*field), &base, old_id, new_id, &mut report);
                    });
                }
            }
        }

        debug!(
            kind = ?kind,
            old = old_id,
            new = new_id,
            rewritten = report.rewritten.len(),
            "repaired identifier references"
        );
        report
    }
}

fn for_each_link(document: &mut Document, mut visit: impl FnMut(FieldPath, &mut Value)) {
    for (asset_key, asset) in document.entities_mut(TECHNICAL_ASSETS) {
        let Some(links) = asset.get_mut(COMMUNICATION_LINKS).and_then(Value::as_mapping_mut) else {
            continue;
        };
        for (link_key, link) in links.iter_mut() {
            let Some(link_key) = link_key.as_str() else {
                continue;
            };
            visit(
                FieldPath::from_keys([TECHNICAL_ASSETS, asset_key, COMMUNICATION_LINKS, link_key]),
                link,
            );
        }
    }
}

fn rewrite_list(
    list: Option<&mut Value>,
    base: &FieldPath,
    old_id: &str,
    new_id: &str,
    report: &mut RepairReport,
) {
    let Some(items) = list.and_then(Value::as_sequence_mut) else {
        return;
    };
    for (index, item) in items.iter_mut().enumerate() {
        if item.as_str() == Some(old_id) {
            *item = Value::String(new_id.to_string());
            report.rewritten.push(base.clone().index(index));
        }
    }
}
