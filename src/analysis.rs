//! Risk analysis join
//!
//! The analysis itself runs elsewhere. This module defines the boundary a
//! transport implements and joins what comes back with the document's own
//! `risk_tracking` section.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::document::{Document, RISK_TRACKING};
use crate::error::AnalysisError;

/// Status shown for risks with no tracking entry
pub const DEFAULT_STATUS: &str = "Unchecked";

/// Synchronous request boundary to a risk analysis service
pub trait RiskAnalyzer {
    fn analyze(&self, document: &Document) -> Result<AnalysisResponse, AnalysisError>;
}

/// One identified risk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub synthetic_id: String,
    pub title: String,
    pub severity: String,
    pub exploitation_likelihood: String,
    pub exploitation_impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_relevant_technical_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_relevant_communication_link: Option<String>,
    #[serde(default)]
    pub data_breach_technical_assets: Vec<String>,
}

/// Risk category name → risks, in response order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResponse(pub IndexMap<String, Vec<RiskRecord>>);

impl AnalysisResponse {
    /// Parse a JSON response body
    pub fn from_json(body: &str) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[RiskRecord])> {
        self.0.iter().map(|(name, risks)| (name.as_str(), risks.as_slice()))
    }

    pub fn risk_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// A risk with its tracking status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRisk {
    pub category: String,
    pub risk: RiskRecord,
    pub status: String,
    /// Whether `risk_tracking` has an entry for this risk
    pub tracked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskReport {
    pub risks: Vec<TrackedRisk>,
}

impl RiskReport {
    /// Join `response` with the tracking entries of `document`.
    /// Untracked risks, and tracked ones without a string status, get `default_status`.
    pub fn join(response: &AnalysisResponse, document: &Document, default_status: &str) -> Self {
        let tracking = document.as_value().get(RISK_TRACKING);
        let risks = response
            .categories()
            .flat_map(|(category, risks)| risks.iter().map(move |risk| (category, risk)))
            .map(|(category, risk)| {
                let entry = tracking.and_then(|t| t.get(risk.synthetic_id.as_str()));
                let status = entry
                    .and_then(|e| e.get("status"))
                    .and_then(Value::as_str)
                    .unwrap_or(default_status);
                TrackedRisk {
                    category: category.to_string(),
                    risk: risk.clone(),
                    status: status.to_string(),
                    tracked: entry.is_some(),
                }
            })
            .collect();
        Self { risks }
    }

    /// Risk count per status, in order of first appearance
    pub fn status_counts(&self) -> IndexMap<&str, usize> {
        let mut counts = IndexMap::new();
        for risk in &self.risks {
            *counts.entry(risk.status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn untracked(&self) -> impl Iterator<Item = &TrackedRisk> {
        self.risks.iter().filter(|risk| !risk.tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "unencrypted-communication": [
            {"synthetic_id": "uc@web>db", "title": "Unencrypted link", "severity": "elevated",
             "exploitation_likelihood": "likely", "exploitation_impact": "medium",
             "most_relevant_technical_asset": "web", "most_relevant_communication_link": "web>db"}
        ],
        "missing-waf": [
            {"synthetic_id": "waf@web", "title": "No WAF", "severity": "low",
             "exploitation_likelihood": "unlikely", "exploitation_impact": "low",
             "data_breach_technical_assets": ["web"]},
            {"synthetic_id": "waf@api", "title": "No WAF", "severity": "low",
             "exploitation_likelihood": "unlikely", "exploitation_impact": "low"}
        ]
    }"#;

    fn doc(yaml: &str) -> Document {
        Document::from_value(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_response_keeps_category_order() {
        let response = AnalysisResponse::from_json(RESPONSE).unwrap();
        let names: Vec<_> = response.categories().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["unencrypted-communication", "missing-waf"]);
        assert_eq!(response.risk_count(), 3);
        let waf = &response.0["missing-waf"][1];
        assert!(waf.most_relevant_technical_asset.is_none());
        assert!(waf.data_breach_technical_assets.is_empty());
    }

    #[test]
    fn test_malformed_response_is_error() {
        assert!(matches!(
            AnalysisResponse::from_json("{\"x\": [{}]}"),
            Err(AnalysisError::Response(_))
        ));
    }

    #[test]
    fn test_join_uses_tracking_status_or_default() {
        let response = AnalysisResponse::from_json(RESPONSE).unwrap();
        let document = doc("risk_tracking:\n  waf@web:\n    status: accepted\n  waf@api:\n    justification: later\n");
        let report = RiskReport::join(&response, &document, DEFAULT_STATUS);

        let statuses: Vec<_> = report.risks.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["Unchecked", "accepted", "Unchecked"]);
        assert_eq!(report.untracked().count(), 1);

        let counts = report.status_counts();
        assert_eq!(counts.get("Unchecked"), Some(&2));
        assert_eq!(counts.get("accepted"), Some(&1));
        assert_eq!(counts.keys().next(), Some(&"Unchecked"));
    }

    #[test]
    fn test_join_without_tracking_section() {
        let response = AnalysisResponse::from_json(RESPONSE).unwrap();
        let report = RiskReport::join(&response, &Document::empty(), "unchecked");
        assert!(report.risks.iter().all(|r| r.status == "unchecked" && !r.tracked));
    }
}
