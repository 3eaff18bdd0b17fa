//! Policy documents, rule matching, and immutable policy entities.
//!
//! A [`PolicyConfig`] is plain data (JSON/YAML, camelCase). Registering it
//! through [`PolicyRegistry`] validates the document, compiles its target
//! patterns, sorts rules by priority, and wraps the result in a
//! content-addressed [`PolicyEntity`] that is never mutated afterwards.

pub mod entity;
pub mod glob;
pub mod matcher;
pub mod registry;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::ToolCategory;
use crate::error::{GovernanceError, Result};

pub use entity::PolicyEntity;
pub use registry::PolicyRegistry;

/// Decision a rule (or the default policy) produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny,
    AskUser,
    LogOnly,
}

impl PolicyDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny => "deny",
            PolicyDecision::AskUser => "ask_user",
            PolicyDecision::LogOnly => "log_only",
        }
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateLimitSpec {
    pub max_count: u32,
    pub window_ms: u64,
}

/// Conditions a rule requires. Every `Some` field must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<ToolCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub target_patterns_are_regex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub priority: u32,
    #[serde(rename = "match")]
    pub match_spec: PolicyMatch,
    pub decision: PolicyDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Overrides the policy-level `enforce` flag for this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<bool>,
}

impl PolicyRule {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyConfig {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub enforce: bool,
    pub default_policy: PolicyDecision,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl PolicyConfig {
    /// Parse a JSON policy document.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| GovernanceError::Configuration(format!("invalid policy json: {e}")))
    }

    /// Structural checks; regex patterns are checked when compiled.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GovernanceError::Configuration("policy name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(GovernanceError::Configuration(format!(
                "policy {} version must not be empty",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(GovernanceError::Configuration(format!(
                    "policy {} has a rule with an empty id",
                    self.name
                )));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(GovernanceError::Configuration(format!(
                    "policy {} has duplicate rule id: {}",
                    self.name, rule.id
                )));
            }
            validate_match(&rule.id, &rule.match_spec)?;
        }
        Ok(())
    }
}

fn validate_match(rule_id: &str, m: &PolicyMatch) -> Result<()> {
    if let Some(min) = m.min_trust {
        if !(0.0..=1.0).contains(&min) {
            return Err(GovernanceError::Configuration(format!(
                "rule {rule_id}: minTrust must be between 0 and 1 (got {min})"
            )));
        }
    }
    if let Some(rl) = m.rate_limit {
        if rl.max_count == 0 || rl.window_ms == 0 {
            return Err(GovernanceError::Configuration(format!(
                "rule {rule_id}: rateLimit maxCount and windowMs must be positive"
            )));
        }
    }
    let empty_list = [
        ("tools", m.tools.as_ref().is_some_and(|v| v.is_empty())),
        ("categories", m.categories.as_ref().is_some_and(|v| v.is_empty())),
        ("targetPatterns", m.target_patterns.as_ref().is_some_and(|v| v.is_empty())),
    ];
    if let Some((field, _)) = empty_list.iter().find(|(_, empty)| *empty) {
        return Err(GovernanceError::Configuration(format!(
            "rule {rule_id}: {field} must not be an empty list"
        )));
    }
    if m.target_patterns_are_regex && m.target_patterns.is_none() {
        return Err(GovernanceError::Configuration(format!(
            "rule {rule_id}: targetPatternsAreRegex set without targetPatterns"
        )));
    }
    Ok(())
}

/// Result of evaluating one call against a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluation {
    pub decision: PolicyDecision,
    pub matched_rule: Option<String>,
    pub enforced: bool,
    pub reason: String,
    pub trust_score: f64,
    pub constraints: Vec<String>,
    /// Rate limit declared by the matched rule, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSpec>,
}

impl PolicyEvaluation {
    /// A deny that the policy does not enforce (soft mode).
    pub fn is_soft_deny(&self) -> bool {
        self.decision == PolicyDecision::Deny && !self.enforced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> PolicyRule {
        PolicyRule {
            id: id.into(),
            name: None,
            priority: 10,
            match_spec: PolicyMatch::default(),
            decision: PolicyDecision::Allow,
            reason: None,
            enforce: None,
        }
    }

    fn config(rules: Vec<PolicyRule>) -> PolicyConfig {
        PolicyConfig {
            name: "t".into(),
            version: "1".into(),
            enforce: true,
            default_policy: PolicyDecision::Deny,
            rules,
        }
    }

    #[test]
    fn parses_camel_case_document() {
        let doc = r#"{
            "name": "p", "version": "1.0.0", "enforce": true, "defaultPolicy": "ask_user",
            "rules": [{
                "id": "r1", "priority": 5, "decision": "log_only",
                "match": {"categories": ["file_write"], "minTrust": 0.3,
                          "rateLimit": {"maxCount": 2, "windowMs": 1000}}
            }]
        }"#;
        let cfg = PolicyConfig::from_json(doc);
        assert!(cfg.is_ok());
        if let Ok(cfg) = cfg {
            assert_eq!(cfg.default_policy, PolicyDecision::AskUser);
            assert_eq!(cfg.rules[0].match_spec.rate_limit, Some(RateLimitSpec { max_count: 2, window_ms: 1000 }));
            assert!(cfg.validate().is_ok());
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let doc = r#"{"name":"p","version":"1","defaultPolicy":"allow","rulez":[]}"#;
        let err = PolicyConfig::from_json(doc).err().map(|e| e.code().as_str());
        assert_eq!(err, Some("CONFIGURATION"));
    }

    #[test]
    fn duplicate_rule_ids_rejected() {
        assert!(config(vec![rule("a"), rule("a")]).validate().is_err());
    }

    #[test]
    fn bad_match_specs_rejected() {
        let mut r = rule("a");
        r.match_spec.min_trust = Some(1.5);
        assert!(config(vec![r]).validate().is_err());

        let mut r = rule("a");
        r.match_spec.rate_limit = Some(RateLimitSpec { max_count: 0, window_ms: 10 });
        assert!(config(vec![r]).validate().is_err());

        let mut r = rule("a");
        r.match_spec.tools = Some(vec![]);
        assert!(config(vec![r]).validate().is_err());

        let mut r = rule("a");
        r.match_spec.target_patterns_are_regex = true;
        assert!(config(vec![r]).validate().is_err());
    }

    #[test]
    fn empty_name_rejected() {
        let mut cfg = config(vec![]);
        cfg.name = " ".into();
        assert!(cfg.validate().is_err());
    }
}
