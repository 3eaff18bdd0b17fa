//! Immutable, content-addressed policy entities.

use crate::canonical::short_hash;
use crate::category::ToolCategory;
use crate::error::Result;

use super::matcher::CompiledRule;
use super::{PolicyConfig, PolicyDecision, PolicyEvaluation};

/// Hash of the canonical (sorted-key) form of a policy document.
pub fn policy_hash(config: &PolicyConfig) -> Result<String> {
    short_hash(config)
}

pub fn policy_entity_id(name: &str, version: &str, hash: &str) -> String {
    format!("policy:{name}:{version}:{hash}")
}

/// A validated policy. Rules are held sorted by priority; ties keep document
/// order.
#[derive(Debug, Clone)]
pub struct PolicyEntity {
    id: String,
    content_hash: String,
    document: String,
    config: PolicyConfig,
    rules: Vec<CompiledRule>,
}

impl PolicyEntity {
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;

        let content_hash = policy_hash(&config)?;
        let document = serde_json::to_string(&config)?;
        let id = policy_entity_id(&config.name, &config.version, &content_hash);

        let mut rules = config
            .rules
            .iter()
            .cloned()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        rules.sort_by_key(|r| r.rule.priority);

        Ok(Self { id, content_hash, document, config, rules })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// JSON form of the config, as handed to backends.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn default_policy(&self) -> PolicyDecision {
        self.config.default_policy
    }

    /// First matching rule (by priority) decides; otherwise the default policy.
    pub fn evaluate(
        &self,
        tool_name: &str,
        category: ToolCategory,
        target: Option<&str>,
        trust_score: f64,
    ) -> PolicyEvaluation {
        let matched = self
            .rules
            .iter()
            .find(|r| r.matches(tool_name, category, target, trust_score));

        let Some(compiled) = matched else {
            let decision = self.config.default_policy;
            return PolicyEvaluation {
                decision,
                matched_rule: None,
                enforced: true,
                reason: format!("Default policy: {decision}"),
                trust_score,
                constraints: self.constraints("default", decision, true),
                rate_limit: None,
            };
        };

        let rule = &compiled.rule;
        let enforce = rule.enforce.unwrap_or(self.config.enforce);
        let enforced = rule.decision != PolicyDecision::Deny || enforce;

        PolicyEvaluation {
            decision: rule.decision,
            matched_rule: Some(rule.id.clone()),
            enforced,
            reason: rule
                .reason
                .clone()
                .unwrap_or_else(|| format!("Matched rule: {}", rule.display_name())),
            trust_score,
            constraints: self.constraints(&rule.id, rule.decision, enforced),
            rate_limit: rule.match_spec.rate_limit,
        }
    }

    fn constraints(&self, rule_id: &str, decision: PolicyDecision, enforced: bool) -> Vec<String> {
        let mut out = vec![
            format!("policy:{}", self.config.name),
            format!("rule:{rule_id}"),
            format!("decision:{decision}"),
        ];
        if decision == PolicyDecision::LogOnly {
            out.push("log:required".into());
        }
        if !enforced {
            out.push("enforce:soft".into());
        }
        out
    }
}
