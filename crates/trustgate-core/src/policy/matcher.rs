//! Compiled rule matchers.

use regex::Regex;

use crate::category::ToolCategory;
use crate::error::{GovernanceError, Result};

use super::glob::glob_match;
use super::{PolicyMatch, PolicyRule};

#[derive(Debug, Clone)]
pub enum TargetMatcher {
    Glob(Vec<String>),
    Regex(Vec<Regex>),
}

impl TargetMatcher {
    pub fn compile(rule_id: &str, patterns: &[String], as_regex: bool) -> Result<Self> {
        if !as_regex {
            return Ok(TargetMatcher::Glob(patterns.to_vec()));
        }
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    GovernanceError::Configuration(format!("rule {rule_id}: invalid regex {p:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TargetMatcher::Regex(compiled))
    }

    pub fn is_match(&self, target: &str) -> bool {
        match self {
            TargetMatcher::Glob(patterns) => patterns.iter().any(|p| glob_match(p, target)),
            TargetMatcher::Regex(patterns) => patterns.iter().any(|re| re.is_match(target)),
        }
    }
}

/// A rule with its target patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: PolicyRule,
    targets: Option<TargetMatcher>,
}

impl CompiledRule {
    pub fn compile(rule: PolicyRule) -> Result<Self> {
        let targets = match &rule.match_spec.target_patterns {
            Some(patterns) => Some(TargetMatcher::compile(
                &rule.id,
                patterns,
                rule.match_spec.target_patterns_are_regex,
            )?),
            None => None,
        };
        Ok(Self { rule, targets })
    }

    pub fn matches(
        &self,
        tool_name: &str,
        category: ToolCategory,
        target: Option<&str>,
        trust_score: f64,
    ) -> bool {
        let m: &PolicyMatch = &self.rule.match_spec;

        if let Some(min) = m.min_trust {
            if trust_score < min {
                return false;
            }
        }
        if let Some(tools) = &m.tools {
            if !tools.iter().any(|t| t == tool_name) {
                return false;
            }
        }
        if let Some(categories) = &m.categories {
            if !categories.contains(&category) {
                return false;
            }
        }
        if let Some(matcher) = &self.targets {
            // a pattern constraint never matches a call without a target
            let Some(target) = target else { return false };
            if !matcher.is_match(target) {
                return false;
            }
        }
        true
    }
}
