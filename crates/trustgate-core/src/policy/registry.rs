//! Registration cache for policy entities, keyed by id and by content hash.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

use super::entity::{policy_entity_id, policy_hash, PolicyEntity};
use super::PolicyConfig;

#[derive(Debug, Default)]
pub struct PolicyRegistry {
    by_id: HashMap<String, Arc<PolicyEntity>>,
    by_hash: HashMap<String, Arc<PolicyEntity>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a policy document. Identical documents resolve
    /// to the same entity; a rejected document leaves the registry untouched.
    pub fn register(&mut self, config: PolicyConfig) -> Result<Arc<PolicyEntity>> {
        let hash = policy_hash(&config)?;
        if let Some(existing) = self.by_hash.get(&hash) {
            return Ok(Arc::clone(existing));
        }

        let entity = Arc::new(PolicyEntity::new(config)?);
        tracing::info!(policy_id = %entity.id(), rules = entity.config().rules.len(), "policy registered");

        self.by_id.insert(entity.id().to_string(), Arc::clone(&entity));
        self.by_hash.insert(hash, Arc::clone(&entity));
        Ok(entity)
    }

    pub fn get(&self, id: &str) -> Option<Arc<PolicyEntity>> {
        self.by_id.get(id).cloned()
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<Arc<PolicyEntity>> {
        self.by_hash.get(hash).cloned()
    }

    /// Id a document would receive, without registering it.
    pub fn preview_id(config: &PolicyConfig) -> Result<String> {
        Ok(policy_entity_id(&config.name, &config.version, &policy_hash(config)?))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDecision, PolicyMatch, PolicyRule};

    fn config() -> PolicyConfig {
        PolicyConfig {
            name: "p".into(),
            version: "1.0.0".into(),
            enforce: true,
            default_policy: PolicyDecision::Allow,
            rules: vec![PolicyRule {
                id: "r".into(),
                name: None,
                priority: 1,
                match_spec: PolicyMatch { tools: Some(vec!["Bash".into()]), ..Default::default() },
                decision: PolicyDecision::AskUser,
                reason: None,
                enforce: None,
            }],
        }
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let mut reg = PolicyRegistry::new();
        let a = reg.register(config()).ok();
        let b = reg.register(config()).ok();
        assert_eq!(a.as_ref().map(|e| e.id().to_string()), b.as_ref().map(|e| e.id().to_string()));
        assert!(matches!((a, b), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn any_change_produces_new_entity() {
        let mut reg = PolicyRegistry::new();
        let base = reg.register(config()).ok().map(|e| e.id().to_string());

        let mut changed = config();
        changed.rules[0].priority = 2;
        let other = reg.register(changed).ok().map(|e| e.id().to_string());

        let mut soft = config();
        soft.enforce = false;
        let third = reg.register(soft).ok().map(|e| e.id().to_string());

        assert_ne!(base, other);
        assert_ne!(base, third);
        assert_ne!(other, third);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn lookup_by_id_and_hash() {
        let mut reg = PolicyRegistry::new();
        let registered = reg.register(config());
        assert!(registered.is_ok());
        let Ok(e) = registered else { return };
        assert!(reg.get(e.id()).is_some());
        assert!(reg.get_by_hash(e.content_hash()).is_some());
        assert_eq!(PolicyRegistry::preview_id(&config()).ok().as_deref(), Some(e.id()));
    }

    #[test]
    fn rejected_document_is_not_cached() {
        let mut reg = PolicyRegistry::new();
        let mut bad = config();
        bad.rules.push(bad.rules[0].clone());
        assert!(reg.register(bad).is_err());
        assert!(reg.is_empty());
    }
}
