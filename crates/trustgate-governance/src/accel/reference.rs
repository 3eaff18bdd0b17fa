//! Backend built directly on `trustgate-core`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trustgate_core::audit::{AuditChain, R6Action};
use trustgate_core::category::ToolCategory;
use trustgate_core::clock::{Clock, SystemClock};
use trustgate_core::error::{GovernanceError, Result};
use trustgate_core::policy::entity::policy_hash;
use trustgate_core::policy::{PolicyConfig, PolicyEntity};
use trustgate_core::rate_limit::{RateLimitResult, RateLimitState, RateLimiter};
use trustgate_core::trust::{EntityTrust, TrustDelta};
use trustgate_core::witness::WitnessEvent;

use super::GovernanceBackend;

/// Reported in `metrics()` so reference and accelerated backends compare.
pub const CAPABILITIES: [&str; 5] = [
    "t3_trust_tensors",
    "policy_entities",
    "witnessing_chains",
    "rate_limiting",
    "r6_audit_chain",
];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustUpdate {
    pub entity: EntityTrust,
    pub delta: TrustDelta,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAppend {
    pub chain: AuditChain,
    pub action: R6Action,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitCheck {
    pub result: RateLimitResult,
    pub state: RateLimitState,
}

pub struct ReferenceBackend {
    clock: Arc<dyn Clock>,
    calls: AtomicU64,
    // compiled policies keyed by their JSON document
    policies: DashMap<String, Arc<PolicyEntity>>,
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ReferenceBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, calls: AtomicU64::new(0), policies: DashMap::new() }
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn policy(&self, policy_json: &str) -> Result<Arc<PolicyEntity>> {
        if let Some(p) = self.policies.get(policy_json) {
            return Ok(Arc::clone(p.value()));
        }
        let policy = Arc::new(PolicyEntity::new(PolicyConfig::from_json(policy_json)?)?);
        self.policies.insert(policy_json.to_string(), Arc::clone(&policy));
        Ok(policy)
    }
}

impl GovernanceBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn evaluate_policy(
        &self,
        policy_json: &str,
        tool_name: &str,
        target: Option<&str>,
        trust_score: f64,
    ) -> Result<String> {
        self.tick();
        let policy = self.policy(policy_json)?;
        let category = ToolCategory::from_tool_name(tool_name);
        let ev = policy.evaluate(tool_name, category, target, trust_score);
        Ok(serde_json::to_string(&ev)?)
    }

    fn update_trust(&self, entity_json: &str, success: bool, weight: f64) -> Result<String> {
        self.tick();
        let mut entity: EntityTrust = serde_json::from_str(entity_json)?;
        entity.normalize();

        let delta = entity.update(success, weight, self.clock.now());
        Ok(serde_json::to_string(&TrustUpdate { entity, delta })?)
    }

    fn record_witness(&self, witness_id: &str, witnessed_id: &str, trust_score: f64) -> Result<String> {
        self.tick();
        let ev = WitnessEvent::new(witness_id, witnessed_id, trust_score, self.clock.now());
        Ok(serde_json::to_string(&ev)?)
    }

    fn append_audit(&self, chain_json: &str, action_json: &str) -> Result<String> {
        self.tick();
        let mut chain: AuditChain = serde_json::from_str(chain_json)?;
        let action: R6Action = serde_json::from_str(action_json)?;
        chain.append(action)?;

        let action = chain.records().last().cloned();
        let Some(action) = action else {
            return Err(GovernanceError::Internal("append left chain empty".into()));
        };
        Ok(serde_json::to_string(&AuditAppend { chain, action })?)
    }

    fn check_rate_limit(&self, state_json: &str, key: &str, max_count: u32, window_ms: u64) -> Result<String> {
        self.tick();
        let state: RateLimitState = if state_json.trim().is_empty() {
            RateLimitState::default()
        } else {
            serde_json::from_str(state_json)?
        };
        let mut limiter = RateLimiter::with_state(state, Arc::clone(&self.clock));
        let result = limiter.check(key, max_count, window_ms);
        let state = limiter.into_state();
        Ok(serde_json::to_string(&RateLimitCheck { result, state })?)
    }

    fn compute_policy_hash(&self, policy_json: &str) -> Result<String> {
        self.tick();
        policy_hash(&PolicyConfig::from_json(policy_json)?)
    }

    fn metrics(&self) -> Value {
        json!({
            "backend": self.name(),
            "available": true,
            "version": env!("CARGO_PKG_VERSION"),
            "calls": self.calls.load(Ordering::Relaxed),
            "capabilities": CAPABILITIES,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::GovernanceBackend;
    use chrono::Utc;
    use trustgate_core::clock::ManualClock;
    use trustgate_core::policy::{PolicyDecision, PolicyEvaluation};
    use trustgate_core::trust::EntityType;

    const POLICY: &str = r#"{"name":"p","version":"1","defaultPolicy":"allow","enforce":true,"rules":[
        {"id":"secrets","priority":1,"decision":"deny","match":{"targetPatterns":["**/.env"]}}]}"#;

    fn backend() -> ReferenceBackend {
        ReferenceBackend::new(Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn evaluates_policy_documents() {
        let b = backend();
        let out = b.evaluate_policy(POLICY, "Read", Some("/repo/.env"), 0.5).unwrap();
        let ev: PolicyEvaluation = serde_json::from_str(&out).unwrap();
        assert_eq!(ev.decision, PolicyDecision::Deny);
        assert_eq!(ev.matched_rule.as_deref(), Some("secrets"));

        // second call is served from the compiled cache
        b.evaluate_policy(POLICY, "Read", None, 0.5).unwrap();
        assert_eq!(b.policies.len(), 1);

        assert!(b.evaluate_policy("{not json", "Read", None, 0.5).is_err());
    }

    #[test]
    fn trust_update_round_trip() {
        let b = backend();
        let entity = serde_json::to_string(&EntityTrust::new("tool:Bash", EntityType::Tool, Utc::now())).unwrap();
        let out: TrustUpdate = serde_json::from_str(&b.update_trust(&entity, true, 0.15).unwrap()).unwrap();
        assert_eq!(out.entity.success_count, 1);
        assert!((out.delta.weight - 0.15).abs() < 1e-9);
    }

    #[test]
    fn rate_limit_state_threads_through() {
        let b = backend();
        let mut state = String::new();
        let mut allowed = Vec::new();
        for _ in 0..4 {
            let out: RateLimitCheck =
                serde_json::from_str(&b.check_rate_limit(&state, "rule:x", 3, 1000).unwrap()).unwrap();
            allowed.push(out.result.allowed);
            state = serde_json::to_string(&out.state).unwrap();
        }
        assert_eq!(allowed, vec![true, true, true, false]);
    }

    #[test]
    fn appends_link_across_calls() {
        let b = backend();
        let chain = AuditChain::new("s", "policy:p:1:x", Utc::now());
        let action = json!({
            "rules": {"policyId": "policy:p:1:x", "policyHash": "x", "matchedRule": null, "decision": "allow"},
            "role": {"sessionId": "s", "agentId": null, "trustScore": 0.5},
            "request": {"toolName": "Read", "category": "file_read", "parametersHash": "00"},
            "resource": {"target": null, "targetType": "file_read"},
            "result": {"success": true, "enforced": true, "blocked": false, "error": null},
            "timestamp": "2026-01-01T00:00:00Z"
        })
        .to_string();

        let first: AuditAppend =
            serde_json::from_str(&b.append_audit(&serde_json::to_string(&chain).unwrap(), &action).unwrap()).unwrap();
        let second: AuditAppend = serde_json::from_str(
            &b.append_audit(&serde_json::to_string(&first.chain).unwrap(), &action).unwrap(),
        )
        .unwrap();

        assert_eq!(second.action.reference.sequence_number, 2);
        assert_eq!(second.action.reference.previous_hash.as_deref(), Some(first.action.content_hash.as_str()));
        assert!(second.chain.verify().is_ok());
    }

    #[test]
    fn policy_hash_matches_core() {
        let b = backend();
        let cfg = PolicyConfig::from_json(POLICY).unwrap();
        assert_eq!(b.compute_policy_hash(POLICY).unwrap(), policy_hash(&cfg).unwrap());
        assert_eq!(b.metrics()["calls"], 1);
    }

    #[test]
    fn metrics_list_capabilities() {
        let m = backend().metrics();
        assert_eq!(m["available"], true);
        let caps: Vec<&str> = m["capabilities"].as_array().unwrap().iter().filter_map(|c| c.as_str()).collect();
        assert_eq!(caps, CAPABILITIES);
        assert!(caps.contains(&"r6_audit_chain"));
    }
}
