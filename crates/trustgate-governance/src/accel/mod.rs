//! Acceleration boundary.
//!
//! Every governance primitive is reachable through [`GovernanceBackend`] as
//! JSON in, JSON out. [`ReferenceBackend`] runs on `trustgate-core`;
//! an accelerated implementation may be supplied by an [`AcceleratorLoader`]
//! and is selected once per process by [`AcceleratorSlot`].
//!
//! The façade sends policy evaluation, rate limiting, trust updates and
//! witness recording through the selected backend, and checks its policy
//! hash once when the backend is installed. Audit appends stay in-process:
//! the chain is owned by the session and shipping it whole on every call
//! would make each append linear in the chain length.

pub mod reference;
pub mod slot;

use serde_json::{json, Value};
use trustgate_core::error::{GovernanceError, Result};

pub use reference::ReferenceBackend;
pub use slot::{AcceleratorLoader, AcceleratorSlot, NoAccelerator};

/// Operation surface shared by every backend. Arguments and results are
/// JSON documents of the core entity types.
pub trait GovernanceBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    /// `PolicyConfig` + optional target + trust score -> `PolicyEvaluation`.
    fn evaluate_policy(
        &self,
        policy_json: &str,
        tool_name: &str,
        target: Option<&str>,
        trust_score: f64,
    ) -> Result<String>;

    /// `EntityTrust` + outcome -> `{entity, delta}`.
    fn update_trust(&self, entity_json: &str, success: bool, weight: f64) -> Result<String>;

    /// -> `WitnessEvent`.
    fn record_witness(&self, witness_id: &str, witnessed_id: &str, trust_score: f64) -> Result<String>;

    /// `AuditChain` + `R6Action` -> `{chain, action}`.
    fn append_audit(&self, chain_json: &str, action_json: &str) -> Result<String>;

    /// `RateLimitState` (empty string for none) -> `{result, state}`.
    fn check_rate_limit(&self, state_json: &str, key: &str, max_count: u32, window_ms: u64) -> Result<String>;

    /// `PolicyConfig` -> short content hash.
    fn compute_policy_hash(&self, policy_json: &str) -> Result<String>;

    fn metrics(&self) -> Value;
}

/// Installed when the accelerated backend could not be loaded.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail<T>(&self) -> Result<T> {
        Err(GovernanceError::AccelerationUnavailable(self.reason.clone()))
    }
}

impl GovernanceBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn evaluate_policy(&self, _: &str, _: &str, _: Option<&str>, _: f64) -> Result<String> {
        self.fail()
    }

    fn update_trust(&self, _: &str, _: bool, _: f64) -> Result<String> {
        self.fail()
    }

    fn record_witness(&self, _: &str, _: &str, _: f64) -> Result<String> {
        self.fail()
    }

    fn append_audit(&self, _: &str, _: &str) -> Result<String> {
        self.fail()
    }

    fn check_rate_limit(&self, _: &str, _: &str, _: u32, _: u64) -> Result<String> {
        self.fail()
    }

    fn compute_policy_hash(&self, _: &str) -> Result<String> {
        self.fail()
    }

    fn metrics(&self) -> Value {
        json!({
            "backend": self.name(),
            "available": false,
            "reason": self.reason,
        })
    }
}
