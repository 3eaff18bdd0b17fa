//! Per-session state owned by the façade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trustgate_core::audit::AuditChain;
use trustgate_core::rate_limit::RateLimitState;
use trustgate_core::trust::{EntityTrust, TrustStore};
use trustgate_core::witness::WitnessEvent;

pub fn session_entity_id(session_id: &str) -> String {
    format!("session:{session_id}")
}

pub fn tool_entity_id(tool_name: &str) -> String {
    format!("tool:{tool_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Active,
    Closed,
}

pub(crate) struct ActiveSession {
    pub trust: TrustStore,
    pub chain: AuditChain,
    pub rate: RateLimitState,
    pub witnesses: Vec<WitnessEvent>,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn new(session_id: &str, policy_id: &str, trust: TrustStore, now: DateTime<Utc>) -> Self {
        Self {
            trust,
            chain: AuditChain::new(session_id, policy_id, now),
            rate: RateLimitState::default(),
            witnesses: Vec::new(),
            started_at: now,
        }
    }

    pub fn into_record(mut self, session_id: &str, ended_at: DateTime<Utc>) -> SessionRecord {
        self.chain.seal();
        let mut trust: Vec<EntityTrust> = self.trust.records().cloned().collect();
        trust.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        SessionRecord {
            session_id: session_id.to_string(),
            started_at: self.started_at,
            ended_at,
            trust,
            chain: self.chain,
            witnesses: self.witnesses,
        }
    }
}

/// Snapshot handed out at session end for external persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Sorted by entity id.
    pub trust: Vec<EntityTrust>,
    pub chain: AuditChain,
    pub witnesses: Vec<WitnessEvent>,
}

impl SessionRecord {
    /// Trust store to seed the next session with.
    pub fn trust_store(&self) -> TrustStore {
        TrustStore::from_records(self.trust.iter().cloned())
    }

    pub(crate) fn tombstone(&self) -> ClosedSession {
        ClosedSession {
            ended_at: self.ended_at,
            records: self.chain.len(),
            latest_hash: self.chain.latest_hash().map(str::to_string),
        }
    }
}

/// What the façade keeps once a session's record has been handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedSession {
    pub ended_at: DateTime<Utc>,
    pub records: usize,
    pub latest_hash: Option<String>,
}

pub(crate) enum SessionState {
    Active(Box<ActiveSession>),
    Closed(ClosedSession),
}
