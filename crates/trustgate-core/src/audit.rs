//! R6 audit records and the per-session hash chain.
//!
//! Records live in an append-only arena; record `n` sits at index `n - 1`.
//! Each record stores the hash of its predecessor in its reference facet and
//! its own hash over every other field, so rewriting any record breaks every
//! link after it. Nothing here repairs a broken chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{short_hash, value_hash};
use crate::category::ToolCategory;
use crate::error::{GovernanceError, Result};
use crate::policy::PolicyDecision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Rules {
    pub policy_id: String,
    pub policy_hash: String,
    pub matched_rule: Option<String>,
    pub decision: PolicyDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Role {
    pub session_id: String,
    pub agent_id: Option<String>,
    pub trust_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Request {
    pub tool_name: String,
    pub category: ToolCategory,
    pub parameters_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Reference {
    pub previous_hash: Option<String>,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Resource {
    pub target: Option<String>,
    pub target_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Result {
    pub success: bool,
    pub enforced: bool,
    pub blocked: bool,
    pub error: Option<String>,
}

/// One audited decision (Rules/Role/Request/Reference/Resource/Result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct R6Action {
    #[serde(default)]
    pub action_id: String,
    pub rules: R6Rules,
    pub role: R6Role,
    pub request: R6Request,
    #[serde(default)]
    pub reference: R6Reference,
    pub resource: R6Resource,
    pub result: R6Result,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub content_hash: String,
}

impl R6Action {
    /// Unlinked record; [`AuditChain::append`] fills id, reference and hash.
    pub fn new(
        rules: R6Rules,
        role: R6Role,
        request: R6Request,
        resource: R6Resource,
        result: R6Result,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            action_id: String::new(),
            rules,
            role,
            request,
            reference: R6Reference::default(),
            resource,
            result,
            timestamp,
            content_hash: String::new(),
        }
    }

    /// SHA-256 over the canonical form of every field except `contentHash`.
    pub fn compute_hash(&self) -> Result<String> {
        let mut v = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut v {
            map.remove("contentHash");
        }
        value_hash(&v)
    }
}

/// Short hash of tool input, used in the request facet.
pub fn parameters_hash(tool_input: &Value) -> Result<String> {
    short_hash(tool_input)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditChain {
    pub session_id: String,
    pub policy_id: String,
    records: Vec<R6Action>,
    entries: Vec<String>,
    latest_hash: Option<String>,
    sequence_number: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    sealed: bool,
}

impl AuditChain {
    pub fn new(session_id: impl Into<String>, policy_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            policy_id: policy_id.into(),
            records: Vec::new(),
            entries: Vec::new(),
            latest_hash: None,
            sequence_number: 0,
            created_at: now,
            sealed: false,
        }
    }

    /// Link and hash `action`, then push it. Returns the new content hash.
    pub fn append(&mut self, mut action: R6Action) -> Result<String> {
        if self.sealed {
            return Err(GovernanceError::ChainSealed(self.session_id.clone()));
        }

        let seq = self.sequence_number + 1;
        action.action_id = format!("r6:{}:{}", self.session_id, seq);
        action.reference = R6Reference {
            previous_hash: self.latest_hash.clone(),
            sequence_number: seq,
        };
        let hash = action.compute_hash()?;
        action.content_hash = hash.clone();

        self.records.push(action);
        self.entries.push(hash.clone());
        self.latest_hash = Some(hash.clone());
        self.sequence_number = seq;

        tracing::debug!(session_id = %self.session_id, seq, hash = %hash, "audit record appended");
        Ok(hash)
    }

    /// Recompute every hash and link; report the first mismatch.
    pub fn verify(&self) -> Result<()> {
        verify_records(&self.records)?;

        if self.entries.len() != self.records.len() {
            return Err(GovernanceError::AuditIntegrity {
                sequence: self.records.len() as u64,
                reason: format!(
                    "entry index holds {} hashes for {} records",
                    self.entries.len(),
                    self.records.len()
                ),
            });
        }
        for (rec, entry) in self.records.iter().zip(&self.entries) {
            if &rec.content_hash != entry {
                return Err(GovernanceError::AuditIntegrity {
                    sequence: rec.reference.sequence_number,
                    reason: "entry index disagrees with record hash".into(),
                });
            }
        }
        if self.latest_hash.as_ref() != self.entries.last() {
            return Err(GovernanceError::AuditIntegrity {
                sequence: self.sequence_number,
                reason: "latest hash is not the last entry".into(),
            });
        }
        if self.sequence_number != self.records.len() as u64 {
            return Err(GovernanceError::AuditIntegrity {
                sequence: self.sequence_number,
                reason: "sequence number does not match record count".into(),
            });
        }
        Ok(())
    }

    /// Close the chain to further appends.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn records(&self) -> &[R6Action] {
        &self.records
    }

    /// Record by sequence number (1-based).
    pub fn get(&self, sequence_number: u64) -> Option<&R6Action> {
        let idx = usize::try_from(sequence_number.checked_sub(1)?).ok()?;
        self.records.get(idx)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn latest_hash(&self) -> Option<&str> {
        self.latest_hash.as_deref()
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Verify an ordered record sequence, e.g. one loaded from storage.
pub fn verify_records(records: &[R6Action]) -> Result<()> {
    let mut previous: Option<&str> = None;
    for (idx, rec) in records.iter().enumerate() {
        let expected_seq = idx as u64 + 1;
        let seq = rec.reference.sequence_number;
        let violation = |reason: String| GovernanceError::AuditIntegrity { sequence: seq, reason };

        if seq != expected_seq {
            return Err(violation(format!("expected sequence {expected_seq}, found {seq}")));
        }
        if rec.reference.previous_hash.as_deref() != previous {
            return Err(violation("previous hash does not match predecessor".into()));
        }
        let recomputed = rec.compute_hash()?;
        if recomputed != rec.content_hash {
            return Err(violation("content hash mismatch".into()));
        }
        previous = Some(&rec.content_hash);
    }
    Ok(())
}
