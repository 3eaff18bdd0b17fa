//! Witnessing: one entity attesting to another's behaviour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trust::TrustLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessEvent {
    pub witness_id: String,
    pub witnessed_id: String,
    pub trust_score: f64,
    pub trust_level: TrustLevel,
    pub timestamp: DateTime<Utc>,
    pub depth: u32,
}

impl WitnessEvent {
    pub fn new(
        witness_id: impl Into<String>,
        witnessed_id: impl Into<String>,
        trust_score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            witness_id: witness_id.into(),
            witnessed_id: witnessed_id.into(),
            trust_score,
            trust_level: TrustLevel::from_score(trust_score),
            timestamp: now,
            depth: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessNode {
    pub entity_id: String,
    pub t3_composite: f64,
    pub trust_level: TrustLevel,
    pub depth: u32,
}

impl WitnessNode {
    pub fn new(entity_id: impl Into<String>, t3_composite: f64, depth: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            t3_composite,
            trust_level: TrustLevel::from_score(t3_composite),
            depth,
        }
    }
}

/// Who vouched for an entity, and whom it vouched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessingChain {
    pub entity_id: String,
    pub t3_composite: f64,
    pub trust_level: TrustLevel,
    pub witnessed_by: Vec<WitnessNode>,
    pub has_witnessed: Vec<WitnessNode>,
}

impl WitnessingChain {
    pub fn new(entity_id: impl Into<String>, t3_composite: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            t3_composite,
            trust_level: TrustLevel::from_score(t3_composite),
            witnessed_by: Vec::new(),
            has_witnessed: Vec::new(),
        }
    }

    /// Build the chain for `entity_id` from a flat event log.
    pub fn from_events<'a>(
        entity_id: &str,
        t3_composite: f64,
        events: impl IntoIterator<Item = &'a WitnessEvent>,
    ) -> Self {
        let mut chain = Self::new(entity_id, t3_composite);
        for ev in events {
            if ev.witnessed_id == entity_id {
                chain.add_witness(WitnessNode::new(ev.witness_id.clone(), ev.trust_score, ev.depth));
            } else if ev.witness_id == entity_id {
                chain.add_witnessed(WitnessNode::new(ev.witnessed_id.clone(), ev.trust_score, ev.depth));
            }
        }
        chain
    }

    pub fn add_witness(&mut self, node: WitnessNode) {
        self.witnessed_by.push(node);
    }

    pub fn add_witnessed(&mut self, node: WitnessNode) {
        self.has_witnessed.push(node);
    }

    /// Mean composite of the witnesses; 0 when nobody has witnessed.
    pub fn aggregate_witness_trust(&self) -> f64 {
        if self.witnessed_by.is_empty() {
            return 0.0;
        }
        let total: f64 = self.witnessed_by.iter().map(|w| w.t3_composite).sum();
        total / self.witnessed_by.len() as f64
    }

    /// `direct * 0.7 + witnesses * 0.3`
    pub fn transitive_trust(&self) -> f64 {
        self.t3_composite * 0.7 + self.aggregate_witness_trust() * 0.3
    }
}
