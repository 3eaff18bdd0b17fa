//! T3 trust tensors and per-entity trust records.
//!
//! A T3 tensor scores an entity along talent, training and temperament. The
//! composite is `talent * 0.3 + training * 0.4 + temperament * 0.3` and is
//! always derived from the current tensor; the stored [`TrustLevel`] is
//! recomputed on every mutation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete trust bucket derived from a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 0.2 => TrustLevel::Low,
            s if s < 0.4 => TrustLevel::MediumLow,
            s if s < 0.6 => TrustLevel::Medium,
            s if s < 0.8 => TrustLevel::MediumHigh,
            _ => TrustLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Low => "low",
            TrustLevel::MediumLow => "medium_low",
            TrustLevel::Medium => "medium",
            TrustLevel::MediumHigh => "medium_high",
            TrustLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct T3Tensor {
    pub talent: f64,
    pub training: f64,
    pub temperament: f64,
}

impl Default for T3Tensor {
    fn default() -> Self {
        Self { talent: 0.5, training: 0.5, temperament: 0.5 }
    }
}

/// Clamp into [0, 1]. NaN collapses to 0.
fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

impl T3Tensor {
    pub fn new(talent: f64, training: f64, temperament: f64) -> Self {
        Self {
            talent: clamp_unit(talent),
            training: clamp_unit(training),
            temperament: clamp_unit(temperament),
        }
    }

    pub fn composite(&self) -> f64 {
        clamp_unit(self.talent * 0.3 + self.training * 0.4 + self.temperament * 0.3)
    }

    pub fn level(&self) -> TrustLevel {
        TrustLevel::from_score(self.composite())
    }

    /// Re-clamp every axis; used after deserializing foreign state.
    pub fn normalized(self) -> Self {
        Self::new(self.talent, self.training, self.temperament)
    }

    /// Apply the fixed outcome deltas.
    ///
    /// | outcome | talent | training | temperament |
    /// |---------|--------|----------|-------------|
    /// | success | 0      | +0.008   | +0.005      |
    /// | failure | -0.02  | -0.01    | -0.02       |
    pub fn apply_outcome(&mut self, success: bool) {
        if success {
            self.training = clamp_unit(self.training + 0.008);
            self.temperament = clamp_unit(self.temperament + 0.005);
        } else {
            self.talent = clamp_unit(self.talent - 0.02);
            self.training = clamp_unit(self.training - 0.01);
            self.temperament = clamp_unit(self.temperament - 0.02);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Tool,
    Session,
    Agent,
    Policy,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTrust {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub t3: T3Tensor,
    pub level: TrustLevel,
    pub interaction_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Change produced by one trust update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustDelta {
    pub previous_composite: f64,
    pub new_composite: f64,
    pub previous_level: TrustLevel,
    pub new_level: TrustLevel,
    /// Category weight the update was issued with. Recorded only.
    pub weight: f64,
    /// True when the level bucket changed.
    pub changed: bool,
}

impl EntityTrust {
    pub fn new(entity_id: impl Into<String>, entity_type: EntityType, now: DateTime<Utc>) -> Self {
        let t3 = T3Tensor::default();
        Self {
            entity_id: entity_id.into(),
            entity_type,
            level: t3.level(),
            t3,
            interaction_count: 0,
            success_count: 0,
            failure_count: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn composite(&self) -> f64 {
        self.t3.composite()
    }

    /// Apply an outcome. `weight` does not scale the deltas.
    pub fn update(&mut self, success: bool, weight: f64, now: DateTime<Utc>) -> TrustDelta {
        let previous_composite = self.composite();
        let previous_level = self.level;

        self.interaction_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.t3.apply_outcome(success);
        self.level = self.t3.level();
        self.last_updated = now;

        TrustDelta {
            previous_composite,
            new_composite: self.composite(),
            previous_level,
            new_level: self.level,
            weight,
            changed: previous_level != self.level,
        }
    }

    /// Restore invariants on a record that crossed a serialization boundary.
    pub fn normalize(&mut self) {
        self.t3 = self.t3.normalized();
        self.level = self.t3.level();
    }
}

/// Explicitly owned trust records, keyed by entity id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustStore {
    entities: HashMap<String, EntityTrust>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records, re-clamping every tensor.
    pub fn from_records(records: impl IntoIterator<Item = EntityTrust>) -> Self {
        let entities = records
            .into_iter()
            .map(|mut e| {
                e.normalize();
                (e.entity_id.clone(), e)
            })
            .collect();
        Self { entities }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityTrust> {
        self.entities.get(entity_id)
    }

    pub fn get_or_create(
        &mut self,
        entity_id: &str,
        entity_type: EntityType,
        now: DateTime<Utc>,
    ) -> &mut EntityTrust {
        self.entities
            .entry(entity_id.to_string())
            .or_insert_with(|| EntityTrust::new(entity_id, entity_type, now))
    }

    /// Composite for an entity, creating it lazily.
    pub fn composite_of(&mut self, entity_id: &str, entity_type: EntityType, now: DateTime<Utc>) -> f64 {
        self.get_or_create(entity_id, entity_type, now).composite()
    }

    /// Replace an entity's record wholesale, re-clamping its tensor.
    pub fn insert(&mut self, mut entity: EntityTrust) {
        entity.normalize();
        self.entities.insert(entity.entity_id.clone(), entity);
    }

    pub fn update(
        &mut self,
        entity_id: &str,
        entity_type: EntityType,
        success: bool,
        weight: f64,
        now: DateTime<Utc>,
    ) -> TrustDelta {
        self.get_or_create(entity_id, entity_type, now)
            .update(success, weight, now)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityTrust> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn levels_use_fixed_thresholds() {
        assert_eq!(TrustLevel::from_score(0.0), TrustLevel::Low);
        assert_eq!(TrustLevel::from_score(0.19), TrustLevel::Low);
        assert_eq!(TrustLevel::from_score(0.2), TrustLevel::MediumLow);
        assert_eq!(TrustLevel::from_score(0.5), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_score(0.6), TrustLevel::MediumHigh);
        assert_eq!(TrustLevel::from_score(0.8), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(1.0), TrustLevel::High);
    }

    #[test]
    fn seeded_record_is_medium() {
        let e = EntityTrust::new("tool:Read", EntityType::Tool, Utc::now());
        assert!(approx(e.composite(), 0.5));
        assert_eq!(e.level, TrustLevel::Medium);
        assert_eq!(e.interaction_count, 0);
    }

    #[test]
    fn success_and_failure_deltas() {
        let now = Utc::now();
        let mut e = EntityTrust::new("tool:Bash", EntityType::Tool, now);

        e.update(true, 0.15, now);
        assert!(approx(e.t3.talent, 0.5));
        assert!(approx(e.t3.training, 0.508));
        assert!(approx(e.t3.temperament, 0.505));

        e.update(false, 0.15, now);
        assert!(approx(e.t3.talent, 0.48));
        assert!(approx(e.t3.training, 0.498));
        assert!(approx(e.t3.temperament, 0.485));

        assert_eq!(e.interaction_count, 2);
        assert_eq!(e.success_count, 1);
        assert_eq!(e.failure_count, 1);
    }

    #[test]
    fn weight_does_not_scale_deltas() {
        let now = Utc::now();
        let mut light = EntityTrust::new("a", EntityType::Tool, now);
        let mut heavy = EntityTrust::new("b", EntityType::Tool, now);

        let d1 = light.update(false, 0.05, now);
        let d2 = heavy.update(false, 0.15, now);

        assert_eq!(light.t3, heavy.t3);
        assert!(approx(d1.new_composite, d2.new_composite));
        assert!(approx(d2.weight, 0.15));
    }

    #[test]
    fn repeated_failures_bottom_out_at_zero() {
        let now = Utc::now();
        let mut e = EntityTrust::new("a", EntityType::Agent, now);
        let mut last = None;
        for _ in 0..100 {
            last = Some(e.update(false, 0.1, now));
        }
        assert_eq!(e.t3, T3Tensor::new(0.0, 0.0, 0.0));
        assert_eq!(e.level, TrustLevel::Low);
        assert!(last.is_some_and(|d| !d.changed));
    }

    #[test]
    fn delta_reports_level_change() {
        let now = Utc::now();
        let mut e = EntityTrust::new("a", EntityType::Tool, now);
        e.t3 = T3Tensor::new(0.41, 0.41, 0.41);
        e.level = e.t3.level();
        let d = e.update(false, 0.1, now);
        assert_eq!(d.previous_level, TrustLevel::Medium);
        assert_eq!(d.new_level, TrustLevel::MediumLow);
        assert!(d.changed);
    }

    #[test]
    fn store_creates_lazily_and_normalizes_imports() {
        let now = Utc::now();
        let mut store = TrustStore::new();
        assert!(store.is_empty());
        assert!(approx(store.composite_of("session:s1", EntityType::Session, now), 0.5));
        assert_eq!(store.len(), 1);

        let mut foreign = EntityTrust::new("tool:X", EntityType::Tool, now);
        foreign.t3 = T3Tensor { talent: 3.0, training: -1.0, temperament: f64::NAN };
        let store = TrustStore::from_records([foreign]);
        let rec = store.get("tool:X").map(|e| e.t3);
        assert_eq!(rec, Some(T3Tensor::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn insert_replaces_and_clamps() {
        let now = Utc::now();
        let mut store = TrustStore::new();
        store.composite_of("tool:Read", EntityType::Tool, now);

        let mut updated = EntityTrust::new("tool:Read", EntityType::Tool, now);
        updated.success_count = 7;
        updated.t3 = T3Tensor { talent: 1.5, training: 0.9, temperament: 0.9 };
        store.insert(updated);

        assert_eq!(store.len(), 1);
        let rec = store.get("tool:Read");
        assert_eq!(rec.map(|e| e.success_count), Some(7));
        assert_eq!(rec.map(|e| e.t3.talent), Some(1.0));
    }
}
