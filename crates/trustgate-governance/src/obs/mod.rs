//! Lightweight in-process metrics.
//!
//! Counters are atomics rendered in Prometheus text format on request; the
//! hook adapter exposes them through the `metrics` event.

pub mod metrics;

pub use metrics::GovernanceMetrics;
