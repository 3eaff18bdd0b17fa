//! trustgate governance library entry.
//!
//! Wires the core trust, policy, rate-limit and audit primitives into a
//! per-session façade, plus the pieces around it: presets, YAML config,
//! the acceleration boundary, metrics and the hook event adapter used by the
//! `trustgate-hook` binary.

pub mod accel;
pub mod config;
pub mod governance;
pub mod hook;
pub mod obs;
pub mod presets;

pub use governance::{ClosedSession, Governance, HookContext, HookDecision, HookOutput, SessionRecord};
