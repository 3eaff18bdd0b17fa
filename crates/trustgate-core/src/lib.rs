//! trustgate core: trust tensors, policy evaluation, rate limiting, and the
//! hash-chained audit log.
//!
//! Everything here is synchronous and deterministic given a [`clock::Clock`].
//! The crate carries no runtime or transport dependencies so the same types
//! can back the governance façade, the acceleration boundary, and tooling
//! that replays persisted audit chains.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Fallible paths surface as `GovernanceError`/`Result` so a gating hook is
//! never brought down by bad input.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod audit;
pub mod canonical;
pub mod category;
pub mod clock;
pub mod error;
pub mod policy;
pub mod rate_limit;
pub mod trust;
pub mod witness;

/// Shared result type.
pub use error::{GovernanceError, Result};
