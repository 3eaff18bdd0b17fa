//! Top-level facade crate for trustgate.
//!
//! Re-exports the core primitives and the governance library so users can depend on a single crate.

pub mod core {
    pub use trustgate_core::*;
}

pub mod governance {
    pub use trustgate_governance::*;
}
