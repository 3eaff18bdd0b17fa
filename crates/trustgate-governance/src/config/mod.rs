//! Governance config loader (strict parsing).

pub mod schema;

use std::fs;

use trustgate_core::error::{GovernanceError, Result};

pub use schema::{AccelerationSection, AuditSection, GovernanceConfig, PolicySection};

pub fn load_from_file(path: &str) -> Result<GovernanceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GovernanceError::Configuration(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GovernanceConfig> {
    let cfg: GovernanceConfig = serde_yaml::from_str(s)
        .map_err(|e| GovernanceError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
