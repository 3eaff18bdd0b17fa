use std::fs;
use std::path::Path;

use serde::Deserialize;
use trustgate_core::error::{GovernanceError, Result};
use trustgate_core::policy::PolicyConfig;

use crate::presets::{parse_policy_yaml, Preset};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    pub version: u32,

    #[serde(default)]
    pub policy: PolicySection,

    #[serde(default)]
    pub acceleration: AccelerationSection,

    #[serde(default)]
    pub audit: AuditSection,
}

impl GovernanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GovernanceError::Configuration(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.policy.validate()?;
        Ok(())
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            policy: PolicySection::default(),
            acceleration: AccelerationSection::default(),
            audit: AuditSection::default(),
        }
    }
}

/// Where the active policy comes from: a built-in preset or a document on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    #[serde(default)]
    pub preset: Option<Preset>,

    #[serde(default)]
    pub path: Option<String>,
}

impl PolicySection {
    pub fn validate(&self) -> Result<()> {
        if self.preset.is_some() && self.path.is_some() {
            return Err(GovernanceError::Configuration(
                "policy.preset and policy.path are mutually exclusive".into(),
            ));
        }
        if self.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(GovernanceError::Configuration("policy.path must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve to a policy document. Relative paths resolve against `base_dir`.
    pub fn load(&self, base_dir: Option<&Path>) -> Result<PolicyConfig> {
        match &self.path {
            Some(p) => {
                let path = match base_dir {
                    Some(dir) if Path::new(p).is_relative() => dir.join(p),
                    _ => Path::new(p).to_path_buf(),
                };
                let s = fs::read_to_string(&path).map_err(|e| {
                    GovernanceError::Configuration(format!("read policy {} failed: {e}", path.display()))
                })?;
                parse_policy_yaml(&s)
            }
            None => self.preset.unwrap_or(Preset::Standard).config(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccelerationSection {
    #[serde(default = "default_acceleration_enabled")]
    pub enabled: bool,
}

impl Default for AccelerationSection {
    fn default() -> Self {
        Self { enabled: default_acceleration_enabled() }
    }
}

fn default_acceleration_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    /// Verify each chain when its session ends.
    #[serde(default = "default_verify_on_close")]
    pub verify_on_close: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self { verify_on_close: default_verify_on_close() }
    }
}

fn default_verify_on_close() -> bool {
    true
}
