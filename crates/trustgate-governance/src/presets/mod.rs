//! Built-in policy presets, shipped as YAML documents.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use trustgate_core::error::{GovernanceError, Result};
use trustgate_core::policy::PolicyConfig;

const PERMISSIVE: &str = include_str!("permissive.yaml");
const STANDARD: &str = include_str!("standard.yaml");
const STRICT: &str = include_str!("strict.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Permissive,
    Standard,
    Strict,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Permissive, Preset::Standard, Preset::Strict];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Permissive => "permissive",
            Preset::Standard => "standard",
            Preset::Strict => "strict",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Preset::Permissive => PERMISSIVE,
            Preset::Standard => STANDARD,
            Preset::Strict => STRICT,
        }
    }

    /// Parse the embedded document.
    pub fn config(self) -> Result<PolicyConfig> {
        parse_policy_yaml(self.source())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "permissive" => Ok(Preset::Permissive),
            "standard" => Ok(Preset::Standard),
            "strict" => Ok(Preset::Strict),
            other => Err(GovernanceError::Configuration(format!("unknown preset: {other}"))),
        }
    }
}

/// Parse a policy document. JSON documents are accepted too.
pub fn parse_policy_yaml(s: &str) -> Result<PolicyConfig> {
    serde_yaml::from_str(s)
        .map_err(|e| GovernanceError::Configuration(format!("invalid policy document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgate_core::policy::{PolicyDecision, PolicyEntity};

    #[test]
    fn every_preset_registers() {
        for p in Preset::ALL {
            let cfg = p.config();
            assert!(cfg.is_ok(), "preset {p} failed to parse: {:?}", cfg.err());
            let entity = cfg.and_then(PolicyEntity::new);
            assert!(entity.is_ok(), "preset {p} failed validation");
        }
    }

    #[test]
    fn preset_defaults() {
        let get = |p: Preset| p.config().ok().map(|c| (c.default_policy, c.enforce));
        assert_eq!(get(Preset::Permissive), Some((PolicyDecision::Allow, false)));
        assert_eq!(get(Preset::Standard), Some((PolicyDecision::Allow, true)));
        assert_eq!(get(Preset::Strict), Some((PolicyDecision::Deny, true)));
    }

    #[test]
    fn names_round_trip() {
        for p in Preset::ALL {
            assert_eq!(p.as_str().parse::<Preset>().ok(), Some(p));
        }
        assert!("lenient".parse::<Preset>().is_err());
    }

    #[test]
    fn json_documents_parse() {
        let doc = r#"{"name":"j","version":"1","defaultPolicy":"deny","rules":[]}"#;
        assert!(parse_policy_yaml(doc).is_ok());
    }
}
