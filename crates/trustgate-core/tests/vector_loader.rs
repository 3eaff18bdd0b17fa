//! JSON policy vector loader shared by policy tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde::Deserialize;
use trustgate_core::policy::{PolicyConfig, PolicyDecision};

#[derive(Debug, Deserialize)]
pub struct PolicyVector {
    pub description: String,
    pub policy: PolicyConfig,
    pub cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
pub struct Case {
    pub tool: String,
    #[serde(default)]
    pub target: Option<String>,
    pub trust: f64,
    pub expect: Expect,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expect {
    pub decision: PolicyDecision,
    pub enforced: bool,
    pub matched_rule: Option<String>,
}

pub fn load(name: &str) -> PolicyVector {
    let s = std::fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}
