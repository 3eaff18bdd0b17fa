//! Per-call hook input and output.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trustgate_core::category::ToolCategory;
use trustgate_core::policy::{PolicyDecision, PolicyEvaluation};

/// Tool input fields that name the call's target, in lookup order.
const TARGET_FIELDS: [&str; 7] = ["file_path", "notebook_path", "path", "url", "command", "pattern", "query"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    pub session_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl HookContext {
    pub fn new(session_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tool_name: tool_name.into(),
            tool_input: Value::Null,
            target: None,
            agent_id: None,
            cwd: None,
        }
    }

    pub fn with_input(mut self, tool_input: Value) -> Self {
        self.tool_input = tool_input;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Explicit target, else the first string-valued target field of the
    /// tool input. Relative file paths are joined onto `cwd` when known.
    pub fn resolve_target(&self, category: ToolCategory) -> Option<String> {
        let raw = self.target.clone().or_else(|| {
            TARGET_FIELDS
                .iter()
                .find_map(|f| self.tool_input.get(f).and_then(Value::as_str))
                .map(str::to_string)
        })?;

        let is_file = matches!(category, ToolCategory::FileRead | ToolCategory::FileWrite);
        match (&self.cwd, is_file) {
            (Some(cwd), true) if Path::new(&raw).is_relative() => {
                Some(Path::new(cwd).join(&raw).to_string_lossy().into_owned())
            }
            _ => Some(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    Allow,
    Deny,
    Block,
    Ask,
}

impl HookDecision {
    /// Evaluation outcome to hook decision.
    pub fn from_evaluation(ev: &PolicyEvaluation) -> Self {
        match (ev.decision, ev.enforced) {
            (PolicyDecision::Allow, _) | (PolicyDecision::LogOnly, _) => HookDecision::Allow,
            (PolicyDecision::AskUser, _) => HookDecision::Ask,
            (PolicyDecision::Deny, true) => HookDecision::Deny,
            (PolicyDecision::Deny, false) => HookDecision::Allow,
        }
    }

    /// Decision used when evaluation itself faulted. Never opens the gate.
    pub fn fail_closed(default_policy: PolicyDecision) -> Self {
        match default_policy {
            PolicyDecision::Deny => HookDecision::Block,
            PolicyDecision::AskUser | PolicyDecision::Allow | PolicyDecision::LogOnly => HookDecision::Ask,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookDecision::Allow => "allow",
            HookDecision::Deny => "deny",
            HookDecision::Block => "block",
            HookDecision::Ask => "ask",
        }
    }

    /// The caller may carry on unless blocked.
    pub fn should_continue(self) -> bool {
        self != HookDecision::Block
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, HookDecision::Deny | HookDecision::Block)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub decision: HookDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "continue")]
    pub continue_: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
}

impl HookOutput {
    pub fn from_evaluation(ev: &PolicyEvaluation, policy_hash: &str) -> Self {
        let decision = HookDecision::from_evaluation(ev);
        let reason = match ev.decision {
            PolicyDecision::Deny if !ev.enforced => format!("{} (not enforced)", ev.reason),
            PolicyDecision::LogOnly => format!("{} [logged]", ev.reason),
            _ => ev.reason.clone(),
        };
        Self {
            decision,
            reason: Some(reason),
            continue_: decision.should_continue(),
            trust_score: Some(ev.trust_score),
            policy_hash: Some(policy_hash.to_string()),
        }
    }

    pub fn fail_closed(default_policy: PolicyDecision, fault: &str, policy_hash: &str) -> Self {
        let decision = HookDecision::fail_closed(default_policy);
        Self {
            decision,
            reason: Some(format!("governance fault: {fault}")),
            continue_: decision.should_continue(),
            trust_score: None,
            policy_hash: Some(policy_hash.to_string()),
        }
    }
}
