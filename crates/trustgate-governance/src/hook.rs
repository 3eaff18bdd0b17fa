//! Newline-delimited JSON event adapter for the hook binary.
//!
//! One event per line in, one JSON response per line out. Events are tagged
//! by `event`. A line that cannot be parsed is answered with an error object
//! that also carries the fail-closed decision, so a dispatcher that only
//! reads `decision` never treats garbage as permission.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trustgate_core::error::GovernanceError;

use crate::governance::{Governance, HookContext, HookDecision};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent {
    SessionStart {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    PreToolUse(HookContext),
    PostToolUse {
        #[serde(flatten)]
        context: HookContext,
        success: bool,
    },
    SessionEnd {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Metrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: &'static str,
    message: String,
}

pub struct HookServer {
    governance: Governance,
}

impl HookServer {
    pub fn new(governance: Governance) -> Self {
        Self { governance }
    }

    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    /// Handle one raw input line.
    pub fn handle_line(&mut self, line: &str) -> String {
        let response = match serde_json::from_str::<HookEvent>(line) {
            Ok(event) => self.handle(event),
            Err(e) => {
                tracing::warn!(error = %e, "malformed hook event");
                self.error_response(&GovernanceError::from(e))
            }
        };
        response.to_string()
    }

    pub fn handle(&mut self, event: HookEvent) -> Value {
        match event {
            HookEvent::SessionStart { session_id } => match self.governance.session_start(&session_id) {
                Ok(()) => json!({
                    "ok": true,
                    "sessionId": session_id,
                    "policyId": self.governance.policy().id(),
                }),
                Err(e) => self.error_response(&e),
            },
            HookEvent::PreToolUse(ctx) => {
                let out = self.governance.pre_tool_use(&ctx);
                serde_json::to_value(&out).unwrap_or_else(|e| self.error_response(&e.into()))
            }
            HookEvent::PostToolUse { context, success } => {
                match self.governance.post_tool_use(&context, success) {
                    Ok(outcome) => {
                        serde_json::to_value(&outcome).unwrap_or_else(|e| self.error_response(&e.into()))
                    }
                    Err(e) => self.error_response(&e),
                }
            }
            HookEvent::SessionEnd { session_id } => match self.governance.session_end(&session_id) {
                Ok(record) => json!({
                    "ok": true,
                    "record": serde_json::to_value(&record).unwrap_or(Value::Null),
                }),
                Err(e) => self.error_response(&e),
            },
            HookEvent::Metrics => json!({
                "backend": self.governance.backend().metrics(),
                "prometheus": self.governance.metrics().render(),
            }),
        }
    }

    fn error_response(&self, e: &GovernanceError) -> Value {
        let decision = HookDecision::fail_closed(self.governance.policy().default_policy());
        json!({
            "ok": false,
            "error": ErrorBody { code: e.code().as_str(), message: e.to_string() },
            "decision": decision,
            "continue": decision.should_continue(),
        })
    }
}
