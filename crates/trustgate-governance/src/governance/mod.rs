//! Governance façade.
//!
//! Sequences trust lookup, policy evaluation, rate limiting and audit for
//! each tool call. Sessions move `uninitialized -> active -> closed`; all
//! per-session state (trust store, audit chain, rate windows, witness log)
//! is owned here and mutated through `&mut self`, so callers serialize calls
//! for a session.
//!
//! Evaluation, rate limiting, trust updates and witnessing go through the
//! installed [`GovernanceBackend`]. A closed session leaves only a
//! [`ClosedSession`] tombstone behind; its full record belongs to the caller
//! of [`Governance::session_end`].

pub mod context;
pub mod session;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use trustgate_core::audit::{
    parameters_hash, AuditChain, R6Action, R6Request, R6Resource, R6Result, R6Role, R6Rules,
};
use trustgate_core::category::ToolCategory;
use trustgate_core::clock::{Clock, SystemClock};
use trustgate_core::error::{GovernanceError, Result};
use trustgate_core::policy::{PolicyDecision, PolicyEntity, PolicyEvaluation, PolicyRegistry};
use trustgate_core::rate_limit::rule_key;
use trustgate_core::trust::{EntityType, TrustDelta, TrustStore};
use trustgate_core::witness::{WitnessEvent, WitnessingChain};

use crate::accel::reference::{RateLimitCheck, TrustUpdate};
use crate::accel::{GovernanceBackend, ReferenceBackend};
use crate::config::GovernanceConfig;
use crate::obs::GovernanceMetrics;

pub use context::{HookContext, HookDecision, HookOutput};
pub use session::{session_entity_id, tool_entity_id, ClosedSession, SessionPhase, SessionRecord};

use session::{ActiveSession, SessionState};

/// Trust deltas produced by one completed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolOutcome {
    pub tool: TrustDelta,
    pub session: TrustDelta,
    pub witnessed: bool,
}

pub struct Governance {
    policy: Arc<PolicyEntity>,
    sessions: HashMap<String, SessionState>,
    // records whose chain failed verification at close
    retained: HashMap<String, SessionRecord>,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn GovernanceBackend>,
    // true until a backend is installed explicitly
    reference_backend: bool,
    metrics: Arc<GovernanceMetrics>,
    verify_on_close: bool,
}

fn active_session<'a>(
    sessions: &'a mut HashMap<String, SessionState>,
    session_id: &str,
) -> Result<&'a mut ActiveSession> {
    match sessions.get_mut(session_id) {
        Some(SessionState::Active(s)) => Ok(s.as_mut()),
        Some(SessionState::Closed(_)) => Err(GovernanceError::SessionClosed(session_id.to_string())),
        None => Err(GovernanceError::SessionNotActive(session_id.to_string())),
    }
}

fn decode<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

/// Apply one outcome to an entity through the backend and store the result.
fn update_entity(
    backend: &dyn GovernanceBackend,
    store: &mut TrustStore,
    entity_id: &str,
    entity_type: EntityType,
    success: bool,
    weight: f64,
    now: DateTime<Utc>,
) -> Result<TrustDelta> {
    let current = serde_json::to_string(store.get_or_create(entity_id, entity_type, now))?;
    let update: TrustUpdate = decode(&backend.update_trust(&current, success, weight)?)?;
    store.insert(update.entity);
    Ok(update.delta)
}

impl Governance {
    pub fn new(policy: Arc<PolicyEntity>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            policy,
            sessions: HashMap::new(),
            retained: HashMap::new(),
            backend: Arc::new(ReferenceBackend::new(Arc::clone(&clock))),
            reference_backend: true,
            clock,
            metrics: Arc::new(GovernanceMetrics::new()),
            verify_on_close: true,
        }
    }

    /// Build from a loaded config, registering its policy.
    pub fn from_config(
        cfg: &GovernanceConfig,
        base_dir: Option<&Path>,
        registry: &mut PolicyRegistry,
    ) -> Result<Self> {
        let policy = registry.register(cfg.policy.load(base_dir)?)?;
        Ok(Self::new(policy).with_verify_on_close(cfg.audit.verify_on_close))
    }

    /// Replace the clock. The built-in reference backend follows it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if self.reference_backend {
            self.backend = Arc::new(ReferenceBackend::new(Arc::clone(&clock)));
        }
        self.clock = clock;
        self
    }

    /// Install the backend selected at startup. It must hash the policy
    /// document to the same content hash the policy was registered under.
    pub fn with_backend(mut self, backend: Arc<dyn GovernanceBackend>) -> Result<Self> {
        let hash = backend.compute_policy_hash(self.policy.document())?;
        if hash != self.policy.content_hash() {
            return Err(GovernanceError::Configuration(format!(
                "backend {} hashes policy {} as {hash}",
                backend.name(),
                self.policy.id()
            )));
        }
        tracing::info!(backend = backend.name(), policy_id = %self.policy.id(), "governance backend installed");
        self.backend = backend;
        self.reference_backend = false;
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: Arc<GovernanceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_verify_on_close(mut self, verify: bool) -> Self {
        self.verify_on_close = verify;
        self
    }

    pub fn policy(&self) -> &Arc<PolicyEntity> {
        &self.policy
    }

    pub fn backend(&self) -> &Arc<dyn GovernanceBackend> {
        &self.backend
    }

    pub fn metrics(&self) -> &Arc<GovernanceMetrics> {
        &self.metrics
    }

    pub fn phase(&self, session_id: &str) -> SessionPhase {
        match self.sessions.get(session_id) {
            None => SessionPhase::Uninitialized,
            Some(SessionState::Active(_)) => SessionPhase::Active,
            Some(SessionState::Closed(_)) => SessionPhase::Closed,
        }
    }

    pub fn session_start(&mut self, session_id: &str) -> Result<()> {
        self.session_start_with(session_id, TrustStore::new())
    }

    /// Start a session seeded with a previously persisted trust store.
    /// Starting an active session is a no-op.
    pub fn session_start_with(&mut self, session_id: &str, trust: TrustStore) -> Result<()> {
        match self.sessions.get(session_id) {
            Some(SessionState::Active(_)) => return Ok(()),
            Some(SessionState::Closed(_)) => {
                return Err(GovernanceError::SessionClosed(session_id.to_string()))
            }
            None => {}
        }

        let now = self.clock.now();
        let mut session = ActiveSession::new(session_id, self.policy.id(), trust, now);
        session
            .trust
            .get_or_create(&session_entity_id(session_id), EntityType::Session, now);

        self.sessions
            .insert(session_id.to_string(), SessionState::Active(Box::new(session)));
        self.metrics.sessions.inc(&[("event", "start")]);
        tracing::info!(session_id, policy_id = %self.policy.id(), "session started");
        Ok(())
    }

    /// Gate one tool call. Faults fail closed and are never returned.
    pub fn pre_tool_use(&mut self, ctx: &HookContext) -> HookOutput {
        match self.try_pre_tool_use(ctx) {
            Ok(out) => out,
            Err(e) => {
                let default = self.policy.default_policy();
                self.metrics.faults.inc(&[("code", e.code().as_str())]);
                tracing::error!(
                    session_id = %ctx.session_id,
                    tool = %ctx.tool_name,
                    code = e.code().as_str(),
                    error = %e,
                    "evaluation fault, failing closed"
                );
                HookOutput::fail_closed(default, &e.to_string(), self.policy.content_hash())
            }
        }
    }

    fn try_pre_tool_use(&mut self, ctx: &HookContext) -> Result<HookOutput> {
        let started = Instant::now();
        let now = self.clock.now();
        let policy = Arc::clone(&self.policy);
        let backend = Arc::clone(&self.backend);
        let session = active_session(&mut self.sessions, &ctx.session_id)?;

        let category = ToolCategory::from_tool_name(&ctx.tool_name);
        let target = ctx.resolve_target(category);

        let tool_score = session
            .trust
            .composite_of(&tool_entity_id(&ctx.tool_name), EntityType::Tool, now);
        let session_score = session.trust.composite_of(
            &session_entity_id(&ctx.session_id),
            EntityType::Session,
            now,
        );
        let trust_score = (tool_score + session_score) / 2.0;

        let mut ev: PolicyEvaluation = decode(&backend.evaluate_policy(
            policy.document(),
            &ctx.tool_name,
            target.as_deref(),
            trust_score,
        )?)?;

        if let (Some(limit), Some(rule_id)) = (ev.rate_limit, ev.matched_rule.clone()) {
            let state = serde_json::to_string(&session.rate)?;
            let check: RateLimitCheck = decode(&backend.check_rate_limit(
                &state,
                &rule_key(&rule_id),
                limit.max_count,
                limit.window_ms,
            )?)?;
            session.rate = check.state;
            let rl = check.result;
            if !rl.allowed {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    rule = %rule_id,
                    count = rl.current_count,
                    max = rl.max_count,
                    reset_in_ms = rl.reset_in_ms,
                    "rate limit exceeded"
                );
                self.metrics.rate_limited.inc(&[("rule", rule_id.as_str())]);
                ev.decision = PolicyDecision::Deny;
                ev.enforced = true;
                ev.reason = format!(
                    "Rate limit exceeded: {}/{} in {}ms (resets in {}ms)",
                    rl.current_count, limit.max_count, limit.window_ms, rl.reset_in_ms
                );
                ev.constraints
                    .push(format!("rate_limit:{}/{}ms", limit.max_count, limit.window_ms));
            }
        }

        let output = HookOutput::from_evaluation(&ev, policy.content_hash());

        let action = R6Action::new(
            R6Rules {
                policy_id: policy.id().to_string(),
                policy_hash: policy.content_hash().to_string(),
                matched_rule: ev.matched_rule.clone(),
                decision: ev.decision,
            },
            R6Role {
                session_id: ctx.session_id.clone(),
                agent_id: ctx.agent_id.clone(),
                trust_score,
            },
            R6Request {
                tool_name: ctx.tool_name.clone(),
                category,
                parameters_hash: parameters_hash(&ctx.tool_input)?,
            },
            R6Resource {
                target,
                target_type: category.as_str().to_string(),
            },
            R6Result {
                success: !output.decision.is_blocking(),
                enforced: ev.enforced,
                blocked: output.decision.is_blocking(),
                error: None,
            },
            now,
        );
        session.chain.append(action)?;

        self.metrics.audit_appends.inc(&[]);
        self.metrics.decisions.inc(&[
            ("decision", output.decision.as_str()),
            ("category", category.as_str()),
        ]);
        self.metrics
            .evaluate_duration
            .observe(&[("category", category.as_str())], started.elapsed());

        tracing::debug!(
            session_id = %ctx.session_id,
            tool = %ctx.tool_name,
            decision = output.decision.as_str(),
            rule = ev.matched_rule.as_deref().unwrap_or("default"),
            trust = trust_score,
            "tool call evaluated"
        );
        Ok(output)
    }

    /// Record a completed call's outcome against tool and session trust.
    pub fn post_tool_use(&mut self, ctx: &HookContext, success: bool) -> Result<PostToolOutcome> {
        let now = self.clock.now();
        let backend = Arc::clone(&self.backend);
        let session = active_session(&mut self.sessions, &ctx.session_id)?;

        let weight = ToolCategory::from_tool_name(&ctx.tool_name).trust_weight();
        let tool_id = tool_entity_id(&ctx.tool_name);
        let session_id = session_entity_id(&ctx.session_id);

        let tool = update_entity(
            backend.as_ref(),
            &mut session.trust,
            &tool_id,
            EntityType::Tool,
            success,
            weight,
            now,
        )?;
        let sess = update_entity(
            backend.as_ref(),
            &mut session.trust,
            &session_id,
            EntityType::Session,
            success,
            weight / 2.0,
            now,
        )?;

        if success {
            let event: WitnessEvent =
                decode(&backend.record_witness(&session_id, &tool_id, sess.new_composite)?)?;
            session.witnesses.push(event);
        }

        let outcome = if success { "success" } else { "failure" };
        self.metrics.trust_updates.inc(&[("entity_type", "tool"), ("outcome", outcome)]);
        self.metrics.trust_updates.inc(&[("entity_type", "session"), ("outcome", outcome)]);
        if tool.previous_level != tool.new_level {
            tracing::info!(
                tool = %ctx.tool_name,
                from = tool.previous_level.as_str(),
                to = tool.new_level.as_str(),
                "tool trust level changed"
            );
        }
        tracing::debug!(
            session_id = %ctx.session_id,
            tool = %ctx.tool_name,
            success,
            tool_trust = tool.new_composite,
            session_trust = sess.new_composite,
            "tool outcome recorded"
        );

        Ok(PostToolOutcome { tool, session: sess, witnessed: success })
    }

    /// Seal and close the session, handing its record to the caller. Only a
    /// tombstone stays behind. An integrity failure is reported after the
    /// session has been closed, and the record is then kept for
    /// [`Governance::take_record`].
    pub fn session_end(&mut self, session_id: &str) -> Result<SessionRecord> {
        let session = match self.sessions.remove(session_id) {
            Some(SessionState::Active(s)) => s,
            Some(closed @ SessionState::Closed(_)) => {
                self.sessions.insert(session_id.to_string(), closed);
                return Err(GovernanceError::SessionClosed(session_id.to_string()));
            }
            None => return Err(GovernanceError::SessionNotActive(session_id.to_string())),
        };

        let record = session.into_record(session_id, self.clock.now());
        self.sessions
            .insert(session_id.to_string(), SessionState::Closed(record.tombstone()));
        self.metrics.sessions.inc(&[("event", "end")]);

        if self.verify_on_close {
            if let Err(e) = record.chain.verify() {
                tracing::error!(session_id, error = %e, "audit chain failed verification, record retained");
                self.retained.insert(session_id.to_string(), record);
                return Err(e);
            }
        }

        tracing::info!(
            session_id,
            records = record.chain.len(),
            latest_hash = record.chain.latest_hash().unwrap_or(""),
            "session closed"
        );
        Ok(record)
    }

    /// Tombstone of a closed session.
    pub fn closed(&self, session_id: &str) -> Option<&ClosedSession> {
        match self.sessions.get(session_id)? {
            SessionState::Closed(c) => Some(c),
            SessionState::Active(_) => None,
        }
    }

    /// Hand out a record kept after a failed close-time verification.
    pub fn take_record(&mut self, session_id: &str) -> Option<SessionRecord> {
        self.retained.remove(session_id)
    }

    pub fn retained_records(&self) -> usize {
        self.retained.len()
    }

    /// Drop everything left of a closed session, tombstone included. The id
    /// can be started again afterwards. Active sessions are untouched.
    pub fn forget(&mut self, session_id: &str) -> bool {
        if !matches!(self.sessions.get(session_id), Some(SessionState::Closed(_))) {
            return false;
        }
        self.sessions.remove(session_id);
        self.retained.remove(session_id);
        true
    }

    /// Chain of an active session, or of a closed one whose record was kept.
    pub fn audit_chain(&self, session_id: &str) -> Option<&AuditChain> {
        match self.sessions.get(session_id)? {
            SessionState::Active(s) => Some(&s.chain),
            SessionState::Closed(_) => self.retained.get(session_id).map(|r| &r.chain),
        }
    }

    /// Trust store of an active session.
    pub fn trust(&self, session_id: &str) -> Option<&TrustStore> {
        match self.sessions.get(session_id)? {
            SessionState::Active(s) => Some(&s.trust),
            SessionState::Closed(_) => None,
        }
    }

    /// Witnessing view of one entity within a session.
    pub fn witnessing(&self, session_id: &str, entity_id: &str) -> Option<WitnessingChain> {
        let (composite, events) = match self.sessions.get(session_id)? {
            SessionState::Active(s) => (
                s.trust.get(entity_id).map(|e| e.composite()).unwrap_or(0.5),
                &s.witnesses,
            ),
            SessionState::Closed(_) => {
                let r = self.retained.get(session_id)?;
                (
                    r.trust
                        .iter()
                        .find(|e| e.entity_id == entity_id)
                        .map(|e| e.composite())
                        .unwrap_or(0.5),
                    &r.witnesses,
                )
            }
        };
        Some(WitnessingChain::from_events(entity_id, composite, events))
    }

    /// Drop expired rate-limit windows across active sessions.
    pub fn purge_rate_limits(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.sessions
            .values_mut()
            .filter_map(|s| match s {
                SessionState::Active(a) => Some(a.rate.purge_expired(now)),
                SessionState::Closed(_) => None,
            })
            .sum()
    }
}
