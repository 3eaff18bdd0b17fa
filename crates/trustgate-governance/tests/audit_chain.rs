#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::json;
use trustgate_core::audit::{parameters_hash, verify_records};
use trustgate_core::clock::ManualClock;
use trustgate_core::error::{ErrorCode, GovernanceError};
use trustgate_core::policy::PolicyEntity;
use trustgate_governance::governance::{Governance, HookContext, SessionPhase, SessionRecord};
use trustgate_governance::presets::Preset;

fn run_session(calls: usize) -> (Governance, SessionRecord) {
    let policy = Arc::new(PolicyEntity::new(Preset::Standard.config().unwrap()).unwrap());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let mut g = Governance::new(policy).with_clock(clock.clone());
    g.session_start("audit").unwrap();
    for i in 0..calls {
        let ctx = HookContext::new("audit", "Read")
            .with_input(json!({ "file_path": format!("/repo/file{i}.rs") }))
            .with_agent("agent-1");
        g.pre_tool_use(&ctx);
        clock.advance(10);
    }
    let record = g.session_end("audit").unwrap();
    (g, record)
}

#[test]
fn records_link_to_predecessors() {
    let (_, record) = run_session(5);
    let records = record.chain.records();
    assert_eq!(records.len(), 5);
    assert!(records[0].reference.previous_hash.is_none());
    for pair in records.windows(2) {
        assert_eq!(pair[1].reference.previous_hash.as_deref(), Some(pair[0].content_hash.as_str()));
    }
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.reference.sequence_number, i as u64 + 1);
        assert_eq!(r.action_id, format!("r6:audit:{}", i + 1));
        assert_eq!(r.role.agent_id.as_deref(), Some("agent-1"));
    }
    assert_eq!(record.chain.latest_hash(), Some(records[4].content_hash.as_str()));
    assert!(record.chain.verify().is_ok());
}

#[test]
fn facets_capture_the_decision() {
    let (g, record) = run_session(1);
    let rec = &record.chain.records()[0];
    assert_eq!(rec.rules.policy_id, g.policy().id());
    assert_eq!(rec.rules.policy_hash, g.policy().content_hash());
    assert_eq!(rec.resource.target.as_deref(), Some("/repo/file0.rs"));
    assert_eq!(rec.resource.target_type, "file_read");
    assert_eq!(
        rec.request.parameters_hash,
        parameters_hash(&json!({ "file_path": "/repo/file0.rs" })).unwrap()
    );
    assert_eq!(rec.request.parameters_hash.len(), 16);
    assert!(rec.result.success);
    assert!(!rec.result.blocked);
}

#[test]
fn persisted_chain_detects_tampering() {
    let (_, record) = run_session(4);
    let persisted = serde_json::to_string(&record).unwrap();
    let restored: SessionRecord = serde_json::from_str(&persisted).unwrap();
    assert!(restored.chain.verify().is_ok());
    assert!(verify_records(restored.chain.records()).is_ok());

    let mut records = restored.chain.records().to_vec();
    records[2].resource.target = Some("/repo/.env".into());
    let err = verify_records(&records).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuditIntegrity);
    assert!(matches!(err, GovernanceError::AuditIntegrity { sequence: 3, .. }));

    let mut reordered = restored.chain.records().to_vec();
    reordered.swap(1, 2);
    assert!(verify_records(&reordered).is_err());
}

#[test]
fn closed_session_keeps_only_a_tombstone() {
    let (mut g, record) = run_session(2);
    assert!(record.chain.is_sealed());

    let tomb = g.closed("audit").cloned().unwrap();
    assert_eq!(tomb.records, 2);
    assert_eq!(tomb.latest_hash.as_deref(), record.chain.latest_hash());
    assert_eq!(tomb.ended_at, record.ended_at);
    assert!(g.audit_chain("audit").is_none());
    assert!(g.witnessing("audit", "tool:Read").is_none());
    assert_eq!(g.retained_records(), 0);

    // calls after close fail closed and leave the tombstone untouched
    let out = g.pre_tool_use(&HookContext::new("audit", "Read"));
    assert!(out.reason.unwrap().contains("session closed"));
    assert!(g.post_tool_use(&HookContext::new("audit", "Read"), true).is_err());
    assert_eq!(g.closed("audit"), Some(&tomb));
}

#[test]
fn finished_sessions_release_their_state() {
    let policy = Arc::new(PolicyEntity::new(Preset::Standard.config().unwrap()).unwrap());
    let mut g = Governance::new(policy).with_clock(Arc::new(ManualClock::new(1_700_000_000_000)));
    for i in 0..1000 {
        let id = format!("s{i}");
        g.session_start(&id).unwrap();
        g.pre_tool_use(&HookContext::new(&id, "Read").with_input(json!({ "file_path": "/repo/a.rs" })));
        let record = g.session_end(&id).unwrap();
        assert_eq!(record.chain.len(), 1);
    }

    assert_eq!(g.retained_records(), 0);
    assert_eq!(g.phase("s999"), SessionPhase::Closed);
    assert!((0..1000).all(|i| g.audit_chain(&format!("s{i}")).is_none()));
    assert_eq!(g.closed("s0").map(|t| t.records), Some(1));

    assert!(g.forget("s0"));
    assert_eq!(g.phase("s0"), SessionPhase::Uninitialized);
    assert!(g.closed("s0").is_none());
    g.session_start("s0").unwrap();
    assert!(!g.forget("s0"));
}

#[test]
fn policy_change_changes_policy_id() {
    let mut changed = Preset::Standard.config().unwrap();
    changed.rules.retain(|r| r.id != "ask-execute");
    let a = PolicyEntity::new(Preset::Standard.config().unwrap()).unwrap();
    let b = PolicyEntity::new(changed).unwrap();
    assert_ne!(a.id(), b.id());
    assert_ne!(a.content_hash(), b.content_hash());
}
