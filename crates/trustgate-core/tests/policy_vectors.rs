//! Policy evaluation vectors.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use trustgate_core::category::ToolCategory;
use trustgate_core::policy::PolicyRegistry;

mod vector_loader;

#[test]
fn policy_vectors() {
    let files = [
        "priority_ordering.json",
        "target_patterns.json",
        "secret_patterns.json",
        "soft_mode.json",
    ];

    let mut registry = PolicyRegistry::new();
    for f in files {
        let v = vector_loader::load(f);
        let entity = registry
            .register(v.policy)
            .unwrap_or_else(|e| panic!("vector={} register failed: {e}", v.description));

        for (i, case) in v.cases.iter().enumerate() {
            let category = ToolCategory::from_tool_name(&case.tool);
            let ev = entity.evaluate(&case.tool, category, case.target.as_deref(), case.trust);

            assert_eq!(ev.decision, case.expect.decision, "vector={} case={i}", v.description);
            assert_eq!(ev.enforced, case.expect.enforced, "vector={} case={i}", v.description);
            assert_eq!(ev.matched_rule, case.expect.matched_rule, "vector={} case={i}", v.description);
            assert_eq!(ev.trust_score, case.trust, "vector={} case={i}", v.description);
        }
    }
    assert_eq!(registry.len(), files.len());
}
