//! Check sync against a recording SCM client.

mod support;

use prwarden_core::{CheckReconciler, EngineConfig, SyncOutcome};
use prwarden_state::{CheckRunStore, ResultStatus};
use support::*;

const RULES: &str = r#"
rules:
  - ready:
      conditions: ["draft=false"]
      actions:
        - add_label: ready
"#;

#[tokio::test]
async fn unchanged_rule_is_synced_once() {
    let h = harness();
    h.load(RULES).await;
    let reconciler = CheckReconciler::new(h.store.clone(), h.scm.clone(), EngineConfig::default());
    let ctx = context(pull_request(5, "sha-a"));
    let evaluated = h.engine.preview(&ctx).await.unwrap();

    let first = reconciler.reconcile(&ctx, &evaluated[0]).await.unwrap();
    let second = reconciler.reconcile(&ctx, &evaluated[0]).await.unwrap();
    assert_eq!(first, SyncOutcome::Created);
    assert_eq!(second, SyncOutcome::Unchanged);
    assert_eq!(h.scm.check_calls().len(), 1);

    let stored = h
        .store
        .get_check_run(&repo(), 5, "ready")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remote_id, "check-1");
    assert_eq!(stored.status, ResultStatus::Pending);
}

#[tokio::test]
async fn status_change_updates_the_same_check() {
    let h = harness();
    h.load(RULES).await;
    let ctx = context(pull_request(5, "sha-a"));
    h.engine.refresh_checks(&ctx).await.unwrap();
    h.engine.execute("pr_updated", &ctx).await.unwrap();

    assert_eq!(
        h.scm.check_calls(),
        vec![
            Call::AddCheck {
                key: "prwarden/ready".into(),
                sha: "sha-a".into(),
                status: ResultStatus::Pending,
            },
            Call::UpdateCheck {
                remote_id: "check-1".into(),
                sha: "sha-a".into(),
                status: ResultStatus::Success,
            },
        ]
    );
}

#[tokio::test]
async fn new_head_updates_the_check() {
    let h = harness();
    h.load(RULES).await;
    h.engine
        .refresh_checks(&context(pull_request(5, "sha-a")))
        .await
        .unwrap();
    h.engine
        .refresh_checks(&context(pull_request(5, "sha-b")))
        .await
        .unwrap();

    let calls = h.scm.check_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1],
        Call::UpdateCheck {
            remote_id: "check-1".into(),
            sha: "sha-b".into(),
            status: ResultStatus::Pending,
        }
    );
}

#[tokio::test]
async fn check_prefix_is_configurable() {
    let h = harness_with(EngineConfig {
        check_prefix: "policy".into(),
        ..EngineConfig::default()
    });
    h.load(RULES).await;
    h.engine
        .refresh_checks(&context(pull_request(5, "sha-a")))
        .await
        .unwrap();
    assert!(matches!(
        &h.scm.check_calls()[0],
        Call::AddCheck { key, .. } if key == "policy/ready"
    ));
}
