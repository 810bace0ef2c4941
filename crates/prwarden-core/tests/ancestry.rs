//! `behind` as seen by the engine.

mod support;

use prwarden_core::{ancestry, EngineConfig};
use prwarden_state::{BranchStore, CommitGraphStore};
use support::*;

#[tokio::test]
async fn pull_request_on_base_head_is_not_behind() {
    let h = harness();
    let store = h.store.as_ref();
    ancestry::ingest_commits(store, &repo(), None, vec![commit("b", &["a"])])
        .await
        .unwrap();
    h.store.update_branch_head(&repo(), "main", "b").await.unwrap();

    let mut pr = pull_request(2, "c");
    pr.commits = vec![commit("c", &["b"])];
    ancestry::ingest_commits(store, &repo(), Some(2), pr.commits.clone())
        .await
        .unwrap();

    let ctx = h.engine.load_ancestry(&context(pr.clone())).await;
    assert!(!ctx.ancestry.unwrap().behind);

    // Base moves on
    ancestry::ingest_commits(store, &repo(), None, vec![commit("d", &["b"])])
        .await
        .unwrap();
    h.store.update_branch_head(&repo(), "main", "d").await.unwrap();
    let ctx = h.engine.load_ancestry(&context(pr)).await;
    assert!(ctx.ancestry.unwrap().behind);
}

#[tokio::test]
async fn depth_limits_how_far_back_the_base_is_found() {
    for (depth, behind) in [(1, true), (3, false)] {
        let h = harness_with(EngineConfig::default().with_ancestry_depth(depth));
        let store = h.store.as_ref();
        h.store.update_branch_head(&repo(), "main", "base").await.unwrap();
        ancestry::ingest_commits(
            store,
            &repo(),
            None,
            vec![commit("f2", &["f1"]), commit("f1", &["base"])],
        )
        .await
        .unwrap();

        let mut pr = pull_request(9, "f3");
        pr.commits = vec![commit("f3", &["f2"])];
        ancestry::ingest_commits(store, &repo(), Some(9), pr.commits.clone())
            .await
            .unwrap();

        let ctx = h.engine.load_ancestry(&context(pr)).await;
        assert_eq!(ctx.ancestry.unwrap().behind, behind, "depth {depth}");
    }
}

#[tokio::test]
async fn parents_referenced_before_ingest_are_placeholders() {
    let h = harness();
    ancestry::ingest_commits(h.store.as_ref(), &repo(), None, vec![commit("c", &["p"])])
        .await
        .unwrap();
    let parent = h.store.get_commit(&repo(), "p").await.unwrap().unwrap();
    assert!(parent.is_placeholder());

    ancestry::ingest_commits(h.store.as_ref(), &repo(), None, vec![commit("p", &[])])
        .await
        .unwrap();
    let parent = h.store.get_commit(&repo(), "p").await.unwrap().unwrap();
    assert!(!parent.is_placeholder());
    assert_eq!(h.store.edge_count(), 1);
}
