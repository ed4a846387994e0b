//! Multi-level template chains: transitive propagation, fixpoint, bounds

use std::sync::Arc;

use templink_core::config::Config;
use templink_core::domain::context::CallerContext;
use templink_core::domain::errors::EngineError;
use templink_core::ports::EntityRepository;
use templink_sync::{ChangeDriver, EntityUpdate};

use crate::common::{draft, driver, entity_on, MemoryRepository};

#[tokio::test]
async fn test_chain_propagates_through_intermediate_template() {
    let repo = MemoryRepository::new();
    let top = repo.add_template("T0");
    let mid = repo.add_template("T1");
    let host = repo.add_host("web-01");
    repo.link(top, mid);
    repo.link(mid, host);

    let top_item = repo.add_item(top, "system.cpu.load");
    repo.add_item(mid, "system.cpu.load");
    repo.add_item(host, "system.cpu.load");

    let driver = driver(&repo);
    let ids = driver
        .create(
            vec![draft(top, "CPU Load", &[top_item])],
            &CallerContext::new("ops"),
        )
        .await
        .unwrap();

    // The intermediate template materializes its own copy, and the host
    // copy points at it, not at the top-level definition
    let mid_copy = &repo.entities_of(&mid)[0];
    assert_eq!(mid_copy.source_id(), Some(&ids[0]));

    let host_copy = &repo.entities_of(&host)[0];
    assert_eq!(host_copy.source_id(), Some(mid_copy.id()));
    assert_eq!(repo.entity_count(), 3);
}

#[tokio::test]
async fn test_chain_resync_is_noop() {
    let repo = MemoryRepository::new();
    let top = repo.add_template("T0");
    let mid = repo.add_template("T1");
    let host = repo.add_host("web-01");
    repo.link(top, mid);
    repo.link(mid, host);

    let top_item = repo.add_item(top, "system.cpu.load");
    repo.add_item(mid, "system.cpu.load");
    repo.add_item(host, "system.cpu.load");

    let driver = driver(&repo);
    let ctx = CallerContext::new("ops");
    driver
        .create(vec![draft(top, "CPU Load", &[top_item])], &ctx)
        .await
        .unwrap();

    let summary = driver.sync_to_hosts(&[top], None, &ctx).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.levels, 2);
}

#[tokio::test]
async fn test_update_rewrites_the_whole_chain() {
    let repo = MemoryRepository::new();
    let top = repo.add_template("T0");
    let mid = repo.add_template("T1");
    let host = repo.add_host("web-01");
    repo.link(top, mid);
    repo.link(mid, host);

    let top_item = repo.add_item(top, "system.cpu.load");
    repo.add_item(mid, "system.cpu.load");
    repo.add_item(host, "system.cpu.load");

    let driver = driver(&repo);
    let ctx = CallerContext::new("ops");
    let ids = driver
        .create(vec![draft(top, "CPU Load", &[top_item])], &ctx)
        .await
        .unwrap();

    let mid_copy_id = *repo.entities_of(&mid)[0].id();
    let host_copy_id = *repo.entities_of(&host)[0].id();

    driver
        .update(
            vec![EntityUpdate {
                id: ids[0],
                name: Some("CPU Utilization".to_string()),
                components: None,
                axes: None,
            }],
            &ctx,
        )
        .await
        .unwrap();

    let mid_copy = repo.entity(&mid_copy_id).unwrap();
    let host_copy = repo.entity(&host_copy_id).unwrap();
    assert_eq!(mid_copy.name().as_str(), "CPU Utilization");
    assert_eq!(host_copy.name().as_str(), "CPU Utilization");
    // Copies keep their stable ids across updates
    assert_eq!(repo.entity_count(), 3);
}

#[tokio::test]
async fn test_depth_bound_aborts_runaway_chain() {
    let repo = MemoryRepository::new();
    let t0 = repo.add_template("T0");
    let t1 = repo.add_template("T1");
    let t2 = repo.add_template("T2");
    let host = repo.add_host("web-01");
    repo.link(t0, t1);
    repo.link(t1, t2);
    repo.link(t2, host);

    let top_item = repo.add_item(t0, "system.cpu.load");
    for owner in [t1, t2, host] {
        repo.add_item(owner, "system.cpu.load");
    }

    let mut config = Config::default();
    config.engine.max_chain_depth = 2;
    let driver = ChangeDriver::new(
        Arc::clone(&repo) as Arc<dyn EntityRepository>,
        &config,
    );

    let before = repo.fingerprint();
    let result = driver
        .create(
            vec![draft(t0, "CPU Load", &[top_item])],
            &CallerContext::new("ops"),
        )
        .await;

    assert!(matches!(result, Err(EngineError::Integrity(_))));
    // Everything including the already-applied upper levels is rolled back
    assert_eq!(repo.fingerprint(), before);
}

#[tokio::test]
async fn test_linkage_cycle_aborts_and_rolls_back() {
    let repo = MemoryRepository::new();
    let t0 = repo.add_template("T0");
    let t1 = repo.add_template("T1");
    repo.link(t0, t1);
    repo.link(t1, t0);

    let top_item = repo.add_item(t0, "system.cpu.load");
    repo.add_item(t1, "system.cpu.load");
    repo.add_entity(entity_on(t0, "CPU Load", &[top_item]));

    let driver = driver(&repo);
    let before = repo.fingerprint();
    let result = driver
        .sync_to_hosts(&[t0], None, &CallerContext::new("ops"))
        .await;

    assert!(matches!(result, Err(EngineError::Integrity(_))));
    assert_eq!(repo.fingerprint(), before);
}
