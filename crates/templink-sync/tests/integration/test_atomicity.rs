//! Transactional behavior: a failed run is never partially applied

use templink_core::domain::context::CallerContext;

use crate::common::{draft, driver, entity_on, MemoryRepository};

#[tokio::test]
async fn test_failed_create_leaves_store_untouched() {
    // Conflict surfaces at the second linkage level, after the first
    // level was already applied inside the transaction
    let repo = MemoryRepository::new();
    let top = repo.add_template("T0");
    let mid = repo.add_template("T1");
    let host = repo.add_host("web-01");
    repo.link(top, mid);
    repo.link(mid, host);

    let top_item = repo.add_item(top, "net.if.in");
    repo.add_item(mid, "net.if.in");
    let host_item = repo.add_item(host, "net.if.in");

    // The host already has a local entity with the contested name
    repo.add_entity(entity_on(host, "Network", &[host_item]));

    let driver = driver(&repo);
    let before = repo.fingerprint();
    let result = driver
        .create(
            vec![draft(top, "Network", &[top_item])],
            &CallerContext::new("ops"),
        )
        .await;

    assert!(result.is_err());
    // Neither the definition nor the mid-level copy survived
    assert_eq!(repo.fingerprint(), before);
    assert!(repo.entities_of(&top).is_empty());
    assert!(repo.entities_of(&mid).is_empty());
}

#[tokio::test]
async fn test_no_sibling_host_is_written_on_conflict() {
    // One conflicting host poisons the whole batch, including hosts that
    // would have applied cleanly
    let repo = MemoryRepository::new();
    let template = repo.add_template("Linux");
    let clean = repo.add_host("web-01");
    let dirty = repo.add_host("web-02");
    repo.link(template, clean);
    repo.link(template, dirty);

    let tmpl_item = repo.add_item(template, "net.if.in");
    repo.add_item(clean, "net.if.in");
    let dirty_item = repo.add_item(dirty, "net.if.in");
    repo.add_entity(entity_on(dirty, "Network", &[dirty_item]));

    let driver = driver(&repo);
    let result = driver
        .create(
            vec![draft(template, "Network", &[tmpl_item])],
            &CallerContext::new("ops"),
        )
        .await;

    assert!(result.is_err());
    assert!(repo.entities_of(&clean).is_empty());
    assert!(repo.entities_of(&template).is_empty());
}

#[tokio::test]
async fn test_transactions_are_balanced_across_calls() {
    // After both failed and successful runs the repository accepts the
    // next transaction, i.e. begin/commit/rollback pair up correctly
    let repo = MemoryRepository::new();
    let template = repo.add_template("Linux");
    let host = repo.add_host("web-01");
    repo.link(template, host);
    let tmpl_item = repo.add_item(template, "system.cpu.load");
    let host_item = repo.add_item(host, "system.cpu.load");
    repo.add_entity(entity_on(host, "Taken", &[host_item]));

    let driver = driver(&repo);
    let ctx = CallerContext::new("ops");

    let failed = driver
        .create(vec![draft(template, "Taken", &[tmpl_item])], &ctx)
        .await;
    assert!(failed.is_err());

    driver
        .create(vec![draft(template, "CPU Load", &[tmpl_item])], &ctx)
        .await
        .unwrap();
    driver.sync_to_hosts(&[template], None, &ctx).await.unwrap();

    assert_eq!(repo.entities_of(&host).len(), 2);
}
