mod common;

use common::{config, memory_pool, units, v, Events, Harness, CHAIN};
use stand_schema::prelude::*;

const VERSIONS: &[&str] = &["0.0.0", "1.0.0", "1.0.1", "1.1.0", "1.2.0", "2.0.0"];

#[tokio::test]
async fn ranges_compose() {
    let units = units();
    for (i, a) in VERSIONS.iter().enumerate() {
        for (j, b) in VERSIONS.iter().enumerate().skip(i) {
            for c in VERSIONS.iter().skip(j) {
                let whole = Harness::new(memory_pool().await).await;
                whole.run(&units, "0.0.0", a).await.unwrap();
                whole.run(&units, a, c).await.unwrap();

                let split = Harness::new(memory_pool().await).await;
                split.run(&units, "0.0.0", a).await.unwrap();
                split.run(&units, a, b).await.unwrap();
                split.run(&units, b, c).await.unwrap();

                if *c != "0.0.0" {
                    assert_eq!(
                        whole.snapshot("events").await,
                        split.snapshot("events").await,
                        "({a}, {c}] differs from ({a}, {b}] + ({b}, {c}]"
                    );
                }
                assert_eq!(
                    whole.audit.completed_versions().await.unwrap(),
                    split.audit.completed_versions().await.unwrap()
                );
            }
        }
    }
}

#[tokio::test]
async fn rerunning_the_chain_changes_nothing() {
    let units = units();
    let harness = Harness::new(memory_pool().await).await;

    harness.run(&units, "0.0.0", "2.0.0").await.unwrap();
    let once = harness.snapshot("events").await;

    let again = harness.run(&units, "0.0.0", "2.0.0").await.unwrap();
    assert!(again.applied.iter().all(|u| u.applied_ops == 0));
    assert_eq!(harness.snapshot("events").await, once);
}

#[tokio::test]
async fn units_run_in_version_order() {
    let units = units();
    let versions: Vec<String> = units
        .iter()
        .map(|u| u.target_version.to_string())
        .collect();
    assert_eq!(versions, vec!["1.0.0", "1.0.1", "1.1.0", "1.2.0", "2.0.0"]);

    let harness = Harness::new(memory_pool().await).await;
    let report = harness.run(&units, "0.0.0", "2.0.0").await.unwrap();
    assert_eq!(
        report.versions(),
        vec![v("1.0.0"), v("1.0.1"), v("1.1.0"), v("1.2.0"), v("2.0.0")]
    );
}

#[tokio::test]
async fn upgrade_stops_at_the_requested_release() {
    let units = units();
    let harness = Harness::new(memory_pool().await).await;
    harness.run(&units, "0.0.0", "1.0.0").await.unwrap();

    let first = harness.run(&units, "1.0.0", "1.1.0").await.unwrap();
    assert_eq!(first.versions(), vec![v("1.0.1"), v("1.1.0")]);
    let snapshot = harness.snapshot("events").await;
    assert!(snapshot.column_names().contains(&"starts_at"));
    assert!(snapshot.column_names().contains(&"post_id"));

    let second = harness.run(&units, "1.1.0", "2.0.0").await.unwrap();
    assert_eq!(second.versions(), vec![v("1.2.0"), v("2.0.0")]);
    assert!(!harness
        .snapshot("events")
        .await
        .column_names()
        .contains(&"post_id"));
}

#[tokio::test]
async fn adding_an_existing_column_is_not_an_error() {
    let harness = Harness::new(memory_pool().await).await;
    harness.run(&units(), "0.0.0", "1.0.1").await.unwrap();

    let outcome = harness
        .alterer
        .apply(&SchemaOperation::add_column(
            "ts_events",
            ColumnSchema::new("summary", SqlType::Text),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, OperationOutcome::NotApplied);
}

#[tokio::test]
async fn failed_unit_is_not_completed_and_resumes() {
    let harness = Harness::new(memory_pool().await).await;
    harness.run(&units(), "0.0.0", "1.0.0").await.unwrap();

    let broken = vec![MigrationUnit::new(v("1.0.1"), "venue")
        .operation(SchemaOperation::add_column(
            "ts_events",
            ColumnSchema::new("venue", SqlType::Text),
        ))
        .operation(SchemaOperation::add_index(
            "ts_events",
            IndexSchema::new("venue_city", &["venue", "city"]),
        ))];

    let err = harness.run(&broken, "1.0.0", "1.0.1").await.unwrap_err();
    assert!(matches!(err, SchemaError::StructuralOperationFailed { .. }));
    let entries = harness.audit.entries_for(&v("1.0.1")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AuditStatus::Failed);

    let fixed = vec![MigrationUnit::new(v("1.0.1"), "venue")
        .operation(SchemaOperation::add_column(
            "ts_events",
            ColumnSchema::new("venue", SqlType::Text),
        ))
        .operation(SchemaOperation::add_column(
            "ts_events",
            ColumnSchema::new("city", SqlType::Text),
        ))
        .operation(SchemaOperation::add_index(
            "ts_events",
            IndexSchema::new("venue_city", &["venue", "city"]),
        ))];

    let report = harness.run(&fixed, "1.0.0", "1.0.1").await.unwrap();
    assert_eq!(report.applied[0].skipped_ops, 1);
    assert_eq!(report.applied[0].applied_ops, 2);
    assert_eq!(
        harness.audit.completed_versions().await.unwrap(),
        vec![v("1.0.0"), v("1.0.1")]
    );
}

#[tokio::test]
async fn failed_upgrade_keeps_stored_version() {
    let pool = memory_pool().await;
    let mut manager = SchemaManager::new(pool.clone(), config("2.0.0"))
        .unwrap()
        .with_migrations(CHAIN);
    manager.register_table(Events).unwrap();

    // Recorded as 1.0.0 but the table was never created
    manager.options().ensure_table().await.unwrap();
    manager
        .options()
        .set("ticket_stand_db_version", "1.0.0")
        .await
        .unwrap();

    let err = manager.check_and_upgrade().await.unwrap_err();
    assert!(err.is_schema_incomplete());
    assert!(!manager.is_ready());
    assert_eq!(
        manager.installed_version().await.unwrap(),
        Some(v("1.0.0"))
    );
    let audit = manager.audit_log();
    assert!(audit.completed_versions().await.unwrap().is_empty());
    assert_eq!(
        audit.entries_for(&v("1.0.1")).await.unwrap()[0].status,
        AuditStatus::Failed
    );
}

#[tokio::test]
async fn install_matches_the_full_chain() {
    let installed = memory_pool().await;
    let mut manager = SchemaManager::new(installed.clone(), config("2.0.0"))
        .unwrap()
        .with_migrations(CHAIN);
    manager.register_table(Events).unwrap();
    let report = manager.install().await.unwrap();
    assert_eq!(report.created, vec!["ts_events"]);
    assert!(manager.audit_log().entries().await.unwrap().is_empty());

    let migrated = memory_pool().await;
    let mut manager = SchemaManager::new(migrated.clone(), config("2.0.0"))
        .unwrap()
        .with_migrations(CHAIN);
    manager.register_table(Events).unwrap();
    manager.options().ensure_table().await.unwrap();
    manager
        .options()
        .set("ticket_stand_db_version", "0.0.0")
        .await
        .unwrap();
    let outcome = manager.check_and_upgrade().await.unwrap();
    assert!(matches!(outcome, UpgradeOutcome::Upgraded { .. }));

    let a = Introspector::new(&installed).snapshot("ts_events").await.unwrap();
    let b = Introspector::new(&migrated).snapshot("ts_events").await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn install_over_an_older_store_migrates_first() {
    let pool = memory_pool().await;
    let harness = Harness::new(pool.clone()).await;
    harness.run(&units(), "0.0.0", "1.0.1").await.unwrap();

    let mut manager = SchemaManager::new(pool.clone(), config("2.0.0"))
        .unwrap()
        .with_migrations(CHAIN);
    manager.register_table(Events).unwrap();
    manager
        .options()
        .set("ticket_stand_db_version", "1.0.1")
        .await
        .unwrap();

    let report = manager.install().await.unwrap();
    assert_eq!(report.migrated.versions(), vec![v("1.1.0"), v("1.2.0"), v("2.0.0")]);
    assert!(report.created.is_empty());
    assert_eq!(report.version, v("2.0.0"));

    let snapshot = harness.snapshot("events").await;
    assert!(!snapshot.column_names().contains(&"post_id"));
}

#[tokio::test]
async fn duplicate_versions_abort_the_upgrade() {
    fn nothing(_: &TableNames) -> Vec<SchemaOperation> {
        Vec::new()
    }
    static DUPLICATED: &[MigrationEntry] = &[
        MigrationEntry::new("1.1.0", "one", nothing),
        MigrationEntry::new("1.1.0", "two", nothing),
    ];

    let pool = memory_pool().await;
    let manager = SchemaManager::new(pool, config("1.1.0"))
        .unwrap()
        .with_migrations(DUPLICATED);
    manager.options().ensure_table().await.unwrap();
    manager
        .options()
        .set("ticket_stand_db_version", "1.0.0")
        .await
        .unwrap();

    let err = manager.check_and_upgrade().await.unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateMigrationVersion { .. }));
    assert_eq!(
        manager.installed_version().await.unwrap(),
        Some(v("1.0.0"))
    );
}

#[tokio::test]
async fn unreadable_audit_log_does_not_block_upgrade() {
    let pool = memory_pool().await;
    let harness = Harness::new(pool.clone()).await;
    harness.run(&units(), "0.0.0", "1.0.0").await.unwrap();

    let mut manager = SchemaManager::new(pool, config("1.0.1"))
        .unwrap()
        .with_migrations(CHAIN);
    manager.register_table(Events).unwrap();
    manager
        .options()
        .set("ticket_stand_db_version", "1.0.0")
        .await
        .unwrap();
    // Left behind by an older release in a different format
    let legacy = r#"a:1:{i:0;a:2:{s:7:"version";s:5:"1.0.0";s:6:"status";s:9:"completed";}}"#;
    manager
        .options()
        .set("ticket_stand_migration_logs", legacy)
        .await
        .unwrap();

    let outcome = manager.check_and_upgrade().await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            from: v("1.0.0"),
            to: v("1.0.1"),
            applied: vec![v("1.0.1")],
        }
    );
    assert!(manager.is_ready());
    assert_eq!(manager.installed_version().await.unwrap(), Some(v("1.0.1")));

    let audit = manager.audit_log();
    assert_eq!(audit.completed_versions().await.unwrap(), vec![v("1.0.1")]);
    assert_eq!(
        manager
            .options()
            .get(&audit.unreadable_key())
            .await
            .unwrap()
            .as_deref(),
        Some(legacy)
    );
}
