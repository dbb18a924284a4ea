mod common;

use common::{file_pool, migrate_fresh, stand, v};
use stand_schema::{SchemaConfig, UpgradeOutcome};
use ticket_stand_db::{activate, bootstrap, TicketError};

const RELEASE: &str = env!("CARGO_PKG_VERSION");

#[tokio::test]
async fn concurrent_starts_upgrade_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickets.db");
    migrate_fresh(&file_pool(&path).await, "1.0.1").await;

    let first = stand(&file_pool(&path).await, RELEASE);
    let second = stand(&file_pool(&path).await, RELEASE);
    let (a, b) = tokio::join!(first.bootstrap(), second.bootstrap());
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, UpgradeOutcome::Upgraded { .. }))
            .count(),
        1
    );
    let completed = first
        .manager()
        .audit_log()
        .completed_versions()
        .await
        .unwrap();
    assert_eq!(
        completed,
        vec![v("1.0.0"), v("1.0.1"), v("1.1.0"), v("1.2.0")]
    );
    assert!(first.manager().lock().holder().await.unwrap().is_none());
}

#[tokio::test]
async fn config_from_json_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickets.db");
    let config: SchemaConfig = serde_json::from_value(serde_json::json!({
        "app_version": RELEASE,
        "table_prefix": "wp_ts_",
        "lock_wait_secs": 5
    }))
    .unwrap();
    assert_eq!(config.version_option, "ticket_stand_db_version");

    let pool = file_pool(&path).await;
    let err = bootstrap(pool.clone(), config.clone()).await.unwrap_err();
    assert!(matches!(err, TicketError::NotInstalled { .. }));

    let (stand, report) = activate(pool.clone(), config.clone()).await.unwrap();
    assert_eq!(
        report.created,
        vec![
            "wp_ts_events",
            "wp_ts_ticket_types",
            "wp_ts_event_extras",
            "wp_ts_ticket_type_extras"
        ]
    );
    assert_eq!(report.version, v(RELEASE));
    assert!(stand.is_activated().await.unwrap());

    // Activating again creates nothing and keeps the version
    let (_, again) = activate(pool.clone(), config.clone()).await.unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.version, v(RELEASE));

    let restarted = bootstrap(pool, config).await.unwrap();
    assert!(restarted.manager().is_ready());
}
