//! Concurrency tests for quota admission
//!
//! Verifies that the guarded check-and-increment never over-admits under
//! concurrent bursts against a single token, and that admissions and stored
//! entries stay in lockstep.

use chrono::Utc;
use futures_util::future::join_all;
use hookscope::config::QuotaConfig;
use hookscope::error::AppError;
use hookscope::models::NewWebhookLog;
use hookscope::services::{IngestService, TokenRegistry, WebhookStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::time::Duration;

/// File-backed test database (WAL, FK on) with migrations applied
struct TestDb {
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    pool: SqlitePool,
}

impl TestDb {
    async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("hookscope_test.db"))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("Failed to open test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        TestDb { dir, pool }
    }
}

fn quota_config(basic: i64, max_entries: i64) -> QuotaConfig {
    QuotaConfig {
        tier_ceiling_basic: basic,
        tier_ceiling_privileged: 500,
        default_ttl_seconds: 86400,
        max_entries_per_token: max_entries,
        max_body_bytes: 262_144,
    }
}

fn entry(tag: usize) -> NewWebhookLog {
    NewWebhookLog {
        method: "POST".to_string(),
        headers: serde_json::json!({ "content-type": ["text/plain"] }),
        body: format!("sender {}", tag).into_bytes(),
        body_truncated: false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_burst_never_exceeds_ceiling() {
    let db = TestDb::new().await;
    let quota = quota_config(10, 100);
    let token = TokenRegistry::create(&db.pool, None, &quota)
        .await
        .expect("Failed to create token");

    // 25 senders hammer the same token; only 10 fit the quota
    let tasks: Vec<_> = (0..25)
        .map(|i| {
            let pool = db.pool.clone();
            let quota = quota.clone();
            let token_id = token.id.clone();
            tokio::spawn(async move {
                IngestService::capture(&pool, &quota, &token_id, entry(i)).await
            })
        })
        .collect();

    let results = join_all(tasks).await;

    let mut admitted = 0;
    let mut quota_exceeded = 0;
    for result in results {
        match result.expect("capture task panicked") {
            Ok(_) => admitted += 1,
            Err(AppError::QuotaExceeded { .. }) => quota_exceeded += 1,
            Err(e) => panic!("unexpected capture error: {:?}", e),
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(quota_exceeded, 15);

    // No lost updates, no over-admission, counter invariant intact
    let refreshed = TokenRegistry::get(&db.pool, &token.id).await.unwrap();
    assert_eq!(refreshed.requests_used, 10);
    assert_eq!(
        refreshed.requests_used + refreshed.requests_remaining(),
        refreshed.quota_limit
    );

    // Exactly one stored entry per admission
    let count = WebhookStore::count_for_token(&db.pool, &token.id)
        .await
        .unwrap();
    assert_eq!(count, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepted_captures_all_increment() {
    let db = TestDb::new().await;
    let quota = quota_config(100, 100);
    let token = TokenRegistry::create(&db.pool, None, &quota)
        .await
        .expect("Failed to create token");

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let pool = db.pool.clone();
            let quota = quota.clone();
            let token_id = token.id.clone();
            tokio::spawn(async move {
                IngestService::capture(&pool, &quota, &token_id, entry(i)).await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result
            .expect("capture task panicked")
            .expect("capture should be admitted");
    }

    // Exactly N increments for N accepted captures
    let refreshed = TokenRegistry::get(&db.pool, &token.id).await.unwrap();
    assert_eq!(refreshed.requests_used, 20);

    let logs = WebhookStore::list(&db.pool, &token.id).await.unwrap();
    assert_eq!(logs.len(), 20);

    // seq is strictly monotonic: the log reflects one admission order
    for pair in logs.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_captures_respect_retention_cap() {
    let db = TestDb::new().await;
    let quota = quota_config(100, 8);
    let token = TokenRegistry::create(&db.pool, None, &quota)
        .await
        .expect("Failed to create token");

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let pool = db.pool.clone();
            let quota = quota.clone();
            let token_id = token.id.clone();
            tokio::spawn(async move {
                IngestService::capture(&pool, &quota, &token_id, entry(i)).await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result
            .expect("capture task panicked")
            .expect("capture should be admitted");
    }

    // The cap held even while concurrent appenders raced
    let count = WebhookStore::count_for_token(&db.pool, &token.id)
        .await
        .unwrap();
    assert_eq!(count, 8);

    // Survivors are the newest 8 admissions
    let logs = WebhookStore::list(&db.pool, &token.id).await.unwrap();
    let min_seq = logs.first().unwrap().seq;
    assert!(logs.iter().all(|l| l.seq >= min_seq));
    assert_eq!(logs.last().unwrap().seq - min_seq, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_all_for_token_purges_the_log() {
    let db = TestDb::new().await;
    let quota = quota_config(50, 100);
    let token = TokenRegistry::create(&db.pool, None, &quota).await.unwrap();

    for i in 0..4 {
        IngestService::capture(&db.pool, &quota, &token.id, entry(i))
            .await
            .unwrap();
    }

    let removed = WebhookStore::delete_all_for_token(&db.pool, &token.id)
        .await
        .unwrap();
    assert_eq!(removed, 4);
    assert_eq!(
        WebhookStore::count_for_token(&db.pool, &token.id)
            .await
            .unwrap(),
        0
    );

    // The token itself is untouched; only its log is gone
    let refreshed = TokenRegistry::get(&db.pool, &token.id).await.unwrap();
    assert_eq!(refreshed.requests_used, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_removes_expired_tokens_and_cascades_logs() {
    let db = TestDb::new().await;
    let quota = quota_config(50, 100);

    let doomed = TokenRegistry::create(&db.pool, None, &quota).await.unwrap();
    let survivor = TokenRegistry::create(&db.pool, None, &quota).await.unwrap();

    IngestService::capture(&db.pool, &quota, &doomed.id, entry(0))
        .await
        .unwrap();
    IngestService::capture(&db.pool, &quota, &survivor.id, entry(1))
        .await
        .unwrap();

    sqlx::query("UPDATE tokens SET expires_at = ? WHERE id = ?")
        .bind(Utc::now().timestamp() - 10)
        .bind(&doomed.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let removed = TokenRegistry::delete_expired(&db.pool, Utc::now())
        .await
        .unwrap();
    assert_eq!(removed, 1);

    // The expired token and its log are gone; the live one is untouched
    assert!(matches!(
        TokenRegistry::get(&db.pool, &doomed.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(
        WebhookStore::count_for_token(&db.pool, &doomed.id)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        WebhookStore::count_for_token(&db.pool, &survivor.id)
            .await
            .unwrap(),
        1
    );
}
