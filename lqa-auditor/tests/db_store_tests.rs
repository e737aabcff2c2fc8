//! Audit Store Tests
//! Test File: db_store_tests.rs
//!
//! Round-trips audit jobs through the SQLite-backed `SqliteAuditStore`.

use chrono::Utc;
use lqa_auditor::db::{init_database_pool, init_tables, SqliteAuditStore};
use lqa_auditor::models::{
    apply_transition, AnalysisMethod, AuditJob, AuditKind, AuditMode, AuditScore, AuditStatus,
    DimensionScore, Dimension, ModelUsage, Transition, PROGRESS_TOTAL_STEPS,
};
use lqa_auditor::types::PersistenceStore;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use uuid::Uuid;

mod helpers;
use helpers::pending_job;

async fn memory_store() -> SqliteAuditStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    SqliteAuditStore::new(pool)
}

fn completed(job: &AuditJob) -> AuditJob {
    let job = apply_transition(job, Transition::Begin { total: PROGRESS_TOTAL_STEPS }).unwrap();
    let job = apply_transition(&job, Transition::AnalysisStarted).unwrap();
    apply_transition(
        &job,
        Transition::Completed {
            score: AuditScore {
                overall_score: 81,
                dimensions: vec![DimensionScore {
                    dimension: Dimension::Fluency,
                    score: 81,
                    findings: vec![serde_json::json!({"issue": "Stiff phrasing", "severity": "low"})],
                    good_examples: Vec::new(),
                    recommendations: vec![serde_json::json!("Read it aloud")],
                }],
            },
            usage: ModelUsage {
                input_tokens: 1200,
                output_tokens: 640,
                cost_usd: 0.5,
                duration_ms: 3100,
            },
            method: AnalysisMethod::Text,
            at: Utc::now(),
        },
    )
    .unwrap()
}

fn blocked(job: &AuditJob, screenshot: Option<Vec<u8>>) -> AuditJob {
    let job = apply_transition(job, Transition::Begin { total: PROGRESS_TOTAL_STEPS }).unwrap();
    let job = apply_transition(&job, Transition::AcquisitionStarted).unwrap();
    apply_transition(
        &job,
        Transition::Blocked {
            reason: "Cloudflare challenge".to_string(),
            screenshot,
        },
    )
    .unwrap()
}

/// TC-DB-001: Pending job round-trips
#[tokio::test]
async fn tc_db_001_pending_roundtrip() {
    // Given
    let store = memory_store().await;
    let job = pending_job(AuditKind::Comparison, AuditMode::Combined);

    // When
    store.save(&job).await.unwrap();
    let loaded = store.load(job.id).await.unwrap().unwrap();

    // Then: Everything survives, timestamps at RFC 3339 precision
    assert_eq!(loaded.id, job.id);
    assert_eq!(loaded.kind, AuditKind::Comparison);
    assert_eq!(loaded.mode, AuditMode::Combined);
    assert_eq!(loaded.status, AuditStatus::Pending);
    assert_eq!(loaded.target, job.target);
    assert_eq!(loaded.progress, job.progress);
    assert_eq!(loaded.created_at, job.created_at);
    assert!(loaded.result.is_none());
    assert!(loaded.completed_at.is_none());
}

/// TC-DB-002: Save replaces the stored snapshot
#[tokio::test]
async fn tc_db_002_save_is_upsert() {
    // Given: A stored pending job
    let store = memory_store().await;
    let job = pending_job(AuditKind::Standalone, AuditMode::Text);
    store.save(&job).await.unwrap();

    // When: Saving the completed snapshot of the same job
    let done = completed(&job);
    store.save(&done).await.unwrap();

    // Then: One row, holding the latest snapshot
    let loaded = store.load(job.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, AuditStatus::Completed);
    assert_eq!(loaded.progress.step, PROGRESS_TOTAL_STEPS);
    assert_eq!(loaded.analysis_method, Some(AnalysisMethod::Text));
    assert_eq!(loaded.result, done.result);
    assert_eq!(loaded.usage, done.usage);
    assert_eq!(loaded.completed_at, done.completed_at);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audits")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

/// TC-DB-003: Blocked screenshot is stored with the job
#[tokio::test]
async fn tc_db_003_blocked_screenshot_persisted() {
    let store = memory_store().await;
    let job = blocked(
        &pending_job(AuditKind::Standalone, AuditMode::Auto),
        Some(vec![0x89, b'P', b'N', b'G', 0, 255]),
    );

    store.save(&job).await.unwrap();
    let loaded = store.load(job.id).await.unwrap().unwrap();

    assert_eq!(loaded.status, AuditStatus::Blocked);
    assert_eq!(loaded.blocked_reason.as_deref(), Some("Cloudflare challenge"));
    assert_eq!(loaded.blocked_screenshot, Some(vec![0x89, b'P', b'N', b'G', 0, 255]));
    assert_eq!(loaded.progress.message, "Blocked: Cloudflare challenge");
}

/// TC-DB-004: Missing job loads as None
#[tokio::test]
async fn tc_db_004_missing_job() {
    let store = memory_store().await;
    assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
}

/// TC-DB-005: Listing by status
#[tokio::test]
async fn tc_db_005_list_by_status() {
    // Given: Two blocked jobs and one pending job
    let store = memory_store().await;
    let first = blocked(&pending_job(AuditKind::Standalone, AuditMode::Auto), None);
    let second = blocked(&pending_job(AuditKind::Proficiency, AuditMode::Text), None);
    let pending = pending_job(AuditKind::ImageSet, AuditMode::Screenshot);
    for job in [&second, &pending, &first] {
        store.save(job).await.unwrap();
    }

    // When
    let listed = store.list_by_status(AuditStatus::Blocked).await.unwrap();

    // Then: Only blocked jobs, oldest first
    let ids: Vec<Uuid> = listed.iter().map(|j| j.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id) && ids.contains(&second.id));
    assert!(listed[0].created_at <= listed[1].created_at);
    assert!(listed.iter().all(|j| j.status == AuditStatus::Blocked));
}

/// TC-DB-006: Delete removes the job
#[tokio::test]
async fn tc_db_006_delete() {
    let store = memory_store().await;
    let job = pending_job(AuditKind::Standalone, AuditMode::Auto);
    store.save(&job).await.unwrap();

    store.delete(job.id).await.unwrap();

    assert!(store.load(job.id).await.unwrap().is_none());
}

/// TC-DB-007: File-backed database is created on demand
#[tokio::test]
async fn tc_db_007_file_database() {
    // Given: A database path in a directory that does not exist yet
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("lqa.db");

    // When
    let pool = init_database_pool(&db_path).await.unwrap();
    let store = SqliteAuditStore::new(pool).with_max_lock_wait_ms(500);
    let job = completed(&pending_job(AuditKind::Comparison, AuditMode::Text));
    store.save(&job).await.unwrap();

    // Then: File exists and a fresh pool sees the job
    assert!(db_path.exists());
    let reopened = SqliteAuditStore::new(init_database_pool(&db_path).await.unwrap());
    let loaded = reopened.load(job.id).await.unwrap().unwrap();
    assert_eq!(loaded.result.unwrap().overall_score, 81);
    assert!((loaded.usage.unwrap().cost_usd - 0.5).abs() < 1e-9);
}
