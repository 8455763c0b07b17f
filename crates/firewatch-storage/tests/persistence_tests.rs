use chrono::{DateTime, TimeZone, Utc};
use firewatch_storage::{
    ensure_schema, PersistError, PersistenceExecutor, PersistenceWorkerPool, ReadingRepository,
    UpsertOutcome, WorkerPoolConfig,
};
use firewatch_types::DeviceReading;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    ensure_schema(&db).await.expect("Failed to create schema");
    Arc::new(db)
}

/// 文件型 SQLite，连接池允许多个连接
async fn create_file_db(dir: &tempfile::TempDir) -> Arc<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("firewatch.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(10).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open file database");
    ensure_schema(&db).await.expect("Failed to create schema");
    Arc::new(db)
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

fn fire_reading(status: &str, ts: DateTime<Utc>) -> DeviceReading {
    DeviceReading::new("fire_sensor", 10.0, 20.0)
        .with_status(status)
        .with_timestamp(ts)
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let db = create_test_db().await;
    ensure_schema(&db).await.unwrap();
    ensure_schema(&db).await.unwrap();
}

#[tokio::test]
async fn test_upsert_same_key_updates_in_place() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let ts = at(10, 0);

    let first = repo
        .upsert(&fire_reading("no_fire", ts), ts)
        .await
        .unwrap();
    let second = repo
        .upsert(&fire_reading("fire_detected", ts), ts)
        .await
        .unwrap();

    assert_eq!(first, UpsertOutcome::Inserted);
    assert_eq!(second, UpsertOutcome::Updated);
    assert_eq!(repo.count(Some("fire_sensor")).await.unwrap(), 1);

    let latest = repo.latest("fire_sensor").await.unwrap().unwrap();
    assert_eq!(latest.status.as_deref(), Some("fire_detected"));
    assert_eq!(latest.timestamp, Some(ts));
}

#[tokio::test]
async fn test_identical_replay_is_noop() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let ts = at(10, 0);
    let reading = fire_reading("no_fire", ts);

    repo.upsert(&reading, ts).await.unwrap();
    repo.upsert(&reading, ts).await.unwrap();

    assert_eq!(repo.count(None).await.unwrap(), 1);
    assert_eq!(repo.latest("fire_sensor").await.unwrap(), Some(reading));
}

#[tokio::test]
async fn test_update_keeps_device_type() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let ts = at(9, 0);

    let original = DeviceReading::new("sprinkler_handler", 1.0, 2.0)
        .with_current_action("stopped")
        .with_timestamp(ts);
    repo.upsert(&original, ts).await.unwrap();

    let relabelled = original
        .clone()
        .with_device_type("something_else")
        .with_current_action("started");
    repo.upsert(&relabelled, ts).await.unwrap();

    let latest = repo.latest("sprinkler_handler").await.unwrap().unwrap();
    assert_eq!(latest.device_type, "sprinkler_handler");
    assert_eq!(latest.current_action.as_deref(), Some("started"));
}

#[tokio::test]
async fn test_latest_and_missing_device() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);

    for (i, level) in [10, 20, 30].into_iter().enumerate() {
        let ts = at(8, i as u32);
        let reading = DeviceReading::new("water_level_detector", 0.0, 0.0)
            .with_water_level(level)
            .with_timestamp(ts);
        repo.upsert(&reading, ts).await.unwrap();
    }

    let latest = repo.latest("water_level_detector").await.unwrap().unwrap();
    assert_eq!(latest.water_level, Some(30));
    assert!(repo.latest("unknown_device").await.unwrap().is_none());
}

#[tokio::test]
async fn test_range_is_inclusive_and_descending() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);

    let t0 = at(11, 0);
    let t1 = at(12, 0);
    let t2 = at(13, 0);
    let t3 = at(14, 0);
    for ts in [t0, t1, t2, t3] {
        repo.upsert(&fire_reading("no_fire", ts), ts).await.unwrap();
    }

    let readings = repo.range("fire_sensor", t1, t2).await.unwrap();
    let stamps: Vec<_> = readings.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![Some(t2), Some(t1)]);

    let empty = repo.range("fire_sensor", t3, t0).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_recent_limits_results() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);

    for minute in 0..5 {
        let ts = at(7, minute);
        repo.upsert(&fire_reading("no_fire", ts), ts).await.unwrap();
    }

    let recent = repo.recent("fire_sensor", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].timestamp, Some(at(7, 4)));
}

#[tokio::test]
async fn test_upsert_without_schema_fails() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let repo = ReadingRepository::new(Arc::new(db));
    let ts = at(10, 0);

    let result = repo.upsert(&fire_reading("no_fire", ts), ts).await;
    assert!(matches!(result, Err(PersistError::Database(_))));
}

#[tokio::test]
async fn test_executor_fills_missing_timestamp() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo.clone(), Duration::from_secs(5));

    let before = Utc::now() - chrono::Duration::seconds(1);
    let reading = DeviceReading::new("water_level_detector", 0.0, 0.0)
        .with_water_level(55)
        .without_timestamp();

    let outcome = executor.execute(reading).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let stored = repo.latest("water_level_detector").await.unwrap().unwrap();
    let ts = stored.timestamp.unwrap();
    assert!(ts >= before);
    assert!(ts <= Utc::now() + chrono::Duration::seconds(1));
}

#[tokio::test]
async fn test_executor_truncates_to_microseconds() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo.clone(), Duration::from_secs(5));

    let precise = at(10, 0) + chrono::Duration::nanoseconds(123_456_789);
    executor
        .execute(fire_reading("no_fire", precise))
        .await
        .unwrap();
    let outcome = executor
        .execute(fire_reading("fire_detected", precise))
        .await
        .unwrap();

    assert_eq!(outcome, UpsertOutcome::Updated);
    let stored = repo.latest("fire_sensor").await.unwrap().unwrap();
    assert_eq!(
        stored.timestamp,
        Some(at(10, 0) + chrono::Duration::microseconds(123_456))
    );
}

#[tokio::test]
async fn test_worker_pool_persists_concurrent_jobs() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo.clone(), Duration::from_secs(10));
    let (jobs, pool) = PersistenceWorkerPool::spawn(
        executor,
        WorkerPoolConfig {
            queue_capacity: 16,
            workers: 4,
            job_timeout: Duration::from_secs(10),
        },
    );

    let base = at(0, 0);
    let mut submitters = Vec::new();
    for i in 0..100i64 {
        let jobs = jobs.clone();
        submitters.push(tokio::spawn(async move {
            let ts = base + chrono::Duration::seconds(i);
            let reading = DeviceReading::new("water_level_detector", 0.0, 0.0)
                .with_water_level((i % 101) as i32)
                .with_timestamp(ts);
            jobs.submit(reading).await
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap().unwrap();
    }

    drop(jobs);
    pool.join().await;

    assert_eq!(repo.count(Some("water_level_detector")).await.unwrap(), 100);
}

#[tokio::test]
async fn test_submit_after_pool_stops_fails() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo, Duration::from_secs(10));
    let (jobs, pool) = PersistenceWorkerPool::spawn(executor, WorkerPoolConfig::default());

    pool.abort().await;
    let ts = at(1, 0);
    let result = jobs.submit(fire_reading("no_fire", ts)).await;
    assert!(matches!(result, Err(PersistError::QueueClosed)));
}

#[tokio::test]
async fn test_worker_pool_persists_concurrent_jobs_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_file_db(&dir).await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo.clone(), Duration::from_secs(10));
    let (jobs, pool) = PersistenceWorkerPool::spawn(executor, WorkerPoolConfig::default());

    let base = at(0, 0);
    for i in 0..100i64 {
        let ts = base + chrono::Duration::seconds(i);
        let reading = fire_reading("no_fire", ts);
        jobs.submit(reading).await.unwrap();
    }

    drop(jobs);
    pool.join().await;

    assert_eq!(repo.count(Some("fire_sensor")).await.unwrap(), 100);
}

#[tokio::test]
async fn test_concurrent_upserts_on_file_database_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let repo = ReadingRepository::new(create_file_db(&dir).await);

    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            let ts = at(3, 0) + chrono::Duration::seconds(i);
            repo.upsert(&fire_reading("no_fire", ts), ts).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), UpsertOutcome::Inserted);
    }

    assert_eq!(repo.count(None).await.unwrap(), 8);
}

#[tokio::test]
async fn test_timed_out_jobs_are_never_committed() {
    let db = create_test_db().await;
    let repo = ReadingRepository::new(db);
    let executor = PersistenceExecutor::new(repo.clone(), Duration::from_micros(200));

    let base = at(5, 0);
    let mut succeeded = 0u64;
    for i in 0..200i64 {
        let ts = base + chrono::Duration::seconds(i);
        match executor.execute(fire_reading("no_fire", ts)).await {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, PersistError::Timeout(_)), "unexpected error: {}", e),
        }
    }

    // 只有报告成功的任务落库
    assert_eq!(repo.count(Some("fire_sensor")).await.unwrap(), succeeded);

    // 超时回滚后连接仍可用
    let relaxed = PersistenceExecutor::new(repo.clone(), Duration::from_secs(5));
    let ts = at(6, 0);
    assert_eq!(
        relaxed.execute(fire_reading("fire_detected", ts)).await.unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(repo.count(Some("fire_sensor")).await.unwrap(), succeeded + 1);
}
