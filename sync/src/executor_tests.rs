//! Tests for applying classifications in both directions

use std::collections::BTreeSet;

use filetime::FileTime;

use super::*;
use crate::test_support::{capture_logs, remote_clock, MemoryAdapter, TestProject};

fn keys_of(bucket: &[Item]) -> Vec<String> {
    ClassificationResult::synckeys(bucket)
        .into_iter()
        .map(|k| k.to_string())
        .collect()
}

fn down() -> SyncOptions {
    SyncOptions::default().with_direction(Direction::Down)
}

async fn run_kind(project: &TestProject, adapter: &MemoryAdapter, cache: &mut ContentCache, options: &SyncOptions) -> KindReport {
    let registry = Registry::new();
    let executor = SyncExecutor::new(&registry, &project.ctx);
    executor.sync_kind(adapter, cache, options).await
}

#[tokio::test]
async fn test_sync_up_creates_missing_remote_item() {
    let project = TestProject::new();
    project.write("files/b.txt", b"bee").await;
    let adapter = MemoryAdapter::new();
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert_eq!(keys_of(&report.status.to_add), vec!["b.txt"]);
    assert!(report.status.to_delete.is_empty());
    assert_eq!(report.created, 1);
    assert_eq!(adapter.mutating_calls(), vec!["upload b.txt modify=false"]);
    assert_eq!(adapter.remote_paths(), vec!["b.txt"]);
}

#[tokio::test]
async fn test_dry_run_plans_without_calling_remote() {
    let project = TestProject::new();
    project.write("files/b.txt", b"bee").await;
    let adapter = MemoryAdapter::new();
    let mut cache = ContentCache::in_memory();

    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let (logs, _guard) = capture_logs();
    let report = run_kind(&project, &adapter, &mut cache, &options).await;

    assert_eq!(keys_of(&report.status.to_add), vec!["b.txt"]);
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 1);
    assert!(adapter.mutating_calls().is_empty());
    assert!(cache.is_empty());
    assert!(logs.contents().contains("DRY RUN: would create remote files b.txt"));
}

#[tokio::test]
async fn test_conflicting_local_definitions_are_not_uploaded() {
    let project = TestProject::new();
    project.write("files/one.dup", b"1").await;
    project.write("files/two.dup", b"2").await;
    let adapter = MemoryAdapter::new();
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert!(report.status.is_clean());
    assert_eq!(keys_of(&report.status.conflicting), vec!["dup"]);
    assert_eq!(report.created, 0);
    assert!(adapter.mutating_calls().is_empty());
    assert!(adapter.remote_paths().is_empty());
}

#[tokio::test]
async fn test_second_sync_up_is_a_no_op() {
    let project = TestProject::new();
    project.write("files/a.txt", b"a").await;
    project.write("files/css/site.css", b"body{}").await;
    let adapter = MemoryAdapter::new().with_remote("1", "gone.txt", b"x", remote_clock());
    let mut cache = ContentCache::in_memory();

    let first = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;
    assert_eq!((first.created, first.deleted), (2, 1));

    let before = adapter.mutating_calls().len();
    let second = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert!(second.status.is_clean());
    assert_eq!(second.status.unchanged.len(), 2);
    assert_eq!(adapter.mutating_calls().len(), before);
}

#[tokio::test]
async fn test_second_sync_down_is_a_no_op() {
    let project = TestProject::new();
    project.write("files/stale.txt", b"old").await;
    let adapter = MemoryAdapter::new()
        .with_remote("1", "a.txt", b"alpha", remote_clock())
        .with_remote("2", "nested/b.txt", b"beta", remote_clock());
    let mut cache = ContentCache::in_memory();

    let first = run_kind(&project, &adapter, &mut cache, &down()).await;
    assert_eq!((first.created, first.deleted), (2, 1));

    let pulled = project.root().join("files/nested/b.txt");
    assert_eq!(tokio::fs::read(&pulled).await.unwrap(), b"beta");
    assert!(!project.root().join("files/stale.txt").exists());

    let mtime = FileTime::from_last_modification_time(&std::fs::metadata(&pulled).unwrap());
    assert_eq!(mtime.unix_seconds(), remote_clock().timestamp());

    let second = run_kind(&project, &adapter, &mut cache, &down()).await;
    assert!(second.status.is_clean());
    assert_eq!(second.status.unchanged.len(), 2);
    assert!(adapter.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_disabled_actions_are_not_applied() {
    let project = TestProject::new();
    project.write("files/new.txt", b"new").await;
    let adapter = MemoryAdapter::new().with_remote("1", "extra.txt", b"x", remote_clock());
    let mut cache = ContentCache::in_memory();

    let options = SyncOptions {
        delete: false,
        ..SyncOptions::default()
    };
    let report = run_kind(&project, &adapter, &mut cache, &options).await;

    assert_eq!(keys_of(&report.status.to_delete), vec!["extra.txt"]);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.created, 1);
    assert_eq!(adapter.mutating_calls(), vec!["upload new.txt modify=false"]);
}

#[tokio::test]
async fn test_actions_run_delete_create_update() {
    let project = TestProject::new();
    project.write("files/changed.txt", b"edited").await;
    project.write("files/new.txt", b"new").await;
    let adapter = MemoryAdapter::new()
        .with_remote("1", "changed.txt", b"original", remote_clock())
        .with_remote("2", "old.txt", b"old", remote_clock());
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert_eq!((report.deleted, report.created, report.updated), (1, 1, 1));
    assert_eq!(
        adapter.mutating_calls(),
        vec!["remove 2", "upload new.txt modify=false", "upload changed.txt modify=true"]
    );
}

#[tokio::test]
async fn test_item_failures_do_not_stop_the_kind() {
    let project = TestProject::new();
    let adapter = MemoryAdapter::new()
        .with_remote("1", "locked.txt", b"l", remote_clock())
        .with_remote("2", "loose.txt", b"l", remote_clock())
        .failing("locked.txt");
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert_eq!(report.deleted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item, "locked.txt");
    assert_eq!(report.failures[0].action, SyncAction::Delete);
    assert_eq!(adapter.remote_paths(), vec!["locked.txt"]);
}

#[tokio::test]
async fn test_remote_conflict_is_reported_separately() {
    let project = TestProject::new();
    project.write("files/race.txt", b"mine").await;
    project.write("files/calm.txt", b"fine").await;
    let adapter = MemoryAdapter::new().failing("race.txt");
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &SyncOptions::default()).await;

    assert_eq!(report.conflicts, vec!["race.txt"]);
    assert!(report.failures.is_empty());
    assert_eq!(report.created, 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_sync_down_keeps_bundled_items() {
    let project = TestProject::new();
    let bundled = project.write("bundles/base/files/logo.svg", b"<svg/>").await;
    let adapter = MemoryAdapter::new();
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &down()).await;

    assert_eq!(keys_of(&report.status.to_delete), vec!["logo.svg"]);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 1);
    assert!(bundled.exists());
}

#[tokio::test]
async fn test_pulled_update_of_bundled_item_lands_in_project() {
    let project = TestProject::new();
    let bundled = project.write("bundles/base/files/app.js", b"bundle").await;
    let adapter = MemoryAdapter::new().with_remote("1", "app.js", b"remote", remote_clock());
    let mut cache = ContentCache::in_memory();

    let report = run_kind(&project, &adapter, &mut cache, &down()).await;

    assert_eq!(report.updated, 1);
    assert_eq!(tokio::fs::read(&bundled).await.unwrap(), b"bundle");
    let local = project.root().join("files/app.js");
    assert_eq!(tokio::fs::read(&local).await.unwrap(), b"remote");
}

#[tokio::test]
async fn test_executor_syncs_registered_kinds_and_saves_cache() {
    let project = TestProject::new();
    project.write("files/a.txt", b"a").await;

    let mut registry = Registry::new();
    registry
        .register(SyncableDescriptor::new("files", 's', "Static files", |_ctx| {
            Ok(Box::new(MemoryAdapter::new()) as Box<dyn ResourceAdapter>)
        }))
        .unwrap();
    let executor = SyncExecutor::new(&registry, &project.ctx);

    let report = executor.sync_up(&Selection::all(), &SyncOptions::default()).await.unwrap();

    assert_eq!(report.direction, Direction::Up);
    assert!(report.finished_at.is_some());
    assert_eq!(report.kind("files").unwrap().created, 1);
    assert_eq!(report.failure_count(), 0);

    let reopened = ContentCache::open(&project.ctx.cache_dir, "files").await.unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(project.ctx.cache_dir.join("cache.files.yaml").exists());
}

#[tokio::test]
async fn test_status_reports_without_touching_anything() {
    let project = TestProject::new();
    project.write("files/a.txt", b"a").await;

    let mut registry = Registry::new();
    registry
        .register(SyncableDescriptor::new("files", 's', "Static files", |_ctx| {
            Ok(Box::new(MemoryAdapter::new().with_remote("1", "b.txt", b"b", remote_clock())) as Box<dyn ResourceAdapter>)
        }))
        .unwrap();
    let executor = SyncExecutor::new(&registry, &project.ctx);

    let report = executor.status(&Selection::of(["s"]), &down()).await.unwrap();
    let files = report.kind("files").unwrap();

    let added: BTreeSet<String> = keys_of(&files.status.to_add).into_iter().collect();
    assert_eq!(added, BTreeSet::from(["b.txt".to_string()]));
    assert_eq!(keys_of(&files.status.to_delete), vec!["a.txt"]);
    assert!(report.dry_run);
    assert!(!project.root().join("files/b.txt").exists());
    assert!(!project.ctx.cache_dir.exists());
}

#[tokio::test]
async fn test_unreadable_cache_fails_only_that_kind() {
    let project = TestProject::new();
    project.write(".solsync/cache.files.yaml", b"{ not: [yaml").await;

    let mut registry = Registry::new();
    registry
        .register(SyncableDescriptor::new("files", 's', "Static files", |_ctx| {
            Ok(Box::new(MemoryAdapter::new()) as Box<dyn ResourceAdapter>)
        }))
        .unwrap();
    let executor = SyncExecutor::new(&registry, &project.ctx);

    let report = executor.sync_up(&Selection::all(), &SyncOptions::default()).await.unwrap();

    let files = report.kind("files").unwrap();
    assert!(files.error.as_deref().unwrap().contains("Unreadable cache"));
    assert_eq!(report.failure_count(), 1);
}

#[tokio::test]
async fn test_configuration_error_aborts_before_any_kind_runs() {
    let project = TestProject::new();
    project.write("files/a.txt", b"a").await;

    let mut registry = Registry::new();
    registry
        .register(SyncableDescriptor::new("files", 's', "Static files", |_ctx| {
            Ok(Box::new(MemoryAdapter::new()) as Box<dyn ResourceAdapter>)
        }))
        .unwrap();
    registry
        .register(SyncableDescriptor::new("endpoints", 'a', "Endpoints", |_ctx| {
            Err(SyncError::config_error("no solution id configured"))
        }))
        .unwrap();
    let executor = SyncExecutor::new(&registry, &project.ctx);

    let err = executor.sync_up(&Selection::all(), &SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert!(!project.ctx.cache_dir.exists());

    let err = executor.status(&Selection::all(), &SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}
