//! Applies a classification to the remote (sync up) or the project (sync down)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, error, info, warn};

use crate::adapter::{item_key, ResourceAdapter};
use crate::cache::ContentCache;
use crate::context::{Direction, SyncContext, SyncOptions};
use crate::error::{Result, SyncError};
use crate::item::Item;
use crate::registry::{Registry, Selection, SyncableDescriptor};
use crate::report::{KindReport, SyncAction, SyncReport};
use crate::status;

/// Result of one item action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Skipped,
}

/// Drives status and sync across the selected resource kinds
pub struct SyncExecutor<'a> {
    registry: &'a Registry,
    ctx: &'a SyncContext,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(registry: &'a Registry, ctx: &'a SyncContext) -> Self {
        Self { registry, ctx }
    }

    /// Push local state to the remote
    pub async fn sync_up(&self, selection: &Selection, options: &SyncOptions) -> Result<SyncReport> {
        self.sync(selection, &options.clone().with_direction(Direction::Up)).await
    }

    /// Pull remote state into the project
    pub async fn sync_down(&self, selection: &Selection, options: &SyncOptions) -> Result<SyncReport> {
        self.sync(selection, &options.clone().with_direction(Direction::Down)).await
    }

    /// Adapters for every selected kind, built before any kind runs so a
    /// configuration error aborts with nothing applied
    fn build_selected(&self, selection: &Selection) -> Result<Vec<(&'a SyncableDescriptor, Box<dyn ResourceAdapter>)>> {
        self.registry
            .filtered(selection, self.ctx.default_kinds.as_deref())
            .into_iter()
            .map(|descriptor| Ok((descriptor, descriptor.build(self.ctx)?)))
            .collect()
    }

    /// Sync every selected kind in `options.direction`.
    ///
    /// Only configuration errors abort the run; everything else is recorded
    /// in the report of the kind it happened in.
    pub async fn sync(&self, selection: &Selection, options: &SyncOptions) -> Result<SyncReport> {
        let mut report = SyncReport::new(options.direction, options.dry_run);

        for (descriptor, adapter) in self.build_selected(selection)? {
            let mut cache = match ContentCache::open(&self.ctx.cache_dir, &descriptor.name).await {
                Ok(cache) => cache,
                Err(e) => {
                    error!("Cannot open cache for {}: {}", descriptor.name, e);
                    report.kinds.push(KindReport::failed(&descriptor.name, e));
                    continue;
                }
            };

            let kind_report = self.sync_kind(adapter.as_ref(), &mut cache, options).await;
            info!("{}", kind_report.summary());
            report.kinds.push(kind_report);
        }

        report.complete();
        Ok(report)
    }

    /// Classification only; nothing is modified
    pub async fn status(&self, selection: &Selection, options: &SyncOptions) -> Result<SyncReport> {
        let mut report = SyncReport::new(options.direction, true);

        for (descriptor, adapter) in self.build_selected(selection)? {
            let kind_report = match ContentCache::open(&self.ctx.cache_dir, &descriptor.name).await {
                Ok(cache) => match status::status(adapter.as_ref(), &cache, self.ctx, options).await {
                    Ok(status) => KindReport {
                        status,
                        ..KindReport::new(&descriptor.name)
                    },
                    Err(e) => {
                        error!("Status of {} failed: {}", descriptor.name, e);
                        KindReport::failed(&descriptor.name, e)
                    }
                },
                Err(e) => KindReport::failed(&descriptor.name, e),
            };

            report.kinds.push(kind_report);
        }

        report.complete();
        Ok(report)
    }

    /// Compute status for one kind and apply it: delete, then create, then update
    pub async fn sync_kind(
        &self,
        adapter: &dyn ResourceAdapter,
        cache: &mut ContentCache,
        options: &SyncOptions,
    ) -> KindReport {
        let status = match status::status(adapter, cache, self.ctx, options).await {
            Ok(status) => status,
            Err(e) => {
                error!("Status of {} failed: {}", adapter.name(), e);
                return KindReport::failed(adapter.name(), e);
            }
        };

        debug!("{} {}: {}", adapter.name(), options.direction, status.summary());
        for item in &status.conflicting {
            warn!("Conflicting {} {} left untouched", adapter.name(), item.label());
        }

        let mut report = KindReport::new(adapter.name());
        let phases: [(SyncAction, bool, &Vec<Item>); 3] = [
            (SyncAction::Delete, options.delete, &status.to_delete),
            (SyncAction::Create, options.create, &status.to_add),
            (SyncAction::Update, options.update, &status.to_modify),
        ];

        for (action, enabled, items) in phases {
            if !enabled {
                if !items.is_empty() {
                    info!("Not running {} {} action(s) on {}: disabled", items.len(), action, adapter.name());
                }
                continue;
            }

            for item in items {
                self.apply(adapter, cache, action, item, options, &mut report).await;
            }
        }

        if !options.dry_run {
            if let Err(e) = cache.save().await {
                warn!("Could not save {} cache: {}", adapter.name(), e);
            }
        }

        report.status = status;
        report
    }

    async fn apply(
        &self,
        adapter: &dyn ResourceAdapter,
        cache: &mut ContentCache,
        action: SyncAction,
        item: &Item,
        options: &SyncOptions,
        report: &mut KindReport,
    ) {
        let target = match options.direction {
            Direction::Up => "remote",
            Direction::Down => "local",
        };

        if options.dry_run {
            info!("DRY RUN: would {} {} {} {}", action, target, adapter.name(), item.label());
            report.skipped += 1;
            return;
        }

        info!("{} {} {} {}", action, target, adapter.name(), item.label());

        let result = match (options.direction, action) {
            (Direction::Up, SyncAction::Delete) => self.remove_remote(adapter, item).await,
            (Direction::Up, SyncAction::Create) => self.upload(adapter, cache, item, false).await,
            (Direction::Up, SyncAction::Update) => self.upload(adapter, cache, item, true).await,
            (Direction::Down, SyncAction::Delete) => self.remove_local(adapter, item).await,
            (Direction::Down, SyncAction::Create) | (Direction::Down, SyncAction::Update) => {
                self.download(adapter, cache, item).await
            }
        };

        match result {
            Ok(Outcome::Applied) => report.record(action),
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(e) if e.is_remote_conflict() => {
                warn!("{} {} changed remotely, not applying {}: {}", adapter.name(), item.label(), action, e);
                report.conflicts.push(item.label());
            }
            Err(e) => {
                warn!("Failed to {} {} {}: {}", action, adapter.name(), item.label(), e);
                report.record_failure(action, item.label(), e);
            }
        }
    }

    async fn remove_remote(&self, adapter: &dyn ResourceAdapter, item: &Item) -> Result<Outcome> {
        let key = item_key(adapter, item)?;
        adapter.remove(&key).await?;
        Ok(Outcome::Applied)
    }

    async fn upload(
        &self,
        adapter: &dyn ResourceAdapter,
        cache: &mut ContentCache,
        item: &Item,
        modify: bool,
    ) -> Result<Outcome> {
        let path = local_path_of(item)?;
        let reported = adapter.upload(path, item, modify).await?;

        let when = reported.unwrap_or_else(Utc::now);
        if let Err(e) = cache.record_upload(path, when).await {
            warn!("Uploaded {} but could not cache it: {}", item.label(), e);
        }
        Ok(Outcome::Applied)
    }

    async fn remove_local(&self, adapter: &dyn ResourceAdapter, item: &Item) -> Result<Outcome> {
        if item.bundled {
            info!("Keeping bundled {} {}", adapter.name(), item.label());
            return Ok(Outcome::Skipped);
        }

        let path = local_path_of(item)?;
        adapter.remove_local(path, item).await?;
        Ok(Outcome::Applied)
    }

    async fn download(
        &self,
        adapter: &dyn ResourceAdapter,
        cache: &mut ContentCache,
        item: &Item,
    ) -> Result<Outcome> {
        // Bundles are read-only overlays; a pulled change lands in the project
        let path: PathBuf = match (&item.local_path, item.bundled) {
            (Some(path), false) => path.clone(),
            _ => adapter.to_local_path(&self.ctx.project_root, item)?,
        };

        adapter.download(&path, item).await?;

        if let Some(remote_time) = item.updated_at() {
            stamp_mtime(&path, remote_time);
            if let Err(e) = cache.record_upload(&path, remote_time).await {
                warn!("Downloaded {} but could not cache it: {}", item.label(), e);
            }
        }
        Ok(Outcome::Applied)
    }
}

fn local_path_of(item: &Item) -> Result<&Path> {
    item.local_path
        .as_deref()
        .ok_or_else(|| SyncError::Conflict(format!("{} has no local file", item.label())))
}

fn stamp_mtime(path: &Path, when: DateTime<Utc>) {
    let mtime = FileTime::from_unix_time(when.timestamp(), when.timestamp_subsec_nanos());
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        debug!("Could not set mtime on {}: {}", path.display(), e);
    }
}
