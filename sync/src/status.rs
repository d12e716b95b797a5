//! Classification of local and remote items into sync buckets

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::ResourceAdapter;
use crate::cache::ContentCache;
use crate::collector::local_list;
use crate::context::{Direction, SyncContext, SyncOptions};
use crate::error::Result;
use crate::external_diff::ExternalDiff;
use crate::item::{Item, SyncKey};

/// Outcome of one status computation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationResult {
    pub to_add: Vec<Item>,
    pub to_delete: Vec<Item>,
    pub to_modify: Vec<Item>,
    pub unchanged: Vec<Item>,
    pub skipped: Vec<Item>,
    pub conflicting: Vec<Item>,
}

impl ClassificationResult {
    /// Whether applying this result would change anything
    pub fn is_clean(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty() && self.to_modify.is_empty()
    }

    /// Synckeys of a bucket
    pub fn synckeys(bucket: &[Item]) -> BTreeSet<SyncKey> {
        bucket.iter().filter_map(|item| item.synckey.clone()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} to add, {} to delete, {} to modify, {} unchanged, {} skipped, {} conflicting",
            self.to_add.len(),
            self.to_delete.len(),
            self.to_modify.len(),
            self.unchanged.len(),
            self.skipped.len(),
            self.conflicting.len()
        )
    }
}

/// Compute the classification for one resource kind
pub async fn status(
    adapter: &dyn ResourceAdapter,
    cache: &ContentCache,
    ctx: &SyncContext,
    options: &SyncOptions,
) -> Result<ClassificationResult> {
    let mut result = ClassificationResult::default();

    let there = adapter.list().await?;
    debug!("Listed {} remote {}", there.len(), adapter.name());
    let mut there = key_remote(adapter, there, &mut result)?;

    let listing = local_list(adapter, ctx).await?;
    debug!("Collected {} local {}", listing.items.len(), adapter.name());
    result.conflicting.extend(listing.conflicts);
    for key in &listing.conflict_keys {
        if there.remove(key).is_some() {
            debug!("Leaving remote {} alone until its local definitions agree", key);
        }
    }
    let here = key_local(adapter, listing.items, &mut result);

    classify(adapter, cache, here, there, options, &mut result).await?;

    if options.diff {
        let differ = ExternalDiff::new(ctx.diff_command.clone());
        for item in result.to_modify.iter_mut() {
            item.diff = Some(match differ.run(adapter, item).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Diff of {} failed: {}", item.label(), e);
                    format!("<diff failed: {}>", e)
                }
            });
        }
    }

    Ok(result)
}

/// Split keyed local and remote maps into the add/delete/modify/unchanged buckets
pub async fn classify(
    adapter: &dyn ResourceAdapter,
    cache: &ContentCache,
    here: BTreeMap<SyncKey, Item>,
    mut there: BTreeMap<SyncKey, Item>,
    options: &SyncOptions,
    result: &mut ClassificationResult,
) -> Result<()> {
    let mut only_here = Vec::new();
    let merge_fields = adapter.merge_fields();

    for (key, local) in here {
        let Some(remote) = there.remove(&key) else {
            only_here.push(local);
            continue;
        };

        let mut merged = Item::merged(&local, &remote, adapter.key_field(), merge_fields.as_deref());
        merged.synckey = Some(key);

        if adapter.docmp(&local, &remote, cache).await? {
            result.to_modify.push(merged);
        } else {
            result.unchanged.push(merged);
        }
    }

    let only_there: Vec<Item> = there.into_values().collect();

    match options.direction {
        Direction::Up => {
            result.to_add.extend(only_here);
            result.to_delete.extend(only_there);
        }
        Direction::Down => {
            result.to_add.extend(only_there);
            result.to_delete.extend(only_here);
        }
    }

    Ok(())
}

fn key_remote(
    adapter: &dyn ResourceAdapter,
    items: Vec<Item>,
    result: &mut ClassificationResult,
) -> Result<BTreeMap<SyncKey, Item>> {
    let mut keyed = BTreeMap::new();

    for mut item in items {
        let key = adapter.synckey(&item)?;
        item.synckey = Some(key.clone());

        if let Some(reason) = adapter.should_skip(&item) {
            debug!("Skipping remote {}: {}", key, reason);
            result.skipped.push(item);
            continue;
        }

        if keyed.contains_key(&key) {
            warn!("Remote lists {} more than once", key);
            result.conflicting.push(item);
            continue;
        }
        keyed.insert(key, item);
    }

    Ok(keyed)
}

fn key_local(
    adapter: &dyn ResourceAdapter,
    items: Vec<Item>,
    result: &mut ClassificationResult,
) -> BTreeMap<SyncKey, Item> {
    let mut keyed = BTreeMap::new();

    for item in items {
        if let Some(reason) = adapter.should_skip(&item) {
            debug!("Skipping local {}: {}", item.label(), reason);
            result.skipped.push(item);
            continue;
        }

        // Collected items are always keyed and unique per synckey
        if let Some(key) = item.synckey.clone() {
            keyed.insert(key, item);
        }
    }

    keyed
}
