//! Configuration-driven adapter for record-shaped resource kinds
//!
//! Endpoints, modules, event handlers, users, roles and device resources are
//! all JSON records on the remote side. Locally each YAML or JSON file holds
//! one record (a mapping) or several (a sequence of mappings).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use solsync::{item_key, ContentCache, Item, ResourceAdapter, Result, SyncError, SyncKey, WireItem};
use tokio::fs;
use tracing::{debug, info};

use crate::api::SolutionClient;

fn default_key_field() -> String {
    "id".to_string()
}

fn default_record_globs() -> Vec<String> {
    vec!["**/*.yaml".to_string(), "**/*.yml".to_string(), "**/*.json".to_string()]
}

fn default_metadata_fields() -> Vec<String> {
    ["created_at", "updated_at", "created_by", "updated_by", "solution_id"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Field mapping for one record kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordKind {
    /// Kind name, also the default location directory
    pub name: String,
    /// Remote collection name
    pub collection: String,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Fields that together identify a record across both sides
    pub synckey_fields: Vec<String>,
    pub location: PathBuf,
    #[serde(default = "default_record_globs")]
    pub search_for: Vec<String>,
    #[serde(default)]
    pub ignoring: Vec<String>,
    /// Fields a local record may override; all of them when unset
    #[serde(default)]
    pub merge_fields: Option<Vec<String>>,
    /// Server-maintained fields left out of comparisons and local files
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<String>,
}

impl RecordKind {
    pub fn new<I, S>(name: &str, collection: &str, synckey_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            key_field: default_key_field(),
            synckey_fields: synckey_fields.into_iter().map(Into::into).collect(),
            location: PathBuf::from(name),
            search_for: default_record_globs(),
            ignoring: Vec::new(),
            merge_fields: None,
            metadata_fields: default_metadata_fields(),
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_merge_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn is_bookkeeping(&self, field: &str) -> bool {
        field == self.key_field || self.metadata_fields.iter().any(|m| m == field)
    }
}

pub struct RecordAdapter {
    kind: RecordKind,
    client: Arc<SolutionClient>,
}

impl RecordAdapter {
    pub fn new(kind: RecordKind, client: Arc<SolutionClient>) -> Self {
        Self { kind, client }
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    /// Record fields without the key and server metadata
    fn content_view(&self, fields: &WireItem) -> WireItem {
        fields
            .iter()
            .filter(|(name, _)| !self.kind.is_bookkeeping(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Names of the fields a local record is compared on
    fn compared_fields<'a>(&self, local: &'a Item) -> Vec<&'a str> {
        local
            .fields
            .keys()
            .map(String::as_str)
            .filter(|name| !self.kind.is_bookkeeping(name))
            .filter(|name| match &self.kind.merge_fields {
                Some(allowed) => allowed
                    .iter()
                    .chain(self.kind.synckey_fields.iter())
                    .any(|f| f.as_str() == *name),
                None => true,
            })
            .collect()
    }

    fn upload_body(&self, item: &Item, modify: bool) -> WireItem {
        let mut body = self.content_view(&item.fields);
        if modify {
            if let Some(key) = item.get(&self.kind.key_field) {
                body.insert(self.kind.key_field.clone(), key.clone());
            }
        }
        body
    }

    fn record_synckey(&self, record: &WireItem) -> Option<SyncKey> {
        let item = Item::from_wire(record.clone());
        self.synckey(&item).ok()
    }

    async fn read_records(&self, path: &Path) -> Result<Vec<Value>> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::local_io(path, e))?;
        parse_records(path, &text)
    }

    async fn write_records(&self, path: &Path, records: Vec<Value>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::local_io(parent, e))?;
        }
        let text = render_records(path, records)?;
        fs::write(path, text)
            .await
            .map_err(|e| SyncError::local_io(path, e))
    }
}

#[async_trait]
impl ResourceAdapter for RecordAdapter {
    fn name(&self) -> &str {
        &self.kind.name
    }

    fn key_field(&self) -> &str {
        &self.kind.key_field
    }

    fn location(&self) -> PathBuf {
        self.kind.location.clone()
    }

    fn search_for(&self) -> Vec<String> {
        self.kind.search_for.clone()
    }

    fn ignoring(&self) -> Vec<String> {
        self.kind.ignoring.clone()
    }

    async fn list(&self) -> Result<Vec<Item>> {
        let records = self.client.crud.list(&self.kind.collection).await?;
        Ok(records.into_iter().map(Item::from_wire).collect())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let record = self.client.crud.get(&self.kind.collection, key).await?;
        let mut text = serde_json::to_string_pretty(&Value::Object(self.content_view(&record)))?;
        text.push('\n');
        Ok(text.into_bytes())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client.crud.delete(&self.kind.collection, key).await?;
        Ok(())
    }

    async fn upload(&self, _local_path: &Path, item: &Item, modify: bool) -> Result<Option<DateTime<Utc>>> {
        let body = self.upload_body(item, modify);
        let stored = if modify {
            let key = item_key(self, item)?;
            self.client.crud.update(&self.kind.collection, &key, &body).await?
        } else {
            self.client.crud.create(&self.kind.collection, &body).await?
        };
        Ok(Item::from_wire(stored).updated_at())
    }

    /// Replace the matching record in its file, or add it
    async fn download(&self, local_path: &Path, item: &Item) -> Result<()> {
        let key = item_key(self, item)?;
        let record = self.client.crud.get(&self.kind.collection, &key).await?;
        let synckey = self.synckey(&Item::from_wire(record.clone()))?;
        let content = Value::Object(self.content_view(&record));

        let mut records = if fs::try_exists(local_path).await.unwrap_or(false) {
            self.read_records(local_path).await?
        } else {
            Vec::new()
        };

        let existing = records.iter().position(|r| {
            r.as_object()
                .and_then(|fields| self.record_synckey(fields))
                .map_or(false, |k| k == synckey)
        });
        match existing {
            Some(index) => records[index] = content,
            None => records.push(content),
        }

        debug!("Writing {} {} to {}", self.kind.name, synckey, local_path.display());
        self.write_records(local_path, records).await
    }

    /// Drop only this record; the file goes once it holds none
    async fn remove_local(&self, local_path: &Path, item: &Item) -> Result<()> {
        let synckey = match &item.synckey {
            Some(key) => key.clone(),
            None => self.synckey(item)?,
        };

        let records: Vec<Value> = self
            .read_records(local_path)
            .await?
            .into_iter()
            .filter(|r| {
                r.as_object()
                    .and_then(|fields| self.record_synckey(fields))
                    .map_or(true, |k| k != synckey)
            })
            .collect();

        if records.is_empty() {
            info!("Removing {}", local_path.display());
            fs::remove_file(local_path)
                .await
                .map_err(|e| SyncError::local_io(local_path, e))
        } else {
            self.write_records(local_path, records).await
        }
    }

    async fn to_remote_item(&self, _root: &Path, path: &Path) -> Result<Vec<Item>> {
        let records = self.read_records(path).await?;
        let mut items = Vec::with_capacity(records.len());

        for record in records {
            let Value::Object(fields) = record else {
                return Err(SyncError::not_recognized(path, "records must be mappings"));
            };
            let item = Item::from_wire(fields);
            if let Some(missing) = self.kind.synckey_fields.iter().find(|f| item.get_str(f.as_str()).is_none()) {
                return Err(SyncError::not_recognized(
                    path,
                    format!("record without scalar '{}' field", missing),
                ));
            }
            items.push(item);
        }

        Ok(items)
    }

    fn to_local_name(&self, item: &Item, key: &str) -> String {
        let parts: Vec<String> = self
            .kind
            .synckey_fields
            .iter()
            .filter_map(|field| item.get_str(field))
            .map(|value| sanitize(&value))
            .filter(|part| !part.is_empty())
            .collect();

        let stem = if parts.is_empty() { sanitize(key) } else { parts.join("_") };
        format!("{}.yaml", stem)
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey> {
        let mut parts = Vec::with_capacity(self.kind.synckey_fields.len());
        for field in &self.kind.synckey_fields {
            let value = item.get_str(field).ok_or_else(|| {
                SyncError::format_error(
                    item.local_path.clone().unwrap_or_default(),
                    format!("{} record has no '{}' field", self.kind.name, field),
                )
            })?;
            parts.push(value);
        }
        Ok(SyncKey::from_parts(parts))
    }

    /// Records differ when any locally present content field differs
    async fn docmp(&self, local: &Item, remote: &Item, _cache: &ContentCache) -> Result<bool> {
        let fields = self.compared_fields(local);
        let differ = fingerprint(&local.fields, &fields) != fingerprint(&remote.fields, &fields);
        debug!("Compared {} {}: modified={}", self.kind.name, local.label(), differ);
        Ok(differ)
    }

    async fn local_content(&self, item: &Item) -> Result<Vec<u8>> {
        let mut text = serde_json::to_string_pretty(&Value::Object(self.content_view(&item.fields)))?;
        text.push('\n');
        Ok(text.into_bytes())
    }

    fn merge_fields(&self) -> Option<Vec<String>> {
        self.kind.merge_fields.clone()
    }
}

/// SHA-256 over the canonical JSON of `fields`, absent fields counting as null
pub fn fingerprint(record: &WireItem, fields: &[&str]) -> String {
    let selected: BTreeMap<&str, &Value> = fields
        .iter()
        .map(|name| (*name, record.get(*name).unwrap_or(&Value::Null)))
        .collect();
    let canonical = serde_json::to_vec(&selected).unwrap_or_default();
    format!("{:x}", Sha256::digest(&canonical))
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Records held by a file: a mapping is one record, a sequence many, an empty file none
pub fn parse_records(path: &Path, text: &str) -> Result<Vec<Value>> {
    let value: Value = if is_json(path) {
        serde_json::from_str(text).map_err(|e| SyncError::format_error(path, e.to_string()))?
    } else {
        serde_yaml::from_str(text).map_err(|e| SyncError::format_error(path, e.to_string()))?
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(records) => Ok(records),
        record @ Value::Object(_) => Ok(vec![record]),
        _ => Err(SyncError::not_recognized(path, "expected a mapping or a list of mappings")),
    }
}

fn render_records(path: &Path, mut records: Vec<Value>) -> Result<String> {
    let document = if records.len() == 1 {
        records.remove(0)
    } else {
        Value::Array(records)
    };

    if is_json(path) {
        let mut text = serde_json::to_string_pretty(&document)?;
        text.push('\n');
        Ok(text)
    } else {
        Ok(serde_yaml::to_string(&document)?)
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
