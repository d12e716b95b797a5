//! Canonical item records and their derived sync keys

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped, string-keyed field map as it travels over the wire
pub type WireItem = serde_json::Map<String, Value>;

/// Field holding the remote's last-modified instant
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Stable identity used to match a local item to its remote counterpart
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncKey(Vec<String>);

impl SyncKey {
    /// Single-part key
    pub fn new(part: impl Into<String>) -> Self {
        Self(vec![part.into()])
    }

    /// Multi-part key, e.g. method and path of an endpoint
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// A local or remote resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Item {
    /// Resource fields, keyed by field name
    pub fields: WireItem,
    /// Where the item came from on disk; only set for local items
    pub local_path: Option<PathBuf>,
    /// True when sourced from a bundle overlay
    pub bundled: bool,
    /// Derived identity, filled in when the item is keyed
    pub synckey: Option<SyncKey>,
    /// External diff output, when requested
    pub diff: Option<String>,
}

impl Item {
    /// Ingest a wire item
    pub fn from_wire(fields: WireItem) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Convert a JSON value into an item; anything but an object is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::from_wire(fields)),
            _ => None,
        }
    }

    /// Hand the fields back for transmission
    pub fn into_wire(self) -> WireItem {
        self.fields
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String view of a field; numbers and bools are rendered as text
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Remote-reported last modification, if present and parseable
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(UPDATED_AT_FIELD)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Human-readable identity for log lines
    pub fn label(&self) -> String {
        match (&self.synckey, &self.local_path) {
            (Some(key), _) => key.to_string(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => "<unkeyed>".to_string(),
        }
    }

    /// Build the item used to update a matched pair.
    ///
    /// Starts from the remote fields and lays the local fields over them. The
    /// `key_field` always keeps the remote value. When `overridable` is given,
    /// only those fields may be taken from the local side.
    pub fn merged(local: &Item, remote: &Item, key_field: &str, overridable: Option<&[String]>) -> Item {
        let mut fields = remote.fields.clone();

        for (name, value) in &local.fields {
            if name == key_field {
                continue;
            }
            if let Some(allowed) = overridable {
                if !allowed.iter().any(|f| f == name) {
                    continue;
                }
            }
            fields.insert(name.clone(), value.clone());
        }

        match remote.fields.get(key_field) {
            Some(key) => {
                fields.insert(key_field.to_string(), key.clone());
            }
            None => {
                fields.remove(key_field);
            }
        }

        Item {
            fields,
            local_path: local.local_path.clone(),
            bundled: local.bundled,
            synckey: local.synckey.clone().or_else(|| remote.synckey.clone()),
            diff: None,
        }
    }
}
