//! Catalog of resource kinds that can be synchronized

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::adapter::ResourceAdapter;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};

/// Builds the adapter for one kind against a project context
pub type AdapterFactory = Arc<dyn Fn(&SyncContext) -> Result<Box<dyn ResourceAdapter>> + Send + Sync>;

/// One registered resource kind
#[derive(Clone)]
pub struct SyncableDescriptor {
    pub name: String,
    pub factory: AdapterFactory,
    /// Single-letter CLI switch
    pub flag: char,
    pub description: String,
    /// Synced when the caller selects nothing explicitly
    pub included_by_default: bool,
    pub aliases: Vec<String>,
}

impl fmt::Debug for SyncableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncableDescriptor")
            .field("name", &self.name)
            .field("flag", &self.flag)
            .field("description", &self.description)
            .field("included_by_default", &self.included_by_default)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl SyncableDescriptor {
    pub fn new<F>(name: impl Into<String>, flag: char, description: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&SyncContext) -> Result<Box<dyn ResourceAdapter>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            flag,
            description: description.into(),
            included_by_default: true,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn not_default(mut self) -> Self {
        self.included_by_default = false;
        self
    }

    /// Whether `name` is this kind's name, one of its aliases, or its flag letter
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name
            || self.aliases.iter().any(|a| a == name)
            || (name.chars().count() == 1 && name.starts_with(self.flag))
    }

    pub fn build(&self, ctx: &SyncContext) -> Result<Box<dyn ResourceAdapter>> {
        (self.factory)(ctx)
    }
}

/// Which kinds the caller asked for
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Select every registered kind
    pub all: bool,
    /// Names, aliases or flag letters
    pub kinds: Vec<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            all: true,
            kinds: Vec::new(),
        }
    }

    pub fn of<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            all: false,
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

/// Registered kinds, in registration order
#[derive(Debug, Default)]
pub struct Registry {
    syncables: Vec<SyncableDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind; flag letters must be unique
    pub fn register(&mut self, descriptor: SyncableDescriptor) -> Result<()> {
        if let Some(existing) = self.by_flag(descriptor.flag) {
            return Err(SyncError::DuplicateFlag {
                flag: descriptor.flag,
                existing: existing.name.clone(),
            });
        }

        let names = std::iter::once(&descriptor.name).chain(descriptor.aliases.iter());
        for name in names {
            if let Some(existing) = self.get(name) {
                warn!("Syncable name '{}' is already used by '{}'", name, existing.name);
            }
        }

        self.syncables.push(descriptor);
        Ok(())
    }

    /// Drop every registration
    pub fn reset(&mut self) {
        self.syncables.clear();
    }

    /// Look up by name or alias; the first registration wins
    pub fn get(&self, name: &str) -> Option<&SyncableDescriptor> {
        self.syncables
            .iter()
            .find(|s| s.name == name || s.aliases.iter().any(|a| a == name))
    }

    pub fn by_flag(&self, flag: char) -> Option<&SyncableDescriptor> {
        self.syncables.iter().find(|s| s.flag == flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncableDescriptor> {
        self.syncables.iter()
    }

    pub fn len(&self) -> usize {
        self.syncables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syncables.is_empty()
    }

    /// Kinds chosen by `selection`.
    ///
    /// With nothing selected, falls back to `defaults` when configured and to
    /// the kinds flagged `included_by_default` otherwise.
    pub fn filtered(&self, selection: &Selection, defaults: Option<&[String]>) -> Vec<&SyncableDescriptor> {
        if selection.all {
            return self.syncables.iter().collect();
        }

        for name in &selection.kinds {
            if !self.syncables.iter().any(|s| s.answers_to(name)) {
                warn!("Unknown resource kind '{}' ignored", name);
            }
        }

        let explicit: Vec<&SyncableDescriptor> = self
            .syncables
            .iter()
            .filter(|s| selection.kinds.iter().any(|name| s.answers_to(name)))
            .collect();

        if !explicit.is_empty() {
            return explicit;
        }

        match defaults {
            Some(names) => self
                .syncables
                .iter()
                .filter(|s| names.iter().any(|name| s.answers_to(name)))
                .collect(),
            None => self.syncables.iter().filter(|s| s.included_by_default).collect(),
        }
    }
}
