//! Process-lifetime store of per-module connection descriptors.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::descriptor::{ConnectionDescriptor, ParseError};
use crate::module_key::ModuleKey;

/// Why a module has no usable descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbsentReason {
    /// The configuration value was not provided.
    Missing,
    /// The configuration value was provided but could not be parsed.
    Malformed(String),
}

impl std::fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbsentReason::Missing => f.write_str("not configured"),
            AbsentReason::Malformed(e) => write!(f, "malformed: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Present(Arc<ConnectionDescriptor>),
    Absent(AbsentReason),
}

/// Result of a diagnostic lookup; distinguishes "absent" from "never attempted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NotAttempted,
    Present(Arc<ConnectionDescriptor>),
    Absent(AbsentReason),
}

/// Snapshot returned by [`ConnectionConfigStore::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub present: BTreeSet<ModuleKey>,
    pub absent: BTreeSet<ModuleKey>,
}

/// Loaded/missing view over the primary modules only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub loaded: Vec<ModuleKey>,
    pub missing: Vec<ModuleKey>,
    pub total: usize,
}

/// One descriptor per module, populated once at bootstrap.
///
/// Once a key holds a descriptor it never changes: re-loading that key is a no-op
/// returning the original. A key recorded absent may still be upgraded by a later
/// successful load.
#[derive(Default)]
pub struct ConnectionConfigStore {
    slots: DashMap<ModuleKey, Slot>,
}

impl std::fmt::Debug for ConnectionConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfigStore")
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw` and store it under `module`.
    ///
    /// A parse failure records the module as malformed (unless it already holds a
    /// descriptor) and never touches any other module's entry.
    pub fn load(
        &self,
        module: ModuleKey,
        raw: &str,
    ) -> Result<Arc<ConnectionDescriptor>, ParseError> {
        if let Some(existing) = self.get(module) {
            return Ok(existing);
        }

        let parsed = ConnectionDescriptor::parse(raw).map(Arc::new);

        // The shard lock is held from here on, so concurrent loaders of the same key
        // serialise and the first descriptor stored wins.
        let mut slot = self
            .slots
            .entry(module)
            .or_insert(Slot::Absent(AbsentReason::Missing));
        if let Slot::Present(existing) = slot.value() {
            return Ok(Arc::clone(existing));
        }

        match parsed {
            Ok(descriptor) => {
                *slot = Slot::Present(Arc::clone(&descriptor));
                Ok(descriptor)
            }
            Err(e) => {
                *slot = Slot::Absent(AbsentReason::Malformed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Record that `module` has no configuration value. Never downgrades a present entry.
    pub fn mark_missing(&self, module: ModuleKey) {
        self.slots
            .entry(module)
            .or_insert(Slot::Absent(AbsentReason::Missing));
    }

    /// Pure lookup; never parses and never performs I/O.
    pub fn get(&self, module: ModuleKey) -> Option<Arc<ConnectionDescriptor>> {
        match self.slots.get(&module).as_deref() {
            Some(Slot::Present(d)) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    pub fn lookup(&self, module: ModuleKey) -> Lookup {
        match self.slots.get(&module).as_deref() {
            None => Lookup::NotAttempted,
            Some(Slot::Present(d)) => Lookup::Present(Arc::clone(d)),
            Some(Slot::Absent(reason)) => Lookup::Absent(reason.clone()),
        }
    }

    /// Why `module` is unavailable, or `None` if it holds a descriptor.
    pub fn absence_reason(&self, module: ModuleKey) -> Option<AbsentReason> {
        match self.lookup(module) {
            Lookup::Present(_) => None,
            Lookup::Absent(reason) => Some(reason),
            Lookup::NotAttempted => Some(AbsentReason::Missing),
        }
    }

    pub fn status(&self) -> StoreStatus {
        let mut status = StoreStatus::default();
        for entry in self.slots.iter() {
            match entry.value() {
                Slot::Present(_) => status.present.insert(*entry.key()),
                Slot::Absent(_) => status.absent.insert(*entry.key()),
            };
        }
        status
    }

    pub fn summary(&self) -> ConnectionSummary {
        let (loaded, missing): (Vec<_>, Vec<_>) = ModuleKey::PRIMARY
            .into_iter()
            .partition(|k| self.get(*k).is_some());
        ConnectionSummary {
            loaded,
            missing,
            total: ModuleKey::PRIMARY.len(),
        }
    }

    /// Drop every entry. Only meant for test teardown.
    pub fn clear(&self) {
        self.slots.clear();
    }
}
