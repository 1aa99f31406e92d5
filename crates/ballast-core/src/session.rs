// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session snapshot record and the storage contract.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// The single most recent record of session position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Vertical scroll position.
    pub scroll_offset: f64,
    /// Route the position belongs to.
    pub route_key: String,
    /// When the record was written.
    pub saved_at: u64,
    /// Consecutive sessions that ended without a clean shutdown.
    #[serde(default)]
    pub unclean_restarts: u32,
    /// Set only by the final write of an orderly shutdown.
    #[serde(default)]
    pub clean_shutdown: bool,
}

/// Visibility of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Visible and interactive.
    #[default]
    Foreground,
    /// Hidden; may be frozen or killed by the host at any time.
    Background,
}

/// Storage for the single snapshot record.
pub trait SnapshotStore: Send {
    /// Reads the record, if any.
    fn load(&mut self) -> Result<Option<SessionSnapshot>, StoreError>;

    /// Replaces the record.
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    /// Deletes the record. Deleting a missing record is not an error.
    fn remove(&mut self) -> Result<(), StoreError>;
}

/// In-process store holding the encoded record. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with raw (possibly malformed) contents.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// Returns `true` when a record is present.
    pub fn is_occupied(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&mut self) -> Result<Option<SessionSnapshot>, StoreError> {
        let slot = self.slot.lock().map_err(|_| StoreError::Poisoned)?;
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(snapshot)?;
        let mut slot = self.slot.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(encoded);
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}
