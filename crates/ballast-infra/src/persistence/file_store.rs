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

use anyhow::{Context, Result};
use ballast_core::error::StoreError;
use ballast_core::session::{SessionSnapshot, SnapshotStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name used by [`FileSnapshotStore::in_dir`].
pub const SNAPSHOT_FILE_NAME: &str = "session-snapshot.json";

/// Keeps the snapshot record as a single JSON file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// record, so a crash mid-write never leaves a torn snapshot behind.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Uses `path` as the record. The parent directory must exist on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates `dir` if needed and keeps the record in it.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;
        Ok(Self::new(dir.join(SNAPSHOT_FILE_NAME)))
    }

    /// The record's location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&mut self) -> std::result::Result<Option<SessionSnapshot>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&mut self, snapshot: &SessionSnapshot) -> std::result::Result<(), StoreError> {
        let encoded = serde_json::to_vec(snapshot)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, encoded)?;
        fs::rename(&temp_path, &self.path)?;
        log::trace!("FileSnapshotStore: wrote {}.", self.path.display());
        Ok(())
    }

    fn remove(&mut self) -> std::result::Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
