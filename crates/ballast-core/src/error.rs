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

//! Error types for the governor.
//!
//! Nothing here is fatal to the host: API misuse surfaces as [`GovernorError`],
//! while probe and store failures are absorbed by the components that see them.

use crate::load::{LoadId, LoadState};
use crate::resource::ResourceId;
use thiserror::Error;

/// Caller-visible failures of the governor API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernorError {
    /// A live request already uses this id.
    #[error("{0} is already tracked")]
    DuplicateRequest(LoadId),
    /// No live request has this id.
    #[error("{0} is not tracked")]
    UnknownRequest(LoadId),
    /// The requested state change would move backwards.
    #[error("{id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The request.
        id: LoadId,
        /// Its current state.
        from: LoadState,
        /// The rejected target state.
        to: LoadState,
    },
    /// The request was tail-dropped because the pending queue is full.
    #[error("{0} was dropped: pending queue is full")]
    QueueOverflow(LoadId),
    /// No resource is registered under this id.
    #[error("{0} is not registered")]
    UnknownResource(ResourceId),
    /// The service thread is not running.
    #[error("governor service is not running")]
    ServiceStopped,
}

/// A failed memory reading. Treated as a missed sample.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("memory probe failed: {0}")]
pub struct ProbeError(pub String);

/// Snapshot store failures. Treated as "no snapshot available".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The record could not be encoded or decoded.
    #[error("snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A lock guarding the store was poisoned.
    #[error("snapshot store lock poisoned")]
    Poisoned,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The JSON did not match the schema.
    #[error("config is invalid: {0}")]
    Parse(#[from] serde_json::Error),
}
