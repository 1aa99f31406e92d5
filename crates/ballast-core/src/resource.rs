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

//! Heavy resource handles tracked for reclamation.
//!
//! The governor never owns the underlying resource. Collaborators register a
//! handle together with a callback, and every release/pause/shrink/restore is
//! performed by invoking that callback.

use crate::pressure::PressureLevel;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a handle at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// The kind of heavy resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A decoded image.
    Image,
    /// A drawing surface.
    Canvas,
    /// A media element.
    Video,
    /// A 3D scene asset.
    SceneAsset,
}

/// Opaque reference to the owning visual element. Never dereferenced by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundsRef(pub u64);

/// An action requested from a resource's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReclaimAction {
    /// Free the resource entirely.
    Release,
    /// Pause playback and drop buffers (video only).
    Pause,
    /// Shrink to a minimal footprint (canvas only).
    Shrink,
    /// Undo a previous release, pause, or shrink.
    Restore,
}

/// What the reclaimer last asked the owner to do with a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResidencyState {
    /// Fully live.
    #[default]
    Resident,
    /// Released.
    Released,
    /// Paused.
    Paused,
    /// Shrunk.
    Shrunk,
}

/// Callback through which the reclaimer asks an owner to act on its resource.
///
/// Under `GovernorService` it runs on the control-loop thread, so it must not
/// block on a call back into the service.
pub type ReclaimCallback = Box<dyn FnMut(ResourceId, ReclaimAction) + Send>;

/// A registered heavy resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Owning visual element.
    pub bounds_ref: BoundsRef,
    /// Last time the element was on screen.
    pub last_visible_at_ms: u64,
    /// Estimated memory held by the resource.
    pub size_bytes_estimate: u64,
    /// When set by the owner, the reclaimer never targets this handle.
    pub keep_alive: bool,
}

impl ResourceHandle {
    /// Creates a handle that is considered visible at `now_ms`.
    pub fn new(kind: ResourceKind, bounds_ref: BoundsRef, size_bytes_estimate: u64, now_ms: u64) -> Self {
        Self {
            kind,
            bounds_ref,
            last_visible_at_ms: now_ms,
            size_bytes_estimate,
            keep_alive: false,
        }
    }

    /// Marks the handle as protected from reclamation.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

/// Why a sweep was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepReason {
    /// Pressure entered Warning or Critical.
    Pressure(PressureLevel),
    /// The fixed background cadence elapsed.
    Periodic,
    /// Requested explicitly by a collaborator.
    Manual,
    /// The host went to the background. Nothing is on screen, so every video
    /// is paused and the Critical rules apply.
    Background,
}

impl SweepReason {
    /// Returns `true` when canvas shrinking is allowed.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            SweepReason::Pressure(PressureLevel::Critical) | SweepReason::Background
        )
    }

    /// Returns `true` for sweeps subject to the pressure cooldown.
    pub fn is_pressure(self) -> bool {
        matches!(self, SweepReason::Pressure(_))
    }
}
