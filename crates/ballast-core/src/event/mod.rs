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

//! Broadcast signals and the observer registry that delivers them.
//!
//! The [`EventHub`] is generic over its payload so that it carries no knowledge
//! of governor semantics; [`GovernorEvent`] is the payload the governor uses.

mod hub;

pub use self::hub::{EventHub, SubscriptionId};

use crate::degradation::TriggerReason;
use crate::load::LoadId;
use crate::pressure::{PressureLevel, PressureSample};
use crate::resource::ResourceId;
use crate::session::SessionSnapshot;

/// A signal broadcast from the governor to its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum GovernorEvent {
    /// The pressure level differs from the previous sample's.
    PressureChanged {
        /// The new level.
        level: PressureLevel,
        /// The sample that produced it.
        sample: PressureSample,
    },
    /// Degraded mode was entered.
    DegradedModeEntered {
        /// What triggered it.
        reason: TriggerReason,
    },
    /// Degraded mode was left through an explicit reset.
    DegradedModeReset,
    /// A load request may proceed.
    LoadAdmitted(LoadId),
    /// A load request finished successfully.
    LoadCompleted(LoadId),
    /// A load request failed or was dropped on overflow.
    LoadFailed(LoadId),
    /// An admitted load request was cancelled by its caller.
    LoadCancelled(LoadId),
    /// A resource owner was asked to release its resource.
    ResourceReleased(ResourceId),
    /// A resource owner was asked to restore its resource.
    ResourceRestored(ResourceId),
    /// The session snapshot was applied. Fired at most once per process.
    SnapshotRestored(SessionSnapshot),
}

impl GovernorEvent {
    /// The signal name as seen by collaborators.
    pub fn name(&self) -> &'static str {
        match self {
            GovernorEvent::PressureChanged { .. } => "pressure-changed",
            GovernorEvent::DegradedModeEntered { .. } => "degraded-mode-entered",
            GovernorEvent::DegradedModeReset => "degraded-mode-reset",
            GovernorEvent::LoadAdmitted(_) => "load-admitted",
            GovernorEvent::LoadCompleted(_) => "load-completed",
            GovernorEvent::LoadFailed(_) => "load-failed",
            GovernorEvent::LoadCancelled(_) => "load-cancelled",
            GovernorEvent::ResourceReleased(_) => "resource-released",
            GovernorEvent::ResourceRestored(_) => "resource-restored",
            GovernorEvent::SnapshotRestored(_) => "snapshot-restored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(GovernorEvent::LoadAdmitted(LoadId(1)).name(), "load-admitted");
        assert_eq!(GovernorEvent::DegradedModeReset.name(), "degraded-mode-reset");
        assert_eq!(
            GovernorEvent::DegradedModeEntered {
                reason: TriggerReason::ErrorBurst
            }
            .name(),
            "degraded-mode-entered"
        );
        assert_eq!(
            GovernorEvent::ResourceRestored(ResourceId(4)).name(),
            "resource-restored"
        );
    }
}
