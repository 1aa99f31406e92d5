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

//! # Ballast SDK
//!
//! The public face of the adaptive resource governor. Most hosts only need
//! the [`prelude`] and a [`GovernorBuilder`]:
//!
//! ```no_run
//! use ballast_sdk::prelude::*;
//!
//! let mut governor = GovernorBuilder::new()
//!     .with_hints(HostHints::new().with_memory_gb(4.0))
//!     .build();
//! governor.subscribe(|event| log::info!("{}", event.name()));
//! let ticket = governor.enqueue(LoadRequest::new(1, Priority::High));
//! ```

#![warn(missing_docs)]

mod builder;

pub use builder::GovernorBuilder;

/// Everything a typical host touches.
pub mod prelude {
    pub use crate::GovernorBuilder;
    pub use ballast_agents::{RestoreOutcome, SweepReport};
    pub use ballast_control::{Governor, GovernorHandle, GovernorService, GovernorStatus};
    pub use ballast_core::clock::{Clock, ManualClock, SystemClock};
    pub use ballast_core::config::GovernorConfig;
    pub use ballast_core::degradation::{DegradationFlags, DegradationMode, DegradationState, TriggerReason};
    pub use ballast_core::error::GovernorError;
    pub use ballast_core::event::{GovernorEvent, SubscriptionId};
    pub use ballast_core::load::{LoadId, LoadRequest, LoadState, LoadTicket, Priority};
    pub use ballast_core::pressure::{MemoryProbe, MemoryUsage, PressureLevel, PressureSample};
    pub use ballast_core::profile::{DeviceProfile, HostHints, PlatformClass, Tier};
    pub use ballast_core::resource::{BoundsRef, ReclaimAction, ResourceHandle, ResourceId, ResourceKind};
    pub use ballast_core::session::{Lifecycle, MemorySnapshotStore, SessionSnapshot, SnapshotStore};
}
