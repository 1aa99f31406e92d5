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

//! # Ballast Core
//!
//! Foundational crate containing the data model, contracts, and event types
//! shared by every layer of the adaptive resource governor.
//!
//! This crate defines the abstract "what": device profiles, pressure samples,
//! load requests, resource handles, degradation state, and session snapshots.
//! Policy lives in `ballast-telemetry`, `ballast-agents`, and `ballast-control`;
//! concrete host integrations live in `ballast-infra`.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod degradation;
pub mod error;
pub mod event;
pub mod load;
pub mod pressure;
pub mod profile;
pub mod resource;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DegradationConfig, GovernorConfig, PressureConfig, ReclaimConfig, RecoveryConfig,
    SchedulerConfig, ServiceConfig, WatchdogConfig,
};
pub use degradation::{DegradationFlags, DegradationMode, DegradationState, TriggerReason};
pub use error::{ConfigError, GovernorError, ProbeError, StoreError};
pub use event::{EventHub, GovernorEvent, SubscriptionId};
pub use load::{LoadId, LoadNotifier, LoadRequest, LoadState, LoadTicket, Priority};
pub use pressure::{
    MemoryProbe, MemoryUsage, NoMemorySignal, PressureLevel, PressureSample, SampleSource,
};
pub use profile::{DeviceProfile, HostHints, PlatformClass, Tier};
pub use resource::{
    ReclaimAction, ReclaimCallback, ResidencyState, ResourceHandle, ResourceId, ResourceKind,
    SweepReason,
};
pub use session::{Lifecycle, MemorySnapshotStore, SessionSnapshot, SnapshotStore};
