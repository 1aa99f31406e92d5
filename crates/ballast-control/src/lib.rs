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

//! # Ballast Control
//!
//! The deciding side of the governor.
//!
//! - [`profiler`]: one-shot classification of the host into a tier.
//! - [`degradation`]: the Normal/Degraded state machine.
//! - [`context`]: [`GovernorState`], the aggregate every step mutates, and its
//!   read model [`GovernorStatus`].
//! - [`governor`]: [`Governor`], the single serializing context that wires the
//!   telemetry and agents together and dispatches their events.
//! - [`service`]: [`GovernorService`], which runs a governor on its own thread
//!   behind a command channel.

#![warn(missing_docs)]

pub mod context;
pub mod degradation;
pub mod governor;
pub mod profiler;
pub mod service;

pub use context::{GovernorState, GovernorStatus};
pub use degradation::DegradationController;
pub use governor::Governor;
pub use profiler::EnvironmentProfiler;
pub use service::{GovernorCommand, GovernorHandle, GovernorService};
