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

//! # Ballast Agents
//!
//! The acting side of the governor. Each agent owns one duty and reports what
//! it did as [`GovernorEvent`](ballast_core::event::GovernorEvent)s pushed onto
//! a caller-supplied buffer, leaving dispatch to the control layer:
//!
//! - [`load_agent`]: concurrency-limited admission of heavy asset loads.
//! - [`reclaim_agent`]: release of off-screen heavy resources.
//! - [`recovery_agent`]: session snapshots and crash detection.

#![warn(missing_docs)]

pub mod load_agent;
pub mod reclaim_agent;
pub mod recovery_agent;

pub use load_agent::{LoadScheduler, SchedulerStats};
pub use reclaim_agent::{ReclaimStats, ResourceReclaimer, SweepReport, SweepTarget};
pub use recovery_agent::{RestoreOutcome, SessionRecovery};
