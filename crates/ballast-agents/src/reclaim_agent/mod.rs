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

//! Acts as the agent for heavy resource reclamation.
//!
//! Collaborators register the heavy resources they create (decoded images,
//! canvases, videos, scene assets) and keep the reclaimer informed of how far
//! each one is from the viewport. Under pressure, and on a slow background
//! cadence, off-screen resources are released, paused, or shrunk through their
//! owner's callback.

mod reclaimer;

pub use self::reclaimer::{ReclaimStats, ResourceReclaimer, SweepReport, SweepTarget};
