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

//! Resource pressure types and the memory probe contract.
//!
//! "Pressure" is a normalised usage ratio (`used / budget`) bucketed into
//! three levels. The probe trait is the seam through which a host reports
//! memory usage; `ballast-infra` provides a `sysinfo`-backed implementation.

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};

/// Bucketed pressure level. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum PressureLevel {
    /// Usage below the warning threshold.
    #[default]
    Normal,
    /// Usage between the warning and critical thresholds.
    Warning,
    /// Usage at or above the critical threshold.
    Critical,
}

impl PressureLevel {
    /// Buckets a usage ratio against the two thresholds.
    ///
    /// Ratios below `warning` are Normal, `[warning, critical)` Warning, and
    /// `>= critical` Critical. Non-finite ratios are treated as Critical.
    pub fn from_ratio(ratio: f64, warning: f64, critical: f64) -> Self {
        if !ratio.is_finite() || ratio >= critical {
            PressureLevel::Critical
        } else if ratio >= warning {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }
}

/// Where a sample's level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleSource {
    /// Derived from a usable memory reading.
    Memory,
    /// The host offered no memory signal; derived from frame timing.
    FrameTime,
    /// Forced after repeated sampling failures.
    Defensive,
}

/// One pressure reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureSample {
    /// When the sample was taken. Non-decreasing across a monitor's samples.
    pub timestamp_ms: u64,
    /// Bytes in use.
    pub used_bytes: u64,
    /// Budget against which usage is normalised.
    pub budget_bytes: u64,
    /// Bucketed level.
    pub level: PressureLevel,
    /// Origin of the level.
    pub source: SampleSource,
}

impl PressureSample {
    /// Returns `used / budget`, or 0.0 for a zero budget.
    pub fn ratio(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.budget_bytes as f64
    }
}

/// A raw memory reading from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    /// Bytes currently in use by the process.
    pub used_bytes: u64,
    /// The host-reported limit, if known. The profile budget is used otherwise.
    pub limit_bytes: Option<u64>,
}

/// Host seam for reading memory usage.
pub trait MemoryProbe: Send {
    /// Takes one reading.
    ///
    /// Returns `Ok(None)` when the host offers no usable memory signal, and an
    /// error when the reading itself failed.
    fn sample(&mut self) -> Result<Option<MemoryUsage>, ProbeError>;
}

/// A probe for hosts with no memory signal at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemorySignal;

impl MemoryProbe for NoMemorySignal {
    fn sample(&mut self) -> Result<Option<MemoryUsage>, ProbeError> {
        Ok(None)
    }
}
