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

//! Device capability classification types.

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// The broad class of host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformClass {
    /// A desktop or laptop host.
    #[default]
    Desktop,
    /// A phone-class host.
    Mobile,
    /// A tablet-class host.
    Tablet,
}

/// Ordinal device-capability tier in `[1, 5]`. Higher is more capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tier(u8);

impl Tier {
    /// The least capable tier.
    pub const MIN: Tier = Tier(1);
    /// The most capable tier.
    pub const MAX: Tier = Tier(5);
    /// The tier assumed when host hints are absent or implausible.
    pub const CONSERVATIVE: Tier = Tier(2);

    /// Creates a tier, clamping `value` into `[1, 5]`.
    pub fn new(value: i32) -> Self {
        Tier(value.clamp(Self::MIN.0 as i32, Self::MAX.0 as i32) as u8)
    }

    /// Returns the ordinal value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Returns the tier one step below, saturating at [`Tier::MIN`].
    pub fn downgrade(self) -> Self {
        Tier::new(self.0 as i32 - 1)
    }

    /// Default heap budget for this tier when the host reports no limit.
    pub fn memory_budget_bytes(self) -> u64 {
        match self.0 {
            1 => 64 * MIB,
            2 => 128 * MIB,
            3 => 256 * MIB,
            4 => 512 * MIB,
            _ => 1024 * MIB,
        }
    }

    /// Distance (in pixels) beyond the viewport at which a resource counts as off-screen.
    ///
    /// Weaker devices reclaim closer to the viewport.
    pub fn viewport_margin_px(self) -> f32 {
        match self.0 {
            1 => 200.0,
            2 => 350.0,
            3 => 500.0,
            4 => 600.0,
            _ => 700.0,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier-{}", self.0)
    }
}

/// Host capability classification. Created once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Capability tier.
    pub tier: Tier,
    /// Memory budget used to normalise pressure samples.
    pub memory_budget_bytes: u64,
    /// Number of logical cores reported by the host.
    pub logical_core_count: u32,
    /// `true` when running inside a restrictive embedding (e.g. an in-app browser).
    pub is_constrained_host_context: bool,
    /// The platform class.
    pub platform_class: PlatformClass,
}

impl DeviceProfile {
    /// Returns `true` for the two lowest tiers.
    pub fn is_low_end(&self) -> bool {
        self.tier <= Tier::CONSERVATIVE
    }

    /// Off-screen margin for this profile's tier.
    pub fn viewport_margin_px(&self) -> f32 {
        self.tier.viewport_margin_px()
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        let tier = Tier::CONSERVATIVE;
        Self {
            tier,
            memory_budget_bytes: tier.memory_budget_bytes(),
            logical_core_count: 2,
            is_constrained_host_context: false,
            platform_class: PlatformClass::Desktop,
        }
    }
}

/// Raw hints reported by the host, from which a [`DeviceProfile`] is derived.
///
/// Every field is optional; missing values are filled in heuristically or
/// fall back to conservative defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostHints {
    /// Reported device memory in gigabytes.
    pub device_memory_gb: Option<f32>,
    /// Reported logical core count.
    pub logical_cores: Option<u32>,
    /// User-agent-equivalent identification string.
    pub user_agent: Option<String>,
    /// Maximum simultaneous touch points, if the host has a touch surface.
    pub max_touch_points: Option<u32>,
    /// Explicit platform class; derived from the user agent when absent.
    pub platform: Option<PlatformClass>,
    /// Explicit constrained-host flag; derived from the user agent when absent.
    pub constrained_host: Option<bool>,
}

impl HostHints {
    /// Creates empty hints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reported device memory.
    pub fn with_memory_gb(mut self, gb: f32) -> Self {
        self.device_memory_gb = Some(gb);
        self
    }

    /// Sets the reported logical core count.
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.logical_cores = Some(cores);
        self
    }

    /// Sets the user-agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the touch point count.
    pub fn with_touch_points(mut self, points: u32) -> Self {
        self.max_touch_points = Some(points);
        self
    }

    /// Forces the platform class.
    pub fn with_platform(mut self, platform: PlatformClass) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Forces the constrained-host flag.
    pub fn with_constrained_host(mut self, constrained: bool) -> Self {
        self.constrained_host = Some(constrained);
        self
    }
}
