//! Security gate settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Actions permitted when no allow-list is configured.
pub const DEFAULT_ALLOWED_ACTIONS: [&str; 18] = [
    "light.on",
    "light.off",
    "light.brightness",
    "light.color",
    "light.color_temp",
    "switch.on",
    "switch.off",
    "switch.toggle",
    "ac.on",
    "ac.off",
    "ac.set_temp",
    "vacuum.start",
    "vacuum.stop",
    "vacuum.pause",
    "vacuum.home",
    "tv.power",
    "tv.vol_up",
    "tv.vol_down",
];

/// Rate limiting, allow-list and audit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Requests admitted per window.
    pub max_requests: usize,
    /// Sliding window length in seconds.
    pub window_secs: u64,
    /// Audit entries kept before the oldest is evicted.
    pub audit_capacity: usize,
    pub allowed_actions: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            audit_capacity: 1000,
            allowed_actions: DEFAULT_ALLOWED_ACTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
