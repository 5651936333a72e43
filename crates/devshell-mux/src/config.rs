//! Multiplexer configuration
//!
//! All delays are settle heuristics, not synchronization: the remote shell and
//! the rendering surface give no readiness signal, so the multiplexer waits a
//! fixed time before acting. Durations are expressed in milliseconds on the wire.

use std::time::Duration;

use devshell_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Host platform, used to pick the shell command separator for quick launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Unix,
    Windows,
}

impl Platform {
    /// Detect from a `navigator.platform`-style string
    pub fn detect(platform: &str) -> Self {
        if platform.to_lowercase().starts_with("win") {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// PowerShell chains with `;` rather than `&&`
    pub fn command_separator(&self) -> &'static str {
        match self {
            Platform::Unix => " && ",
            Platform::Windows => "; ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Wait after a channel opens before fitting and sending the first resize
    #[serde(with = "millis")]
    pub open_fit_delay: Duration,
    /// Wait after a tab is created before fitting and focusing its surface
    #[serde(with = "millis")]
    pub open_settle_delay: Duration,
    /// Wait after a focus change before fitting and focusing the surface
    #[serde(with = "millis")]
    pub focus_settle_delay: Duration,
    /// Wait after a channel opens before injecting the initial command
    #[serde(with = "millis")]
    pub command_settle_delay: Duration,
    /// Quiet period that coalesces viewport changes into one resize
    #[serde(with = "millis")]
    pub resize_debounce: Duration,
    /// Horizontal travel before a touch is classified as a swipe
    pub swipe_classify_distance: f64,
    /// Horizontal travel a swipe needs at touch end to switch tabs
    pub swipe_commit_distance: f64,
    /// Geometry used when the surface cannot be measured, and for new sessions
    pub default_geometry: Geometry,
    pub platform: Platform,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            open_fit_delay: Duration::from_millis(100),
            open_settle_delay: Duration::from_millis(150),
            focus_settle_delay: Duration::from_millis(50),
            command_settle_delay: Duration::from_millis(500),
            resize_debounce: Duration::from_millis(250),
            swipe_classify_distance: 50.0,
            swipe_commit_distance: 100.0,
            default_geometry: Geometry::default(),
            platform: Platform::Unix,
        }
    }
}

impl MuxConfig {
    /// Parse a (possibly partial) JSON object; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
