use std::time::Duration;

use serde::Deserialize;

use crate::error::ScanError;
use crate::progress::DEFAULT_TOTAL_STEPS;
use crate::types::{ToastDuration, ToastPosition};

/// How long an identical notification stays suppressed after it was shown.
pub const DEFAULT_NOTIFICATION_WINDOW_MS: u64 = 3500;

/// Tunables for a scan session and its notifications.
///
/// Missing fields fall back to their defaults when parsed with [`SessionConfig::from_json`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, uniffi::Record)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Number of progress steps the chip reader reports for a full read.
    pub total_nfc_steps: u32,
    /// Duplicate-suppression window for notifications, in milliseconds.
    pub notification_window_ms: u64,
    /// How long notifications stay on screen.
    pub toast_duration: ToastDuration,
    /// Where notifications are placed.
    pub toast_position: ToastPosition,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_nfc_steps: DEFAULT_TOTAL_STEPS,
            notification_window_ms: DEFAULT_NOTIFICATION_WINDOW_MS,
            toast_duration: ToastDuration::Long,
            toast_position: ToastPosition::Center,
        }
    }
}

impl SessionConfig {
    /// Parses a config from JSON, applying defaults for absent fields.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidInput`] if the JSON is malformed or the step count is zero.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ScanError::InvalidInput {
            attribute: "config".to_string(),
            reason: e.to_string(),
        })?;
        if config.total_nfc_steps == 0 {
            return Err(ScanError::InvalidInput {
                attribute: "total_nfc_steps".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(config)
    }

    /// The notification window as a [`Duration`].
    #[must_use]
    pub const fn notification_window(&self) -> Duration {
        Duration::from_millis(self.notification_window_ms)
    }
}

/// Parses a [`SessionConfig`] from JSON. See [`SessionConfig::from_json`].
///
/// # Errors
///
/// Returns [`ScanError::InvalidInput`] if the JSON is invalid.
#[uniffi::export]
pub fn session_config_from_json(json: &str) -> Result<SessionConfig, ScanError> {
    SessionConfig::from_json(json)
}
