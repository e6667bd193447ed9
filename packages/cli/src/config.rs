//! Notifier threshold configuration.
//!
//! Thresholds are written in hours and customer counts, either as CLI
//! flags or in a TOML file, and converted to minute-based [`Thresholds`]
//! before reaching the comparator.

use std::path::Path;

use outage_map_outage_models::Thresholds;
use serde::Deserialize;

/// Errors that can occur while loading a notifier config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid notifier config.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Threshold settings as an operator writes them.
///
/// ```toml
/// remaining_expected_length_threshold = 4.0
/// customer_threshold = 100
/// large_outage_customer_threshold = 1000
/// elapsed_time_threshold = 1.5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifierConfig {
    /// Hours until the restoration estimate.
    pub remaining_expected_length_threshold: f64,
    /// Minimum customers impacted for the three-condition rule.
    pub customer_threshold: u64,
    /// Customers impacted at which an outage is notable on its own.
    pub large_outage_customer_threshold: u64,
    /// Hours the outage has already lasted.
    pub elapsed_time_threshold: f64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            remaining_expected_length_threshold: 0.0,
            customer_threshold: 100,
            large_outage_customer_threshold: 1000,
            elapsed_time_threshold: 0.0,
        }
    }
}

impl NotifierConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is malformed or has
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Converts to comparator thresholds.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::from_hours(
            self.remaining_expected_length_threshold,
            self.customer_threshold,
            self.large_outage_customer_threshold,
            self.elapsed_time_threshold,
        )
    }

    /// Logs the effective thresholds in both hours and minutes.
    pub fn log(&self) {
        let thresholds = self.thresholds();
        log::info!(
            "Expected length threshold: {} hours ({} minutes)",
            self.remaining_expected_length_threshold,
            thresholds.expected_length_threshold_minutes
        );
        log::info!("Customer threshold: {}", self.customer_threshold);
        log::info!(
            "Large outage customer threshold: {}",
            self.large_outage_customer_threshold
        );
        log::info!(
            "Elapsed time threshold: {} hours ({} minutes)",
            self.elapsed_time_threshold,
            thresholds.elapsed_time_threshold_minutes
        );
    }
}
