//! Validator run configuration
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use std::fs;
use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::errors::{ValidatorError, ValidatorResult};

bitflags! {
    /// Categories of checks a run performs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CheckFlags: u32 {
        /// Null and dead references in not-null fields
        const NOT_NULL = 1 << 0;
        /// Empty strings and lists in non-empty fields
        const NON_EMPTY = 1 << 1;
        /// Cross-object unique values
        const UNIQUE_VALUES = 1 << 2;
        /// Tag-constrained strings
        const TAGS = 1 << 3;
        /// Registered custom validators
        const CUSTOM_VALIDATORS = 1 << 4;
        /// Self-validating types
        const SELF_CHECKS = 1 << 5;
        /// Condition attributes
        const CONDITIONS = 1 << 6;
        /// Event callback lists
        const EVENTS = 1 << 7;
        /// Enum membership
        const ENUMS = 1 << 8;
        /// Host resource properties
        const HOST_RESOURCES = 1 << 9;
        /// Serialized references to destroyed objects
        const MISSING_REFERENCES = 1 << 10;
        /// Required sibling capabilities
        const REQUIRED_COMPONENTS = 1 << 11;
        /// Destroyed children of containers
        const MISSING_COMPONENTS = 1 << 12;
    }
}

impl Default for CheckFlags {
    fn default() -> Self {
        CheckFlags::all()
    }
}

/// Parallel jobs per launched batch.
pub const BATCH_SIZE: usize = 100;

/// Inner failures carried by a fatal job-failure report.
pub const MAX_REPORTED_FAILURES: usize = 25;

fn default_batch_size() -> usize {
    BATCH_SIZE
}

fn default_poll_delay_ms() -> u64 {
    10
}

fn default_progress_interval_ms() -> u64 {
    33
}

fn default_max_reported_failures() -> usize {
    MAX_REPORTED_FAILURES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub checks: CheckFlags,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Sleep between polls while parallel batches are still running.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    /// Minimum interval between progress callbacks (about 30 per second).
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_max_reported_failures")]
    pub max_reported_failures: usize,
    /// Threads of a dedicated batch pool. 0 uses the global rayon pool.
    #[serde(default)]
    pub worker_threads: usize,
    /// Report a duplicate even when every observation comes from one owner.
    #[serde(default)]
    pub report_same_owner_duplicates: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            checks: CheckFlags::default(),
            batch_size: default_batch_size(),
            poll_delay_ms: default_poll_delay_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            max_reported_failures: default_max_reported_failures(),
            worker_threads: 0,
            report_same_owner_duplicates: false,
        }
    }
}

impl ValidatorConfig {
    /// Config with only the given check categories enabled.
    pub fn with_checks(checks: CheckFlags) -> Self {
        Self {
            checks,
            ..Self::default()
        }
    }

    /// Loads and validates a JSON config file.
    pub fn load(path: &Path) -> ValidatorResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ValidatorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ValidatorConfig = serde_json::from_str(&contents).map_err(|e| {
            ValidatorError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ValidatorResult<()> {
        if self.batch_size == 0 {
            return Err(ValidatorError::Config("batch_size must be at least 1".into()));
        }
        if self.max_reported_failures == 0 {
            return Err(ValidatorError::Config(
                "max_reported_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn enabled(&self, flags: CheckFlags) -> bool {
        self.checks.contains(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.checks, CheckFlags::all());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_delay_ms, 10);
        assert_eq!(config.max_reported_failures, 25);
        assert!(!config.report_same_owner_duplicates);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: ValidatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_with_checks() {
        let config = ValidatorConfig::with_checks(CheckFlags::NOT_NULL | CheckFlags::NON_EMPTY);
        assert!(config.enabled(CheckFlags::NOT_NULL));
        assert!(!config.enabled(CheckFlags::TAGS));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_size": 7, "report_same_owner_duplicates": true}}"#).unwrap();

        let config = ValidatorConfig::load(file.path()).unwrap();
        assert_eq!(config.batch_size, 7);
        assert!(config.report_same_owner_duplicates);
        assert_eq!(config.poll_delay_ms, 10);
    }

    #[test]
    fn test_load_rejects_zero_batch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_size": 0}}"#).unwrap();
        assert!(matches!(
            ValidatorConfig::load(file.path()),
            Err(ValidatorError::Config(_))
        ));
    }

    #[test]
    fn test_flags_roundtrip_through_json() {
        let config = ValidatorConfig::with_checks(CheckFlags::TAGS | CheckFlags::ENUMS);
        let json = serde_json::to_string(&config).unwrap();
        let back: ValidatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.checks, CheckFlags::TAGS | CheckFlags::ENUMS);
    }
}
