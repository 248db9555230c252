//! Resolution policy configuration.

use crate::aggregate::{CombinePolicy, UnavailablePolicy};
use crate::error::ConfigError;
use crate::validator::{ChainValidator, RevocationMode, DEFAULT_MAX_PATH_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Policy for an [crate::AttestationTrustResolver]. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustConfig {
    /// How the trust roots of several sources combine.
    pub combine: CombinePolicy,
    /// What to do when a source is unavailable.
    pub on_unavailable: UnavailablePolicy,
    /// The deadline for all trust source lookups of a single resolution, in milliseconds.
    /// `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    /// How revocation lists are consulted.
    pub revocation: RevocationMode,
    /// Check basic constraints, key usage and path length of issuing certificates.
    pub check_constraints: bool,
    /// The maximum number of certificates in a path, excluding the trust root.
    pub max_path_depth: usize,
}

impl Default for TrustConfig {
    fn default() -> Self {
        TrustConfig {
            combine: CombinePolicy::default(),
            on_unavailable: UnavailablePolicy::default(),
            timeout_ms: None,
            revocation: RevocationMode::default(),
            check_constraints: true,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

impl TrustConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: TrustConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Reject settings that could never resolve anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_path_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_path_depth must be at least 1".to_string(),
            ));
        }

        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The lookup deadline as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// A validator configured with these settings.
    pub fn validator(&self) -> ChainValidator {
        ChainValidator::new()
            .with_revocation(self.revocation)
            .with_constraint_checks(self.check_constraints)
            .with_max_path_depth(self.max_path_depth)
    }
}
