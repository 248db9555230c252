//! Possible errors that may occur during attestation trust resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reason an attestation chain was not trusted.
///
/// Variants are declared from least to most specific, so the derived `Ord` ranks them:
/// when several candidate paths fail, the greatest failure is the one reported. Revocation
/// is the strongest distrust signal and ranks highest.
#[derive(
    Debug, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TrustFailure {
    /// No trust root was found for the AAGUID or chain, or there were no roots to
    /// validate against.
    #[error("no trust root vouches for this authenticator")]
    Untrusted,
    /// Trust roots exist, but no path from the leaf to any of them could be built.
    #[error("no certificate path connects the attestation to a trust root")]
    PathUnresolvable,
    /// An issuing certificate is not permitted to act as a CA by its basic constraints,
    /// key usage or path length.
    #[error("a certificate in the attestation path violates its constraints")]
    ConstraintViolation,
    /// Revocation checking was required, but no current revocation list covered a
    /// certificate in the path.
    #[error("the revocation status of a certificate in the attestation path is unknown")]
    RevocationUnknown,
    /// A certificate in the path is not signed by its issuer.
    #[error("a certificate signature in the attestation path is invalid")]
    SignatureMismatch,
    /// A certificate in the path is outside of its validity interval.
    #[error("a certificate in the attestation path is expired or not yet valid")]
    Expired,
    /// A certificate in the path has been revoked by its issuer.
    #[error("a certificate in the attestation path has been revoked")]
    Revoked,
}

/// An error raised by a [crate::TrustSource] that could not determine trust.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source's backing store could not be reached.
    #[error("trust source {source_name} is unavailable: {reason}")]
    Unavailable {
        /// The name of the source.
        source_name: String,
        /// Why the source is unavailable.
        reason: String,
    },
    /// The source did not answer before the resolution deadline.
    #[error("trust source {source_name} did not answer in time")]
    TimedOut {
        /// The name of the source.
        source_name: String,
    },
    /// The source holds trust material that could not be processed.
    #[error("trust source material is invalid: {0}")]
    Material(String),
}

impl SourceError {
    /// The name of the source that failed, if known.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            SourceError::Unavailable { source_name, .. }
            | SourceError::TimedOut { source_name } => Some(source_name),
            SourceError::Material(_) => None,
        }
    }
}

impl From<openssl::error::ErrorStack> for SourceError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        SourceError::Material(e.to_string())
    }
}

/// The terminal error of an attestation trust resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// The attestation was rejected. `unavailable_sources` names any trust sources that
    /// did not contribute to the decision, for audit purposes.
    #[error("attestation rejected: {reason}")]
    Rejected {
        /// Why the attestation was rejected.
        reason: TrustFailure,
        /// Trust sources that were unavailable while this decision was made.
        unavailable_sources: Vec<String>,
    },
    /// A trust source was unavailable and the configured policy does not permit
    /// resolution to continue without it.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl TrustError {
    /// The failure this error represents. A source failure resolves to `Untrusted`, since
    /// trust could not be established.
    pub fn failure(&self) -> TrustFailure {
        match self {
            TrustError::Rejected { reason, .. } => *reason,
            TrustError::Source(_) => TrustFailure::Untrusted,
        }
    }
}

impl From<TrustFailure> for TrustError {
    fn from(reason: TrustFailure) -> Self {
        TrustError::Rejected {
            reason,
            unavailable_sources: Vec::new(),
        }
    }
}

/// An error loading trust configuration or the material it refers to.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration or material file could not be read.
    #[error("unable to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A certificate or revocation list could not be parsed.
    #[error("invalid certificate material in {path}: {source}")]
    Certificate {
        /// The file that held the material.
        path: String,
        /// The underlying error.
        source: openssl::error::ErrorStack,
    },
    /// A trust source could not be built from the configured material.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A setting is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),
}
