//! The trust source contract.

use crate::chain::CertificateChain;
use crate::error::SourceError;
use crate::material::{AuxiliaryMaterial, TrustRootSet};
use async_trait::async_trait;
use uuid::Uuid;

/// A repository which can look up trust roots for authenticator attestation.
///
/// Sources may be backed by static configuration, a vendor metadata feed, or a database,
/// and may perform I/O on every call. The same source serves many registration ceremonies
/// concurrently, so lookups take `&self` and the trait requires `Send + Sync`.
///
/// Returned sets are immutable snapshots: an implementation may hand out the same set for
/// many calls, even with different arguments, but it MUST return an empty set for any
/// query that should not be trusted.
#[async_trait]
pub trait TrustSource: Send + Sync {
    /// A short name for this source, used in logs and audit records.
    fn name(&self) -> &str;

    /// Look up the trust roots registered for this authenticator model.
    ///
    /// If no trust roots for this AAGUID are found, or if authenticators with this AAGUID
    /// are not trusted, return an empty set. Absence of a record is indistinguishable from
    /// explicit distrust. Only return an error if the source could not determine trust.
    async fn find_trust_roots_for_aaguid(&self, aaguid: &Uuid)
        -> Result<TrustRootSet, SourceError>;

    /// Look up the trust roots applicable to this whole certificate chain.
    ///
    /// The same trust root may issue chains for several authenticator models. If only some
    /// of those models are trusted, this MUST return an empty set for chains of the others.
    /// An empty chain always yields an empty set.
    async fn find_trust_roots_for_chain(
        &self,
        chain: &CertificateChain,
    ) -> Result<TrustRootSet, SourceError>;

    /// Retrieve additional CRLs and/or intermediate certificates required to validate this
    /// chain. None of the returned certificates are trusted.
    async fn cert_store(
        &self,
        _chain: &CertificateChain,
    ) -> Result<Option<AuxiliaryMaterial>, SourceError> {
        Ok(None)
    }
}
