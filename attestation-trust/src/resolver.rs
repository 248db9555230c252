//! Resolving the trust anchor of an attestation.

use crate::aggregate::{AggregateTrustSource, Aggregated};
use crate::chain::CertificateChain;
use crate::config::TrustConfig;
use crate::error::{SourceError, TrustError, TrustFailure};
use crate::material::TrustRootSet;
use crate::source::TrustSource;
use crate::validator::{ChainValidator, VerifiedAnchor};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// The result of a successful resolution.
#[derive(Debug, Clone)]
pub struct TrustResolution {
    /// The trust root the attestation chain was verified against.
    pub anchor: VerifiedAnchor,
    /// Trust sources that were unavailable while this decision was made.
    pub unavailable_sources: Vec<String>,
}

/// Decides whether an authenticator's attestation is trusted, and by which root.
///
/// This is the only part of this crate a registration ceremony needs: it gathers trust
/// roots and auxiliary material from every configured source, and verifies the chain
/// against them.
pub struct AttestationTrustResolver {
    sources: AggregateTrustSource,
    validator: ChainValidator,
}

/// Builds an [AttestationTrustResolver].
pub struct ResolverBuilder {
    sources: AggregateTrustSource,
    validator: ChainValidator,
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        ResolverBuilder {
            sources: AggregateTrustSource::new("resolver"),
            validator: ChainValidator::default(),
        }
    }
}

impl ResolverBuilder {
    /// A builder with default policy and no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the policy settings of this configuration.
    pub fn with_config(mut self, config: &TrustConfig) -> Self {
        self.sources = self
            .sources
            .with_combine_policy(config.combine)
            .with_unavailable_policy(config.on_unavailable)
            .with_timeout(config.timeout());
        self.validator = config.validator();
        self
    }

    /// Add a trust source. Sources are consulted in the order they are added.
    pub fn with_source<T: TrustSource + 'static>(mut self, source: T) -> Self {
        self.sources = self.sources.with_source(source);
        self
    }

    /// Add a trust source that is shared with other resolvers.
    pub fn with_shared_source(mut self, source: Arc<dyn TrustSource>) -> Self {
        self.sources = self.sources.with_shared_source(source);
        self
    }

    /// Replace the chain validator.
    pub fn with_validator(mut self, validator: ChainValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Build the resolver.
    pub fn build(self) -> AttestationTrustResolver {
        AttestationTrustResolver {
            sources: self.sources,
            validator: self.validator,
        }
    }
}

impl AttestationTrustResolver {
    /// Build a resolver with this configuration over these sources.
    pub fn from_config(config: &TrustConfig, sources: Vec<Arc<dyn TrustSource>>) -> Self {
        sources
            .into_iter()
            .fold(ResolverBuilder::new().with_config(config), |builder, source| {
                builder.with_shared_source(source)
            })
            .build()
    }

    /// The aggregate of every configured source.
    pub fn sources(&self) -> &AggregateTrustSource {
        &self.sources
    }

    /// The chain validator.
    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// Resolve the trust anchor of this attestation at time `now`.
    ///
    /// `aaguid` is the authenticator model the attestation claims to be. If the leaf
    /// certificate carries a different AAGUID in its FIDO extension, the claimed model is
    /// not used to find trust roots.
    pub async fn resolve(
        &self,
        aaguid: Option<Uuid>,
        chain: &CertificateChain,
        now: SystemTime,
    ) -> Result<TrustResolution, TrustError> {
        debug!(?aaguid, chain_len = chain.len(), "resolving attestation trust");

        if chain.is_empty() {
            debug!("empty attestation chain");
            return Err(TrustFailure::Untrusted.into());
        }

        let lookup_aaguid = match (aaguid, chain.aaguid()) {
            (Some(declared), Some(certified)) if declared != certified => {
                warn!(
                    %declared,
                    %certified,
                    "declared aaguid does not match the attestation certificate, ignoring it"
                );
                None
            }
            (declared, _) => declared,
        };

        let deadline = self.sources.deadline();

        let by_aaguid = async {
            match lookup_aaguid {
                Some(aaguid) => self.sources.query_aaguid(&aaguid, deadline).await,
                None => Ok(Aggregated {
                    value: TrustRootSet::empty(),
                    unavailable: Vec::new(),
                }),
            }
        };
        // Intermediates from any source may bridge the chain to another source's roots, so
        // the chain lookup sees them too.
        let by_chain = async {
            let auxiliary = self.sources.query_cert_store(chain, deadline).await?;
            let by_chain = match auxiliary.value.as_ref() {
                Some(aux) if !aux.intermediates().is_empty() => {
                    let extended = chain
                        .iter()
                        .chain(aux.intermediates())
                        .cloned()
                        .collect::<Vec<_>>();
                    self.sources
                        .query_chain(&CertificateChain::from(extended), deadline)
                        .await?
                }
                _ => self.sources.query_chain(chain, deadline).await?,
            };
            Ok::<_, SourceError>((by_chain, auxiliary))
        };

        let (by_aaguid, by_chain) = futures::join!(by_aaguid, by_chain);
        let (by_aaguid, (by_chain, auxiliary)) = (by_aaguid?, by_chain?);

        let mut unavailable_sources: Vec<String> = Vec::new();
        for name in by_aaguid
            .unavailable
            .into_iter()
            .chain(by_chain.unavailable)
            .chain(auxiliary.unavailable)
        {
            if !unavailable_sources.contains(&name) {
                unavailable_sources.push(name);
            }
        }

        let roots = by_aaguid.value.union(&by_chain.value);
        debug!(roots = roots.len(), "gathered trust roots");

        match self
            .validator
            .validate(chain, &roots, auxiliary.value.as_ref(), now)
        {
            Ok(anchor) => {
                info!(
                    ?aaguid,
                    anchor = ?anchor.anchor().subject_name(),
                    unavailable = ?unavailable_sources,
                    "attestation trusted"
                );
                Ok(TrustResolution {
                    anchor,
                    unavailable_sources,
                })
            }
            Err(reason) => {
                info!(
                    ?aaguid,
                    %reason,
                    unavailable = ?unavailable_sources,
                    "attestation rejected"
                );
                Err(TrustError::Rejected {
                    reason,
                    unavailable_sources,
                })
            }
        }
    }

    /// Resolve the trust anchor of this attestation at the current system time.
    pub async fn resolve_now(
        &self,
        aaguid: Option<Uuid>,
        chain: &CertificateChain,
    ) -> Result<TrustResolution, TrustError> {
        self.resolve(aaguid, chain, SystemTime::now()).await
    }
}
