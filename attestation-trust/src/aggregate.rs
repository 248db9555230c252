//! Combining the answers of several trust sources.

use crate::chain::CertificateChain;
use crate::error::SourceError;
use crate::material::{AuxiliaryMaterial, TrustRootSet};
use crate::source::TrustSource;
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// How the trust roots of several sources combine into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    /// An authenticator is trusted if any source trusts it. Roots are de-duplicated.
    #[default]
    Union,
    /// A root is only returned if every source returned it. An unavailable source
    /// contributes nothing, so the result is empty.
    Intersection,
    /// The first source, in configured order, with a non-empty answer decides.
    FirstMatch,
}

/// What to do when a source fails or does not answer before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Continue with the remaining sources. The unavailable source contributes an empty
    /// answer and is named in [Aggregated::unavailable].
    #[default]
    Degrade,
    /// Fail the whole lookup.
    FailClosed,
}

/// A combined answer, and the names of the sources that could not contribute to it.
#[derive(Debug, Clone)]
pub struct Aggregated<T> {
    /// The combined answer.
    pub value: T,
    /// Sources that failed or timed out, in configured order.
    pub unavailable: Vec<String>,
}

/// A trust source that asks every one of its member sources, concurrently, and combines
/// the answers according to a [CombinePolicy].
///
/// Every member is always queried, since auxiliary material may need merging even when
/// only one member contributes trust roots. A single deadline bounds the whole fan-out;
/// members that have not answered by then contribute nothing.
pub struct AggregateTrustSource {
    name: String,
    sources: Vec<Arc<dyn TrustSource>>,
    combine: CombinePolicy,
    on_unavailable: UnavailablePolicy,
    timeout: Option<Duration>,
}

type Answers<'a, T> = Vec<(&'a str, Result<T, SourceError>)>;

impl AggregateTrustSource {
    /// An aggregate with no members. It trusts nothing until sources are added.
    pub fn new<S: Into<String>>(name: S) -> Self {
        AggregateTrustSource {
            name: name.into(),
            sources: Vec::new(),
            combine: CombinePolicy::default(),
            on_unavailable: UnavailablePolicy::default(),
            timeout: None,
        }
    }

    /// Add a member source.
    pub fn with_source<T: TrustSource + 'static>(self, source: T) -> Self {
        self.with_shared_source(Arc::new(source))
    }

    /// Add a member source that is shared with other owners.
    pub fn with_shared_source(mut self, source: Arc<dyn TrustSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Set how member answers combine.
    pub fn with_combine_policy(mut self, combine: CombinePolicy) -> Self {
        self.combine = combine;
        self
    }

    /// Set what happens when a member is unavailable.
    pub fn with_unavailable_policy(mut self, on_unavailable: UnavailablePolicy) -> Self {
        self.on_unavailable = on_unavailable;
        self
    }

    /// Bound every lookup by this overall timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The number of member sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True if there are no member sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The configured combination policy.
    pub fn combine_policy(&self) -> CombinePolicy {
        self.combine
    }

    /// The deadline a lookup started now must finish by, if a timeout is configured.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }

    /// Ask every member for the roots of this authenticator model.
    pub async fn query_aaguid<'a>(
        &'a self,
        aaguid: &'a Uuid,
        deadline: Option<Instant>,
    ) -> Result<Aggregated<TrustRootSet>, SourceError> {
        let answers = self
            .fan_out(deadline, |source| source.find_trust_roots_for_aaguid(aaguid))
            .await;
        self.combine_roots(answers)
    }

    /// Ask every member for the roots of this chain.
    pub async fn query_chain<'a>(
        &'a self,
        chain: &'a CertificateChain,
        deadline: Option<Instant>,
    ) -> Result<Aggregated<TrustRootSet>, SourceError> {
        let answers = self
            .fan_out(deadline, |source| source.find_trust_roots_for_chain(chain))
            .await;
        self.combine_roots(answers)
    }

    /// Ask every member for auxiliary material for this chain, and concatenate it.
    pub async fn query_cert_store<'a>(
        &'a self,
        chain: &'a CertificateChain,
        deadline: Option<Instant>,
    ) -> Result<Aggregated<Option<AuxiliaryMaterial>>, SourceError> {
        let answers = self
            .fan_out(deadline, |source| source.cert_store(chain))
            .await;
        let (values, unavailable) = self.settle(answers)?;
        let value = AuxiliaryMaterial::merge_all(values.into_iter().flatten().flatten());
        Ok(Aggregated { value, unavailable })
    }

    async fn fan_out<'a, T, F>(&'a self, deadline: Option<Instant>, query: F) -> Answers<'a, T>
    where
        F: Fn(&'a dyn TrustSource) -> BoxFuture<'a, Result<T, SourceError>>,
    {
        let pending = self.sources.iter().map(|source| {
            let source_name = source.name();
            let answer = query(source.as_ref());
            async move {
                let result = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, answer)
                        .await
                        .unwrap_or_else(|_| {
                            Err(SourceError::TimedOut {
                                source_name: source_name.to_string(),
                            })
                        }),
                    None => answer.await,
                };
                (source_name, result)
            }
        });

        join_all(pending).await
    }

    /// Split answers into per-source values, in configured order, and the names of the
    /// sources that failed. A failed source has no value.
    fn settle<T>(
        &self,
        answers: Answers<'_, T>,
    ) -> Result<(Vec<Option<T>>, Vec<String>), SourceError> {
        let mut values = Vec::with_capacity(answers.len());
        let mut unavailable = Vec::new();

        for (source_name, result) in answers {
            match result {
                Ok(value) => values.push(Some(value)),
                Err(e) => {
                    warn!(
                        aggregate = %self.name,
                        source = %source_name,
                        error = %e,
                        "trust source unavailable"
                    );
                    if self.on_unavailable == UnavailablePolicy::FailClosed {
                        return Err(e);
                    }
                    unavailable.push(source_name.to_string());
                    values.push(None);
                }
            }
        }

        Ok((values, unavailable))
    }

    fn combine_roots(
        &self,
        answers: Answers<'_, TrustRootSet>,
    ) -> Result<Aggregated<TrustRootSet>, SourceError> {
        for (source_name, result) in answers.iter() {
            if let Ok(roots) = result {
                debug!(source = %source_name, roots = roots.len(), "trust source answered");
            }
        }

        let (values, unavailable) = self.settle(answers)?;

        let value = match self.combine {
            CombinePolicy::Union => values
                .iter()
                .flatten()
                .fold(TrustRootSet::empty(), |acc, roots| acc.union(roots)),
            CombinePolicy::Intersection => {
                if values.iter().any(Option::is_none) {
                    // An unavailable member can't agree to anything.
                    TrustRootSet::empty()
                } else {
                    values
                        .iter()
                        .flatten()
                        .cloned()
                        .reduce(|acc, roots| acc.intersection(&roots))
                        .unwrap_or_default()
                }
            }
            CombinePolicy::FirstMatch => values
                .into_iter()
                .flatten()
                .find(|roots| !roots.is_empty())
                .unwrap_or_default(),
        };

        Ok(Aggregated { value, unavailable })
    }
}

#[async_trait]
impl TrustSource for AggregateTrustSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_trust_roots_for_aaguid(
        &self,
        aaguid: &Uuid,
    ) -> Result<TrustRootSet, SourceError> {
        self.query_aaguid(aaguid, self.deadline())
            .await
            .map(|answer| answer.value)
    }

    async fn find_trust_roots_for_chain(
        &self,
        chain: &CertificateChain,
    ) -> Result<TrustRootSet, SourceError> {
        self.query_chain(chain, self.deadline())
            .await
            .map(|answer| answer.value)
    }

    async fn cert_store(
        &self,
        chain: &CertificateChain,
    ) -> Result<Option<AuxiliaryMaterial>, SourceError> {
        self.query_cert_store(chain, self.deadline())
            .await
            .map(|answer| answer.value)
    }
}
