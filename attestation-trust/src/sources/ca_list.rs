use crate::chain::{fingerprint, name_der, CertificateChain};
use crate::error::SourceError;
use crate::material::{AuxiliaryMaterial, TrustRootSet};
use crate::source::TrustSource;
use async_trait::async_trait;
use openssl::x509::X509NameRef;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;
use webauthn_attestation_ca::{AttestationCa, AttestationCaList};

/// A trust source backed by a static [AttestationCaList].
///
/// AAGUID lookups only match CAs that list the AAGUID explicitly. Chain lookups match CAs
/// that could have issued any certificate in the chain, and then apply each CA's AAGUID
/// allow-list to the AAGUID the leaf declares, so that a root shared by several models only
/// vouches for the models it was configured for.
pub struct CaListTrustSource {
    name: String,
    cas: AttestationCaList,
    by_aaguid: BTreeMap<Uuid, TrustRootSet>,
    auxiliary: Option<AuxiliaryMaterial>,
}

impl CaListTrustSource {
    /// Create a source from this CA list. The answer to every AAGUID lookup is computed
    /// here, once.
    pub fn new<S: Into<String>>(name: S, cas: AttestationCaList) -> Result<Self, SourceError> {
        let aaguids: BTreeSet<Uuid> = cas
            .iter()
            .flat_map(|att_ca| att_ca.aaguids.iter().copied())
            .collect();

        let by_aaguid = aaguids
            .into_iter()
            .map(|aaguid| {
                let roots = cas.cas_for_aaguid(&aaguid).map(|att_ca| att_ca.ca.clone());
                TrustRootSet::new(roots).map(|set| (aaguid, set))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(CaListTrustSource {
            name: name.into(),
            cas,
            by_aaguid,
            auxiliary: None,
        })
    }

    /// Hand out this material from [TrustSource::cert_store] for every non-empty chain.
    /// Its intermediates also help this source match chains that omit them.
    pub fn with_auxiliary_material(mut self, auxiliary: AuxiliaryMaterial) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    /// The CAs this source was built from.
    pub fn cas(&self) -> &AttestationCaList {
        &self.cas
    }

    /// The issuer names of every certificate in the chain, extended through any of our own
    /// intermediates that bridge from one of them.
    fn issuer_names<'a>(&'a self, chain: &'a CertificateChain) -> Vec<&'a X509NameRef> {
        let mut names: Vec<&X509NameRef> = chain.iter().map(|cert| cert.issuer_name()).collect();
        let mut seen: BTreeSet<Vec<u8>> = names.iter().filter_map(|name| name_der(name)).collect();

        let mut grew = true;
        while grew {
            grew = false;
            for int in self.auxiliary.iter().flat_map(|aux| aux.intermediates()) {
                let bridges = name_der(int.subject_name())
                    .map(|subject| seen.contains(&subject))
                    .unwrap_or(false);
                if !bridges {
                    continue;
                }
                if let Some(issuer) = name_der(int.issuer_name()) {
                    if seen.insert(issuer) {
                        names.push(int.issuer_name());
                        grew = true;
                    }
                }
            }
        }

        names
    }

    fn roots_for_chain(&self, chain: &CertificateChain) -> Result<TrustRootSet, SourceError> {
        let aaguid = chain.aaguid();

        // A configured CA may be presented in the chain itself.
        let mut matched: Vec<&AttestationCa> = Vec::new();
        for cert in chain.iter() {
            if let Some(att_ca) = self.cas.get(&fingerprint(cert)?) {
                matched.push(att_ca);
            }
        }
        for name in self.issuer_names(chain) {
            matched.extend(self.cas.cas_with_subject(name));
        }

        let mut roots = Vec::new();
        for att_ca in matched {
            if att_ca.permits(aaguid.as_ref()) {
                roots.push(att_ca.ca.clone());
            } else {
                debug!(
                    ca = ?att_ca.ca.subject_name(),
                    ?aaguid,
                    "attestation ca does not permit this authenticator model"
                );
            }
        }

        TrustRootSet::new(roots).map_err(SourceError::from)
    }
}

#[async_trait]
impl TrustSource for CaListTrustSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_trust_roots_for_aaguid(
        &self,
        aaguid: &Uuid,
    ) -> Result<TrustRootSet, SourceError> {
        Ok(self.by_aaguid.get(aaguid).cloned().unwrap_or_default())
    }

    async fn find_trust_roots_for_chain(
        &self,
        chain: &CertificateChain,
    ) -> Result<TrustRootSet, SourceError> {
        self.roots_for_chain(chain)
    }

    async fn cert_store(
        &self,
        chain: &CertificateChain,
    ) -> Result<Option<AuxiliaryMaterial>, SourceError> {
        if chain.is_empty() {
            Ok(None)
        } else {
            Ok(self.auxiliary.clone())
        }
    }
}
