//! Attestation CA descriptions.
//!
//! These types describe the attestation root certificates a relying party is prepared to
//! trust, and which authenticator models (AAGUIDs) each root may vouch for. They are pure
//! trust *material*: deciding whether a presented chain actually validates against them is
//! the job of `webauthn-attestation-trust`.

#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use base64urlsafedata::Base64UrlSafeData;
use openssl::error::ErrorStack as OpenSSLErrorStack;
use openssl::{hash, x509};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

/// A serialised Attestation CA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialisableAttestationCa {
    pub(crate) ca: Base64UrlSafeData,
    #[serde(default)]
    pub(crate) aaguids: BTreeSet<Uuid>,
}

/// A structure representing an Attestation CA and the authenticator models it may attest.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SerialisableAttestationCa")]
pub struct AttestationCa {
    /// The x509 root CA of the attestation chain that a security key will be attested to.
    pub ca: x509::X509,
    /// If not empty, the set of acceptable AAGUIDS (Device Ids) that are allowed to be
    /// attested as trusted by this CA. AAGUIDS that are not in this set, but signed by
    /// this CA will NOT be trusted.
    pub aaguids: BTreeSet<Uuid>,
}

impl Serialize for AttestationCa {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let der = self.ca.to_der().map_err(serde::ser::Error::custom)?;
        SerialisableAttestationCa {
            ca: Base64UrlSafeData::from(der),
            aaguids: self.aaguids.clone(),
        }
        .serialize(serializer)
    }
}

impl TryFrom<SerialisableAttestationCa> for AttestationCa {
    type Error = OpenSSLErrorStack;

    fn try_from(data: SerialisableAttestationCa) -> Result<Self, Self::Error> {
        Ok(AttestationCa {
            ca: x509::X509::from_der(data.ca.as_ref())?,
            aaguids: data.aaguids,
        })
    }
}

impl TryFrom<&[u8]> for AttestationCa {
    type Error = OpenSSLErrorStack;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::new_from_pem(data)
    }
}

impl From<x509::X509> for AttestationCa {
    fn from(ca: x509::X509) -> Self {
        AttestationCa {
            ca,
            aaguids: BTreeSet::default(),
        }
    }
}

impl AttestationCa {
    /// Create an attestation CA that trusts every model it issues, from a PEM certificate.
    pub fn new_from_pem(data: &[u8]) -> Result<Self, OpenSSLErrorStack> {
        x509::X509::from_pem(data).map(Self::from)
    }

    /// Create an attestation CA that trusts every model it issues, from a DER certificate.
    pub fn new_from_der(data: &[u8]) -> Result<Self, OpenSSLErrorStack> {
        x509::X509::from_der(data).map(Self::from)
    }

    /// The SHA-256 fingerprint of this CA's DER encoding. This is the key the CA is
    /// stored under in an [AttestationCaList].
    pub fn fingerprint(&self) -> Result<Vec<u8>, OpenSSLErrorStack> {
        self.ca
            .digest(hash::MessageDigest::sha256())
            .map(|bytes| bytes.to_vec())
    }

    /// Replace the set of aaguids this Attestation CA allows. If an empty set is provided
    /// then this Attestation CA allows all Aaguids it has issued.
    pub fn set_aaguids(&mut self, aaguids: BTreeSet<Uuid>) {
        self.aaguids = aaguids;
    }

    /// Add this AAGUID to the allowed set, restricting the CA if it was unrestricted.
    pub fn insert_aaguid(&mut self, aaguid: Uuid) {
        self.aaguids.insert(aaguid);
    }

    /// Add these AAGUIDs to the allowed set. Unlike [Self::set_aaguids] this never removes
    /// an AAGUID that is already allowed.
    pub fn with_aaguids<I: IntoIterator<Item = Uuid>>(mut self, aaguids: I) -> Self {
        self.aaguids.extend(aaguids);
        self
    }

    /// True when this CA does not restrict which models it may attest.
    pub fn is_unrestricted(&self) -> bool {
        self.aaguids.is_empty()
    }

    /// True if this CA has been explicitly configured to trust this model. An unrestricted
    /// CA does not explicitly trust any single AAGUID.
    pub fn explicitly_trusts(&self, aaguid: &Uuid) -> bool {
        self.aaguids.contains(aaguid)
    }

    /// True if a chain issued by this CA, whose leaf declares `aaguid`, may be trusted.
    pub fn permits(&self, aaguid: Option<&Uuid>) -> bool {
        self.is_unrestricted() || aaguid.map(|a| self.aaguids.contains(a)).unwrap_or(false)
    }

    /// True if this CA's subject is `name`, ie it could have issued a certificate whose
    /// issuer is `name`.
    pub fn is_subject(&self, name: &x509::X509NameRef) -> bool {
        match (self.ca.subject_name().to_der(), name.to_der()) {
            (Ok(ours), Ok(theirs)) => ours == theirs,
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(?e, "unable to encode x509 name");
                false
            }
        }
    }
}

/// A list of AttestationCas and associated options.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AttestationCaList {
    /// The set of CA's that we trust, keyed by their SHA-256 fingerprint.
    pub cas: BTreeMap<Base64UrlSafeData, AttestationCa>,
}

impl TryFrom<AttestationCa> for AttestationCaList {
    type Error = OpenSSLErrorStack;

    fn try_from(att_ca: AttestationCa) -> Result<Self, Self::Error> {
        let mut new = Self::default();
        new.insert(att_ca)?;
        Ok(new)
    }
}

impl TryFrom<&[u8]> for AttestationCaList {
    type Error = OpenSSLErrorStack;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        AttestationCa::try_from(data).and_then(Self::try_from)
    }
}

impl TryFrom<&[(&[u8], Uuid)]> for AttestationCaList {
    type Error = OpenSSLErrorStack;

    fn try_from(iter: &[(&[u8], Uuid)]) -> Result<Self, Self::Error> {
        let mut new = Self::default();
        for (der, aaguid) in iter {
            let ca = x509::X509::from_der(der)?;
            new.insert(AttestationCa::from(ca).with_aaguids([*aaguid]))?;
        }
        Ok(new)
    }
}

impl AttestationCaList {
    /// Build a list from `(root, aaguid)` pairs. Repeated roots accumulate their aaguids.
    pub fn from_iter<I: IntoIterator<Item = (x509::X509, Uuid)>>(
        iter: I,
    ) -> Result<Self, OpenSSLErrorStack> {
        let mut new = Self::default();
        for (ca, aaguid) in iter {
            new.insert(AttestationCa::from(ca).with_aaguids([aaguid]))?;
        }
        Ok(new)
    }

    /// Determine if this attestation list contains any members.
    pub fn is_empty(&self) -> bool {
        self.cas.is_empty()
    }

    /// The number of distinct CAs in this list.
    pub fn len(&self) -> usize {
        self.cas.len()
    }

    /// Insert a new att_ca into this Attestation Ca List. If this CA is already present the
    /// aaguid sets are merged. Merging with an unrestricted CA yields an unrestricted CA.
    pub fn insert(&mut self, att_ca: AttestationCa) -> Result<(), OpenSSLErrorStack> {
        let kid = Base64UrlSafeData::from(att_ca.fingerprint()?);

        match self.cas.get_mut(&kid) {
            Some(existing) => {
                if existing.is_unrestricted() || att_ca.is_unrestricted() {
                    existing.aaguids.clear();
                } else {
                    existing.aaguids.extend(att_ca.aaguids);
                }
            }
            None => {
                self.cas.insert(kid, att_ca);
            }
        }
        Ok(())
    }

    /// Retrieve a CA by its SHA-256 fingerprint.
    pub fn get(&self, fingerprint: &[u8]) -> Option<&AttestationCa> {
        self.cas.get(fingerprint)
    }

    /// Iterate over the CAs in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = &AttestationCa> {
        self.cas.values()
    }

    /// The CAs that have been explicitly configured to trust this model.
    pub fn cas_for_aaguid<'a>(
        &'a self,
        aaguid: &'a Uuid,
    ) -> impl Iterator<Item = &'a AttestationCa> + 'a {
        self.cas
            .values()
            .filter(move |att_ca| att_ca.explicitly_trusts(aaguid))
    }

    /// The CAs whose subject is `name`.
    pub fn cas_with_subject<'a>(
        &'a self,
        name: &'a x509::X509NameRef,
    ) -> impl Iterator<Item = &'a AttestationCa> + 'a {
        self.cas
            .values()
            .filter(move |att_ca| att_ca.is_subject(name))
    }
}
