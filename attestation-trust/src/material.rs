//! Trust material handed out by trust sources: trust root sets, and the auxiliary
//! intermediates and revocation lists that help validate a chain.
//!
//! Both are immutable snapshots. A source may cache one and hand the same value to every
//! caller; cloning only bumps reference counts.

use crate::chain::{fingerprint, hex};
use openssl::error::ErrorStack as OpenSSLErrorStack;
use openssl::x509::{X509Crl, X509CrlRef, X509NameRef, X509Ref, X509};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A set of trust anchors, de-duplicated by the SHA-256 fingerprint of each certificate
/// and iterated in fingerprint order.
#[derive(Clone, Default)]
pub struct TrustRootSet {
    roots: Arc<BTreeMap<Vec<u8>, X509>>,
}

impl fmt::Debug for TrustRootSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.roots
                    .iter()
                    .map(|(kid, ca)| (hex(kid), ca.subject_name())),
            )
            .finish()
    }
}

impl PartialEq for TrustRootSet {
    fn eq(&self, other: &Self) -> bool {
        self.roots.keys().eq(other.roots.keys())
    }
}

impl Eq for TrustRootSet {}

impl TrustRootSet {
    /// The empty set. Untrusted queries must answer with this.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from certificates, dropping duplicates.
    pub fn new<I: IntoIterator<Item = X509>>(iter: I) -> Result<Self, OpenSSLErrorStack> {
        let roots = iter
            .into_iter()
            .map(|ca| fingerprint(&ca).map(|kid| (kid, ca)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(TrustRootSet {
            roots: Arc::new(roots),
        })
    }

    /// True if there are no trust anchors in this set.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The number of distinct trust anchors.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Iterate the anchors in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = &X509> {
        self.roots.values()
    }

    /// Iterate `(fingerprint, anchor)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &X509)> {
        self.roots.iter().map(|(kid, ca)| (kid.as_slice(), ca))
    }

    /// Retrieve an anchor by fingerprint.
    pub fn get(&self, fingerprint: &[u8]) -> Option<&X509> {
        self.roots.get(fingerprint)
    }

    /// True if this exact certificate is an anchor of this set.
    pub fn contains(&self, cert: &X509Ref) -> bool {
        fingerprint(cert)
            .map(|kid| self.roots.contains_key(&kid))
            .unwrap_or(false)
    }

    /// True if both values share the same underlying snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.roots, &other.roots)
    }

    /// Every anchor present in either set. When one side is empty the other snapshot is
    /// returned as is.
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut roots = (*self.roots).clone();
        roots.extend(
            other
                .roots
                .iter()
                .map(|(kid, ca)| (kid.clone(), ca.clone())),
        );
        TrustRootSet {
            roots: Arc::new(roots),
        }
    }

    /// Only the anchors present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        let roots: BTreeMap<_, _> = self
            .roots
            .iter()
            .filter(|(kid, _)| other.roots.contains_key(*kid))
            .map(|(kid, ca)| (kid.clone(), ca.clone()))
            .collect();
        TrustRootSet {
            roots: Arc::new(roots),
        }
    }
}

/// A shared handle to a certificate revocation list.
#[derive(Clone)]
pub struct RevocationList {
    crl: Arc<X509Crl>,
}

impl fmt::Debug for RevocationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationList")
            .field("issuer", &self.crl.issuer_name())
            .field("last_update", &self.crl.last_update().to_string())
            .finish()
    }
}

impl From<X509Crl> for RevocationList {
    fn from(crl: X509Crl) -> Self {
        RevocationList { crl: Arc::new(crl) }
    }
}

impl RevocationList {
    /// Parse a PEM encoded CRL.
    pub fn from_pem(data: &[u8]) -> Result<Self, OpenSSLErrorStack> {
        X509Crl::from_pem(data).map(Self::from)
    }

    /// Parse a DER encoded CRL.
    pub fn from_der(data: &[u8]) -> Result<Self, OpenSSLErrorStack> {
        X509Crl::from_der(data).map(Self::from)
    }

    /// The name of the CA that issued this list.
    pub fn issuer_name(&self) -> &X509NameRef {
        self.crl.issuer_name()
    }

    /// The underlying OpenSSL CRL.
    pub fn as_crl(&self) -> &X509CrlRef {
        &self.crl
    }
}

/// Certificates and CRLs that may help build and check a path for one chain.
///
/// Nothing in here is trusted. Intermediates may only be spliced into a path that already
/// terminates at a trust root; CRLs may only take trust away.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryMaterial {
    intermediates: Vec<X509>,
    crls: Vec<RevocationList>,
    distribution_points: BTreeMap<String, Vec<RevocationList>>,
}

impl AuxiliaryMaterial {
    /// Empty material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an untrusted intermediate certificate.
    pub fn with_intermediate(mut self, cert: X509) -> Self {
        self.intermediates.push(cert);
        self
    }

    /// Add a CRL that applies to any certificate issued by its issuer.
    pub fn with_crl(mut self, crl: RevocationList) -> Self {
        self.crls.push(crl);
        self
    }

    /// Add a CRL that was fetched from a CRL distribution point. It is consulted only for
    /// certificates that name `uri` as one of their distribution points.
    pub fn with_distribution_point<S: Into<String>>(mut self, uri: S, crl: RevocationList) -> Self {
        self.distribution_points
            .entry(uri.into())
            .or_default()
            .push(crl);
        self
    }

    /// True if this material holds nothing.
    pub fn is_empty(&self) -> bool {
        self.intermediates.is_empty() && self.crls.is_empty() && self.distribution_points.is_empty()
    }

    /// The untrusted intermediates.
    pub fn intermediates(&self) -> &[X509] {
        &self.intermediates
    }

    /// The CRLs not tied to a distribution point.
    pub fn crls(&self) -> &[RevocationList] {
        &self.crls
    }

    /// The CRLs published at this distribution point, if the material resolves it.
    pub fn crls_at(&self, uri: &str) -> &[RevocationList] {
        self.distribution_points
            .get(uri)
            .map(|crls| crls.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenate two bundles.
    pub fn merge(mut self, other: AuxiliaryMaterial) -> Self {
        self.intermediates.extend(other.intermediates);
        self.crls.extend(other.crls);
        for (uri, crls) in other.distribution_points {
            self.distribution_points.entry(uri).or_default().extend(crls);
        }
        self
    }

    /// Concatenate any number of bundles, yielding `None` if there were none.
    pub fn merge_all<I: IntoIterator<Item = AuxiliaryMaterial>>(iter: I) -> Option<Self> {
        iter.into_iter().reduce(AuxiliaryMaterial::merge)
    }
}
