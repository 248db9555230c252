//! Attestation certificate chains, and the x509 extension data the validator needs from them.

use openssl::error::ErrorStack as OpenSSLErrorStack;
use openssl::hash::MessageDigest;
use openssl::x509::{X509NameRef, X509Ref, X509};
use std::fmt;
use uuid::Uuid;
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

/// If a leaf contains an extension with OID 1.3.6.1.4.1.45724.1.1.4 (id-fido-gen-ce-aaguid)
/// its value is the AAGUID of the authenticator model.
const FIDO_GEN_CE_AAGUID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

/// An ordered attestation certificate chain, leaf first. Each certificate (except possibly
/// the last) should be signed by the next. The trust anchor is typically not included.
#[derive(Clone, Default)]
pub struct CertificateChain {
    certs: Vec<X509>,
}

impl fmt::Debug for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.certs.iter().map(|c| c.subject_name()))
            .finish()
    }
}

impl From<Vec<X509>> for CertificateChain {
    fn from(certs: Vec<X509>) -> Self {
        CertificateChain { certs }
    }
}

impl CertificateChain {
    /// An empty chain.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a chain from one or more concatenated PEM certificates, leaf first.
    pub fn from_pem(data: &[u8]) -> Result<Self, OpenSSLErrorStack> {
        X509::stack_from_pem(data).map(Self::from)
    }

    /// Parse a chain from a sequence of DER certificates, leaf first, as found in the `x5c`
    /// member of an attestation statement.
    pub fn from_der_list<I, B>(iter: I) -> Result<Self, OpenSSLErrorStack>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        iter.into_iter()
            .map(|der| X509::from_der(der.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from)
    }

    /// True if this chain holds no certificates.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// The number of certificates in this chain.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// The certificate being attested.
    pub fn leaf(&self) -> Option<&X509> {
        self.certs.first()
    }

    /// The last certificate of the chain, closest to the trust anchor.
    pub fn top(&self) -> Option<&X509> {
        self.certs.last()
    }

    /// Iterate the chain from the leaf upwards.
    pub fn iter(&self) -> impl Iterator<Item = &X509> {
        self.certs.iter()
    }

    /// The chain as a slice, leaf first.
    pub fn as_slice(&self) -> &[X509] {
        &self.certs
    }

    /// The AAGUID the leaf declares in its id-fido-gen-ce-aaguid extension, if any.
    pub fn aaguid(&self) -> Option<Uuid> {
        self.leaf()
            .and_then(|leaf| CertProfile::parse(leaf))
            .and_then(|profile| profile.aaguid)
    }
}

/// The SHA-256 fingerprint of a certificate's DER encoding.
pub fn fingerprint(cert: &X509Ref) -> Result<Vec<u8>, OpenSSLErrorStack> {
    cert.digest(MessageDigest::sha256())
        .map(|bytes| bytes.to_vec())
}

pub(crate) fn name_der(name: &X509NameRef) -> Option<Vec<u8>> {
    name.to_der()
        .map_err(|e| {
            error!(?e, "unable to encode x509 name");
        })
        .ok()
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// The subset of a certificate's x509v3 extensions that decides what role it may play in
/// a path.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CertProfile {
    /// `None` if the certificate has no basic constraints extension.
    pub is_ca: Option<bool>,
    pub path_len: Option<u32>,
    /// `None` if the certificate has no key usage extension.
    pub key_cert_sign: Option<bool>,
    pub aaguid: Option<Uuid>,
    pub crl_uris: Vec<String>,
}

impl CertProfile {
    pub(crate) fn parse(cert: &X509Ref) -> Option<Self> {
        let der_bytes = cert
            .to_der()
            .map_err(|e| {
                error!(?e, "unable to encode certificate");
            })
            .ok()?;

        let (_, parsed) = x509_parser::parse_x509_certificate(&der_bytes)
            .map_err(|e| {
                warn!(?e, "unable to parse certificate extensions");
            })
            .ok()?;

        let mut profile = CertProfile::default();

        for extension in parsed.extensions() {
            if extension.oid == FIDO_GEN_CE_AAGUID {
                profile.aaguid = parse_aaguid(extension.value);
                continue;
            }

            match extension.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => {
                    profile.is_ca = Some(bc.ca);
                    profile.path_len = bc.path_len_constraint;
                }
                ParsedExtension::KeyUsage(ku) => {
                    profile.key_cert_sign = Some(ku.key_cert_sign());
                }
                ParsedExtension::CRLDistributionPoints(points) => {
                    for point in points.iter() {
                        if let Some(DistributionPointName::FullName(names)) =
                            &point.distribution_point
                        {
                            profile
                                .crl_uris
                                .extend(names.iter().filter_map(|name| match name {
                                    GeneralName::URI(uri) => Some(uri.to_string()),
                                    _ => None,
                                }));
                        }
                    }
                }
                _ => {}
            }
        }

        Some(profile)
    }
}

fn parse_aaguid(i: &[u8]) -> Option<Uuid> {
    let (_, aaguid) = der_parser::der::parse_der_octetstring(i).ok()?;
    aaguid
        .as_slice()
        .ok()
        .and_then(|bytes| Uuid::from_slice(bytes).ok())
}
