//! Webauthn Attestation Trust Resolution
//!
//! During registration, an authenticator may present an attestation: a certificate chain,
//! and usually the AAGUID of its model. Before a relying party can use that attestation to
//! make policy decisions it must know whether the chain leads back to a root it trusts,
//! and which root that is. This crate answers that question.
//!
//! Trust roots come from one or more [TrustSource]s. A source may be a static list of
//! [webauthn_attestation_ca::AttestationCa]s ([CaListTrustSource]), or any other store a
//! deployment implements, such as a metadata feed or a database. Sources may also supply
//! auxiliary material (intermediate certificates and revocation lists), which helps build
//! and check a path but never grants trust by itself.
//!
//! An [AttestationTrustResolver] consults every source concurrently within one deadline,
//! combines their answers according to a [CombinePolicy], and verifies the chain with a
//! [ChainValidator].
//!
//! ```no_run
//! # async fn example(chain_pem: &[u8], ca_pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! use webauthn_attestation_trust::prelude::*;
//!
//! let aaguid = uuid::uuid!("00112233-4455-6677-8899-aabbccddeeff");
//! let ca = AttestationCa::new_from_pem(ca_pem)?.with_aaguids([aaguid]);
//! let source = CaListTrustSource::new("static", AttestationCaList::try_from(ca)?)?;
//!
//! let resolver = ResolverBuilder::new()
//!     .with_config(&TrustConfig::default())
//!     .with_source(source)
//!     .build();
//!
//! let chain = CertificateChain::from_pem(chain_pem)?;
//! let resolution = resolver.resolve_now(Some(aaguid), &chain).await?;
//! println!("trusted by {:?}", resolution.anchor.anchor().subject_name());
//! # Ok(())
//! # }
//! ```

#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

mod aggregate;
mod chain;
mod config;
mod error;
mod material;
mod resolver;
mod source;
pub mod sources;
mod validator;

#[cfg(test)]
mod fixtures;

pub use crate::aggregate::{AggregateTrustSource, Aggregated, CombinePolicy, UnavailablePolicy};
pub use crate::chain::{fingerprint, CertificateChain};
pub use crate::config::TrustConfig;
pub use crate::error::{ConfigError, SourceError, TrustError, TrustFailure};
pub use crate::material::{AuxiliaryMaterial, RevocationList, TrustRootSet};
pub use crate::resolver::{AttestationTrustResolver, ResolverBuilder, TrustResolution};
pub use crate::source::TrustSource;
pub use crate::sources::CaListTrustSource;
pub use crate::validator::{ChainValidator, RevocationMode, VerifiedAnchor, DEFAULT_MAX_PATH_DEPTH};

pub use webauthn_attestation_ca::{AttestationCa, AttestationCaList};

/// Everything needed to configure and run attestation trust resolution.
pub mod prelude {
    pub use crate::{
        AggregateTrustSource, AttestationCa, AttestationCaList, AttestationTrustResolver,
        AuxiliaryMaterial, CaListTrustSource, CertificateChain, ChainValidator, CombinePolicy,
        ResolverBuilder, RevocationList, RevocationMode, TrustConfig, TrustError, TrustFailure,
        TrustResolution, TrustRootSet, TrustSource, UnavailablePolicy,
    };
}
