use openssl::error::ErrorStack;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use webauthn_attestation_trust::prelude::*;
use webauthn_attestation_trust::ConfigError;

/// A trust root certificate on disk, and the authenticator models it may attest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootEntry {
    pub path: PathBuf,
    /// If empty, the root may attest any model, but only through chain lookups.
    #[serde(default)]
    pub aaguids: BTreeSet<Uuid>,
}

/// A CRL on disk, optionally published under a distribution point.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrlEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub distribution_point: Option<String>,
}

/// The tool's configuration file. Relative paths are resolved against the directory the
/// file is in.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub roots: Vec<RootEntry>,
    /// Serialised attestation CAs, as shipped by other deployments.
    #[serde(default)]
    pub cas: Vec<AttestationCa>,
    #[serde(default)]
    pub intermediates: Vec<PathBuf>,
    #[serde(default)]
    pub crls: Vec<CrlEntry>,
    #[serde(skip)]
    base: PathBuf,
}

fn read(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn invalid_material(path: &Path) -> impl FnOnce(ErrorStack) -> ConfigError + '_ {
    move |source| ConfigError::Certificate {
        path: path.display().to_string(),
        source,
    }
}

impl ToolConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = read(path)?;
        let mut config: ToolConfig = serde_json::from_slice(&data)?;
        config.trust.validate()?;
        config.base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn ca_list(&self) -> Result<AttestationCaList, ConfigError> {
        let mut cas = AttestationCaList::default();

        for entry in self.roots.iter() {
            let path = self.resolve_path(&entry.path);
            let att_ca = AttestationCa::new_from_pem(&read(&path)?)
                .map_err(invalid_material(&path))?
                .with_aaguids(entry.aaguids.iter().copied());
            cas.insert(att_ca).map_err(invalid_material(&path))?;
        }

        for att_ca in self.cas.iter() {
            cas.insert(att_ca.clone())
                .map_err(|e| ConfigError::Invalid(format!("attestation ca: {e}")))?;
        }

        Ok(cas)
    }

    fn auxiliary_material(&self) -> Result<AuxiliaryMaterial, ConfigError> {
        let mut aux = AuxiliaryMaterial::new();

        for path in self.intermediates.iter() {
            let path = self.resolve_path(path);
            let chain = CertificateChain::from_pem(&read(&path)?).map_err(invalid_material(&path))?;
            for cert in chain.iter() {
                aux = aux.with_intermediate(cert.clone());
            }
        }

        for entry in self.crls.iter() {
            let path = self.resolve_path(&entry.path);
            let crl = RevocationList::from_pem(&read(&path)?).map_err(invalid_material(&path))?;
            aux = match entry.distribution_point.as_ref() {
                Some(uri) => aux.with_distribution_point(uri.as_str(), crl),
                None => aux.with_crl(crl),
            };
        }

        Ok(aux)
    }

    /// Build a resolver over a single source holding everything this file configures.
    pub fn resolver(&self) -> Result<AttestationTrustResolver, ConfigError> {
        let source = CaListTrustSource::new("config", self.ca_list()?)?;
        let aux = self.auxiliary_material()?;
        let source = if aux.is_empty() {
            source
        } else {
            source.with_auxiliary_material(aux)
        };

        let source: Arc<dyn TrustSource> = Arc::new(source);
        Ok(AttestationTrustResolver::from_config(
            &self.trust,
            vec![source],
        ))
    }
}
