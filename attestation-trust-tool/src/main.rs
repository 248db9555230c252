// #![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use webauthn_attestation_trust::CertificateChain;

mod config;

use crate::config::ToolConfig;

#[derive(Debug, Args)]
pub struct CommonOpt {
    #[clap(short, long)]
    pub debug: bool,
    /// Path to the trust configuration file
    #[clap(short = 'c', long = "config")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct VerifyOpt {
    #[clap(flatten)]
    pub common: CommonOpt,
    /// Path to the attestation chain, as PEM certificates, leaf first
    #[clap(short = 'p', long = "path")]
    pub path: PathBuf,
    /// The AAGUID the authenticator declared
    #[clap(short, long)]
    pub aaguid: Option<Uuid>,
    /// Validate at this time, in seconds since the unix epoch, rather than now
    #[clap(long)]
    pub at: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RootsOpt {
    #[clap(flatten)]
    pub common: CommonOpt,
    /// The AAGUID to list trust roots for
    #[clap(short, long)]
    pub aaguid: Uuid,
}

#[derive(Debug, Subcommand)]
#[clap(about = "Webauthn attestation trust tool")]
pub enum Opt {
    /// Resolve the trust anchor of an attestation chain
    Verify(VerifyOpt),
    /// List the trust roots configured for an authenticator model
    Roots(RootsOpt),
}

impl Opt {
    fn debug(&self) -> bool {
        match self {
            Opt::Verify(VerifyOpt { common, .. }) | Opt::Roots(RootsOpt { common, .. }) => {
                common.debug
            }
        }
    }
}

#[derive(Debug, clap::Parser)]
#[clap(about = "Webauthn attestation trust tool")]
pub struct CliParser {
    #[clap(subcommand)]
    pub commands: Opt,
}

pub fn base16_encode<T: IntoIterator<Item = u8>>(i: T) -> String {
    i.into_iter().map(|c| format!("{c:02x}")).collect()
}

async fn verify(opt: &VerifyOpt) -> ExitCode {
    let config = match ToolConfig::from_file(&opt.common.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(%e, "unable to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let resolver = match config.resolver() {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::error!(%e, "unable to build resolver");
            return ExitCode::FAILURE;
        }
    };

    let chain = match std::fs::read(&opt.path)
        .map_err(|e| e.to_string())
        .and_then(|pem| CertificateChain::from_pem(&pem).map_err(|e| e.to_string()))
    {
        Ok(chain) => chain,
        Err(e) => {
            tracing::error!(%e, path = ?opt.path, "unable to read attestation chain");
            return ExitCode::FAILURE;
        }
    };
    tracing::trace!(?chain);

    let now = opt
        .at
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap_or_else(SystemTime::now);

    match resolver.resolve(opt.aaguid, &chain, now).await {
        Ok(resolution) => {
            println!("trusted");
            println!("anchor: {:?}", resolution.anchor.anchor().subject_name());
            println!(
                "fingerprint: {}",
                base16_encode(resolution.anchor.fingerprint().iter().copied())
            );
            println!("path length: {}", resolution.anchor.path().len());
            for source in resolution.unavailable_sources.iter() {
                println!("unavailable: {source}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("rejected: {e}");
            println!("failure: {:?}", e.failure());
            if let webauthn_attestation_trust::TrustError::Rejected {
                unavailable_sources,
                ..
            } = &e
            {
                for source in unavailable_sources.iter() {
                    println!("unavailable: {source}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn roots(opt: &RootsOpt) -> ExitCode {
    let resolver = match ToolConfig::from_file(&opt.common.config).and_then(|c| c.resolver()) {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::error!(%e, "unable to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let sources = resolver.sources();
    match sources.query_aaguid(&opt.aaguid, sources.deadline()).await {
        Ok(answer) => {
            if answer.value.is_empty() {
                println!("no trust roots for {}", opt.aaguid);
            }
            for (fingerprint, cert) in answer.value.entries() {
                println!(
                    "{} {:?}",
                    base16_encode(fingerprint.iter().copied()),
                    cert.subject_name()
                );
            }
            for source in answer.unavailable.iter() {
                println!("unavailable: {source}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(%e, "trust source lookup failed");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let opt = CliParser::parse();

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = if opt.commands.debug() {
        match EnvFilter::try_new("webauthn_attestation_trust=debug,attestation_trust_tool=debug") {
            Ok(f) => f,
            Err(e) => {
                eprintln!("ERROR! Unable to start tracing {:?}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(f) => f,
            Err(_) => EnvFilter::new("webauthn_attestation_trust=warn,attestation_trust_tool=warn"),
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match opt.commands {
        Opt::Verify(opt) => verify(&opt).await,
        Opt::Roots(opt) => roots(&opt).await,
    }
}
