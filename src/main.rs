use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dkic_rs::{DkicSigner, DkicVerifier, DohProvider, KeyEncoding, VerifierConfig};

#[derive(Parser)]
#[command(name = "dkic", version, about = "Sign and verify web documents with DKIC (Ed25519 keys in DNS)")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an Ed25519 key pair and its DNS entry
    Keygen {
        /// Output file prefix for the private key PEM file
        #[arg(long, value_name = "PREFIX", default_value = "private_key")]
        out: String,

        /// Output file prefix for the public key DNS entry text file
        #[arg(long, value_name = "PREFIXPUB", default_value = "public_key")]
        outpubkey: String,
    },
    /// Embed a signature into HTML files, in place
    Sign {
        /// Private key PEM file (default: PEM contents of DKIC_PRIVATE_KEY)
        #[arg(long, value_name = "FILE")]
        private_key: Option<PathBuf>,

        /// Files to sign
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Verify the document served at URL
    Verify {
        url: String,

        /// DNS-over-HTTPS JSON endpoint
        #[arg(long, value_name = "URL", conflicts_with = "provider")]
        doh: Option<String>,

        /// Well-known DoH resolver: cloudflare, google or quad9
        #[arg(long)]
        provider: Option<DohProvider>,

        /// Require the published key to be a DER SubjectPublicKeyInfo
        #[arg(long)]
        strict_spki: bool,

        /// Print the outcome report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_json);

    match args.command {
        Command::Keygen { out, outpubkey } => {
            keygen(&out, &outpubkey)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sign { private_key, files } => {
            sign(private_key.as_deref(), &files)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            url,
            doh,
            provider,
            strict_spki,
            json,
        } => {
            let mut config = VerifierConfig::from_env()?;
            if let Some(doh) = doh {
                config.doh_url = doh;
            } else if let Some(provider) = provider {
                config.doh_url = provider.url().to_string();
            }
            if strict_spki {
                config.key_encoding = KeyEncoding::StrictSpki;
            }
            verify(&config, &url, json).await
        }
    }
}

fn keygen(prefix: &str, prefixpub: &str) -> anyhow::Result<()> {
    let signer = DkicSigner::generate()?;

    let private_key_filename = format!("{}.pem", prefix);
    fs::write(&private_key_filename, signer.to_pkcs8_pem())
        .with_context(|| format!("writing {}", private_key_filename))?;

    let public_key_filename = format!("{}.dns.txt", prefixpub);
    fs::write(&public_key_filename, signer.zone_entry(None))
        .with_context(|| format!("writing {}", public_key_filename))?;

    println!("Private key: {}", private_key_filename);
    println!("DNS entry with public key: {}:", public_key_filename);
    println!("\tsubdomain: _dkic");
    println!("\ttype: TXT");
    println!("\tcontent: {}", signer.dns_record());
    Ok(())
}

fn load_signer(private_key: Option<&Path>) -> anyhow::Result<DkicSigner> {
    let pem = match private_key {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading private key {}", path.display()))?,
        None => std::env::var("DKIC_PRIVATE_KEY").map_err(|_| {
            anyhow!("no private key file specified and DKIC_PRIVATE_KEY environment variable not set")
        })?,
    };
    Ok(DkicSigner::from_pkcs8_pem(&pem)?)
}

fn sign(private_key: Option<&Path>, files: &[PathBuf]) -> anyhow::Result<()> {
    let signer = load_signer(private_key)?;
    for path in files {
        if !path.exists() {
            warn!(file = %path.display(), "file does not exist, skipping");
            continue;
        }
        signer.sign_file(path)?;
        info!(file = %path.display(), "signed");
        println!("Signed: {}", path.display());
    }
    Ok(())
}

async fn verify(config: &VerifierConfig, url: &str, json: bool) -> anyhow::Result<ExitCode> {
    let verifier = DkicVerifier::from_config(config)?;
    let outcome = verifier.verify_url(url, &config.doh_url).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report())?);
    } else if let Some(domain) = outcome.domain() {
        println!("Verified: content signed by {}", domain);
    } else if let Some(error) = outcome.error() {
        println!("Not verified: {}", error);
    }

    Ok(match outcome.error() {
        None => ExitCode::SUCCESS,
        Some(error) if error.is_verdict() => ExitCode::from(1),
        Some(_) => ExitCode::from(2),
    })
}
