//! docsign: sign files and verify them against stored signature records.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docsign::{
    read_content, Anonymous, Config, FileKeyStore, FsStore, Identity, IdentityProvider, SignError,
    Signature, SignedContent, Signer, SigningSession, StaticIdentity, VerificationRequest,
};

#[derive(Parser)]
#[command(name = "docsign")]
#[command(about = "Sign documents and verify signatures")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "docsign.toml", env = "DOCSIGN_CONFIG")]
    config: PathBuf,

    /// Data directory (overrides config file)
    #[arg(long, env = "DOCSIGN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Key directory (overrides config file)
    #[arg(long, env = "DOCSIGN_KEY_DIR")]
    key_dir: Option<PathBuf>,

    /// Acting user id; omit for anonymous verification
    #[arg(short, long, env = "DOCSIGN_USER")]
    user: Option<String>,

    /// Acting user's email, recorded in the audit trail
    #[arg(long, env = "DOCSIGN_EMAIL")]
    email: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a key pair for the user, replacing any existing one
    Keygen {
        /// Replace an existing key pair without refusing
        #[arg(long)]
        force: bool,
    },

    /// Sign a file and record it
    Sign {
        file: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Also write a detached signature document here
        #[arg(long)]
        detached: Option<PathBuf>,
    },

    /// Verify a file
    Verify {
        file: PathBuf,

        /// Base64 signature to check instead of the stored one
        #[arg(long)]
        signature: Option<String>,

        /// Public key (PEM file path or base64 DER) to check against
        #[arg(long)]
        public_key: Option<String>,

        /// Check against a detached signature document instead of records
        #[arg(long, conflicts_with_all = ["signature", "public_key"])]
        detached: Option<PathBuf>,
    },

    /// Print or save the user's public key as PEM
    ExportKey {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(key_dir) = cli.key_dir {
        config.key_dir = key_dir;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(data_dir = %config.data_dir.display(), "Starting docsign");

    let identity: Arc<dyn IdentityProvider> = match cli.user {
        Some(user) => {
            let mut identity = Identity::new(user);
            if let Some(email) = cli.email {
                identity = identity.with_email(email);
            }
            Arc::new(StaticIdentity(identity))
        }
        None => Arc::new(Anonymous),
    };

    let store = Arc::new(FsStore::open(&config.data_dir).await?);
    let key_store = Arc::new(FileKeyStore::open(&config.key_dir)?);
    let session = SigningSession::new(store, key_store.clone(), identity, config);

    match cli.command {
        Command::Keygen { force } => {
            // An unreadable key file counts as existing; only --force replaces it.
            let exists = match session.has_key_pair() {
                Ok(exists) => exists,
                Err(SignError::Unauthenticated) => return Err(SignError::Unauthenticated.into()),
                Err(_) => true,
            };
            if exists && !force {
                anyhow::bail!(
                    "a key pair already exists; regenerating makes documents verified through \
                     the local key unverifiable that way. Re-run with --force to replace it"
                );
            }
            let outcome = session.generate_key_pair().await?;
            if outcome.replaced_existing {
                eprintln!("warning: previous key pair replaced");
            }
            println!("{}", outcome.fingerprint);
        }

        Command::Sign {
            file,
            name,
            detached,
        } => {
            let content = read_content(&file)?;
            let display_name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });

            let signed = session.sign_document(&display_name, &content).await?;

            if let Some(path) = detached {
                let keypair = session_keypair(&key_store, &signed.document.owner_id)?;
                Signer::new(&keypair)
                    .with_signer_id(signed.document.owner_id.clone())
                    .with_metadata("document_id", signed.document.id.to_string())
                    .sign_bytes(&content)?
                    .save(&path)?;
            }

            println!("{}", serde_json::to_string_pretty(&signed.document)?);
        }

        Command::Verify {
            file,
            signature,
            public_key,
            detached,
        } => {
            let content = read_content(&file)?;

            if let Some(path) = detached {
                let signed = SignedContent::load(&path)?;
                let valid = docsign::verify_signed_content(&content, &signed).unwrap_or(false);
                println!("{}", if valid { "verified" } else { "signature_invalid" });
                if !valid {
                    std::process::exit(1);
                }
                return Ok(());
            }

            let mut request = VerificationRequest::lookup();
            if let Some(signature) = signature {
                request = request.with_signature(Signature::from_base64(signature));
            }
            if let Some(key) = public_key {
                request = request.with_public_key(read_key_argument(&key)?);
            }

            let report = session.verify_document(&content, &request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_verified() {
                std::process::exit(1);
            }
        }

        Command::ExportKey { out } => {
            let pem = session.public_key()?.to_pem()?;
            match out {
                Some(path) => std::fs::write(&path, pem)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", pem),
            }
        }
    }

    Ok(())
}

fn session_keypair(key_store: &FileKeyStore, user: &str) -> anyhow::Result<docsign::KeyPair> {
    use docsign::KeyStore;
    key_store
        .get(user)?
        .ok_or_else(|| anyhow::anyhow!("no key pair for {}", user))
}

/// A `--public-key` value is either a path to a PEM file or the key itself.
fn read_key_argument(value: &str) -> anyhow::Result<String> {
    let path = std::path::Path::new(value);
    if path.is_file() {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", value));
    }
    Ok(value.to_string())
}
