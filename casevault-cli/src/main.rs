//! `casevault`: operator tool for account-scoped encryption.
//!
//! ```bash
//! export CASEVAULT_MASTER_SECRET=...
//! casevault encrypt  --account u-42 --input notes.txt --output notes.env
//! casevault decrypt  --account u-42 --input notes.env --output notes.txt
//! casevault package  --account u-42 --input report.pdf --out-dir downloads/
//! casevault unpack   --account u-42 --input downloads/report.pdf.cvpkg --out-dir restored/
//! casevault migrate  --account u-42 --records /var/lib/casevault/records
//! ```

use anyhow::{Context, Result, bail};
use casevault_crypto::{CryptoConfig, EnvelopeCodec, PackageInfo, Packager};
use casevault_policy::{Migrator, PolicyConfig, PolicyError};
use casevault_storage::DirRecordStore;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "casevault")]
#[command(about = "Account-scoped encryption for CaseVault documents")]
struct Cli {
    /// Deployment-wide master secret
    #[arg(long, env = "CASEVAULT_MASTER_SECRET", hide_env_values = true, global = true)]
    master_secret: Option<String>,

    /// PBKDF2 iteration count
    #[arg(
        long,
        env = "CASEVAULT_KDF_ITERATIONS",
        default_value_t = casevault_crypto::DEFAULT_KDF_ITERATIONS,
        global = true
    )]
    kdf_iterations: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a file into a printable envelope
    Encrypt {
        #[arg(long)]
        account: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Decrypt an envelope produced by `encrypt`
    Decrypt {
        #[arg(long)]
        account: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Wrap a file in a secure package
    Package {
        #[arg(long)]
        account: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        mime_type: Option<String>,
        #[arg(long)]
        document_id: Option<String>,
        #[arg(long)]
        document_type: Option<String>,
    },
    /// Open a secure package and restore the original file
    Unpack {
        #[arg(long)]
        account: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Seal or re-seal every record an account owns
    Migrate {
        #[arg(long)]
        account: String,
        /// Directory of JSON record files
        #[arg(long)]
        records: PathBuf,
    },
}

impl Cli {
    fn codec(&self) -> Result<EnvelopeCodec> {
        let Some(secret) = self.master_secret.as_deref() else {
            bail!("no master secret: pass --master-secret or set CASEVAULT_MASTER_SECRET");
        };
        let config = CryptoConfig::new(secret)?.with_kdf_iterations(self.kdf_iterations)?;
        Ok(EnvelopeCodec::new(config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let codec = cli.codec()?;
    run(cli.command, codec).await
}

async fn run(command: Command, codec: EnvelopeCodec) -> Result<()> {
    match command {
        Command::Encrypt {
            account,
            input,
            output,
        } => {
            let payload = read(&input)?;
            let envelope = codec.encrypt(&payload, &account)?;
            write(&output, envelope.as_bytes())?;
            info!(account = %account, output = %output.display(), "envelope written");
        }
        Command::Decrypt {
            account,
            input,
            output,
        } => {
            let envelope = String::from_utf8(read(&input)?)
                .with_context(|| format!("{} is not a text envelope", input.display()))?;
            let payload = codec
                .decrypt(envelope.trim(), &account)
                .map_err(denied)?;
            write(&output, &payload)?;
            info!(account = %account, output = %output.display(), "envelope decrypted");
        }
        Command::Package {
            account,
            input,
            out_dir,
            mime_type,
            document_id,
            document_type,
        } => {
            let path = package_file(
                &codec,
                &account,
                &input,
                &out_dir,
                PackageInfo {
                    mime_type,
                    document_id,
                    document_type,
                    ..PackageInfo::default()
                },
            )?;
            println!("{}", path.display());
        }
        Command::Unpack {
            account,
            input,
            out_dir,
        } => {
            let path = unpack_file(&codec, &account, &input, &out_dir)?;
            println!("{}", path.display());
        }
        Command::Migrate { account, records } => {
            let store = DirRecordStore::open(&records)
                .with_context(|| format!("opening record store {}", records.display()))?;
            let migrator = Migrator::new(
                Arc::new(codec),
                Arc::new(store),
                &PolicyConfig::from_env()?,
            );
            let report = migrator.migrate_account(&account).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Writes `<out_dir>/<filename>.cvpkg` and returns its path.
fn package_file(
    codec: &EnvelopeCodec,
    account: &str,
    input: &Path,
    out_dir: &Path,
    mut info: PackageInfo,
) -> Result<PathBuf> {
    let bytes = read(input)?;
    info.original_filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let package = Packager::new(Arc::new(codec.clone())).build(&bytes, account, info)?;
    let path = out_dir.join(package.artifact_name());
    write(&path, &package.to_bytes()?)?;
    info!(account, package = %path.display(), "package written");
    Ok(path)
}

/// Restores the packaged file into `out_dir` and returns its path.
fn unpack_file(codec: &EnvelopeCodec, account: &str, input: &Path, out_dir: &Path) -> Result<PathBuf> {
    let artifact = read(input)?;
    let opened = Packager::new(Arc::new(codec.clone()))
        .open_artifact(&artifact, account)
        .map_err(denied)?;
    let path = out_dir.join(&opened.filename);
    write(&path, &opened.bytes)?;
    info!(account, file = %path.display(), "package opened");
    Ok(path)
}

/// Replaces access-denied details with the generic user-facing message.
fn denied(err: casevault_crypto::CryptoError) -> anyhow::Error {
    let err = PolicyError::from(err);
    if err.is_access_denied() {
        tracing::debug!(error = %err, "access denied");
        anyhow::anyhow!(err.user_message())
    } else {
        err.into()
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
