//! partwise entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use partwise_transfer::DigestAlgorithm;
use partwise_upload::StrategyRequest;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "partwise", version, about = "Chunked uploads with content digests")]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "partwise.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file into the local store.
    Upload(UploadArgs),
    /// Print the digest of a file.
    Digest {
        file: PathBuf,
        #[arg(long, default_value_t = DigestAlgorithm::Sha1Base64)]
        algorithm: DigestAlgorithm,
    },
}

#[derive(Debug, clap::Args)]
pub struct UploadArgs {
    /// File to upload.
    pub file: PathBuf,

    /// Destination folder id ("0" is the store root).
    #[arg(long, default_value = "0")]
    pub folder: String,

    /// Name to store the file under (defaults to the local file name).
    #[arg(long)]
    pub name: Option<String>,

    /// auto, single or chunked.
    #[arg(long, default_value_t = StrategyRequest::Auto)]
    pub strategy: StrategyRequest,

    #[arg(long)]
    pub part_size: Option<u64>,

    /// Maximum parts uploaded at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Store root directory.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::Config::load(&cli.config)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Upload(args) => app::upload(args, config).await,
            Command::Digest { file, algorithm } => app::digest(&file, algorithm).await,
        }
    })
}
