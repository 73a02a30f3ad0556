//! # drift CLI
//!
//! Debug interface to the Drift importer and store: pull manifests and
//! file contents through the SCM helper, resolve blob identities, and
//! inspect the byte-store.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use drift_config::Config;
use drift_importer::HelperImporter;
use drift_model::Hash;
use drift_store::{BlobInfoStore, FsByteStore};

/// Drift - source-control-aware virtual filesystem tooling
#[derive(Parser)]
#[command(name = "drift")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Byte-store root directory (overrides configuration)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a commit manifest and print the root tree identity
    Import {
        /// Repository to import from
        #[arg(long)]
        repo: PathBuf,

        /// Revision name to import
        #[arg(long, default_value = "tip")]
        rev: String,
    },

    /// Fetch a blob's contents by identity and write them to stdout
    Cat {
        /// Repository to fetch from
        #[arg(long)]
        repo: PathBuf,

        /// Blob identity (40-char hex)
        blob_id: String,
    },

    /// Resolve a blob identity to its (path, revision) pair
    Resolve {
        /// Blob identity (40-char hex)
        blob_id: String,
    },

    /// Display byte-store statistics
    Stats,
}

fn main() -> Result<()> {
    drift_config::logging::init("info");

    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(store) = cli.store {
        config.storage.root = store;
    }

    let store = Arc::new(
        FsByteStore::new(&config.storage.root).with_context(|| {
            format!("failed to open byte-store at {}", config.storage.root.display())
        })?,
    );

    match cli.command {
        Commands::Import { repo, rev } => {
            let blobs = BlobInfoStore::new(store);
            let mut importer = HelperImporter::spawn(&config.importer.helper, &repo, blobs)
                .context("failed to start SCM helper")?;
            let root = importer.import_manifest(&rev)?;
            info!(rev = %rev, "manifest import complete");
            println!("{root}");
        }
        Commands::Cat { repo, blob_id } => {
            let blob_id = Hash::from_hex(&blob_id).context("invalid blob identity")?;
            let blobs = BlobInfoStore::new(store);
            let mut importer = HelperImporter::spawn(&config.importer.helper, &repo, blobs)
                .context("failed to start SCM helper")?;
            let contents = importer.import_file_contents(blob_id)?;
            std::io::stdout().write_all(&contents)?;
        }
        Commands::Resolve { blob_id } => {
            let blob_id = Hash::from_hex(&blob_id).context("invalid blob identity")?;
            let blobs = BlobInfoStore::new(store);
            let info = blobs.get(blob_id)?;
            println!("{}\t{}", info.rev, info.path);
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("entries: {}", stats.entry_count);
            println!("bytes:   {}", stats.total_bytes);
        }
    }

    Ok(())
}
