#![warn(missing_docs)]

//! `rfs-meta`: runs an in-process metadata authority and seeds it with volumes and directories.

use anyhow::{Context, Result};
use clap::Parser;
use ringfs_meta::{BackendRegistry, DirRecord, Directory, MetaConfig, MetaPath};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Command line for the metadata authority.
#[derive(Parser, Debug)]
#[command(name = "rfs-meta", about = "RingFS in-memory metadata authority")]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, env = "RFS_META_CONFIG")]
    config: Option<PathBuf>,

    /// Volume to create at startup (repeatable)
    #[arg(long = "volume")]
    volumes: Vec<String>,

    /// Directory to create at startup as VOLUME:PATH (repeatable)
    #[arg(long = "mkdir")]
    dirs: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) if path.exists() => MetaConfig::from_file(path)?,
        Some(path) => {
            tracing::warn!("Config file not found, using defaults: {}", path.display());
            MetaConfig::default()
        }
        None => MetaConfig::default(),
    };

    let registry = BackendRegistry::with_defaults();
    let service = registry
        .create_from_config(&config)
        .with_context(|| format!("creating '{}' metadata backend", config.backend))?;
    tracing::info!(identity = %service.identity(), backend = %config.backend, "metadata service ready");

    for volume in &cli.volumes {
        service
            .create_volume(volume)
            .with_context(|| format!("creating volume {}", volume))?;
    }

    for spec in &cli.dirs {
        let (volume, path) = spec
            .split_once(':')
            .with_context(|| format!("--mkdir expects VOLUME:PATH, got {}", spec))?;
        service
            .make_directory(
                &MetaPath::new(volume, path),
                DirRecord::Present(Directory::new(0o755)),
            )
            .with_context(|| format!("creating directory {}", spec))?;
    }

    for (key, record) in service.dump_tree()? {
        tracing::trace!(key = %key, record = ?record, "namespace entry");
    }

    let ring = service.get_ring()?;
    let volumes = service.list_volumes()?;
    tracing::info!(
        volumes = ?volumes,
        ring_type = %ring.ring_type(),
        ring_version = ring.version(),
        "metadata authority state"
    );

    service.close()?;
    Ok(())
}
