//! fastpack CLI
//!
//! Thin command-line wrapper around the fastpack packaging pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fastpack::{
    compute_digest_for, package, remote_location, CompressionBackend, IgnoreKind, PackageOptions,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fastpack", version, about = "Reproducible, ignore-aware source packaging")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a source directory into fast<digest>.tar.gz
    Package {
        /// Source directory
        source: PathBuf,

        /// Directory to write the archive into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        options: OptionArgs,

        /// Compression backend
        #[arg(long, value_enum)]
        compression: Option<CompressionBackend>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the digest of a source directory without packaging it
    Digest {
        /// Source directory
        source: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the remote location an archive with this digest is uploaded to
    RemoteLocation {
        /// Base remote URI, e.g. s3://bucket/dir
        base_uri: String,
        /// Hex digest
        digest: String,
    },
}

#[derive(clap::Args)]
struct OptionArgs {
    /// TOML file with packaging options
    #[arg(short, long, env = "FASTPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Explicit ignore source (repeatable)
    #[arg(long = "ignore", value_enum)]
    ignores: Vec<IgnoreKind>,

    /// Do not union the default ignore sources
    #[arg(long)]
    no_default_ignores: bool,

    /// Store symlink targets' content instead of the links
    #[arg(long)]
    deref_symlinks: bool,
}

impl OptionArgs {
    fn resolve(self) -> Result<PackageOptions> {
        let mut options = match &self.config {
            Some(path) => PackageOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => PackageOptions::default(),
        };

        options.ignores.extend(self.ignores);
        if self.no_default_ignores {
            options.keep_default_ignores = false;
        }
        if self.deref_symlinks {
            options.deref_symlinks = true;
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Package {
            source,
            output_dir,
            options,
            compression,
            json,
        } => {
            let mut options = options.resolve()?;
            if let Some(compression) = compression {
                options.compression = compression;
            }

            std::fs::create_dir_all(&output_dir).with_context(|| {
                format!("Failed to create output directory {}", output_dir.display())
            })?;

            let packaged = package(&source, &output_dir, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&packaged)?);
            } else {
                println!(
                    "{} {}",
                    "Packaged".green().bold(),
                    packaged.archive_path.display()
                );
                println!("  digest:  {}", packaged.digest.to_string().cyan());
                println!(
                    "  entries: {} files, {} directories, {} symlinks ({} skipped)",
                    packaged.stats.files,
                    packaged.stats.directories,
                    packaged.stats.symlinks,
                    packaged.stats.skipped
                );
            }
        },
        Commands::Digest { source, options } => {
            let options = options.resolve()?;
            let digest = compute_digest_for(&source, &options)?;
            println!("{}", digest);
        },
        Commands::RemoteLocation { base_uri, digest } => {
            println!("{}", remote_location(&base_uri, &digest));
        },
    }

    Ok(())
}
