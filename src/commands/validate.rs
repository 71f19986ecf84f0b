//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which parses and
//! validates a configuration file and, optionally, the header of a binary
//! tree file, without running any physics.
//!
//! This command is a safe, read-only operation that does not modify any
//! files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use galsam::config::Config;
use galsam::tree_source::binary::BinaryTreeSource;
use galsam::tree_source::TreeSource;

/// Validate a configuration file and, optionally, a tree file's header
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the configuration file to validate
    pub config: PathBuf,

    /// Also open this binary tree file and validate its header
    #[arg(long)]
    pub tree_file: Option<PathBuf>,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs) -> Result<()> {
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to parse configuration file {}", args.config.display()))?;
    config
        .validate()
        .with_context(|| format!("configuration file {} is invalid", args.config.display()))?;
    println!("config: {} is valid", args.config.display());

    if let Some(tree_file) = &args.tree_file {
        let mut source = BinaryTreeSource::new(tree_file);
        let table = source
            .open()
            .with_context(|| format!("failed to open tree file {}", tree_file.display()))?;
        println!(
            "tree file: {} is valid ({} trees, {} halos, {} endian)",
            tree_file.display(),
            table.ntrees,
            table.tot_n_halos,
            source.detected_endian()
        );
        source.close().context("failed to close tree file")?;
    }

    Ok(())
}
