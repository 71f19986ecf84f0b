//! # Info Command Implementation
//!
//! This module implements the `info` subcommand, which opens a single
//! binary tree file and reports the counts and byte order the tree source
//! auto-detected, without running any physics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use galsam::tree_source::binary::BinaryTreeSource;
use galsam::tree_source::TreeSource;

/// Show tree/halo counts and detected endianness of a binary tree file
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Path to the binary tree file to inspect
    pub tree_file: PathBuf,
}

/// Execute the `info` command.
pub fn execute(args: InfoArgs) -> Result<()> {
    let mut source = BinaryTreeSource::new(&args.tree_file);
    let table = source
        .open()
        .with_context(|| format!("failed to open tree file {}", args.tree_file.display()))?;

    let min = table.halos_per_tree.iter().copied().min().unwrap_or(0);
    let max = table.halos_per_tree.iter().copied().max().unwrap_or(0);
    let mean = if table.ntrees > 0 {
        table.tot_n_halos as f64 / table.ntrees as f64
    } else {
        0.0
    };

    println!("file:            {}", args.tree_file.display());
    println!("detected endian: {}", source.detected_endian());
    println!("trees:           {}", table.ntrees);
    println!("total halos:     {}", table.tot_n_halos);
    println!("halos per tree:  min {min}, max {max}, mean {mean:.1}");

    source.close().context("failed to close tree file")?;
    Ok(())
}
