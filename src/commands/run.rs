//! # Run Command Implementation
//!
//! Drives the end-to-end pipeline: parse and validate the configuration,
//! resolve the file numbers to process, and for each input file load its
//! tree table, evolve every tree, and flush the per-snapshot galaxy
//! catalogues (§4.11). Files are processed in parallel via `rayon` when more
//! than one is queued; each worker owns its own tree source, halo store,
//! arenas, and output writers.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use galsam::arena::{PersistentArena, WorkingArena};
use galsam::config::Config;
use galsam::cosmology::{snapshot_scale_factors, Cosmology};
use galsam::error::Error;
use galsam::galaxy::GalaxyType;
use galsam::halo::HaloStore;
use galsam::join::join_halo;
use galsam::output::{finalize_fof_group, SnapshotWriter};
use galsam::physics::{evolve_fof_group, CoolingTable, NullCoolingTable};
use galsam::traversal::{traverse_tree, FofEvaluator};
use galsam::tree_source::binary::BinaryTreeSource;
use galsam::tree_source::TreeSource;

/// Run the full evolution pipeline over a configured set of tree files
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML parameter file driving this run.
    #[arg(short, long, value_name = "FILE", default_value = "galsam.yaml")]
    pub config: PathBuf,

    /// Process input files sequentially instead of across a rayon pool.
    #[arg(long)]
    pub sequential: bool,
}

/// One FOF-group evaluator, owned for the lifetime of one tree. Ties
/// together the join stage, the physics pipeline, and the output stage in
/// the order the traversal engine drives them.
struct TreeRunner<'a> {
    tree_index: usize,
    config: &'a Config,
    cosmology: &'a Cosmology,
    cooling_table: &'a dyn CoolingTable,
    persistent: &'a mut PersistentArena,
    working: WorkingArena,
}

impl FofEvaluator for TreeRunner<'_> {
    fn evaluate_fof(&mut self, store: &mut HaloStore, fof_root: i32) -> galsam::error::Result<()> {
        self.working.clear();

        let mut sibling = fof_root;
        while sibling != galsam::halo::NONE {
            join_halo(
                self.tree_index,
                sibling,
                store,
                self.persistent,
                &mut self.working,
                self.config,
                self.cosmology,
            )?;
            sibling = store.halo(sibling).next_halo_in_fof_group;
        }

        let central = (0..self.working.len())
            .find(|&p| self.working.get(p).galaxy_type == GalaxyType::Central)
            .ok_or_else(|| {
                Error::invariant(
                    self.tree_index,
                    Some(fof_root),
                    None,
                    "FOF group produced no central galaxy",
                )
            })?;

        evolve_fof_group(
            self.tree_index,
            fof_root,
            central,
            store,
            &mut self.working,
            self.config,
            self.cosmology,
            self.cooling_table,
        )?;

        finalize_fof_group(fof_root, &mut self.working, self.persistent, store)
    }
}

/// Outcome of processing a single input file.
struct FileSummary {
    file_nr: u32,
    trees_processed: usize,
    galaxies_emitted: usize,
}

fn process_file(
    file_nr: u32,
    config: &Config,
    cosmology: &Cosmology,
    cooling_table: &dyn CoolingTable,
    output_snapshots: &[usize],
) -> galsam::error::Result<FileSummary> {
    let path = config.tree_file_path(file_nr);
    let path_string = path.display().to_string();
    let mut source = BinaryTreeSource::new(&path);
    let table = source.open()?;

    let mut writers: Vec<SnapshotWriter> = output_snapshots
        .iter()
        .map(|&snap| SnapshotWriter::new(snap, table.ntrees))
        .collect();

    let mut galaxies_emitted = 0usize;
    for tree_index in 0..table.ntrees {
        let halos = source.load_tree(tree_index)?;
        let mut store = HaloStore::new(halos);
        store.validate_pointers(tree_index, &path_string)?;

        let tree_n_halos = table.halos_per_tree[tree_index] as usize;
        let mut persistent = PersistentArena::new(tree_n_halos);
        let working = WorkingArena::new(tree_n_halos);

        let mut runner = TreeRunner {
            tree_index,
            config,
            cosmology,
            cooling_table,
            persistent: &mut persistent,
            working,
        };
        traverse_tree(&mut store, &mut runner, tree_index)?;

        for writer in writers.iter_mut() {
            writer.add_tree(tree_index, persistent.galaxies(), file_nr)?;
        }
        galaxies_emitted += persistent.len();

        log::info!(
            "file {file_nr}: tree {tree_index}/{} evolved, {} galaxies persisted (high-water mark {} bytes)",
            table.ntrees,
            persistent.len(),
            persistent.high_mark_mem(),
        );
    }
    source.close()?;

    for (writer, &snap) in writers.iter().zip(output_snapshots.iter()) {
        let redshift = cosmology.redshift_at(snap);
        let out_path = config.galaxy_output_path(redshift, file_nr);
        writer.write_to(&out_path)?;
    }

    Ok(FileSummary {
        file_nr,
        trees_processed: table.ntrees,
        galaxies_emitted,
    })
}

/// Execute the `run` command.
pub fn execute(args: RunArgs) -> Result<()> {
    let start = Instant::now();
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    let scale_factors = snapshot_scale_factors(config.num_snapshots);
    let cosmology = Cosmology::build(&config, &scale_factors);
    let output_snapshots = config.outputs.resolve(config.num_snapshots);
    let cooling_table = NullCoolingTable;

    let file_numbers: Vec<u32> = config.file_numbers().collect();
    log::info!(
        "processing files {}..={} ({} total)",
        config.first_file,
        config.last_file,
        file_numbers.len()
    );

    let progress = ProgressBar::new(file_numbers.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} files ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let run_one = |file_nr: u32| -> galsam::error::Result<FileSummary> {
        let result = process_file(file_nr, &config, &cosmology, &cooling_table, &output_snapshots);
        progress.inc(1);
        result
    };

    let summaries: Vec<galsam::error::Result<FileSummary>> = if args.sequential {
        file_numbers.iter().map(|&f| run_one(f)).collect()
    } else {
        file_numbers.par_iter().map(|&f| run_one(f)).collect()
    };
    progress.finish_and_clear();

    let mut trees_processed = 0usize;
    let mut galaxies_emitted = 0usize;
    for summary in summaries {
        match summary {
            Ok(s) => {
                log::info!(
                    "file {}: {} trees, {} galaxies emitted",
                    s.file_nr,
                    s.trees_processed,
                    s.galaxies_emitted
                );
                trees_processed += s.trees_processed;
                galaxies_emitted += s.galaxies_emitted;
            }
            Err(e) => {
                log::error!("fatal error: {e}");
                return Err(anyhow::anyhow!(e));
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "run complete: {trees_processed} trees processed, {galaxies_emitted} galaxies emitted in {:.2}s",
        elapsed.as_secs_f64()
    );

    Ok(())
}
