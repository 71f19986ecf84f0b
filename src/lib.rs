//! # galsam
//!
//! A semi-analytic galaxy formation engine: reads dark-matter merger trees,
//! evolves a galaxy population along each tree by depth-first traversal, and
//! writes a per-snapshot galaxy catalogue.
//!
//! ## Core concepts
//!
//! - **Tree sources (`tree_source`)**: anything that can hand the traversal
//!   engine a file's tree table and, on demand, one tree's halo array. The
//!   binary wire format is built in; an HDF5 backend is available behind the
//!   `hdf5-source` feature.
//! - **Halo model (`halo`)**: the immutable per-snapshot dark-matter record
//!   and the transient per-halo traversal bookkeeping (`HaloAux`).
//! - **Galaxy arenas (`arena`)**: two growable, index-addressed galaxy
//!   arrays — one rebuilt per FOF group, one persistent per tree — backed by
//!   a tracking allocator (`allocator`).
//! - **Traversal (`traversal`)**: depth-first, dependency-ordered walk over
//!   one tree's halos, driving a `FofEvaluator` once per completed FOF
//!   group.
//! - **Join (`join`), physics (`physics`), merger (`merger`)**: galaxy
//!   construction, the per-substep evolution pipeline, and the
//!   merger/disruption stage.
//! - **Output (`output`)**: converts a FOF group's survivors into
//!   persistent-arena records and flushes per-snapshot galaxy catalogues.
//! - **Configuration (`config`) and cosmology (`cosmology`)**: the run's
//!   validated parameter set and the per-snapshot age/redshift tables
//!   derived from it.
//!
//! ## Execution flow
//!
//! For each input tree file (optionally in parallel across files), the tree
//! source fills a file's halo arrays; for each tree, the traversal engine
//! walks the halo graph and, on completing each FOF group, drives join →
//! the sub-stepped physics pipeline → the merger/disruption stage → the
//! output stage in sequence. Once every tree in a file is processed, the
//! per-snapshot output writer flushes that file's contribution to disk.

pub mod allocator;
pub mod arena;
pub mod config;
pub mod cosmology;
pub mod defaults;
pub mod error;
pub mod galaxy;
pub mod halo;
pub mod join;
pub mod merger;
pub mod output;
pub mod physics;
pub mod traversal;
pub mod tree_source;
