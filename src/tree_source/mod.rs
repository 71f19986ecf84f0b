//! # Tree-Source Interface (C1)
//!
//! A tree source is anything that can hand the traversal engine a file's
//! tree table (`Ntrees`, the per-tree halo counts) and, on demand, one
//! tree's halo array. Two implementations exist: [`binary`] (the default,
//! zero-dependency wire format) and [`hdf5`] (feature-gated behind
//! `hdf5-source`). The evolution kernel is generic over the [`TreeSource`]
//! trait and never matches on which backend produced a halo array.

pub mod binary;
#[cfg(feature = "hdf5-source")]
pub mod hdf5;

use crate::error::Result;
use crate::halo::Halo;

/// Per-file tree table: how many trees the file holds and the halo count
/// for each one. `tree_first_halo[i]` is the running offset of tree `i`'s
/// first halo within the file's flat halo array, satisfying
/// `tree_first_halo[i+1] - tree_first_halo[i] == halos_per_tree[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeTable {
    pub ntrees: usize,
    pub tot_n_halos: usize,
    pub halos_per_tree: Vec<i32>,
}

impl TreeTable {
    /// Running per-tree offsets into the file's flat halo array.
    pub fn tree_first_halo(&self) -> Vec<i64> {
        let mut offsets = Vec::with_capacity(self.halos_per_tree.len() + 1);
        let mut running = 0i64;
        offsets.push(running);
        for &n in &self.halos_per_tree {
            running += n as i64;
            offsets.push(running);
        }
        offsets
    }
}

/// A source of merger-tree halo data for one input file.
///
/// Implementations own whatever file handle or dataset references they need
/// between `open` and `close`; `load_tree` may be called any number of
/// times, in any order, once `open` has returned a [`TreeTable`].
pub trait TreeSource {
    /// Open the file and return its tree table. Must be called before
    /// `load_tree`.
    fn open(&mut self) -> Result<TreeTable>;

    /// Load the halo array for one tree. `tree_index` is in
    /// `[0, table.ntrees)`.
    fn load_tree(&mut self, tree_index: usize) -> Result<Vec<Halo>>;

    /// Release any file handles or resources. Implementations also release
    /// on `Drop`; calling `close` explicitly lets callers surface I/O
    /// errors from the release step instead of losing them silently.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_first_halo_offsets_match_invariant() {
        let table = TreeTable {
            ntrees: 3,
            tot_n_halos: 9,
            halos_per_tree: vec![4, 2, 3],
        };
        let offsets = table.tree_first_halo();
        assert_eq!(offsets, vec![0, 4, 6, 9]);
        for i in 0..table.ntrees {
            assert_eq!(
                offsets[i + 1] - offsets[i],
                table.halos_per_tree[i] as i64
            );
        }
    }
}
