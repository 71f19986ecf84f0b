//! # Galaxy Arena (C3)
//!
//! Two growable, index-addressed galaxy arrays: [`WorkingArena`] (`Gal`,
//! rebuilt per FOF group) and [`PersistentArena`] (`HaloGal`, one per tree,
//! flushed to the output writer before the next tree). Both grow
//! geometrically and never invalidate an index already handed out within
//! the same tree's evolution — callers address galaxies by `usize`, never
//! by reference, so a `Vec` reallocation under the hood is invisible to
//! them.

use crate::allocator::TrackingAllocator;
use crate::defaults::{
    GALAXY_ARRAY_GROWTH_FACTOR, INITIAL_FOF_GALAXIES, MAXGALFAC, MAX_GALAXY_ARRAY_SIZE,
    MIN_GALAXY_ARRAY_GROWTH,
};
use crate::error::{Error, Result};
use crate::galaxy::Galaxy;

const GALAXY_RECORD_SIZE: usize = std::mem::size_of::<Galaxy>();

/// Grow `capacity` geometrically until it is at least `needed`, honoring
/// the minimum additive growth and the hard cap shared by both arenas.
fn grow_capacity(capacity: usize, needed: usize) -> Result<usize> {
    let mut next = capacity;
    while next < needed {
        let geometric = ((next as f64) * GALAXY_ARRAY_GROWTH_FACTOR).ceil() as usize;
        next = (next + MIN_GALAXY_ARRAY_GROWTH).max(geometric);
        if next > MAX_GALAXY_ARRAY_SIZE {
            next = MAX_GALAXY_ARRAY_SIZE;
            if next < needed {
                return Err(Error::resource(format!(
                    "galaxy arena cannot grow past MAX_GALAXY_ARRAY_SIZE ({MAX_GALAXY_ARRAY_SIZE}) to satisfy {needed} slots"
                )));
            }
            break;
        }
    }
    Ok(next)
}

/// Transient per-FOF working set. Rebuilt (logically; the backing `Vec` is
/// reused where possible) at the start of every FOF-group evaluation.
pub struct WorkingArena {
    galaxies: Vec<Galaxy>,
    len: usize,
    allocator: TrackingAllocator,
}

impl WorkingArena {
    /// `max_gals` is the tree's `MaxGals` bound (`MAXGALFAC * TreeNHalos`),
    /// used only to size the initial capacity per the spec's
    /// `max(INITIAL_FOF_GALAXIES, 0.1 * MaxGals)` rule.
    pub fn new(max_gals: usize) -> Self {
        let initial = INITIAL_FOF_GALAXIES.max((max_gals as f64 * 0.1).ceil() as usize);
        let mut allocator = TrackingAllocator::new("Gal");
        allocator.alloc(initial * GALAXY_RECORD_SIZE, "Gal initial reserve");
        Self {
            galaxies: Vec::with_capacity(initial),
            len: 0,
            allocator,
        }
    }

    /// Tracked high-water mark of this arena's backing allocation, in bytes.
    pub fn high_mark_mem(&self) -> usize {
        self.allocator.high_mark_mem()
    }

    /// Discard all slots, keeping the backing allocation for reuse by the
    /// next FOF group.
    pub fn clear(&mut self) {
        self.galaxies.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a galaxy, growing the backing store if necessary. Returns the
    /// new galaxy's index.
    pub fn push(&mut self, galaxy: Galaxy) -> Result<usize> {
        let needed = self.len + 1;
        if needed > self.galaxies.capacity() {
            let before = self.galaxies.capacity();
            let target = grow_capacity(before, needed)?;
            self.galaxies.reserve(target - before);
            self.allocator
                .alloc((target - before) * GALAXY_RECORD_SIZE, "Gal growth");
        }
        if self.len < self.galaxies.len() {
            self.galaxies[self.len] = galaxy;
        } else {
            self.galaxies.push(galaxy);
        }
        let index = self.len;
        self.len += 1;
        Ok(index)
    }

    pub fn get(&self, index: usize) -> &Galaxy {
        &self.galaxies[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Galaxy {
        &mut self.galaxies[index]
    }

    pub fn slice(&self) -> &[Galaxy] {
        &self.galaxies[..self.len]
    }

    pub fn slice_mut(&mut self) -> &mut [Galaxy] {
        &mut self.galaxies[..self.len]
    }
}

/// Persistent per-tree galaxy store. One instance lives for the duration of
/// a single tree's evolution and is flushed to the output writer once the
/// tree's traversal completes.
pub struct PersistentArena {
    galaxies: Vec<Galaxy>,
    next_galaxy_nr: i64,
    max_gals: usize,
    allocator: TrackingAllocator,
}

impl PersistentArena {
    pub fn new(tree_n_halos: usize) -> Self {
        let max_gals = (MAXGALFAC * tree_n_halos).max(MIN_GALAXY_ARRAY_GROWTH);
        let mut allocator = TrackingAllocator::new("HaloGal");
        allocator.alloc(max_gals * GALAXY_RECORD_SIZE, "HaloGal initial reserve");
        Self {
            galaxies: Vec::with_capacity(max_gals),
            next_galaxy_nr: 0,
            max_gals,
            allocator,
        }
    }

    /// Tracked high-water mark of this arena's backing allocation, in bytes.
    pub fn high_mark_mem(&self) -> usize {
        self.allocator.high_mark_mem()
    }

    pub fn len(&self) -> usize {
        self.galaxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.galaxies.is_empty()
    }

    /// Issue the next strictly increasing `GalaxyNr` for this tree.
    pub fn next_galaxy_nr(&mut self) -> i64 {
        let nr = self.next_galaxy_nr;
        self.next_galaxy_nr += 1;
        nr
    }

    /// Append one galaxy. Exceeding `MaxGals` is a fatal, not recoverable,
    /// error: the tree's own halo count was used to size the bound, so
    /// overflow means either a corrupt tree or a traversal bug.
    pub fn push(&mut self, galaxy: Galaxy) -> Result<usize> {
        if self.galaxies.len() >= self.max_gals {
            return Err(Error::resource(format!(
                "persistent galaxy arena exceeded MaxGals ({}) for this tree",
                self.max_gals
            )));
        }
        self.galaxies.push(galaxy);
        Ok(self.galaxies.len() - 1)
    }

    pub fn get(&self, index: usize) -> &Galaxy {
        &self.galaxies[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Galaxy {
        &mut self.galaxies[index]
    }

    pub fn galaxies(&self) -> &[Galaxy] {
        &self.galaxies
    }

    /// Find a galaxy's most recent persisted slot by `GalaxyNr`, scanning
    /// backward since the most recent persistence of a lineage is always
    /// the latest-appended matching record.
    pub fn find_latest_by_nr(&self, galaxy_nr: i64) -> Option<usize> {
        self.galaxies
            .iter()
            .enumerate()
            .rev()
            .find(|(_, g)| g.galaxy_nr == galaxy_nr)
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_arena_push_preserves_earlier_indices_across_growth() {
        let mut arena = WorkingArena::new(10);
        let mut indices = Vec::new();
        for i in 0..5000 {
            let mut g = Galaxy::default();
            g.galaxy_nr = i;
            indices.push(arena.push(g).unwrap());
        }
        for (i, &idx) in indices.iter().enumerate() {
            assert_eq!(arena.get(idx).galaxy_nr, i as i64);
        }
    }

    #[test]
    fn working_arena_clear_resets_len_not_capacity() {
        let mut arena = WorkingArena::new(10);
        arena.push(Galaxy::default()).unwrap();
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert!(arena.is_empty());
    }

    #[test]
    fn persistent_arena_issues_strictly_increasing_ids() {
        let mut arena = PersistentArena::new(100);
        let a = arena.next_galaxy_nr();
        let b = arena.next_galaxy_nr();
        assert!(b > a);
    }

    #[test]
    fn persistent_arena_rejects_growth_past_max_gals() {
        let mut arena = PersistentArena::new(1);
        for _ in 0..MIN_GALAXY_ARRAY_GROWTH {
            arena.push(Galaxy::default()).unwrap();
        }
        assert!(arena.push(Galaxy::default()).is_err());
    }

    #[test]
    fn find_latest_by_nr_returns_most_recent_match() {
        let mut arena = PersistentArena::new(10);
        let mut g1 = Galaxy::default();
        g1.galaxy_nr = 7;
        let mut g2 = Galaxy::default();
        g2.galaxy_nr = 7;
        arena.push(g1).unwrap();
        let second = arena.push(g2).unwrap();
        assert_eq!(arena.find_latest_by_nr(7), Some(second));
    }
}
