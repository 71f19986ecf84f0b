//! # Tracking Allocator (C9)
//!
//! Out-of-order allocation tracking layered in front of the system
//! allocator — this is a bookkeeping structure the galaxy arenas report
//! their own growth to, not a `#[global_allocator]`. Tracks `TotMem` and
//! `HighMarkMem`, logs an `info!` line whenever the high-water mark grows
//! by at least [`crate::defaults::ALLOCATOR_LOG_THRESHOLD_BYTES`], and
//! reports any still-live block at `warn!` on teardown.

use crate::defaults::ALLOCATOR_LOG_THRESHOLD_BYTES;

const MIN_ALLOCATION: usize = 8;
const ALIGNMENT: usize = 8;

fn align_up(size: usize, align: usize) -> usize {
    size.max(MIN_ALLOCATION).div_ceil(align) * align
}

struct Allocation {
    handle: u64,
    size: usize,
    label: String,
}

/// An opaque handle to a tracked allocation. Only valid with the
/// [`TrackingAllocator`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocHandle(u64);

/// One worker's (or test's) allocation ledger. Each outer-file worker, when
/// the run is parallelized across files, owns an independent instance —
/// there is no process-wide singleton to contend on.
pub struct TrackingAllocator {
    name: String,
    active: Vec<Allocation>,
    next_handle: u64,
    tot_mem: usize,
    high_mark_mem: usize,
}

impl TrackingAllocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: Vec::new(),
            next_handle: 0,
            tot_mem: 0,
            high_mark_mem: 0,
        }
    }

    /// Record a tracked allocation of `size` bytes, rounded up to an 8-byte
    /// alignment with an 8-byte minimum.
    pub fn alloc(&mut self, size: usize, label: impl Into<String>) -> AllocHandle {
        let size = align_up(size, ALIGNMENT);
        let handle = self.next_handle;
        self.next_handle += 1;
        self.active.push(Allocation {
            handle,
            size,
            label: label.into(),
        });
        self.tot_mem += size;
        self.maybe_log_high_mark();
        AllocHandle(handle)
    }

    /// Release a tracked allocation. O(1) if it is the most recently
    /// allocated still-live block; a linear scan otherwise.
    pub fn free(&mut self, handle: AllocHandle) {
        if let Some(last) = self.active.last() {
            if last.handle == handle.0 {
                let freed = self.active.pop().expect("checked Some above");
                self.tot_mem -= freed.size;
                return;
            }
        }
        if let Some(pos) = self.active.iter().position(|a| a.handle == handle.0) {
            let freed = self.active.remove(pos);
            self.tot_mem -= freed.size;
        }
    }

    pub fn tot_mem(&self) -> usize {
        self.tot_mem
    }

    pub fn high_mark_mem(&self) -> usize {
        self.high_mark_mem
    }

    fn maybe_log_high_mark(&mut self) {
        if self.tot_mem > self.high_mark_mem {
            let growth = self.tot_mem - self.high_mark_mem;
            self.high_mark_mem = self.tot_mem;
            if growth >= ALLOCATOR_LOG_THRESHOLD_BYTES {
                log::info!(
                    "{}: high-water mark grew by {} bytes to {} bytes",
                    self.name,
                    growth,
                    self.high_mark_mem
                );
            }
        }
    }

    /// Number of still-live tracked blocks. Exposed for tests; production
    /// code relies on the `Drop` leak scan instead.
    pub fn live_block_count(&self) -> usize {
        self.active.len()
    }
}

impl Drop for TrackingAllocator {
    fn drop(&mut self) {
        for leaked in &self.active {
            log::warn!(
                "{}: leaked allocation '{}' of {} bytes",
                self.name,
                leaked.label,
                leaked.size
            );
        }
    }
}
