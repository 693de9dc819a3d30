//! Self-modifying-code tracking
//!
//! Executable segments register code regions; every write through the bus
//! marks the 4-byte words it touches so cached translations can be
//! invalidated and re-derived.

use parking_lot::RwLock;
use tracing::debug;

/// A registered executable region with one modified bit per 4-byte word
struct CodeRegion {
    start: u32,
    end: u32,
    modified: Vec<bool>,
}

impl CodeRegion {
    /// Word-bit range covered by `[addr, addr + size)`, clipped to the region.
    /// The trailing word is included even when only partially written.
    fn word_span(&self, addr: u32, size: u32) -> Option<(usize, usize)> {
        let write_end = u64::from(addr) + u64::from(size);
        if write_end <= u64::from(self.start) || addr >= self.end {
            return None;
        }

        let overlap_start = addr.max(self.start);
        let overlap_end = (write_end.min(u64::from(self.end))) as u32;

        let first = ((overlap_start - self.start) / 4) as usize;
        let last = (((overlap_end - self.start) as usize) + 3) / 4;
        Some((first, last.min(self.modified.len())))
    }
}

/// Tracks writes into registered executable regions
pub struct SmcTracker {
    regions: RwLock<Vec<CodeRegion>>,
}

impl SmcTracker {
    /// Create a tracker with no regions
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(Vec::new()),
        }
    }

    /// Register the executable region `[start, end)`
    pub fn register_region(&self, start: u32, end: u32) {
        let words = ((end - start) / 4) as usize;
        self.regions.write().push(CodeRegion {
            start,
            end,
            modified: vec![false; words],
        });
        debug!(target: "smc", "registered code region {start:#010x} - {end:#010x}");
    }

    /// Mark every word overlapping `[addr, addr + size)` as modified
    pub fn mark_modified(&self, addr: u32, size: u32) {
        for region in self.regions.write().iter_mut() {
            if let Some((first, last)) = region.word_span(addr, size) {
                for bit in first..last {
                    region.modified[bit] = true;
                }
            }
        }
    }

    /// Whether any word overlapping `[addr, addr + size)` has been modified
    pub fn is_modified(&self, addr: u32, size: u32) -> bool {
        self.regions.read().iter().any(|region| {
            region
                .word_span(addr, size)
                .is_some_and(|(first, last)| region.modified[first..last].iter().any(|&b| b))
        })
    }

    /// Clear the modified bits for words overlapping `[addr, addr + size)`
    pub fn clear_modified(&self, addr: u32, size: u32) {
        for region in self.regions.write().iter_mut() {
            if let Some((first, last)) = region.word_span(addr, size) {
                for bit in first..last {
                    region.modified[bit] = false;
                }
            }
        }
    }
}

impl Default for SmcTracker {
    fn default() -> Self {
        Self::new()
    }
}
