use std::cell::Cell;

use memmap2::{MmapMut, MmapOptions};

use crate::denoiser::error::DenoiseError;

pub const PAGE_SIZE: usize = 4096;

/// One mapping covers the whole working set of a frame: five float streams
/// of an HD g-buffer fit comfortably.
const DEFAULT_CAPACITY: usize = 500 * 1024 * 1024;

/// Bump allocator over a private anonymous mapping.
///
/// Every allocation advances the cursor by a whole number of pages and
/// returns a span starting `offset_bytes` into the fresh pages. The offset is
/// a cache-colouring knob: concurrently-live streams given distinct offsets
/// land in distinct L1 sets, which matters in the kernel's five-stream loop.
///
/// There is no per-allocation free; spans live until the arena is dropped.
/// Allocation is single-threaded (`Cell` cursor, `!Sync`).
pub struct MemoryArena {
    map: MmapMut,
    base: *mut u8,
    top: Cell<usize>,
}

impl MemoryArena {
    pub fn new() -> Result<Self, DenoiseError> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, DenoiseError> {
        let mut map = MmapOptions::new()
            .len(capacity)
            .map_anon()
            .map_err(DenoiseError::ArenaMap)?;
        let base = map.as_mut_ptr();
        Ok(Self {
            map,
            base,
            top: Cell::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    pub fn used(&self) -> usize {
        self.top.get()
    }

    /// Carve a `size_elems`-long span out of the mapping, `offset_bytes` past
    /// a page boundary. The memory is OS-zeroed but otherwise uninitialised;
    /// callers write before reading anything meaningful.
    pub fn allocate<T: bytemuck::Pod>(
        &self,
        offset_bytes: usize,
        size_elems: usize,
    ) -> Result<&mut [T], DenoiseError> {
        assert_eq!(
            offset_bytes % std::mem::size_of::<T>(),
            0,
            "colouring offset must preserve element alignment"
        );

        let size_bytes = size_elems * std::mem::size_of::<T>();
        let rounded = (size_bytes + offset_bytes).div_ceil(PAGE_SIZE) * PAGE_SIZE;
        assert!(offset_bytes <= rounded);

        let top = self.top.get();
        if top + rounded > self.map.len() {
            return Err(DenoiseError::ArenaExhausted {
                requested: rounded,
                remaining: self.map.len() - top,
            });
        }
        self.top.set(top + rounded);

        // Each call hands out a disjoint region of the mapping: the cursor
        // only moves forward and nothing is ever reused, so the returned
        // exclusive slice cannot alias a previously returned one.
        unsafe {
            let ptr = self.base.add(top + offset_bytes).cast::<T>();
            Ok(std::slice::from_raw_parts_mut(ptr, size_elems))
        }
    }

    /// Touch every page so the kernel timing does not include minor faults.
    /// Must run before any allocation is handed out.
    pub fn prefault(&self) {
        assert_eq!(self.top.get(), 0, "prefault must run before allocations");
        for page in (0..self.map.len()).step_by(PAGE_SIZE) {
            unsafe { self.base.add(page).write_volatile(0) };
        }
    }
}

impl Drop for MemoryArena {
    fn drop(&mut self) {
        let total = self.map.len();
        let used = self.top.get();
        tracing::debug!(
            used_kib = used / 1024,
            total_kib = total / 1024,
            percent = 100 * used / total,
            "arena released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_whole_pages() {
        let arena = MemoryArena::with_capacity(16 * PAGE_SIZE).unwrap();
        let one = arena.allocate::<f32>(0, 1).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(arena.used(), PAGE_SIZE);

        let big = arena.allocate::<f32>(0, PAGE_SIZE / 4 + 1).unwrap();
        assert_eq!(big.len(), PAGE_SIZE / 4 + 1);
        assert_eq!(arena.used(), 3 * PAGE_SIZE);
    }

    #[test]
    fn colouring_offset_shifts_span_within_page() {
        let arena = MemoryArena::with_capacity(16 * PAGE_SIZE).unwrap();
        let a = arena.allocate::<f32>(0, 8).unwrap();
        let b = arena.allocate::<f32>(128, 8).unwrap();
        let c = arena.allocate::<f32>(192, 8).unwrap();
        assert_eq!(a.as_ptr() as usize % PAGE_SIZE, 0);
        assert_eq!(b.as_ptr() as usize % PAGE_SIZE, 128);
        assert_eq!(c.as_ptr() as usize % PAGE_SIZE, 192);
    }

    #[test]
    fn offset_spills_into_next_page() {
        let arena = MemoryArena::with_capacity(16 * PAGE_SIZE).unwrap();
        // One page worth of floats plus a nonzero offset spills to two pages.
        arena.allocate::<f32>(128, PAGE_SIZE / 4).unwrap();
        assert_eq!(arena.used(), 2 * PAGE_SIZE);
    }

    #[test]
    fn spans_are_disjoint_and_writable() {
        let arena = MemoryArena::with_capacity(16 * PAGE_SIZE).unwrap();
        let a = arena.allocate::<f32>(0, 16).unwrap();
        let b = arena.allocate::<f32>(0, 16).unwrap();
        a.fill(1.0);
        b.fill(2.0);
        assert!(a.iter().all(|&v| v == 1.0));
        assert!(b.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn exhaustion_is_an_error() {
        let arena = MemoryArena::with_capacity(4 * PAGE_SIZE).unwrap();
        arena.allocate::<f32>(0, PAGE_SIZE / 4).unwrap();
        let err = arena.allocate::<f32>(0, PAGE_SIZE).unwrap_err();
        assert!(matches!(err, DenoiseError::ArenaExhausted { .. }));
        // A fitting request still succeeds afterwards.
        arena.allocate::<f32>(0, PAGE_SIZE / 4).unwrap();
    }

    #[test]
    fn prefault_before_use() {
        let arena = MemoryArena::with_capacity(8 * PAGE_SIZE).unwrap();
        arena.prefault();
        let span = arena.allocate::<f32>(0, 4).unwrap();
        assert!(span.iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "prefault must run before allocations")]
    fn prefault_after_allocation_panics() {
        let arena = MemoryArena::with_capacity(8 * PAGE_SIZE).unwrap();
        let _span = arena.allocate::<f32>(0, 4).unwrap();
        arena.prefault();
    }
}
