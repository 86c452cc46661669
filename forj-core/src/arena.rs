//! Fixed-size arena with an address-ordered free list.
//!
//! Every atom and every buffer lives in one byte array. Free blocks store
//! their own `next: u32` and `size: u32` inline in their first eight bytes.
//! The first granule of the arena is the free-list head and is never handed
//! out, so address 0 doubles as the null address.

use crate::compat::{Vec, vec};
use crate::config::ArenaConfig;
use crate::error::RuntimeError;

/// Byte offset into the arena. Zero is null.
pub type Addr = u32;

/// Allocation granularity; also the size of a free-block header.
pub const GRANULE: usize = 8;

const HEAD: Addr = 0;

pub fn round_block(size: usize) -> usize {
    let size = size.max(1);
    size.div_ceil(GRANULE) * GRANULE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub capacity: usize,
    pub free_bytes: usize,
    pub largest_free: usize,
    pub free_blocks: usize,
    pub live_blocks: usize,
}

pub struct Arena {
    mem: Vec<u8>,
    poison: u8,
    live_blocks: usize,
}

impl Arena {
    pub fn new(heap_size: usize) -> Self {
        Self::with_config(&ArenaConfig {
            heap_size,
            ..ArenaConfig::default()
        })
    }

    pub fn with_config(config: &ArenaConfig) -> Self {
        let capacity = (config.heap_size / GRANULE) * GRANULE;
        let capacity = capacity.max(2 * GRANULE).min(u32::MAX as usize);
        let mut arena = Arena {
            mem: vec![0; capacity],
            poison: config.poison,
            live_blocks: 0,
        };
        let first = GRANULE as Addr;
        arena.set_link(HEAD, first);
        arena.set_link(first, 0);
        arena.set_block_size(first, capacity - GRANULE);
        arena
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    pub fn live_blocks(&self) -> usize {
        self.live_blocks
    }

    /// First-fit allocation. The block is carved from the high end of the
    /// free block that satisfies it, so the free-list link stays put.
    pub fn allocate(&mut self, size: usize) -> Result<Addr, RuntimeError> {
        let size = round_block(size);
        let mut prev = HEAD;
        let mut cur = self.link(HEAD);
        while cur != 0 {
            let available = self.block_size(cur);
            if available >= size {
                let addr = if available == size {
                    let next = self.link(cur);
                    self.set_link(prev, next);
                    cur
                } else {
                    self.set_block_size(cur, available - size);
                    cur + (available - size) as Addr
                };
                self.mem[addr as usize..addr as usize + size].fill(0);
                self.live_blocks += 1;
                return Ok(addr);
            }
            prev = cur;
            cur = self.link(cur);
        }
        log::error!("arena exhausted: {} bytes requested", size);
        Err(RuntimeError::AllocationFailure { requested: size })
    }

    /// Return a block to the free list, poisoning it first and merging it with
    /// any physically adjacent free neighbour.
    pub fn reclaim(&mut self, addr: Addr, size: usize) {
        let size = round_block(size);
        debug_assert!(addr as usize >= GRANULE && addr as usize + size <= self.mem.len());
        self.mem[addr as usize..addr as usize + size].fill(self.poison);

        let mut prev = HEAD;
        let mut next = self.link(HEAD);
        while next != 0 && next < addr {
            prev = next;
            next = self.link(next);
        }
        debug_assert!(next != addr, "double reclaim of {:#x}", addr);

        self.set_link(addr, next);
        self.set_block_size(addr, size);
        self.set_link(prev, addr);

        if next != 0 && addr as usize + size == next as usize {
            let merged = size + self.block_size(next);
            let after = self.link(next);
            self.set_block_size(addr, merged);
            self.set_link(addr, after);
        }
        if prev != HEAD && prev as usize + self.block_size(prev) == addr as usize {
            let merged = self.block_size(prev) + self.block_size(addr);
            let after = self.link(addr);
            self.set_block_size(prev, merged);
            self.set_link(prev, after);
        }
        self.live_blocks -= 1;
    }

    pub fn stats(&self) -> ArenaStats {
        let mut free_bytes = 0;
        let mut largest_free = 0;
        let mut free_blocks = 0;
        let mut cur = self.link(HEAD);
        while cur != 0 {
            let size = self.block_size(cur);
            free_bytes += size;
            largest_free = largest_free.max(size);
            free_blocks += 1;
            cur = self.link(cur);
        }
        ArenaStats {
            capacity: self.mem.len(),
            free_bytes,
            largest_free,
            free_blocks,
            live_blocks: self.live_blocks,
        }
    }

    // Raw access used by the atom and buffer layers

    pub fn read_u8(&self, addr: Addr) -> u8 {
        self.mem[addr as usize]
    }

    pub fn write_u8(&mut self, addr: Addr, value: u8) {
        self.mem[addr as usize] = value;
    }

    pub fn read_u32(&self, addr: Addr) -> u32 {
        let at = addr as usize;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.mem[at..at + 4]);
        u32::from_le_bytes(raw)
    }

    pub fn write_u32(&mut self, addr: Addr, value: u32) {
        let at = addr as usize;
        self.mem[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_u64(&self, addr: Addr) -> u64 {
        let at = addr as usize;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.mem[at..at + 8]);
        u64::from_le_bytes(raw)
    }

    pub fn write_u64(&mut self, addr: Addr, value: u64) {
        let at = addr as usize;
        self.mem[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn bytes(&self, addr: Addr, len: usize) -> &[u8] {
        &self.mem[addr as usize..addr as usize + len]
    }

    pub fn bytes_mut(&mut self, addr: Addr, len: usize) -> &mut [u8] {
        &mut self.mem[addr as usize..addr as usize + len]
    }

    fn link(&self, block: Addr) -> Addr {
        self.read_u32(block)
    }

    fn set_link(&mut self, block: Addr, next: Addr) {
        self.write_u32(block, next);
    }

    fn block_size(&self, block: Addr) -> usize {
        self.read_u32(block + 4) as usize
    }

    fn set_block_size(&mut self, block: Addr, size: usize) {
        self.write_u32(block + 4, size as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(round_block(0), 8);
        assert_eq!(round_block(1), 8);
        assert_eq!(round_block(8), 8);
        assert_eq!(round_block(9), 16);
        assert_eq!(round_block(24), 24);
    }

    #[test]
    fn test_allocate_never_returns_null() {
        let mut arena = Arena::new(256);
        let a = arena.allocate(24).unwrap();
        let b = arena.allocate(24).unwrap();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
        assert_eq!(arena.live_blocks(), 2);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut arena = Arena::new(64);
        // 56 usable bytes after the head granule
        assert!(arena.allocate(56).is_ok());
        assert_eq!(
            arena.allocate(8),
            Err(RuntimeError::AllocationFailure { requested: 8 })
        );
    }

    #[test]
    fn test_reclaim_poisons_block() {
        let mut arena = Arena::new(128);
        let a = arena.allocate(32).unwrap();
        arena.bytes_mut(a, 32).fill(0x11);
        arena.reclaim(a, 32);
        // The first granule holds the free-list header; the rest is poison
        assert!(arena.bytes(a + 8, 24).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_coalescing_in_any_order() {
        let mut arena = Arena::new(1024);
        let baseline = arena.stats();
        let blocks: Vec<Addr> = (0..6).map(|_| arena.allocate(24).unwrap()).collect();
        for &i in &[3usize, 0, 5, 1, 4, 2] {
            arena.reclaim(blocks[i], 24);
        }
        let after = arena.stats();
        assert_eq!(after.free_blocks, 1);
        assert_eq!(after.free_bytes, baseline.free_bytes);
        assert_eq!(after.live_blocks, 0);
        // One block the size of all six fits again
        assert!(arena.allocate(6 * 24).is_ok());
    }

    #[test]
    fn test_exact_fit_unlinks_block() {
        let mut arena = Arena::new(64);
        let a = arena.allocate(56).unwrap();
        assert_eq!(arena.stats().free_blocks, 0);
        arena.reclaim(a, 56);
        assert_eq!(arena.stats().free_blocks, 1);
        assert_eq!(arena.stats().largest_free, 56);
    }

    #[test]
    fn test_fragmented_arena_reuses_holes() {
        let mut arena = Arena::new(256);
        let a = arena.allocate(16).unwrap();
        let _b = arena.allocate(16).unwrap();
        let c = arena.allocate(16).unwrap();
        arena.reclaim(a, 16);
        arena.reclaim(c, 16);
        let stats = arena.stats();
        assert_eq!(stats.live_blocks, 1);
        // Holes are not adjacent: they must stay separate blocks
        assert!(stats.free_blocks >= 2);
        assert!(arena.allocate(16).is_ok());
    }
}
