// Growable byte buffers stored in the arena.
//
// Layout: `len: u32`, `cap: u32`, then `cap` bytes. The logical length is
// tracked separately from the contents, so embedded NULs are fine.

use crate::arena::{Addr, Arena};
use crate::error::RuntimeError;

pub type VectAddr = Addr;

const HEADER: usize = 8;

fn block_size(cap: usize) -> usize {
    HEADER + cap
}

pub fn len(arena: &Arena, v: VectAddr) -> usize {
    arena.read_u32(v) as usize
}

pub fn capacity(arena: &Arena, v: VectAddr) -> usize {
    arena.read_u32(v + 4) as usize
}

pub fn as_bytes(arena: &Arena, v: VectAddr) -> &[u8] {
    arena.bytes(v + HEADER as Addr, len(arena, v))
}

/// Pre-allocate an empty buffer able to hold `cap` bytes.
pub fn alloc_len(arena: &mut Arena, cap: usize) -> Result<VectAddr, RuntimeError> {
    let v = arena.allocate(block_size(cap))?;
    arena.write_u32(v, 0);
    arena.write_u32(v + 4, cap as u32);
    Ok(v)
}

pub fn from_bytes(arena: &mut Arena, data: &[u8]) -> Result<VectAddr, RuntimeError> {
    let v = alloc_len(arena, data.len())?;
    push_raw(arena, v, data)
}

pub fn free(arena: &mut Arena, v: VectAddr) {
    let cap = capacity(arena, v);
    arena.reclaim(v, block_size(cap));
}

/// Move the contents into a fresh block of `new_cap` bytes (doubling when
/// `new_cap` is zero) and reclaim the old one.
pub fn resize(arena: &mut Arena, v: VectAddr, new_cap: usize) -> Result<VectAddr, RuntimeError> {
    let old_cap = capacity(arena, v);
    let new_cap = match new_cap {
        0 if old_cap == 0 => 1,
        0 => old_cap * 2,
        n => n,
    };
    let used = len(arena, v);
    let fresh = alloc_len(arena, new_cap)?;
    let mut staging = [0u8; 64];
    let mut copied = 0;
    // Copy through a small window: source and destination both borrow the arena
    while copied < used {
        let chunk = (used - copied).min(staging.len());
        staging[..chunk].copy_from_slice(arena.bytes(v + (HEADER + copied) as Addr, chunk));
        arena
            .bytes_mut(fresh + (HEADER + copied) as Addr, chunk)
            .copy_from_slice(&staging[..chunk]);
        copied += chunk;
    }
    arena.write_u32(fresh, used as u32);
    free(arena, v);
    Ok(fresh)
}

// Grow by doubling until `needed` bytes fit.
fn grow_to_fit(arena: &mut Arena, v: VectAddr, needed: usize) -> Result<VectAddr, RuntimeError> {
    let mut cap = capacity(arena, v).max(1);
    while cap < needed {
        cap <<= 1;
    }
    resize(arena, v, cap)
}

pub fn push_byte(arena: &mut Arena, v: VectAddr, byte: u8) -> Result<VectAddr, RuntimeError> {
    push_raw(arena, v, &[byte])
}

pub fn push_raw(arena: &mut Arena, v: VectAddr, data: &[u8]) -> Result<VectAddr, RuntimeError> {
    let used = len(arena, v);
    let needed = used + data.len();
    let v = if needed > capacity(arena, v) {
        grow_to_fit(arena, v, needed)?
    } else {
        v
    };
    arena
        .bytes_mut(v + (HEADER + used) as Addr, data.len())
        .copy_from_slice(data);
    arena.write_u32(v, needed as u32);
    Ok(v)
}

pub fn duplicate(arena: &mut Arena, v: VectAddr) -> Result<VectAddr, RuntimeError> {
    let cap = capacity(arena, v);
    let used = len(arena, v);
    let copy = alloc_len(arena, cap)?;
    let mut staging = [0u8; 64];
    let mut copied = 0;
    while copied < used {
        let chunk = (used - copied).min(staging.len());
        staging[..chunk].copy_from_slice(arena.bytes(v + (HEADER + copied) as Addr, chunk));
        arena
            .bytes_mut(copy + (HEADER + copied) as Addr, chunk)
            .copy_from_slice(&staging[..chunk]);
        copied += chunk;
    }
    arena.write_u32(copy, used as u32);
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_grows_by_doubling() {
        let mut arena = Arena::new(1024);
        let mut v = alloc_len(&mut arena, 0).unwrap();
        v = push_byte(&mut arena, v, b'a').unwrap();
        assert_eq!(capacity(&arena, v), 1);
        v = push_byte(&mut arena, v, b'b').unwrap();
        assert_eq!(capacity(&arena, v), 2);
        v = push_byte(&mut arena, v, b'c').unwrap();
        assert_eq!(capacity(&arena, v), 4);
        assert_eq!(as_bytes(&arena, v), b"abc");
    }

    #[test]
    fn test_push_raw_preserves_embedded_nul() {
        let mut arena = Arena::new(1024);
        let v = from_bytes(&mut arena, b"a\0b").unwrap();
        assert_eq!(len(&arena, v), 3);
        let v = push_raw(&mut arena, v, b"\0c").unwrap();
        assert_eq!(as_bytes(&arena, v), b"a\0b\0c");
    }

    #[test]
    fn test_growth_copies_across_window() {
        let mut arena = Arena::new(4096);
        let payload: crate::compat::Vec<u8> = (0..200u8).collect();
        let v = from_bytes(&mut arena, &payload).unwrap();
        let v = push_byte(&mut arena, v, 0xEE).unwrap();
        assert_eq!(&as_bytes(&arena, v)[..200], &payload[..]);
        assert_eq!(as_bytes(&arena, v)[200], 0xEE);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut arena = Arena::new(1024);
        let v = from_bytes(&mut arena, b"hello").unwrap();
        let w = duplicate(&mut arena, v).unwrap();
        let w = push_raw(&mut arena, w, b" world").unwrap();
        assert_eq!(as_bytes(&arena, v), b"hello");
        assert_eq!(as_bytes(&arena, w), b"hello world");
    }

    #[test]
    fn test_free_returns_all_blocks() {
        let mut arena = Arena::new(1024);
        let before = arena.stats();
        let mut v = alloc_len(&mut arena, 0).unwrap();
        for b in 0..40u8 {
            v = push_byte(&mut arena, v, b).unwrap();
        }
        free(&mut arena, v);
        assert_eq!(arena.stats(), before);
    }
}
