//! Serialized atom graphs.
//!
//! ```text
//! "FORJ" version:u8 count:u32
//! count x record:
//!     identity:u32 kind:u8 flags:u8 payload:u64 next:u32 branch:u32
//!     [buffer only] len:u32 bytes
//! ```
//!
//! Little-endian throughout. Records are written depth-first from the root,
//! root first, and identities are the atoms' addresses at save time. The
//! root is written detached: whatever follows it on its stack is not saved.

use crate::atom::{AtomId, Heap, Kind, Payload};
use crate::builtins::NativeOp;
use crate::compat::{BTreeMap, String, Vec, format, vec};
use crate::error::RuntimeError;

pub const MAGIC: &[u8; 4] = b"FORJ";
pub const VERSION: u8 = 1;

const FLAG_END: u8 = 1;

struct Record {
    identity: u32,
    kind: Kind,
    flags: u8,
    payload: u64,
    next: u32,
    branch: u32,
    bytes: Vec<u8>,
}

impl Record {
    /// Identities this record holds a reference to. An end record's `next`
    /// is a back-reference and is not counted.
    fn owned(&self) -> impl Iterator<Item = u32> {
        let next = if self.flags & FLAG_END == 0 { self.next } else { 0 };
        let slot = if self.kind == Kind::Link { self.payload as u32 } else { 0 };
        [next, self.branch, slot].into_iter().filter(|&addr| addr != 0)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    New,
    Open,
    Done,
}

/// Encode everything reachable from `root` through owned links.
pub fn encode(heap: &Heap, root: AtomId) -> Vec<u8> {
    let mut order = Vec::new();
    let mut seen = BTreeMap::new();
    let mut pending = Vec::new();
    pending.push(root);
    while let Some(atom) = pending.pop() {
        if seen.insert(atom.addr(), ()).is_some() {
            continue;
        }
        order.push(atom);
        // Pushed in reverse so the branch is visited before the sibling
        if atom != root {
            if let Some(next) = heap.next(atom) {
                pending.push(next);
            }
        }
        if let Payload::Atom(slot) = heap.payload(atom) {
            pending.push(slot);
        }
        if let Some(branch) = heap.branch(atom) {
            pending.push(branch);
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(order.len() as u32).to_le_bytes());
    for &atom in &order {
        let (flags, next) = if atom == root {
            (FLAG_END, 0)
        } else {
            let flags = if heap.is_end(atom) { FLAG_END } else { 0 };
            let next = heap.next_raw(atom).map_or(0, AtomId::addr);
            (flags, next)
        };
        let kind = heap.kind(atom);
        let payload = match heap.payload(atom) {
            Payload::Buffer(_) => 0,
            _ => heap.raw_payload(atom),
        };
        out.extend_from_slice(&atom.addr().to_le_bytes());
        out.push(kind as u8);
        out.push(flags);
        out.extend_from_slice(&payload.to_le_bytes());
        out.extend_from_slice(&next.to_le_bytes());
        out.extend_from_slice(&heap.branch(atom).map_or(0, AtomId::addr).to_le_bytes());
        if kind == Kind::Buffer {
            let bytes = heap.buffer_bytes(atom).unwrap_or_default();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
    out
}

/// Rebuild a graph written by [`encode`]. The returned root is floating
/// (refcount 0) until the caller links it somewhere.
pub fn decode(heap: &mut Heap, data: &[u8]) -> Result<AtomId, RuntimeError> {
    let records = parse(data)?;

    // Identity table, allocated in write order
    let mut made: Vec<AtomId> = Vec::with_capacity(records.len());
    let mut table: BTreeMap<u32, AtomId> = BTreeMap::new();
    for record in &records {
        let atom = match allocate(heap, record) {
            Ok(atom) => atom,
            Err(e) => {
                for &atom in &made {
                    heap.release(atom);
                }
                return Err(e);
            }
        };
        made.push(atom);
        table.insert(record.identity, atom);
    }

    for (record, &atom) in records.iter().zip(&made) {
        let next = AtomId::from_addr(record.next).and_then(|n| table.get(&n.addr()).copied());
        if record.flags & FLAG_END != 0 {
            // Back-references outside the snapshot are dropped
            heap.set_back_ref(atom, next);
        } else {
            heap.set_next(atom, next);
        }
        if record.branch != 0 {
            heap.set_branch(atom, table.get(&record.branch).copied());
        }
        if record.kind == Kind::Link && record.payload != 0 {
            heap.set_payload_atom(atom, table.get(&(record.payload as u32)).copied());
        }
    }

    // Every other record is owned by something reachable from the root
    Ok(made[0])
}

fn allocate(heap: &mut Heap, record: &Record) -> Result<AtomId, RuntimeError> {
    match record.kind {
        Kind::Buffer => heap.new_buffer(&record.bytes),
        Kind::Integer => heap.new_integer(record.payload as i64),
        Kind::NativeOp => {
            let op = NativeOp::from_u8(record.payload as u8)
                .ok_or_else(|| RuntimeError::Corrupt(format!("unknown builtin {}", record.payload)))?;
            heap.new_native(op)
        }
        kind => heap.new_atom(kind),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RuntimeError> {
        let end = self.at.checked_add(n).filter(|&end| end <= self.data.len());
        let end = end.ok_or_else(|| RuntimeError::Corrupt(format!("truncated at byte {}", self.at)))?;
        let bytes = &self.data[self.at..end];
        self.at = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, RuntimeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, RuntimeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64, RuntimeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }
}

// Read and validate every record before touching the heap
fn parse(data: &[u8]) -> Result<Vec<Record>, RuntimeError> {
    let mut reader = Reader { data, at: 0 };
    if reader.take(4)? != MAGIC {
        return Err(RuntimeError::Corrupt("bad magic".into()));
    }
    let version = reader.u8()?;
    if version != VERSION {
        return Err(RuntimeError::Corrupt(format!("unsupported version {}", version)));
    }
    let count = reader.u32()? as usize;
    if count == 0 {
        return Err(RuntimeError::Corrupt("empty snapshot".into()));
    }

    let mut records = Vec::new();
    // identity -> position in `records`
    let mut identities = BTreeMap::new();
    for index in 0..count {
        let identity = reader.u32()?;
        let raw_kind = reader.u8()?;
        let kind = Kind::from_u8(raw_kind).ok_or_else(|| RuntimeError::Corrupt(format!("bad kind {}", raw_kind)))?;
        let flags = reader.u8()?;
        let payload = reader.u64()?;
        let next = reader.u32()?;
        let branch = reader.u32()?;
        let bytes = if kind == Kind::Buffer {
            let len = reader.u32()? as usize;
            reader.take(len)?.to_vec()
        } else {
            Vec::new()
        };
        if identity == 0 || identities.insert(identity, index).is_some() {
            return Err(RuntimeError::Corrupt(format!("bad identity {:#x}", identity)));
        }
        records.push(Record {
            identity,
            kind,
            flags,
            payload,
            next,
            branch,
            bytes,
        });
    }
    if reader.at != data.len() {
        return Err(RuntimeError::Corrupt("trailing bytes".into()));
    }

    // Owned links must stay inside the snapshot
    for record in &records {
        if record.owned().any(|addr| !identities.contains_key(&addr)) {
            let what: String = format!("record {:#x} links outside the snapshot", record.identity);
            return Err(RuntimeError::Corrupt(what));
        }
    }
    check_shape(&records, &identities)?;
    Ok(records)
}

// Owned links must form a DAG rooted at the first record, with every record
// reachable from it. Shared branches are fine; cycles and orphans are not.
fn check_shape(records: &[Record], index: &BTreeMap<u32, usize>) -> Result<(), RuntimeError> {
    let corrupt = |identity: u32, what: &str| RuntimeError::Corrupt(format!("record {:#x} {}", identity, what));
    let root = records
        .first()
        .ok_or_else(|| RuntimeError::Corrupt("empty snapshot".into()))?;
    if root.flags & FLAG_END == 0 && root.next != 0 {
        return Err(corrupt(root.identity, "is the root but has siblings"));
    }

    let mut state = vec![Visit::New; records.len()];
    // (record, finished): the second entry closes a record once its
    // descendants are done
    let mut pending: Vec<(usize, bool)> = vec![(0, false)];
    while let Some((at, finished)) = pending.pop() {
        let (Some(record), Some(visit)) = (records.get(at), state.get(at).copied()) else {
            return Err(RuntimeError::Corrupt(format!("record {} out of range", at)));
        };
        if finished {
            state[at] = Visit::Done;
            continue;
        }
        match visit {
            Visit::Done => continue,
            Visit::Open => return Err(corrupt(record.identity, "owns itself")),
            Visit::New => {}
        }
        state[at] = Visit::Open;
        pending.push((at, true));
        for target in record.owned() {
            let child = index
                .get(&target)
                .copied()
                .ok_or_else(|| corrupt(record.identity, "links outside the snapshot"))?;
            match state.get(child) {
                Some(Visit::New) => pending.push((child, false)),
                Some(Visit::Done) => {}
                _ => return Err(corrupt(target, "owns itself")),
            }
        }
    }

    match records.iter().zip(&state).find(|(_, visit)| **visit != Visit::Done) {
        Some((record, _)) => Err(corrupt(record.identity, "is unreachable from the root")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::printer::render;

    fn heap() -> Heap {
        Heap::new(&ArenaConfig {
            heap_size: 16 * 1024,
            ..ArenaConfig::default()
        })
    }

    fn sample(heap: &mut Heap) -> AtomId {
        let outer = heap.new_list(Kind::List).unwrap();
        heap.take_ref(Some(outer));
        let one = heap.new_integer(1).unwrap();
        heap.push(outer, one);
        let inner = heap.new_list(Kind::List).unwrap();
        let word = heap.new_buffer(b"two\0bytes").unwrap();
        heap.push(inner, word);
        heap.push(outer, inner);
        let op = heap.new_native(NativeOp::Add).unwrap();
        heap.push(outer, op);
        let dots = heap.new_dot(2).unwrap();
        heap.push(outer, dots);
        outer
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let mut heap = heap();
        let original = sample(&mut heap);
        let bytes = encode(&heap, original);
        assert_eq!(&bytes[..4], MAGIC);

        let copy = decode(&mut heap, &bytes).unwrap();
        heap.take_ref(Some(copy));
        assert_ne!(copy, original);
        assert_eq!(render(&heap, copy), render(&heap, original));

        // Every list tail points back at its new owner
        let inner = heap.elements(copy)[2];
        let tail = heap.tail_of(heap.branch(inner).unwrap());
        assert_eq!(heap.back_ref(tail), Some(inner));
    }

    #[test]
    fn test_round_trip_leaks_nothing() {
        let mut heap = heap();
        let original = sample(&mut heap);
        let bytes = encode(&heap, original);
        let before = heap.arena_stats();
        let live = heap.live_atoms();

        let copy = decode(&mut heap, &bytes).unwrap();
        heap.take_ref(Some(copy));
        heap.release(copy);
        assert_eq!(heap.live_atoms(), live);
        assert_eq!(heap.arena_stats(), before);
    }

    #[test]
    fn test_detached_root() {
        let mut heap = heap();
        let list = sample(&mut heap);
        // The integer at the bottom is written without its siblings
        let bottom = *heap.elements(list).last().unwrap();
        let bytes = encode(&heap, bottom);
        let copy = decode(&mut heap, &bytes).unwrap();
        assert_eq!(render(&heap, copy), "1");
        assert!(heap.is_end(copy));
        assert_eq!(heap.back_ref(copy), None);
    }

    #[test]
    fn test_corrupt_inputs() {
        let mut heap = heap();
        let list = sample(&mut heap);
        let bytes = encode(&heap, list);
        let live = heap.live_atoms();

        let corrupt = |heap: &mut Heap, data: &[u8]| matches!(decode(heap, data), Err(RuntimeError::Corrupt(_)));
        assert!(corrupt(&mut heap, b"NOPE"));
        assert!(corrupt(&mut heap, &bytes[..bytes.len() - 1]));
        let mut versioned = bytes.clone();
        versioned[4] = 9;
        assert!(corrupt(&mut heap, &versioned));
        let mut bad_kind = bytes.clone();
        bad_kind[9 + 4] = 0xEE;
        assert!(corrupt(&mut heap, &bad_kind));
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(corrupt(&mut heap, &trailing));
        assert_eq!(heap.live_atoms(), live);
    }

    // (identity, kind, flags, payload, next, branch), no buffers
    fn hand_written(records: &[(u32, Kind, u8, u64, u32, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&(records.len() as u32).to_le_bytes());
        for &(identity, kind, flags, payload, next, branch) in records {
            out.extend_from_slice(&identity.to_le_bytes());
            out.push(kind as u8);
            out.push(flags);
            out.extend_from_slice(&payload.to_le_bytes());
            out.extend_from_slice(&next.to_le_bytes());
            out.extend_from_slice(&branch.to_le_bytes());
        }
        out
    }

    fn assert_corrupt(heap: &mut Heap, data: &[u8], why: &str) {
        let live = heap.live_atoms();
        match decode(heap, data) {
            Err(RuntimeError::Corrupt(what)) => assert!(what.contains(why), "{:?} lacks {:?}", what, why),
            other => panic!("expected corrupt snapshot, got {:?}", other),
        }
        assert_eq!(heap.live_atoms(), live);
    }

    #[test]
    fn test_sibling_owning_itself_is_rejected() {
        let mut heap = heap();
        let data = hand_written(&[
            (8, Kind::List, FLAG_END, 0, 0, 16),
            (16, Kind::Integer, 0, 5, 16, 0),
        ]);
        assert_corrupt(&mut heap, &data, "owns itself");
    }

    #[test]
    fn test_longer_cycle_is_rejected() {
        let mut heap = heap();
        let data = hand_written(&[
            (8, Kind::List, FLAG_END, 0, 0, 16),
            (16, Kind::List, 0, 0, 24, 0),
            (24, Kind::List, FLAG_END, 0, 8, 16),
        ]);
        assert_corrupt(&mut heap, &data, "owns itself");
    }

    #[test]
    fn test_link_back_to_root_is_rejected() {
        let mut heap = heap();
        let data = hand_written(&[
            (8, Kind::List, FLAG_END, 0, 0, 16),
            (16, Kind::Link, FLAG_END, 8, 8, 0),
        ]);
        assert_corrupt(&mut heap, &data, "owns itself");
    }

    #[test]
    fn test_orphaned_records_are_rejected() {
        // A zero poison byte turns a double release into a refcount underflow
        let mut heap = Heap::new(&ArenaConfig {
            heap_size: 16 * 1024,
            poison: 0,
        });
        let data = hand_written(&[
            (8, Kind::List, FLAG_END, 0, 0, 0),
            (16, Kind::List, FLAG_END, 0, 0, 24),
            (24, Kind::Integer, FLAG_END, 7, 16, 0),
        ]);
        assert_corrupt(&mut heap, &data, "unreachable");

        // The heap is still usable afterwards
        let one = heap.new_integer(1).unwrap();
        heap.take_ref(Some(one));
        heap.release(one);
    }

    #[test]
    fn test_root_with_siblings_is_rejected() {
        let mut heap = heap();
        let data = hand_written(&[
            (8, Kind::Integer, 0, 1, 16, 0),
            (16, Kind::Integer, FLAG_END, 2, 0, 0),
        ]);
        assert_corrupt(&mut heap, &data, "siblings");
    }

    #[test]
    fn test_shared_branch_round_trips() {
        let mut heap = heap();
        let outer = heap.new_list(Kind::List).unwrap();
        heap.take_ref(Some(outer));
        let inner = heap.new_list(Kind::List).unwrap();
        let one = heap.new_integer(1).unwrap();
        heap.push(inner, one);
        let twin = heap.duplicate(inner).unwrap();
        heap.push(outer, inner);
        heap.push(outer, twin);

        let bytes = encode(&heap, outer);
        let live = heap.live_atoms();
        let copy = decode(&mut heap, &bytes).unwrap();
        heap.take_ref(Some(copy));
        assert_eq!(render(&heap, copy), "[ [ 1 ] [ 1 ] ]");
        let lists = heap.elements(copy);
        assert_eq!(heap.branch(lists[0]), heap.branch(lists[1]));

        heap.release(copy);
        assert_eq!(heap.live_atoms(), live);
    }
}
