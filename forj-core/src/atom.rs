//! The atom graph.
//!
//! An atom is a 24-byte record inside the arena:
//!
//! | offset | field    | notes                                        |
//! |--------|----------|----------------------------------------------|
//! | 0      | next     | sibling, or parent back-reference if `is_end` |
//! | 4      | branch   | nested list head                             |
//! | 8      | payload  | integer / native op / buffer / atom address  |
//! | 16     | refcount |                                              |
//! | 20     | kind     | [`Kind`] discriminant                        |
//! | 21     | flags    | bit 0: `is_end`                              |
//!
//! A list is reached through its owner's `branch`. Its last element has
//! `is_end` set and a non-owning back-reference to the owner in `next`. An
//! empty list is a lone [`Kind::EndMarker`] carrying that back-reference, so
//! a list is never represented by a null branch once created.
//!
//! Fresh atoms start with a refcount of zero: they are "floating" until the
//! first owner links them (`push`, `set_next`, `set_branch`) or a caller takes
//! a reference explicitly.

use core::num::NonZeroU32;

use crate::arena::{Addr, Arena, ArenaStats};
use crate::builtins::NativeOp;
use crate::compat::Vec;
use crate::config::ArenaConfig;
use crate::error::RuntimeError;
use crate::vect::{self, VectAddr};

pub const ATOM_SIZE: usize = 24;

const NEXT: Addr = 0;
const BRANCH: Addr = 4;
const PAYLOAD: Addr = 8;
const REFS: Addr = 16;
const KIND: Addr = 20;
const FLAGS: Addr = 21;

const FLAG_END: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId(NonZeroU32);

impl AtomId {
    pub fn from_addr(addr: Addr) -> Option<Self> {
        NonZeroU32::new(addr).map(AtomId)
    }

    pub fn addr(self) -> Addr {
        self.0.get()
    }
}

fn raw(atom: Option<AtomId>) -> Addr {
    atom.map_or(0, AtomId::addr)
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    List = 0,
    Link = 1,
    ExecList = 2,
    Integer = 3,
    NativeOp = 4,
    Buffer = 5,
    Dot = 6,
    EndMarker = 7,
}

impl Kind {
    pub fn from_u8(raw: u8) -> Option<Kind> {
        Some(match raw {
            0 => Kind::List,
            1 => Kind::Link,
            2 => Kind::ExecList,
            3 => Kind::Integer,
            4 => Kind::NativeOp,
            5 => Kind::Buffer,
            6 => Kind::Dot,
            7 => Kind::EndMarker,
            _ => return None,
        })
    }

    /// Kinds whose branch is an ordinary nested list.
    pub fn is_list(self) -> bool {
        matches!(self, Kind::List | Kind::Link | Kind::ExecList)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::List => "list",
            Kind::Link => "link",
            Kind::ExecList => "code",
            Kind::Integer => "integer",
            Kind::NativeOp => "builtin",
            Kind::Buffer => "string",
            Kind::Dot => "dot",
            Kind::EndMarker => "end",
        }
    }
}

/// Decoded payload word. Which variant applies is fixed by the atom's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    None,
    Integer(i64),
    Native(NativeOp),
    Buffer(VectAddr),
    Atom(AtomId),
}

pub struct Heap {
    arena: Arena,
    created: u64,
    destroyed: u64,
}

impl Heap {
    pub fn new(config: &ArenaConfig) -> Self {
        Heap {
            arena: Arena::with_config(config),
            created: 0,
            destroyed: 0,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    pub fn atoms_created(&self) -> u64 {
        self.created
    }

    pub fn atoms_destroyed(&self) -> u64 {
        self.destroyed
    }

    pub fn live_atoms(&self) -> u64 {
        self.created - self.destroyed
    }

    // Field access

    pub fn kind(&self, a: AtomId) -> Kind {
        let raw = self.arena.read_u8(a.addr() + KIND);
        debug_assert!(Kind::from_u8(raw).is_some(), "bad kind byte {raw} at {:#x}", a.addr());
        Kind::from_u8(raw).unwrap_or(Kind::EndMarker)
    }

    pub fn set_kind(&mut self, a: AtomId, kind: Kind) {
        self.arena.write_u8(a.addr() + KIND, kind as u8);
    }

    pub fn is_end(&self, a: AtomId) -> bool {
        self.arena.read_u8(a.addr() + FLAGS) & FLAG_END != 0
    }

    fn set_end(&mut self, a: AtomId, end: bool) {
        let flags = self.arena.read_u8(a.addr() + FLAGS);
        let flags = if end { flags | FLAG_END } else { flags & !FLAG_END };
        self.arena.write_u8(a.addr() + FLAGS, flags);
    }

    /// Raw `next`: a sibling when `is_end` is false, otherwise the
    /// back-reference to the owning list (possibly null).
    pub fn next_raw(&self, a: AtomId) -> Option<AtomId> {
        AtomId::from_addr(self.arena.read_u32(a.addr() + NEXT))
    }

    /// The following sibling, or `None` at the end of a list.
    pub fn next(&self, a: AtomId) -> Option<AtomId> {
        if self.is_end(a) { None } else { self.next_raw(a) }
    }

    /// The owner this list element points back to, when it is the last one.
    pub fn back_ref(&self, a: AtomId) -> Option<AtomId> {
        if self.is_end(a) { self.next_raw(a) } else { None }
    }

    pub fn branch(&self, a: AtomId) -> Option<AtomId> {
        AtomId::from_addr(self.arena.read_u32(a.addr() + BRANCH))
    }

    pub fn refcount(&self, a: AtomId) -> u32 {
        self.arena.read_u32(a.addr() + REFS)
    }

    pub fn raw_payload(&self, a: AtomId) -> u64 {
        self.arena.read_u64(a.addr() + PAYLOAD)
    }

    pub fn payload(&self, a: AtomId) -> Payload {
        let word = self.raw_payload(a);
        match self.kind(a) {
            Kind::Integer => Payload::Integer(word as i64),
            Kind::NativeOp => match NativeOp::from_u8(word as u8) {
                Some(op) => Payload::Native(op),
                None => Payload::None,
            },
            Kind::Buffer if word != 0 => Payload::Buffer(word as VectAddr),
            Kind::Link => match AtomId::from_addr(word as Addr) {
                Some(slot) => Payload::Atom(slot),
                None => Payload::None,
            },
            _ => Payload::None,
        }
    }

    pub(crate) fn set_raw_payload(&mut self, a: AtomId, word: u64) {
        self.arena.write_u64(a.addr() + PAYLOAD, word);
    }

    /// Point a Link's payload at `slot`, owning a reference to it.
    pub fn set_payload_atom(&mut self, a: AtomId, slot: Option<AtomId>) {
        self.take_ref(slot);
        let old = match self.payload(a) {
            Payload::Atom(old) => Some(old),
            _ => None,
        };
        self.set_raw_payload(a, raw(slot) as u64);
        self.release_opt(old);
    }

    pub fn integer(&self, a: AtomId) -> Option<i64> {
        match self.payload(a) {
            Payload::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn native(&self, a: AtomId) -> Option<NativeOp> {
        match self.payload(a) {
            Payload::Native(op) => Some(op),
            _ => None,
        }
    }

    pub fn buffer_bytes(&self, a: AtomId) -> Option<&[u8]> {
        match self.payload(a) {
            Payload::Buffer(v) => Some(vect::as_bytes(&self.arena, v)),
            _ => None,
        }
    }

    // Construction

    pub fn new_atom(&mut self, kind: Kind) -> Result<AtomId, RuntimeError> {
        let addr = self.arena.allocate(ATOM_SIZE)?;
        let a = AtomId::from_addr(addr).ok_or(RuntimeError::AllocationFailure {
            requested: ATOM_SIZE,
        })?;
        self.arena.write_u8(addr + KIND, kind as u8);
        self.set_end(a, true);
        self.created += 1;
        Ok(a)
    }

    pub fn new_integer(&mut self, value: i64) -> Result<AtomId, RuntimeError> {
        let a = self.new_atom(Kind::Integer)?;
        self.set_raw_payload(a, value as u64);
        Ok(a)
    }

    pub fn new_native(&mut self, op: NativeOp) -> Result<AtomId, RuntimeError> {
        let a = self.new_atom(Kind::NativeOp)?;
        self.set_raw_payload(a, op as u8 as u64);
        Ok(a)
    }

    pub fn new_buffer(&mut self, bytes: &[u8]) -> Result<AtomId, RuntimeError> {
        let v = vect::from_bytes(&mut self.arena, bytes)?;
        match self.new_atom(Kind::Buffer) {
            Ok(a) => {
                self.set_raw_payload(a, v as u64);
                Ok(a)
            }
            Err(e) => {
                vect::free(&mut self.arena, v);
                Err(e)
            }
        }
    }

    /// Append bytes to a buffer atom in place (the buffer may move).
    pub fn buffer_push_raw(&mut self, a: AtomId, bytes: &[u8]) -> Result<(), RuntimeError> {
        let Payload::Buffer(v) = self.payload(a) else {
            return Err(RuntimeError::mismatch("string", self.kind(a).name()));
        };
        let v = vect::push_raw(&mut self.arena, v, bytes)?;
        self.set_raw_payload(a, v as u64);
        Ok(())
    }

    /// An empty list: a `kind` atom whose branch is an end marker pointing back at it.
    pub fn new_list(&mut self, kind: Kind) -> Result<AtomId, RuntimeError> {
        let marker = self.new_atom(Kind::EndMarker)?;
        let list = match self.new_atom(kind) {
            Ok(list) => list,
            Err(e) => {
                self.release(marker);
                return Err(e);
            }
        };
        self.set_back_ref(marker, Some(list));
        self.set_branch(list, Some(marker));
        Ok(list)
    }

    /// The `n`-dot placeholder. A single dot is a bare `Dot`; `n > 1` is a
    /// `Dot` whose branch holds the `n - 1` placeholder.
    pub fn new_dot(&mut self, n: usize) -> Result<AtomId, RuntimeError> {
        let mut dot = self.new_atom(Kind::Dot)?;
        for _ in 1..n {
            let outer = match self.new_atom(Kind::Dot) {
                Ok(outer) => outer,
                Err(e) => {
                    self.release(dot);
                    return Err(e);
                }
            };
            self.push(outer, dot);
            dot = outer;
        }
        Ok(dot)
    }

    /// Build a Link scope frame: its branch is shared with `slot`'s branch and
    /// its payload owns a reference to `slot`.
    pub fn new_frame(&mut self, slot: Option<AtomId>, parent: Option<AtomId>) -> Result<AtomId, RuntimeError> {
        let frame = self.new_atom(Kind::Link)?;
        match slot {
            Some(slot) => {
                let branch = self.branch(slot);
                self.set_branch(frame, branch);
                self.set_payload_atom(frame, Some(slot));
            }
            None => {
                let marker = match self.new_atom(Kind::EndMarker) {
                    Ok(marker) => marker,
                    Err(e) => {
                        self.release(frame);
                        return Err(e);
                    }
                };
                self.set_back_ref(marker, Some(frame));
                self.set_branch(frame, Some(marker));
            }
        }
        if parent.is_some() {
            self.set_next(frame, parent);
        }
        Ok(frame)
    }

    // Reference counting

    pub fn take_ref(&mut self, a: Option<AtomId>) -> Option<AtomId> {
        if let Some(a) = a {
            let refs = self.refcount(a);
            self.arena.write_u32(a.addr() + REFS, refs + 1);
        }
        a
    }

    /// Drop one reference; returns true when the atom is now unowned and must go.
    fn drop_ref(&mut self, a: AtomId) -> bool {
        let refs = self.refcount(a);
        if refs <= 1 {
            self.arena.write_u32(a.addr() + REFS, 0);
            true
        } else {
            self.arena.write_u32(a.addr() + REFS, refs - 1);
            false
        }
    }

    /// Release one reference to `a`. Returns `Some(a)` while it is still
    /// owned elsewhere and `None` once it has been destroyed.
    ///
    /// Destruction releases the owned `next`, the branch and any atom payload,
    /// frees a buffer payload, and reclaims the record. Long lists are walked
    /// with a worklist rather than native recursion.
    pub fn release(&mut self, a: AtomId) -> Option<AtomId> {
        if !self.drop_ref(a) {
            return Some(a);
        }
        let mut doomed = Vec::new();
        doomed.push(a);
        while let Some(dead) = doomed.pop() {
            if let Some(branch) = self.branch(dead) {
                if self.refcount(branch) > 1 {
                    // The list outlives us through another owner
                    self.repair_back_ref(branch, dead);
                }
                if self.drop_ref(branch) {
                    doomed.push(branch);
                }
            }
            if let Some(next) = self.next(dead) {
                if self.drop_ref(next) {
                    doomed.push(next);
                }
            }
            match self.payload(dead) {
                Payload::Buffer(v) => vect::free(&mut self.arena, v),
                Payload::Atom(slot) => {
                    if self.drop_ref(slot) {
                        doomed.push(slot);
                    }
                }
                _ => {}
            }
            self.arena.reclaim(dead.addr(), ATOM_SIZE);
            self.destroyed += 1;
        }
        None
    }

    pub fn release_opt(&mut self, a: Option<AtomId>) -> Option<AtomId> {
        a.and_then(|a| self.release(a))
    }

    /// Null the tail back-reference of the list at `head` if it names `owner`.
    pub fn repair_back_ref(&mut self, head: AtomId, owner: AtomId) {
        let tail = self.tail_of(head);
        if self.back_ref(tail) == Some(owner) {
            self.arena.write_u32(tail.addr() + NEXT, 0);
        }
    }

    // Linking

    /// Point `a.next` at a sibling (owned). `None` turns `a` into an end with
    /// no back-reference.
    pub fn set_next(&mut self, a: AtomId, n: Option<AtomId>) {
        self.take_ref(n);
        let old = self.next(a);
        self.arena.write_u32(a.addr() + NEXT, raw(n));
        self.set_end(a, n.is_none());
        self.release_opt(old);
    }

    /// Make `a` the end of a list whose owner is `owner` (not owned).
    pub fn set_back_ref(&mut self, a: AtomId, owner: Option<AtomId>) {
        let old = self.next(a);
        self.arena.write_u32(a.addr() + NEXT, raw(owner));
        self.set_end(a, true);
        self.release_opt(old);
    }

    pub fn set_branch(&mut self, a: AtomId, b: Option<AtomId>) {
        self.take_ref(b);
        let old = self.branch(a);
        self.arena.write_u32(a.addr() + BRANCH, raw(b));
        self.release_opt(old);
    }

    // Stack view: `stack.branch` is the top of stack

    /// The top element, or `None` when the stack is empty.
    pub fn top(&self, stack: AtomId) -> Option<AtomId> {
        self.branch(stack).filter(|&t| self.kind(t) != Kind::EndMarker)
    }

    pub fn push(&mut self, stack: AtomId, item: AtomId) {
        match self.branch(stack) {
            Some(top) if self.kind(top) == Kind::EndMarker => {
                let owner = self.back_ref(top);
                self.set_back_ref(item, owner);
            }
            Some(top) => self.set_next(item, Some(top)),
            None => self.set_back_ref(item, Some(stack)),
        }
        self.set_branch(stack, Some(item));
    }

    /// Pop the top element and hand the caller a reference to it.
    pub fn pulln(&mut self, stack: AtomId) -> Result<AtomId, RuntimeError> {
        let top = self
            .top(stack)
            .ok_or_else(|| RuntimeError::underflow("pull from an empty stack"))?;
        if self.is_end(top) {
            let owner = self.back_ref(top);
            let marker = self.new_atom(Kind::EndMarker)?;
            self.set_back_ref(marker, owner);
            self.take_ref(Some(top));
            self.set_branch(stack, Some(marker));
        } else {
            self.take_ref(Some(top));
            let rest = self.next(top);
            self.set_branch(stack, rest);
        }
        Ok(top)
    }

    pub fn pull(&mut self, stack: AtomId) -> Result<(), RuntimeError> {
        let top = self.pulln(stack)?;
        self.release(top);
        Ok(())
    }

    /// Shallow copy: same kind and payload, the branch shared, a buffer
    /// payload copied. The copy is floating (refcount 0) and unlinked.
    pub fn duplicate(&mut self, a: AtomId) -> Result<AtomId, RuntimeError> {
        let kind = self.kind(a);
        let word = match self.payload(a) {
            Payload::Buffer(v) => vect::duplicate(&mut self.arena, v)? as u64,
            _ => self.raw_payload(a),
        };
        let copy = match self.new_atom(kind) {
            Ok(copy) => copy,
            Err(e) => {
                if kind == Kind::Buffer {
                    vect::free(&mut self.arena, word as VectAddr);
                }
                return Err(e);
            }
        };
        self.set_raw_payload(copy, word);
        if let Payload::Atom(slot) = self.payload(copy) {
            self.take_ref(Some(slot));
        }
        let branch = self.branch(a);
        self.set_branch(copy, branch);
        Ok(copy)
    }

    // Traversal

    /// Elements of the list starting at `head`, head first. An end marker
    /// yields nothing.
    pub fn elements_from(&self, head: Option<AtomId>) -> Vec<AtomId> {
        let mut out = Vec::new();
        let mut cur = head.filter(|&h| self.kind(h) != Kind::EndMarker);
        while let Some(a) = cur {
            out.push(a);
            cur = self.next(a);
        }
        out
    }

    /// Elements of `list`'s branch, top (last pushed) first.
    pub fn elements(&self, list: AtomId) -> Vec<AtomId> {
        self.elements_from(self.branch(list))
    }

    pub fn list_len(&self, list: AtomId) -> usize {
        let mut n = 0;
        let mut cur = self.top(list);
        while let Some(a) = cur {
            n += 1;
            cur = self.next(a);
        }
        n
    }

    /// Last node of the list starting at `head` (the end marker for an empty list).
    pub fn tail_of(&self, head: AtomId) -> AtomId {
        let mut cur = head;
        while let Some(next) = self.next(cur) {
            cur = next;
        }
        cur
    }
}
