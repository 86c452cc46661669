//! Name resolution.
//!
//! A binding is a string atom sitting directly above its value: `5 :x`
//! leaves `"x"` on top of `5`. Resolution walks the current frame's list from
//! the top down, descending into any nested list before moving past it, then
//! the enclosing frames, then the interpreter's root scope.

use crate::atom::{AtomId, Heap, Kind};
use crate::compat::{String, Vec};
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;

/// Resolve `name` from the current thread's frame and return a fresh
/// duplicate of the bound value.
pub fn resolve(interp: &mut Interpreter, name: &[u8]) -> Result<AtomId, RuntimeError> {
    let focus = interp.focus();
    let found = lookup(
        &interp.heap,
        focus,
        interp.root_scope(),
        name,
        interp.config.max_scan_depth,
    )
    .ok_or_else(|| RuntimeError::ResolutionFailure {
        name: String::from_utf8_lossy(name).into_owned(),
        pos: None,
    })?;
    interp.heap.duplicate(found)
}

/// The bound value itself (no copy), or `None` when `name` is unbound.
pub fn lookup(heap: &Heap, frame: AtomId, root: AtomId, name: &[u8], max_depth: usize) -> Option<AtomId> {
    let scopes = scopes(heap, frame, root);
    let (mut value, mut scope) = search_scopes(heap, &scopes, 0, name, max_depth)?;

    // A string value names another binding further out: follow it while
    // it resolves from below its own binding
    let mut hops = 0;
    while heap.kind(value) == Kind::Buffer && hops < max_depth {
        let alias = match heap.buffer_bytes(value) {
            Some(bytes) => bytes.to_vec(),
            None => break,
        };
        let hit = find_in_list(heap, heap.next(value), &alias, 0, max_depth)
            .map(|target| (target, scope))
            .or_else(|| search_scopes(heap, &scopes, scope + 1, &alias, max_depth));
        match hit {
            Some((target, at)) => {
                value = target;
                scope = at;
                hops += 1;
            }
            None => break,
        }
    }
    Some(value)
}

// List heads to search, innermost frame first, root scope last
fn scopes(heap: &Heap, frame: AtomId, root: AtomId) -> Vec<Option<AtomId>> {
    let mut out = Vec::new();
    let mut cur = Some(frame);
    while let Some(f) = cur {
        out.push(heap.branch(f));
        cur = heap.next(f);
    }
    out.push(heap.branch(root));
    out
}

fn search_scopes(
    heap: &Heap,
    scopes: &[Option<AtomId>],
    first: usize,
    name: &[u8],
    max_depth: usize,
) -> Option<(AtomId, usize)> {
    scopes
        .iter()
        .enumerate()
        .skip(first)
        .find_map(|(at, &head)| find_in_list(heap, head, name, 0, max_depth).map(|found| (found, at)))
}

fn find_in_list(heap: &Heap, head: Option<AtomId>, name: &[u8], depth: usize, max_depth: usize) -> Option<AtomId> {
    let mut cur = head.filter(|&h| heap.kind(h) != Kind::EndMarker);
    while let Some(element) = cur {
        let kind = heap.kind(element);
        // Inner scopes shadow outer ones
        if kind.is_list() && depth < max_depth {
            if let Some(found) = find_in_list(heap, heap.branch(element), name, depth + 1, max_depth) {
                return Some(found);
            }
        }
        let next = heap.next(element);
        if kind == Kind::Buffer && next.is_some() && heap.buffer_bytes(element) == Some(name) {
            return next;
        }
        cur = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn interp() -> Interpreter {
        Interpreter::with_config(Config::default().with_heap_size(32 * 1024)).unwrap()
    }

    fn bind(interp: &mut Interpreter, value: i64, name: &str) {
        let v = interp.heap.new_integer(value).unwrap();
        interp.push(v);
        let n = interp.heap.new_buffer(name.as_bytes()).unwrap();
        interp.push(n);
    }

    fn resolved(interp: &mut Interpreter, name: &str) -> Option<i64> {
        let value = resolve(interp, name.as_bytes()).ok()?;
        let n = interp.heap.integer(value);
        interp.heap.release(value);
        n
    }

    #[test]
    fn test_nearest_binding_wins() {
        let mut interp = interp();
        bind(&mut interp, 1, "x");
        bind(&mut interp, 2, "x");
        assert_eq!(resolved(&mut interp, "x"), Some(2));
    }

    #[test]
    fn test_name_on_top_with_nothing_below_is_not_a_binding() {
        let mut interp = interp();
        let n = interp.heap.new_buffer(b"lonely").unwrap();
        interp.push(n);
        assert!(matches!(
            resolve(&mut interp, b"lonely"),
            Err(RuntimeError::ResolutionFailure { .. })
        ));
    }

    #[test]
    fn test_enclosing_frames_are_searched() {
        let mut interp = interp();
        bind(&mut interp, 7, "outer");
        crate::engine::open(&mut interp).unwrap();
        crate::engine::open(&mut interp).unwrap();
        assert_eq!(resolved(&mut interp, "outer"), Some(7));
    }

    #[test]
    fn test_nested_list_shadows_outer_binding() {
        let mut interp = interp();
        bind(&mut interp, 1, "v");
        crate::engine::open(&mut interp).unwrap();
        bind(&mut interp, 2, "v");
        crate::engine::close(&mut interp).unwrap();
        assert_eq!(resolved(&mut interp, "v"), Some(2));
    }

    #[test]
    fn test_alias_resolves_from_below() {
        let mut interp = interp();
        bind(&mut interp, 5, "target");
        let alias = interp.heap.new_buffer(b"target").unwrap();
        interp.push(alias);
        let name = interp.heap.new_buffer(b"alias").unwrap();
        interp.push(name);
        assert_eq!(resolved(&mut interp, "alias"), Some(5));
    }

    #[test]
    fn test_unresolvable_alias_is_the_string_itself() {
        let mut interp = interp();
        let s = interp.heap.new_buffer(b"hello").unwrap();
        interp.push(s);
        let name = interp.heap.new_buffer(b"greeting").unwrap();
        interp.push(name);
        let value = resolve(&mut interp, b"greeting").unwrap();
        assert_eq!(interp.heap.buffer_bytes(value), Some(&b"hello"[..]));
        interp.heap.release(value);
    }

    #[test]
    fn test_root_scope_is_searched_last() {
        let mut interp = interp();
        let v = interp.heap.new_integer(11).unwrap();
        interp.bind_global(b"g", v).unwrap();
        crate::engine::open(&mut interp).unwrap();
        assert_eq!(resolved(&mut interp, "g"), Some(11));
    }
}
