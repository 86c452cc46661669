// Introspection: len refs live made freed heap

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::printer;

// len ( x -- n )
pub fn len_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let x = interp.pop_with_context("'len' requires a list or string")?;
    let heap = &interp.heap;
    let n = if heap.kind(x).is_list() {
        Ok(heap.list_len(x))
    } else if let Some(bytes) = heap.buffer_bytes(x) {
        Ok(bytes.len())
    } else {
        Err(RuntimeError::mismatch("list or string", printer::render(heap, x)))
    };
    interp.heap.release(x);
    interp.push_integer(n? as i64)
}

// refs ( x -- x n ): the stack's own link counts as one
pub fn refs_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let top = interp
        .top()
        .ok_or_else(|| RuntimeError::underflow("'refs' requires a value on the stack"))?;
    let n = interp.heap.refcount(top);
    interp.push_integer(n as i64)
}

// live ( -- n )
pub fn live_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let n = interp.heap.live_atoms();
    interp.push_integer(n as i64)
}

// made ( -- n )
pub fn made_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let n = interp.heap.atoms_created();
    interp.push_integer(n as i64)
}

// freed ( -- n )
pub fn freed_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let n = interp.heap.atoms_destroyed();
    interp.push_integer(n as i64)
}

// heap ( -- free largest )
pub fn heap_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let stats = interp.heap.arena_stats();
    interp.push_integer(stats.free_bytes as i64)?;
    interp.push_integer(stats.largest_free as i64)
}
