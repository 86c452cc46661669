// Scope primitives: [ ] : link code global

use crate::atom::Kind;
use crate::engine;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::printer;
use crate::scan;

// [ ( -- ) enter the link on top, or push a fresh list and enter it
pub fn open_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    engine::open(interp)
}

// ] ( -- ) finish the current scope
pub fn close_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    engine::close(interp)
}

// : ( name -- value )
pub fn resolve_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let name = interp.pop_bytes("':' needs a name on the stack")?;
    let value = scan::resolve(interp, &name)?;
    interp.push(value);
    Ok(())
}

fn retag(interp: &mut Interpreter, kind: Kind, context: &str) -> Result<(), RuntimeError> {
    let top = interp.top().ok_or_else(|| RuntimeError::underflow(context))?;
    if !interp.heap.kind(top).is_list() {
        return Err(RuntimeError::mismatch("list", printer::render(&interp.heap, top)));
    }
    interp.heap.set_kind(top, kind);
    Ok(())
}

// link ( list -- link )
pub fn link_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    retag(interp, Kind::Link, "'link' needs a list")
}

// code ( list -- code )
pub fn code_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    retag(interp, Kind::ExecList, "'code' needs a list")
}

// global ( value name -- )
pub fn global_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let name = interp.pop_bytes("'global' needs a value and a name (e.g., '5 \"five\" global .')")?;
    let value = interp.pop_with_context("'global' needs a value and a name")?;
    let result = interp.bind_global(&name, value);
    interp.heap.release(value);
    result
}
