// Thread primitives: spawn detach await kill

use crate::compat::format;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::scheduler::ThreadId;

fn pop_thread_id(interp: &mut Interpreter, context: &str) -> Result<ThreadId, RuntimeError> {
    let raw = interp.pop_integer(context)?;
    u32::try_from(raw)
        .map(ThreadId)
        .map_err(|_| RuntimeError::mismatch("thread id", format!("{}", raw)))
}

// spawn ( code -- tid )
pub fn spawn_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let code = interp.pop_with_context("'spawn' requires something to run")?;
    let spawned = interp.spawn_thread(code);
    interp.heap.release(code);
    let id = spawned?;
    interp.push_integer(id.0 as i64)
}

// detach ( tid -- )
pub fn detach_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let id = pop_thread_id(interp, "'detach' requires a thread id")?;
    interp.detach(id)
}

// await ( tid -- )
pub fn await_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let id = pop_thread_id(interp, "'await' requires a thread id")?;
    interp.await_thread(id)
}

// kill ( tid -- )
pub fn kill_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let id = pop_thread_id(interp, "'kill' requires a thread id")?;
    interp.kill(id)
}
