// assert ( cond msg -- )

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::printer;

pub fn assert_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let context = "'assert' requires a condition and a message (e.g., '1 \"ok\" assert .')";
    let msg = interp.pop_with_context(context)?;
    let message = match interp.heap.buffer_bytes(msg) {
        Some(bytes) => crate::compat::String::from_utf8_lossy(bytes).into_owned(),
        None => printer::render(&interp.heap, msg),
    };
    interp.heap.release(msg);
    let cond = interp.pop_integer(context)?;
    if cond == 0 {
        return Err(RuntimeError::UserAssertion(message));
    }
    Ok(())
}
