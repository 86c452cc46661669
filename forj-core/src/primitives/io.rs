// Output primitives: print emit cr

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::printer;

// print ( x -- ) strings are written raw, everything else as rendered
pub fn print_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let value = interp.pop_with_context("'print' requires a value on the stack")?;
    let text = match interp.heap.buffer_bytes(value) {
        Some(bytes) => bytes.to_vec(),
        None => printer::render(&interp.heap, value).into_bytes(),
    };
    interp.heap.release(value);
    interp.write_bytes(&text);
    Ok(())
}

// emit ( codepoint -- )
pub fn emit_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let code = interp.pop_integer("'emit' requires a code point (e.g., '65 emit .')")?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RuntimeError::mismatch("unicode code point", crate::compat::format!("{}", code)))?;
    let mut buf = [0u8; 4];
    interp.write_str(c.encode_utf8(&mut buf));
    Ok(())
}

// cr ( -- )
pub fn cr_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    interp.write_str("\n");
    Ok(())
}
