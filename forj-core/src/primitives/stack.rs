// Stack shuffling: dup , drop swap over

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;

// dup ( a -- a a ), also ','
pub fn dup_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let top = interp
        .top()
        .ok_or_else(|| RuntimeError::underflow("'dup' requires a value on the stack"))?;
    let copy = interp.heap.duplicate(top)?;
    interp.push(copy);
    Ok(())
}

// drop ( a -- )
pub fn drop_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let a = interp.pop_with_context("'drop' requires a value on the stack")?;
    interp.heap.release(a);
    Ok(())
}

// swap ( a b -- b a )
pub fn swap_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let context = "'swap' requires two values on the stack";
    let b = interp.pop_with_context(context)?;
    let a = match interp.pop_with_context(context) {
        Ok(a) => a,
        Err(e) => {
            interp.push(b);
            interp.heap.release(b);
            return Err(e);
        }
    };
    interp.push(b);
    interp.push(a);
    interp.heap.release(a);
    interp.heap.release(b);
    Ok(())
}

// over ( a b -- a b a )
pub fn over_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let focus = interp.focus();
    let second = interp
        .heap
        .top(focus)
        .and_then(|top| interp.heap.next(top))
        .ok_or_else(|| RuntimeError::underflow("'over' requires two values on the stack"))?;
    let copy = interp.heap.duplicate(second)?;
    interp.push(copy);
    Ok(())
}
