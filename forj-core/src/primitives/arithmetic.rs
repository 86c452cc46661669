// Integer arithmetic: + - * / mod
//
// Overflow wraps; division and remainder by zero are errors.

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use num_traits::{CheckedDiv, CheckedRem, WrappingAdd, WrappingMul, WrappingSub};

// Both operands stay on the stack unless both are integers
fn pop_pair(interp: &mut Interpreter, context: &str) -> Result<(i64, i64), RuntimeError> {
    interp.pop_integer_pair(context)
}

// Addition: ( a b -- a+b )
pub fn add_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(interp, "'+' requires two integers on the stack (e.g., '5 3 + .')")?;
    interp.push_integer(WrappingAdd::wrapping_add(&a, &b))
}

// Subtraction: ( a b -- a-b )
pub fn sub_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(interp, "'-' requires two integers on the stack (e.g., '10 3 - .')")?;
    interp.push_integer(WrappingSub::wrapping_sub(&a, &b))
}

// Multiplication: ( a b -- a*b )
pub fn mul_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(interp, "'*' requires two integers on the stack (e.g., '6 7 * .')")?;
    interp.push_integer(WrappingMul::wrapping_mul(&a, &b))
}

// Division: ( a b -- a/b ) truncating toward zero
pub fn div_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(interp, "'/' requires two integers on the stack (e.g., '15 3 / .')")?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    // Only i64::MIN / -1 fails the check; it wraps like the other operators
    let q = CheckedDiv::checked_div(&a, &b).unwrap_or(a.wrapping_div(b));
    interp.push_integer(q)
}

// Remainder: ( a b -- a mod b ) with the sign of a
pub fn mod_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(interp, "'mod' requires two integers on the stack (e.g., '13 5 mod .')")?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let r = CheckedRem::checked_rem(&a, &b).unwrap_or(0);
    interp.push_integer(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn interp() -> Interpreter {
        Interpreter::with_config(Config::default().with_heap_size(16 * 1024)).unwrap()
    }

    fn binary(f: fn(&mut Interpreter) -> Result<(), RuntimeError>, a: i64, b: i64) -> Result<i64, RuntimeError> {
        let mut interp = interp();
        interp.push_integer(a).unwrap();
        interp.push_integer(b).unwrap();
        f(&mut interp)?;
        interp.pop_integer("result")
    }

    #[test]
    fn test_add_sub_mul() {
        assert_eq!(binary(add_impl, 5, 3), Ok(8));
        assert_eq!(binary(sub_impl, 10, 3), Ok(7));
        assert_eq!(binary(mul_impl, 6, 7), Ok(42));
        assert_eq!(binary(add_impl, i64::MAX, 1), Ok(i64::MIN));
    }

    #[test]
    fn test_div_and_mod() {
        assert_eq!(binary(div_impl, 15, 4), Ok(3));
        assert_eq!(binary(div_impl, -7, 2), Ok(-3));
        assert_eq!(binary(mod_impl, 13, 5), Ok(3));
        assert_eq!(binary(mod_impl, -13, 5), Ok(-3));
        assert_eq!(binary(div_impl, i64::MIN, -1), Ok(i64::MIN));
        assert_eq!(binary(mod_impl, i64::MIN, -1), Ok(0));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(binary(div_impl, 1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(binary(mod_impl, 1, 0), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_underflow_keeps_context() {
        let mut interp = interp();
        interp.push_integer(1).unwrap();
        match add_impl(&mut interp) {
            Err(RuntimeError::StackUnderflow { context }) => assert!(context.starts_with("'+'")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_type_error_leaves_both_operands() {
        let mut interp = interp();
        let err = interp.execute_string("1 \"a\" + .").unwrap_err();
        assert_eq!(err, RuntimeError::mismatch("integer", "\"a\""));
        assert_eq!(interp.stack_text(), vec!["1", "\"a\""]);

        // Second operand checked too
        interp.clear_stack();
        interp.execute_string("\"b\" 2 * .").unwrap_err();
        assert_eq!(interp.stack_text(), vec!["\"b\"", "2"]);
    }

    #[test]
    fn test_underflow_leaves_the_lone_operand() {
        let mut interp = interp();
        interp.push_integer(1).unwrap();
        assert!(sub_impl(&mut interp).is_err());
        assert_eq!(interp.stack_text(), vec!["1"]);
    }
}
