// Comparisons push 1 for true and 0 for false

use crate::atom::Payload;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::printer;

// Equality: ( a b -- flag ) on two integers or two strings
pub fn equal_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let context = "'=' requires two values on the stack (e.g., '5 5 = .')";
    let (a, b) = interp.peek_pair(context)?;
    let heap = &interp.heap;
    let equal = match (heap.payload(a), heap.payload(b)) {
        (Payload::Integer(x), Payload::Integer(y)) => x == y,
        (Payload::Buffer(_), Payload::Buffer(_)) => heap.buffer_bytes(a) == heap.buffer_bytes(b),
        (Payload::Integer(_), _) => return Err(RuntimeError::mismatch("integer", printer::render(heap, b))),
        (Payload::Buffer(_), _) => return Err(RuntimeError::mismatch("string", printer::render(heap, b))),
        _ => return Err(RuntimeError::mismatch("integer or string", printer::render(heap, a))),
    };
    let focus = interp.focus();
    interp.heap.pull(focus)?;
    interp.heap.pull(focus)?;
    interp.push_integer(equal as i64)
}

// Less than: ( a b -- flag )
pub fn less_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let context = "'<' requires two integers on the stack (e.g., '3 7 < .')";
    let (a, b) = interp.pop_integer_pair(context)?;
    interp.push_integer((a < b) as i64)
}

// Greater than: ( a b -- flag )
pub fn greater_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let context = "'>' requires two integers on the stack (e.g., '7 3 > .')";
    let (a, b) = interp.pop_integer_pair(context)?;
    interp.push_integer((a > b) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn interp() -> Interpreter {
        Interpreter::with_config(Config::default().with_heap_size(16 * 1024)).unwrap()
    }

    #[test]
    fn test_integer_comparisons() {
        let mut interp = interp();
        interp.execute_string("5 5 = . 3 7 < . 3 7 > .").unwrap();
        assert_eq!(interp.stack_text(), vec!["1", "1", "0"]);
    }

    #[test]
    fn test_string_equality() {
        let mut interp = interp();
        interp.execute_string("\"ab\" \"ab\" = . \"ab\" \"ac\" = .").unwrap();
        assert_eq!(interp.stack_text(), vec!["1", "0"]);
    }

    #[test]
    fn test_mixed_equality_is_mismatch() {
        let mut interp = interp();
        interp.push_integer(1).unwrap();
        let s = interp.heap.new_buffer(b"1").unwrap();
        interp.push(s);
        assert_eq!(
            equal_impl(&mut interp),
            Err(RuntimeError::mismatch("integer", "\"1\""))
        );
        assert_eq!(interp.stack_len(), 2);
    }

    #[test]
    fn test_failed_comparison_keeps_operands() {
        let mut interp = interp();
        let err = interp.execute_string("1 \"a\" < .").unwrap_err();
        assert_eq!(err, RuntimeError::mismatch("integer", "\"a\""));
        assert_eq!(interp.stack_text(), vec!["1", "\"a\""]);

        interp.clear_stack();
        interp.execute_string("\"a\" 1 > .").unwrap_err();
        assert_eq!(interp.stack_text(), vec!["\"a\"", "1"]);
    }

    #[test]
    fn test_equality_underflow_keeps_the_lone_value() {
        let mut interp = interp();
        interp.push_integer(3).unwrap();
        assert!(matches!(equal_impl(&mut interp), Err(RuntimeError::StackUnderflow { .. })));
        assert_eq!(interp.stack_text(), vec!["3"]);
    }
}
