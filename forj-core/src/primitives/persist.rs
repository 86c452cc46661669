// Snapshot primitives: freeze thaw

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::snapshot;

// freeze ( x -- bytes )
pub fn freeze_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let value = interp.pop_with_context("'freeze' requires a value on the stack")?;
    let encoded = snapshot::encode(&interp.heap, value);
    interp.heap.release(value);
    let frozen = interp.heap.new_buffer(&encoded)?;
    interp.push(frozen);
    Ok(())
}

// thaw ( bytes -- x )
pub fn thaw_impl(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let bytes = interp.pop_bytes("'thaw' requires a frozen string on the stack")?;
    let value = snapshot::decode(&mut interp.heap, &bytes)?;
    interp.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_freeze_thaw_round_trip() {
        let mut interp = Interpreter::with_config(Config::default().with_heap_size(32 * 1024)).unwrap();
        interp
            .execute_string("[ . 1 [ . \"two\" ] . 3 ] . dup . freeze . thaw .")
            .unwrap();
        let text = interp.stack_text();
        assert_eq!(text.len(), 2);
        assert_eq!(text[0], text[1]);
        assert_eq!(text[1], "[ 1 [ \"two\" ] 3 ]");
    }

    #[test]
    fn test_thaw_rejects_garbage() {
        let mut interp = Interpreter::with_config(Config::default().with_heap_size(16 * 1024)).unwrap();
        interp.execute_string("\"not a snapshot\"").unwrap();
        assert!(matches!(
            thaw_impl(&mut interp),
            Err(RuntimeError::Corrupt(_))
        ));
    }
}
