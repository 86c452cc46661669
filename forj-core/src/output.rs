//! Output trait for the Forj interpreter
//!
//! The interpreter writes everything `print`, `emit` and `cr` produce through
//! this trait, so the same core can drive a terminal, a UART or a test buffer.

/// Output trait for sync I/O operations
///
/// Returns Ok(()) on success, Err(()) on failure. The interpreter logs
/// failures and carries on.
pub trait Output {
    /// Write bytes to the output
    fn write(&mut self, data: &[u8]) -> Result<(), ()>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<(), ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::Vec;

    // Mock output for testing
    struct MockOutput {
        buffer: Vec<u8>,
        flushes: usize,
    }

    impl Output for MockOutput {
        fn write(&mut self, data: &[u8]) -> Result<(), ()> {
            self.buffer.extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_mock_output() {
        let mut output = MockOutput {
            buffer: Vec::new(),
            flushes: 0,
        };

        output.write(b"Hello").unwrap();
        output.write(b" ").unwrap();
        output.write(b"World").unwrap();
        output.flush().unwrap();

        assert_eq!(output.buffer, b"Hello World");
        assert_eq!(output.flushes, 1);
    }
}
