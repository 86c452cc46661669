//! Stdout wrapper implementing Output
//!
//! This module provides a simple stdout output implementation for std platforms.

use std::io::{self, Write};

use crate::output::Output;

#[derive(Debug, Default)]
pub struct StdoutOutput;

impl StdoutOutput {
    pub fn new() -> Self {
        StdoutOutput
    }
}

impl Output for StdoutOutput {
    fn write(&mut self, data: &[u8]) -> Result<(), ()> {
        io::stdout().write_all(data).map_err(|_| ())
    }

    fn flush(&mut self) -> Result<(), ()> {
        io::stdout().flush().map_err(|_| ())
    }
}
