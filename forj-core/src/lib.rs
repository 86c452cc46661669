//! # Forj Core
//!
//! Runtime library for Forj, a small concatenative language whose only value
//! is the atom: a reference-counted graph node living in a fixed arena.
//!
//! ## Pieces
//!
//! - **Arena**: one byte array, address-ordered free list, first fit
//! - **Atoms**: lists are chains of atoms whose last element points back at
//!   its owner; everything is reference counted
//! - **Engine**: `.` is driven by a per-thread breadcrumb queue, never by
//!   native recursion
//! - **Threads**: cooperative, stepped one breadcrumb at a time
//!
//! ## Example
//!
//! ```
//! use forj_core::Interpreter;
//!
//! let mut interp = Interpreter::new().unwrap();
//! interp.execute_string("5 3 + .").unwrap();
//! assert_eq!(interp.stack_text(), vec!["8"]);
//! ```

#![cfg_attr(target_os = "none", no_std)]

#[cfg(target_os = "none")]
extern crate alloc;

pub mod arena;
pub mod atom;
pub mod builtins;
pub mod config;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod primitives;
pub mod printer;
pub mod scan;
pub mod scheduler;
pub mod snapshot;
pub mod tokenizer;
pub mod vect;

#[cfg(feature = "std")]
pub mod stdout_output;

// Internal module
mod compat;

// Re-exports for convenience
pub use atom::{AtomId, Heap, Kind, Payload};
pub use config::{ArenaConfig, Config};
pub use error::RuntimeError;
pub use interpreter::{Interpreter, MAIN_THREAD};
pub use output::Output;
pub use scheduler::{ThreadId, ThreadState};
pub use tokenizer::SourcePos;

#[cfg(feature = "std")]
pub use stdout_output::StdoutOutput;
