// Compatibility module for std/no_std builds
// Re-exports the alloc types the runtime needs from whichever crate provides them

#[cfg(target_os = "none")]
extern crate alloc;

#[cfg(not(target_os = "none"))]
pub use std::{
    boxed::Box,
    collections::BTreeMap,
    fmt,
    format,
    string::{String, ToString},
    vec::Vec,
};

#[cfg(not(target_os = "none"))]
#[allow(unused_imports)]
pub use std::vec;

#[cfg(target_os = "none")]
pub use self::alloc::{
    boxed::Box,
    collections::BTreeMap,
    format,
    string::{String, ToString},
    vec::Vec,
};

#[cfg(target_os = "none")]
#[allow(unused_imports)]
pub use self::alloc::vec;

#[cfg(target_os = "none")]
pub use core::fmt;
