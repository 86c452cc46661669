// Primitives module - one file per family of native operations

// Scopes and binding
pub mod scope;

// Integer arithmetic and comparison
pub mod arithmetic;
pub mod compare;

// Stack manipulation
pub mod stack;

// Memory and graph introspection
pub mod introspect;

// Output
pub mod io;

// Snapshots
pub mod persist;

// Cooperative threads
pub mod thread;

pub mod assert;
