use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::primitives::{arithmetic, assert, compare, introspect, io, persist, scope, stack, thread};

pub type BuiltinFn = fn(&mut Interpreter) -> Result<(), RuntimeError>;

// RUST CONCEPT: A closed set of native operations
// The discriminant is what gets stored in an atom's payload, so the order
// here must match BUILTINS below.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NativeOp {
    Open,
    Close,
    Resolve,
    Link,
    Code,
    Global,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    Less,
    Greater,
    Dup,
    Comma,
    Drop,
    Swap,
    Over,
    Len,
    Refs,
    Live,
    Made,
    Freed,
    Heap,
    Print,
    Emit,
    Cr,
    Freeze,
    Thaw,
    Spawn,
    Detach,
    Await,
    Kill,
    Assert,
}

impl NativeOp {
    pub fn from_u8(raw: u8) -> Option<NativeOp> {
        BUILTINS.get(raw as usize).map(|b| b.op)
    }

    pub fn builtin(self) -> &'static Builtin {
        &BUILTINS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.builtin().name
    }
}

pub struct Builtin {
    pub op: NativeOp,
    pub name: &'static str,
    pub func: BuiltinFn,
    pub doc: &'static str,
}

pub static BUILTINS: &[Builtin] = &[
    // Scopes
    Builtin {
        op: NativeOp::Open,
        name: "[",
        func: scope::open_impl,
        doc: "Open a scope: enter the link on top, or a fresh list.\nUsage: [ . 1 2 ] .",
    },
    Builtin {
        op: NativeOp::Close,
        name: "]",
        func: scope::close_impl,
        doc: "Close the current scope, writing it back into its list.",
    },
    Builtin {
        op: NativeOp::Resolve,
        name: ":",
        func: scope::resolve_impl,
        doc: "Look up a name without calling it.\nUsage: \"x\" : . => value of x",
    },
    Builtin {
        op: NativeOp::Link,
        name: "link",
        func: scope::link_impl,
        doc: "Turn the list on top into a link, which '.' opens instead of unpacking.",
    },
    Builtin {
        op: NativeOp::Code,
        name: "code",
        func: scope::code_impl,
        doc: "Mark the list on top as code.",
    },
    Builtin {
        op: NativeOp::Global,
        name: "global",
        func: scope::global_impl,
        doc: "Bind a value in the root scope.\nUsage: value \"name\" global .",
    },
    // Arithmetic
    Builtin {
        op: NativeOp::Add,
        name: "+",
        func: arithmetic::add_impl,
        doc: "Add two integers.\nUsage: 5 3 + . => 8",
    },
    Builtin {
        op: NativeOp::Sub,
        name: "-",
        func: arithmetic::sub_impl,
        doc: "Subtract two integers.\nUsage: 10 3 - . => 7",
    },
    Builtin {
        op: NativeOp::Mul,
        name: "*",
        func: arithmetic::mul_impl,
        doc: "Multiply two integers.\nUsage: 6 7 * . => 42",
    },
    Builtin {
        op: NativeOp::Div,
        name: "/",
        func: arithmetic::div_impl,
        doc: "Truncating integer division.\nUsage: 15 4 / . => 3",
    },
    Builtin {
        op: NativeOp::Mod,
        name: "mod",
        func: arithmetic::mod_impl,
        doc: "Remainder of integer division.\nUsage: 13 5 mod . => 3",
    },
    // Comparison
    Builtin {
        op: NativeOp::Equal,
        name: "=",
        func: compare::equal_impl,
        doc: "1 if two integers or strings are equal, else 0.",
    },
    Builtin {
        op: NativeOp::Less,
        name: "<",
        func: compare::less_impl,
        doc: "1 if a < b, else 0.\nUsage: 3 7 < . => 1",
    },
    Builtin {
        op: NativeOp::Greater,
        name: ">",
        func: compare::greater_impl,
        doc: "1 if a > b, else 0.\nUsage: 7 3 > . => 1",
    },
    // Stack
    Builtin {
        op: NativeOp::Dup,
        name: "dup",
        func: stack::dup_impl,
        doc: "Duplicate the top item.",
    },
    Builtin {
        op: NativeOp::Comma,
        name: ",",
        func: stack::dup_impl,
        doc: "Duplicate the top item (same as dup).",
    },
    Builtin {
        op: NativeOp::Drop,
        name: "drop",
        func: stack::drop_impl,
        doc: "Remove the top item.",
    },
    Builtin {
        op: NativeOp::Swap,
        name: "swap",
        func: stack::swap_impl,
        doc: "Exchange the top two items.",
    },
    Builtin {
        op: NativeOp::Over,
        name: "over",
        func: stack::over_impl,
        doc: "Copy the second item to the top.",
    },
    // Introspection
    Builtin {
        op: NativeOp::Len,
        name: "len",
        func: introspect::len_impl,
        doc: "Element count of a list, or byte length of a string.",
    },
    Builtin {
        op: NativeOp::Refs,
        name: "refs",
        func: introspect::refs_impl,
        doc: "Push the reference count of the top item, leaving it in place.",
    },
    Builtin {
        op: NativeOp::Live,
        name: "live",
        func: introspect::live_impl,
        doc: "Number of atoms currently alive.",
    },
    Builtin {
        op: NativeOp::Made,
        name: "made",
        func: introspect::made_impl,
        doc: "Number of atoms created so far.",
    },
    Builtin {
        op: NativeOp::Freed,
        name: "freed",
        func: introspect::freed_impl,
        doc: "Number of atoms destroyed so far.",
    },
    Builtin {
        op: NativeOp::Heap,
        name: "heap",
        func: introspect::heap_impl,
        doc: "Push free bytes, then the largest free block.",
    },
    // Output
    Builtin {
        op: NativeOp::Print,
        name: "print",
        func: io::print_impl,
        doc: "Print the top item (strings without quotes).",
    },
    Builtin {
        op: NativeOp::Emit,
        name: "emit",
        func: io::emit_impl,
        doc: "Output a character from its code point.\nUsage: 65 emit . => A",
    },
    Builtin {
        op: NativeOp::Cr,
        name: "cr",
        func: io::cr_impl,
        doc: "Output a newline.",
    },
    // Snapshots
    Builtin {
        op: NativeOp::Freeze,
        name: "freeze",
        func: persist::freeze_impl,
        doc: "Serialize the top item into a string.",
    },
    Builtin {
        op: NativeOp::Thaw,
        name: "thaw",
        func: persist::thaw_impl,
        doc: "Rebuild an item from a frozen string.",
    },
    // Threads
    Builtin {
        op: NativeOp::Spawn,
        name: "spawn",
        func: thread::spawn_impl,
        doc: "Create a thread that will evaluate the top item; push its id.",
    },
    Builtin {
        op: NativeOp::Detach,
        name: "detach",
        func: thread::detach_impl,
        doc: "Schedule a spawned thread.",
    },
    Builtin {
        op: NativeOp::Await,
        name: "await",
        func: thread::await_impl,
        doc: "Wait until a thread has finished.",
    },
    Builtin {
        op: NativeOp::Kill,
        name: "kill",
        func: thread::kill_impl,
        doc: "Cancel a thread.",
    },
    Builtin {
        op: NativeOp::Assert,
        name: "assert",
        func: assert::assert_impl,
        doc: "Fail with the message when the condition is 0.\nUsage: cond \"message\" assert .",
    },
];

pub fn lookup(name: &str) -> Option<NativeOp> {
    BUILTINS.iter().find(|b| b.name == name).map(|b| b.op)
}

pub fn invoke(interp: &mut Interpreter, op: NativeOp) -> Result<(), RuntimeError> {
    log::trace!("invoke {}", op.name());
    (op.builtin().func)(interp)
}
