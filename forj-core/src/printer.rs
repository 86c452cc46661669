// Plain-text rendering of atoms, used by print, the REPL and error messages.
//
// Lists print in source order, i.e. the reverse of their link order, so the
// output reads back as the program that built them.

use crate::atom::{AtomId, Heap, Kind, Payload};
use crate::compat::{String, ToString, Vec, format};

const MAX_DEPTH: usize = 32;

pub fn render(heap: &Heap, atom: AtomId) -> String {
    let mut out = String::new();
    render_into(heap, atom, 0, &mut out);
    out
}

fn render_into(heap: &Heap, atom: AtomId, depth: usize, out: &mut String) {
    match heap.kind(atom) {
        Kind::Integer => out.push_str(&heap.integer(atom).unwrap_or_default().to_string()),
        Kind::Buffer => {
            out.push('"');
            let text = String::from_utf8_lossy(heap.buffer_bytes(atom).unwrap_or_default());
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\u{1b}' => out.push_str("\\e"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        Kind::NativeOp => match heap.payload(atom) {
            Payload::Native(op) => out.push_str(op.name()),
            _ => out.push_str("<builtin?>"),
        },
        Kind::Dot => {
            let mut dots = 1;
            let mut cur = heap.branch(atom);
            while let Some(inner) = cur {
                dots += 1;
                cur = heap.branch(heap.tail_of(inner));
            }
            for _ in 0..dots {
                out.push('.');
            }
        }
        Kind::EndMarker => {}
        Kind::List | Kind::Link | Kind::ExecList => {
            match heap.kind(atom) {
                Kind::Link => out.push_str("link"),
                Kind::ExecList => out.push_str("code"),
                _ => {}
            }
            if depth >= MAX_DEPTH {
                out.push_str("[ ... ]");
                return;
            }
            out.push('[');
            let mut elements: Vec<AtomId> = heap.elements(atom);
            elements.reverse();
            for element in elements {
                out.push(' ');
                render_into(heap, element, depth + 1, out);
            }
            out.push_str(" ]");
        }
    }
}

/// Stack listing, bottom first, separated by spaces.
pub fn render_stack(heap: &Heap, frame: AtomId) -> String {
    let mut items: Vec<String> = heap.elements(frame).into_iter().map(|a| render(heap, a)).collect();
    items.reverse();
    items.join(" ")
}

/// Debug dump of one atom's fields.
pub fn describe(heap: &Heap, atom: AtomId) -> String {
    format!(
        "{:#06x} {} refs={} end={} next={:?} branch={:?}",
        atom.addr(),
        heap.kind(atom).name(),
        heap.refcount(atom),
        heap.is_end(atom),
        heap.next_raw(atom).map(|a| a.addr()),
        heap.branch(atom).map(|a| a.addr()),
    )
}
