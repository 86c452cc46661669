// Queue-driven evaluator.
//
// Work is never done by native recursion: every pending step is a
// breadcrumb on the current thread's LIFO queue, so a thread can be
// suspended between any two steps and resumed by the scheduler.

use crate::atom::{AtomId, Kind, Payload};
use crate::builtins;
use crate::compat::Vec;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breadcrumb {
    /// Apply one dot step to the top of the stack.
    Dot,
    /// Place one array element on the stack. Holds a reference.
    Element(AtomId),
}

/// Eager dot: queue a `Dot` and run until the queue is back to where it was.
pub fn dot(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let floor = interp.queue_depth();
    interp.enqueue(Breadcrumb::Dot);
    while interp.queue_depth() > floor {
        if let Err(e) = run(interp) {
            unwind(interp, floor);
            return Err(e);
        }
    }
    Ok(())
}

/// Pop one breadcrumb from the current thread and do exactly one unit of work.
/// Returns `false` when the queue was already empty.
pub fn run(interp: &mut Interpreter) -> Result<bool, RuntimeError> {
    let Some(crumb) = interp.dequeue() else {
        return Ok(false);
    };
    log::trace!("thread {} step {:?}", interp.current().0, crumb);
    match crumb {
        Breadcrumb::Dot => dot_step(interp)?,
        Breadcrumb::Element(atom) => {
            let result = element_step(interp, atom);
            interp.heap.release(atom);
            result?
        }
    }
    Ok(true)
}

/// Drop queued work above `floor`, releasing element references.
pub fn unwind(interp: &mut Interpreter, floor: usize) {
    while interp.queue_depth() > floor {
        if let Some(Breadcrumb::Element(atom)) = interp.dequeue() {
            interp.heap.release(atom);
        }
    }
}

fn dot_step(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let focus = interp.focus();
    let top = interp
        .heap
        .top(focus)
        .ok_or_else(|| RuntimeError::underflow("'.' needs something on the stack"))?;

    match interp.heap.kind(top) {
        Kind::NativeOp => {
            let op = interp
                .heap
                .native(top)
                .ok_or_else(|| RuntimeError::Corrupt("unknown native operation".into()))?;
            interp.heap.pull(focus)?;
            builtins::invoke(interp, op)
        }
        Kind::Buffer => {
            // A name is called: look it up, replace it with its value, dot again
            let name = interp.heap.buffer_bytes(top).unwrap_or_default().to_vec();
            let value = scan::resolve(interp, &name)?;
            if let Err(e) = interp.heap.pull(focus) {
                interp.heap.release(value);
                return Err(e);
            }
            interp.push(value);
            interp.enqueue(Breadcrumb::Dot);
            Ok(())
        }
        Kind::Dot => match interp.heap.branch(top) {
            None => {
                interp.heap.pull(focus)?;
                interp.enqueue(Breadcrumb::Dot);
                Ok(())
            }
            Some(inner) => {
                let shorter = interp.heap.tail_of(inner);
                let copy = interp.heap.duplicate(shorter)?;
                replace_top(interp, copy)
            }
        },
        Kind::Link => enter(interp, top),
        Kind::List | Kind::ExecList => {
            let list = interp.heap.pulln(focus)?;
            array(interp, list);
            interp.heap.release(list);
            Ok(())
        }
        Kind::Integer | Kind::EndMarker => {
            let copy = interp.heap.duplicate(top)?;
            replace_top(interp, copy)
        }
    }
}

fn replace_top(interp: &mut Interpreter, replacement: AtomId) -> Result<(), RuntimeError> {
    let focus = interp.focus();
    if let Err(e) = interp.heap.pull(focus) {
        interp.heap.release(replacement);
        return Err(e);
    }
    interp.push(replacement);
    Ok(())
}

// Queue one element per node. Walking head to tail and popping LIFO means the
// tail, which was written first, is placed first.
fn array(interp: &mut Interpreter, list: AtomId) {
    let elements: Vec<AtomId> = interp.heap.elements(list);
    for element in elements {
        interp.heap.take_ref(Some(element));
        interp.enqueue(Breadcrumb::Element(element));
    }
}

fn element_step(interp: &mut Interpreter, element: AtomId) -> Result<(), RuntimeError> {
    if interp.heap.kind(element) == Kind::Dot && interp.heap.branch(element).is_none() {
        interp.enqueue(Breadcrumb::Dot);
        return Ok(());
    }
    let copy = interp.heap.duplicate(element)?;
    interp.push(copy);
    Ok(())
}

/// `[`: enter the Link on top, or push a fresh list and enter that.
pub fn open(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let focus = interp.focus();
    let slot = match interp.heap.top(focus) {
        Some(top) if interp.heap.kind(top) == Kind::Link => top,
        _ => {
            let list = interp.heap.new_list(Kind::List)?;
            interp.push(list);
            list
        }
    };
    enter(interp, slot)
}

// Make a new frame over `slot` and focus it. The slot stays on the parent
// stack so `close` can write the finished list back into it.
fn enter(interp: &mut Interpreter, slot: AtomId) -> Result<(), RuntimeError> {
    let parent = interp.focus();
    let frame = interp.heap.new_frame(Some(slot), Some(parent))?;
    interp.set_focus(frame);
    Ok(())
}

/// `]`: write the frame's list into its slot and return to the parent frame.
pub fn close(interp: &mut Interpreter) -> Result<(), RuntimeError> {
    let frame = interp.focus();
    let parent = interp
        .heap
        .next(frame)
        .ok_or_else(|| RuntimeError::underflow("']' without a matching '['"))?;
    let Payload::Atom(slot) = interp.heap.payload(frame) else {
        return Err(RuntimeError::underflow("']' without a matching '['"));
    };
    let built = match interp.heap.branch(frame) {
        Some(head) => head,
        None => {
            let marker = interp.heap.new_atom(Kind::EndMarker)?;
            interp.heap.set_back_ref(marker, Some(slot));
            marker
        }
    };
    interp.heap.set_branch(slot, Some(built));
    interp.set_focus(parent);
    Ok(())
}
