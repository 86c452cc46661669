use crate::atom::{AtomId, Heap, Kind};
use crate::compat::{BTreeMap, Box, String, Vec};
use crate::config::Config;
use crate::engine::Breadcrumb;
use crate::error::RuntimeError;
use crate::output::Output;
use crate::printer;
use crate::scheduler::{Thread, ThreadId};
use crate::tokenizer::{self, Source};

/// The main thread runs program text; it is never on the schedule.
pub const MAIN_THREAD: ThreadId = ThreadId(0);

// RUST CONCEPT: One explicit world object instead of process globals
// Everything the engine touches hangs off this struct, so independent
// interpreters can live side by side (handy in tests).
pub struct Interpreter {
    pub heap: Heap,
    pub config: Config,
    root_scope: AtomId,
    pub(crate) threads: BTreeMap<ThreadId, Thread>,
    pub(crate) schedule: Vec<ThreadId>,
    pub(crate) next_thread: u32,
    pub(crate) current: ThreadId,
    output: Option<Box<dyn Output>>,
}

impl Interpreter {
    pub fn new() -> Result<Self, RuntimeError> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self, RuntimeError> {
        let mut heap = Heap::new(&config.arena);
        let root_scope = heap.new_list(Kind::List)?;
        heap.take_ref(Some(root_scope));
        let frame = heap.new_frame(None, None)?;
        heap.take_ref(Some(frame));

        let mut threads = BTreeMap::new();
        threads.insert(MAIN_THREAD, Thread::new(MAIN_THREAD, frame));
        Ok(Self {
            heap,
            config,
            root_scope,
            threads,
            schedule: Vec::new(),
            next_thread: 1,
            current: MAIN_THREAD,
            output: None,
        })
    }

    pub fn set_output(&mut self, output: Box<dyn Output>) {
        self.output = Some(output);
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Write to the output sink if one is attached. Sink failures are logged
    /// and otherwise ignored.
    pub fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        if let Some(output) = &mut self.output {
            if output.write(data).and_then(|_| output.flush()).is_err() {
                log::warn!("output sink rejected {} bytes", data.len());
            }
        }
    }

    pub fn root_scope(&self) -> AtomId {
        self.root_scope
    }

    /// Bind `value` to `name` in the root scope, visible from every thread.
    pub fn bind_global(&mut self, name: &[u8], value: AtomId) -> Result<(), RuntimeError> {
        let label = self.heap.new_buffer(name)?;
        self.heap.push(self.root_scope, value);
        self.heap.push(self.root_scope, label);
        Ok(())
    }

    // Current thread

    pub fn current(&self) -> ThreadId {
        self.current
    }

    fn thread(&self) -> &Thread {
        // The current thread is removed from the table only after its step ends
        &self.threads[&self.current]
    }

    fn thread_mut(&mut self) -> &mut Thread {
        self.threads
            .get_mut(&self.current)
            .unwrap_or_else(|| unreachable!("current thread is always registered"))
    }

    /// The frame the current thread is building.
    pub fn focus(&self) -> AtomId {
        self.thread().focus
    }

    pub fn set_focus(&mut self, frame: AtomId) {
        self.heap.take_ref(Some(frame));
        let old = core::mem::replace(&mut self.thread_mut().focus, frame);
        self.heap.release(old);
    }

    pub fn enqueue(&mut self, crumb: Breadcrumb) {
        self.thread_mut().queue.push(crumb);
    }

    pub fn dequeue(&mut self) -> Option<Breadcrumb> {
        self.thread_mut().queue.pop()
    }

    pub fn queue_depth(&self) -> usize {
        self.thread().queue.len()
    }

    // Stack access for primitives

    pub fn push(&mut self, atom: AtomId) {
        let focus = self.focus();
        self.heap.push(focus, atom);
    }

    pub fn push_integer(&mut self, value: i64) -> Result<(), RuntimeError> {
        let atom = self.heap.new_integer(value)?;
        self.push(atom);
        Ok(())
    }

    pub fn top(&self) -> Option<AtomId> {
        self.heap.top(self.focus())
    }

    /// Pop the top atom; the caller owns the returned reference.
    pub fn pop(&mut self) -> Result<AtomId, RuntimeError> {
        self.pop_with_context("stack is empty")
    }

    pub fn pop_with_context(&mut self, context: &str) -> Result<AtomId, RuntimeError> {
        let focus = self.focus();
        if self.heap.top(focus).is_none() {
            return Err(RuntimeError::underflow(context));
        }
        self.heap.pulln(focus)
    }

    pub fn pop_integer(&mut self, context: &str) -> Result<i64, RuntimeError> {
        let atom = self.pop_with_context(context)?;
        let value = self.heap.integer(atom);
        let result = value.ok_or_else(|| RuntimeError::mismatch("integer", printer::render(&self.heap, atom)));
        self.heap.release(atom);
        result
    }

    /// The top two atoms as `(second, top)`, left on the stack.
    pub fn peek_pair(&self, context: &str) -> Result<(AtomId, AtomId), RuntimeError> {
        let top = self.top().ok_or_else(|| RuntimeError::underflow(context))?;
        let second = self.heap.next(top).ok_or_else(|| RuntimeError::underflow(context))?;
        Ok((second, top))
    }

    /// Pop two integers as `(a, b)`, `b` being the former top. Nothing is
    /// popped unless both are integers.
    pub fn pop_integer_pair(&mut self, context: &str) -> Result<(i64, i64), RuntimeError> {
        let (second, top) = self.peek_pair(context)?;
        let heap = &self.heap;
        let as_integer = |atom| {
            heap.integer(atom)
                .ok_or_else(|| RuntimeError::mismatch("integer", printer::render(heap, atom)))
        };
        let b = as_integer(top)?;
        let a = as_integer(second)?;
        let focus = self.focus();
        self.heap.pull(focus)?;
        self.heap.pull(focus)?;
        Ok((a, b))
    }

    pub fn pop_bytes(&mut self, context: &str) -> Result<Vec<u8>, RuntimeError> {
        let atom = self.pop_with_context(context)?;
        let result = match self.heap.buffer_bytes(atom) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(RuntimeError::mismatch("string", printer::render(&self.heap, atom))),
        };
        self.heap.release(atom);
        result
    }

    /// Current thread's stack, bottom first, as printed text.
    pub fn stack_text(&self) -> Vec<String> {
        let mut items: Vec<String> = self
            .heap
            .elements(self.focus())
            .into_iter()
            .map(|atom| printer::render(&self.heap, atom))
            .collect();
        items.reverse();
        items
    }

    pub fn stack_len(&self) -> usize {
        self.heap.list_len(self.focus())
    }

    pub fn clear_stack(&mut self) {
        while self.top().is_some() {
            let focus = self.focus();
            if self.heap.pull(focus).is_err() {
                break;
            }
        }
    }

    /// Tokenize and run `text` on the main thread.
    ///
    /// Unresolved names are reported and skipped; they come back as the list
    /// of diagnostics. Any other error stops at the offending token.
    pub fn execute_string(&mut self, text: &str) -> Result<Vec<RuntimeError>, RuntimeError> {
        let mut diagnostics = Vec::new();
        let mut source = Source::new(text);
        loop {
            match tokenizer::consume_one(self, &mut source) {
                Ok(true) => {}
                Ok(false) => return Ok(diagnostics),
                Err(e @ RuntimeError::ResolutionFailure { .. }) => {
                    log::warn!("{}", e);
                    diagnostics.push(e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
