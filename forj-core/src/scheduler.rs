//! Cooperative threads.
//!
//! A thread is a root frame plus its own breadcrumb queue. Detached threads
//! sit on the schedule and are stepped round-robin, one breadcrumb each per
//! pass, so the only suspension points are breadcrumb boundaries.

use crate::atom::AtomId;
use crate::compat::{Vec, fmt};
use crate::engine::{self, Breadcrumb};
use crate::error::RuntimeError;
use crate::interpreter::{Interpreter, MAIN_THREAD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Active,
    Blocked(ThreadId),
    Drained,
}

pub struct Thread {
    pub id: ThreadId,
    pub(crate) focus: AtomId,
    pub(crate) queue: Vec<Breadcrumb>,
    pub state: ThreadState,
    pub(crate) dependents: Vec<ThreadId>,
}

impl Thread {
    pub fn new(id: ThreadId, focus: AtomId) -> Self {
        Thread {
            id,
            focus,
            queue: Vec::new(),
            state: ThreadState::Active,
            dependents: Vec::new(),
        }
    }
}

impl Interpreter {
    /// Create an undetached thread whose stack holds a copy of `code` and
    /// whose queue will dot it once.
    pub fn spawn_thread(&mut self, code: AtomId) -> Result<ThreadId, RuntimeError> {
        let frame = self.heap.new_frame(None, None)?;
        self.heap.take_ref(Some(frame));
        let copy = match self.heap.duplicate(code) {
            Ok(copy) => copy,
            Err(e) => {
                self.heap.release(frame);
                return Err(e);
            }
        };
        self.heap.push(frame, copy);

        let id = ThreadId(self.next_thread);
        self.next_thread += 1;
        let mut thread = Thread::new(id, frame);
        thread.queue.push(Breadcrumb::Dot);
        self.threads.insert(id, thread);
        log::debug!("spawned thread {}", id);
        Ok(id)
    }

    /// Put a thread on the schedule. Detaching twice is harmless.
    pub fn detach(&mut self, id: ThreadId) -> Result<(), RuntimeError> {
        if id == MAIN_THREAD || !self.threads.contains_key(&id) {
            return Err(RuntimeError::mismatch("spawned thread id", crate::compat::format!("{}", id)));
        }
        if !self.schedule.contains(&id) {
            self.schedule.push(id);
            log::debug!("detached thread {}", id);
        }
        Ok(())
    }

    /// Block the current thread until `id` drains.
    ///
    /// From the main thread this runs the scheduler until `id` is gone,
    /// detaching it first if needed. Awaiting a thread that no longer exists
    /// does nothing.
    pub fn await_thread(&mut self, id: ThreadId) -> Result<(), RuntimeError> {
        if !self.threads.contains_key(&id) {
            return Ok(());
        }
        if id == self.current {
            log::warn!("thread {} awaited itself; ignoring", id);
            return Ok(());
        }
        if self.current == MAIN_THREAD {
            self.detach(id)?;
            while self.threads.contains_key(&id) {
                if self.pass()? == 0 {
                    log::warn!("await on {} cannot make progress", id);
                    break;
                }
            }
            return Ok(());
        }
        let waiter = self.current;
        if let Some(thread) = self.threads.get_mut(&waiter) {
            thread.state = ThreadState::Blocked(id);
        }
        if let Some(target) = self.threads.get_mut(&id) {
            target.dependents.push(waiter);
        }
        log::debug!("thread {} waits for {}", waiter, id);
        Ok(())
    }

    /// Cancel a thread. A thread killing itself stops after the current step.
    pub fn kill(&mut self, id: ThreadId) -> Result<(), RuntimeError> {
        if id == MAIN_THREAD {
            return Err(RuntimeError::mismatch("spawned thread id", "the main thread"));
        }
        if id == self.current {
            engine::unwind(self, 0);
            return Ok(());
        }
        if self.threads.contains_key(&id) {
            log::debug!("killed thread {}", id);
            self.finish(id);
        }
        Ok(())
    }

    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.threads.get(&id).map(|t| t.state)
    }

    pub fn scheduled(&self) -> &[ThreadId] {
        &self.schedule
    }

    /// Run one breadcrumb of thread `id`. A thread whose queue is empty after
    /// the step drains; a non-fatal error ends only that thread.
    pub fn step(&mut self, id: ThreadId) -> Result<(), RuntimeError> {
        let saved = self.current;
        self.current = id;
        let result = engine::run(self);
        self.current = saved;

        match result {
            Ok(_) => {
                let done = self
                    .threads
                    .get(&id)
                    .is_some_and(|t| t.queue.is_empty() && t.state == ThreadState::Active);
                if done {
                    self.finish(id);
                }
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                log::warn!("thread {} failed: {}", id, e);
                self.finish(id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Step every active scheduled thread once, in schedule order. Returns
    /// how many were stepped.
    pub fn pass(&mut self) -> Result<usize, RuntimeError> {
        let order = self.schedule.clone();
        let mut stepped = 0;
        for id in order {
            if self.thread_state(id) == Some(ThreadState::Active) {
                self.step(id)?;
                stepped += 1;
            }
        }
        Ok(stepped)
    }

    /// Pass until the schedule empties. If every remaining thread is blocked
    /// the run stops and the number of stuck threads is returned.
    pub fn run_until_idle(&mut self) -> Result<usize, RuntimeError> {
        while !self.schedule.is_empty() {
            if self.pass()? == 0 {
                let stuck = self.schedule.len();
                log::warn!("deadlock: {} threads blocked", stuck);
                return Ok(stuck);
            }
        }
        Ok(0)
    }

    // Drain a thread: unlink it, release its atoms, wake its dependents
    fn finish(&mut self, id: ThreadId) {
        self.schedule.retain(|&t| t != id);
        let Some(mut thread) = self.threads.remove(&id) else {
            return;
        };
        thread.state = ThreadState::Drained;
        for crumb in thread.queue.drain(..) {
            if let Breadcrumb::Element(atom) = crumb {
                self.heap.release(atom);
            }
        }
        self.heap.release(thread.focus);
        for dependent in thread.dependents {
            if let Some(waiter) = self.threads.get_mut(&dependent) {
                if waiter.state == ThreadState::Blocked(id) {
                    waiter.state = ThreadState::Active;
                }
            }
        }
        log::debug!("thread {} drained", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn interp() -> Interpreter {
        Interpreter::with_config(Config::default().with_heap_size(64 * 1024)).unwrap()
    }

    #[test]
    fn test_spawned_thread_waits_until_detached() {
        let mut interp = interp();
        interp.execute_string("[ . 1 2 ] . spawn .").unwrap();
        assert_eq!(interp.stack_text(), vec!["1"]);
        let id = ThreadId(1);
        assert_eq!(interp.thread_state(id), Some(ThreadState::Active));
        assert_eq!(interp.run_until_idle().unwrap(), 0);
        assert!(interp.thread_state(id).is_some());

        interp.detach(id).unwrap();
        assert_eq!(interp.run_until_idle().unwrap(), 0);
        assert_eq!(interp.thread_state(id), None);
    }

    #[test]
    fn test_thread_drains_after_its_breadcrumbs() {
        let mut interp = interp();
        let live = interp.heap.live_atoms();
        interp.execute_string("[ . 1 2 3 ] . spawn . detach .").unwrap();
        // One dot on the list plus three elements
        let mut passes = 0;
        while !interp.scheduled().is_empty() {
            interp.pass().unwrap();
            passes += 1;
        }
        assert_eq!(passes, 4);
        assert_eq!(interp.heap.live_atoms(), live);
    }

    #[test]
    fn test_blocked_thread_is_not_stepped() {
        let mut interp = interp();
        interp.execute_string("[ . 1 ] . spawn . [ . 2 ] . spawn .").unwrap();
        let (a, b) = (ThreadId(1), ThreadId(2));
        interp.detach(a).unwrap();
        interp.detach(b).unwrap();
        interp.current = a;
        interp.await_thread(b).unwrap();
        interp.current = MAIN_THREAD;
        assert_eq!(interp.thread_state(a), Some(ThreadState::Blocked(b)));

        interp.pass().unwrap();
        assert_eq!(interp.thread_state(a), Some(ThreadState::Blocked(b)));
        interp.pass().unwrap();
        // b placed its only element and drained, waking a
        assert_eq!(interp.thread_state(b), None);
        assert_eq!(interp.thread_state(a), Some(ThreadState::Active));
    }

    #[test]
    fn test_deadlock_is_reported() {
        let mut interp = interp();
        interp.execute_string("[ . 1 ] . spawn . [ . 2 ] . spawn .").unwrap();
        let (a, b) = (ThreadId(1), ThreadId(2));
        interp.detach(a).unwrap();
        interp.current = a;
        // b exists but is never detached
        interp.await_thread(b).unwrap();
        interp.current = MAIN_THREAD;
        assert_eq!(interp.run_until_idle().unwrap(), 1);
    }

    #[test]
    fn test_kill_releases_thread() {
        let mut interp = interp();
        let live = interp.heap.live_atoms();
        interp.execute_string("[ . 1 2 3 ] . spawn . dup . detach .").unwrap();
        interp.pass().unwrap();
        interp.execute_string("kill .").unwrap();
        assert!(interp.scheduled().is_empty());
        assert_eq!(interp.heap.live_atoms(), live);
    }

    #[test]
    fn test_await_unknown_thread_is_noop() {
        let mut interp = interp();
        interp.await_thread(ThreadId(99)).unwrap();
    }
}
