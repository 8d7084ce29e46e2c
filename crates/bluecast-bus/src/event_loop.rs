//! Private message loop owned by one thread
//!
//! Every engine instance runs its own loop on a dedicated thread, so signal
//! delivery and method dispatch never interfere with other bus users in the
//! same process. Transports post work through a cloneable [`LoopHandle`];
//! the owning thread drains it in [`EventLoop::run`], which keeps all
//! deliveries serialized in posting order.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

enum LoopTask {
    Dispatch(Box<dyn FnOnce() + Send>),
    Quit,
}

// ----------------------------------------------------------------------------
// Event Loop
// ----------------------------------------------------------------------------

/// Task queue drained by the thread that owns it.
pub struct EventLoop {
    tasks: Receiver<LoopTask>,
    handle: LoopHandle,
}

/// Posting side of an [`EventLoop`]. Cloned freely by transports and by the
/// engine that needs to stop the loop later.
#[derive(Clone)]
pub struct LoopHandle {
    tx: Sender<LoopTask>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tasks: rx,
            handle: LoopHandle { tx },
        }
    }

    /// A handle for posting tasks into this loop.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Blocks dispatching posted tasks, in order, until a quit request is
    /// observed or every handle has been dropped.
    pub fn run(self) {
        let EventLoop { tasks, handle } = self;
        // The loop's own handle must not keep the channel alive.
        drop(handle);

        while let Ok(task) = tasks.recv() {
            match task {
                LoopTask::Dispatch(task) => task(),
                LoopTask::Quit => break,
            }
        }
        debug!("Event loop finished");
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopHandle {
    /// Posts a task for the loop thread to run. Returns `false` once the
    /// loop is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(LoopTask::Dispatch(Box::new(task))).is_ok()
    }

    /// Asks the loop to stop. Tasks posted earlier still run first; tasks
    /// posted after the quit request are dropped with the loop.
    pub fn quit(&self) {
        let _ = self.tx.send(LoopTask::Quit);
    }
}
