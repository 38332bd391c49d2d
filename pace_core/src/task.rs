//! Background work that overlaps the main control thread.
//!
//! `spawn` runs a closure on its own thread and hands back a [`TaskHandle`].
//! The handle must be joined exactly once; `join` consumes it and surfaces a
//! failure (or a panic) from the task at the joining call site.
//!
//! Safety: each handle owns exactly one thread. A handle dropped without
//! being joined logs a warning and blocks until the thread finishes, so no
//! thread outlives its handle.
use crossbeam_channel as xch;
use eyre::WrapErr;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;

use crate::error::{PaceError, Result};

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const FAILED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Failed,
}

/// One step of a [`spawn_sequence`] task.
pub type Step = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub struct TaskHandle {
    name: String,
    state: Arc<AtomicU8>,
    rx: xch::Receiver<Result<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Launch `f` on a new thread.
pub fn spawn<F>(name: impl Into<String>, f: F) -> TaskHandle
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let name = name.into();
    let (tx, rx) = xch::bounded(1);
    let state = Arc::new(AtomicU8::new(RUNNING));
    let state_clone = state.clone();
    let task_name = name.clone();

    tracing::debug!(task = %name, "spawning background task");
    let join_handle = std::thread::spawn(move || {
        let outcome = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => Err(eyre::Report::new(PaceError::TaskPanicked {
                task: task_name.clone(),
                message: panic_message(payload.as_ref()),
            })),
        };
        let code = if outcome.is_ok() { COMPLETED } else { FAILED };
        state_clone.store(code, Ordering::Release);
        if tx.send(outcome).is_err() {
            tracing::trace!(task = %task_name, "task handle gone before completion");
        }
    });

    TaskHandle {
        name,
        state,
        rx,
        join_handle: Some(join_handle),
    }
}

/// Launch an ordered list of steps on one thread. The first failing step ends
/// the task; its error names the step.
pub fn spawn_sequence(name: impl Into<String>, steps: Vec<Step>) -> TaskHandle {
    let name = name.into();
    let seq_name = name.clone();
    spawn(name, move || {
        let total = steps.len();
        for (i, step) in steps.into_iter().enumerate() {
            step().wrap_err_with(|| format!("{seq_name}: step {} of {total}", i + 1))?;
        }
        Ok(())
    })
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking view of the task's progress.
    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => TaskState::Running,
            COMPLETED => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() != TaskState::Running
    }

    /// Block until the task ends and return its outcome.
    pub fn join(mut self) -> Result<()> {
        let outcome = self.wait();
        tracing::debug!(task = %self.name, ok = outcome.is_ok(), "background task joined");
        outcome
    }

    fn wait(&mut self) -> Result<()> {
        let received = self.rx.recv();
        let joined = self.join_handle.take().map(JoinHandle::join);
        match (received, joined) {
            (Ok(outcome), _) => outcome,
            (Err(_), Some(Err(payload))) => Err(eyre::Report::new(PaceError::TaskPanicked {
                task: self.name.clone(),
                message: panic_message(payload.as_ref()),
            })),
            (Err(_), _) => Err(eyre::Report::new(PaceError::TaskPanicked {
                task: self.name.clone(),
                message: "task ended without reporting".into(),
            })),
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.join_handle.is_none() {
            return;
        }
        tracing::warn!(task = %self.name, "background task dropped without join; waiting for it");
        if let Err(e) = self.wait() {
            tracing::error!(task = %self.name, error = %e, "unjoined background task failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}
