//! The unit of work traveling through the queue, and the handle a
//! submitter keeps.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Carries exactly one invocation across the queue: user metadata plus a
/// single-shot callable.
///
/// The envelope is move-only and the callable is consumed exactly once by
/// [`invoke`](TaskEnvelope::invoke). `()` serves as the metadata type for
/// callers that need no per-task context.
pub struct TaskEnvelope<M> {
    metadata: M,
    invocable: Box<dyn FnOnce() + Send + 'static>,
}

impl<M> TaskEnvelope<M> {
    /// Package a callable with its metadata.
    pub fn new<F>(metadata: M, invocable: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            metadata,
            invocable: Box::new(invocable),
        }
    }

    /// The metadata attached at submission.
    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Run the callable, consuming the envelope.
    pub fn invoke(self) {
        (self.invocable)();
    }
}

impl<M: fmt::Debug> fmt::Debug for TaskEnvelope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEnvelope")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Shared state between a [`TaskHandle`] and the worker that completes it.
struct HandleShared<R> {
    result: Mutex<Option<Result<R>>>,
    done: Condvar,
}

/// A handle that resolves once the submitted callable has run.
///
/// Obtained from [`ThreadPool::submit`](crate::pool::ThreadPool::submit).
/// If the callable panicked, the handle resolves to
/// [`Error::TaskPanicked`]; the panic never escapes the worker.
pub struct TaskHandle<R> {
    shared: Arc<HandleShared<R>>,
}

impl<R> TaskHandle<R> {
    /// Whether the task has finished (successfully or by panic).
    pub fn is_finished(&self) -> bool {
        self.shared.result.lock().is_some()
    }

    /// Block until the task has run, returning the callable's value.
    pub fn join(self) -> Result<R> {
        let mut result = self.shared.result.lock();
        while result.is_none() {
            self.shared.done.wait(&mut result);
        }
        result.take().expect("task result already consumed")
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// The completing half of a [`TaskHandle`]; captured by the invocable the
/// pool builds at submit time.
pub(crate) struct CompletionSlot<R> {
    shared: Arc<HandleShared<R>>,
}

impl<R> CompletionSlot<R> {
    pub(crate) fn complete(self, result: Result<R>) {
        let mut slot = self.shared.result.lock();
        *slot = Some(result);
        self.shared.done.notify_all();
    }
}

/// A fresh handle plus the slot that resolves it.
pub(crate) fn handle_pair<R>() -> (TaskHandle<R>, CompletionSlot<R>) {
    let shared = Arc::new(HandleShared {
        result: Mutex::new(None),
        done: Condvar::new(),
    });
    (
        TaskHandle {
            shared: shared.clone(),
        },
        CompletionSlot { shared },
    )
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Wrap a callable so its outcome, panic included, lands in `slot`.
///
/// A panic is recorded in the slot first and then resumed, so the worker's
/// isolation layer still observes it without the submitter's handle ever
/// hanging.
pub(crate) fn package<F, R>(func: F, slot: CompletionSlot<R>) -> impl FnOnce() + Send + 'static
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    move || match std::panic::catch_unwind(std::panic::AssertUnwindSafe(func)) {
        Ok(value) => slot.complete(Ok(value)),
        Err(payload) => {
            slot.complete(Err(Error::TaskPanicked(panic_message(&*payload))));
            std::panic::resume_unwind(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_envelope_runs_once_and_carries_metadata() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_task = calls.clone();

        let envelope = TaskEnvelope::new(7u32, move || {
            calls_in_task.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(*envelope.metadata(), 7);
        envelope.invoke();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_handle_resolves_to_value() {
        let (handle, slot) = handle_pair();
        assert!(!handle.is_finished());

        let worker = thread::spawn(move || slot.complete(Ok(42)));
        assert_eq!(handle.join().unwrap(), 42);
        worker.join().unwrap();
    }

    #[test]
    fn test_packaged_panic_lands_in_handle() {
        let (handle, slot) = handle_pair::<i32>();
        let invocable = package(|| panic!("boom"), slot);

        // The handle is completed before the panic is resumed.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(invocable));
        assert!(result.is_err());

        match handle.join() {
            Err(Error::TaskPanicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected TaskPanicked, got {:?}", other),
        }
    }

    #[test]
    fn test_packaged_success_lands_in_handle() {
        let (handle, slot) = handle_pair();
        let invocable = package(|| 5 + 5, slot);
        invocable();

        assert!(handle.is_finished());
        assert_eq!(handle.join().unwrap(), 10);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
