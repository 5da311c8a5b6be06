//! Background work handles.
//!
//! Storage and parsing are potentially blocking; callers that must not
//! block (a UI thread) run them through [`spawn`] and poll or join the
//! returned handle. There is no cancellation: the underlying operation
//! finishes or fails on its own.

use std::sync::mpsc;
use std::thread;

/// Handle for a job running on a background thread.
pub struct JobHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Check for the result without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the job to finish (blocking). `None` if the worker died
    /// before producing a result.
    pub fn recv(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

/// Run `f` on a worker thread and hand back its result through the handle.
pub fn spawn<T, F>(f: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        // The caller may have dropped the handle; a failed send is fine.
        let _ = sender.send(f());
    });
    JobHandle { receiver }
}
