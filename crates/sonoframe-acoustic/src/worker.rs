//! Background solves.
//!
//! Each dispatched job gets its own thread and runs to completion. Results
//! come back on a bounded channel that the owning thread drains; jobs never
//! touch the owner's state. A job that panics still posts a completion, so
//! waiting never outlives the jobs.

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Completion channel capacity. A finished job blocks until drained when full.
pub const COMPLETION_CAPACITY: usize = 4;

/// A job panicked instead of returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Background job '{label}' panicked: {message}")]
pub struct JobPanic {
    /// Label given at dispatch.
    pub label: String,
    /// Panic payload, when it was a string.
    pub message: String,
}

/// A finished job.
#[derive(Debug)]
pub struct Completion<T> {
    /// Label given at dispatch.
    pub label: String,
    /// What the job returned, or how it panicked.
    pub value: Result<T, JobPanic>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Dispatches jobs to dedicated threads and collects their results.
#[derive(Debug)]
pub struct Worker<T> {
    sender: SyncSender<Completion<T>>,
    receiver: Receiver<Completion<T>>,
    in_flight: usize,
}

impl<T: Send + 'static> Default for Worker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Worker<T> {
    /// Worker with an empty completion channel.
    pub fn new() -> Self {
        let (sender, receiver) = sync_channel(COMPLETION_CAPACITY);
        Self {
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Run `job` on a new thread named after `label`.
    pub fn dispatch(&mut self, label: impl Into<String>, job: impl FnOnce() -> T + Send + 'static) -> io::Result<()> {
        let label = label.into();
        let sender = self.sender.clone();
        let name = format!("sonoframe-solve-{}", label);
        let thread_label = label.clone();
        thread::Builder::new().name(name).spawn(move || {
            let value = catch_unwind(AssertUnwindSafe(job)).map_err(|payload| JobPanic {
                label: thread_label.clone(),
                message: panic_message(payload.as_ref()),
            });
            match &value {
                Ok(_) => debug!(label = %thread_label, "background job finished"),
                Err(e) => warn!(label = %thread_label, error = %e, "background job panicked"),
            }
            if sender.send(Completion { label: thread_label, value }).is_err() {
                warn!("worker dropped before a job completed; result discarded");
            }
        })?;
        self.in_flight += 1;
        debug!(%label, in_flight = self.in_flight, "background job dispatched");
        Ok(())
    }

    /// Jobs dispatched and not yet drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Collect every completion available now, without blocking.
    pub fn drain(&mut self) -> Vec<Completion<T>> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(c) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    out.push(c);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Block until one job completes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completion<T>> {
        if self.in_flight == 0 {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(c) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(c)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until every dispatched job has completed.
    pub fn wait_all(&mut self) -> Vec<Completion<T>> {
        let mut out = Vec::new();
        while self.in_flight > 0 {
            match self.receiver.recv() {
                Ok(c) => {
                    self.in_flight -= 1;
                    out.push(c);
                }
                Err(_) => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_and_wait_all() {
        let mut worker: Worker<usize> = Worker::new();
        for i in 0..6 {
            worker.dispatch(format!("job{}", i), move || i * 10).unwrap();
        }
        assert_eq!(worker.in_flight(), 6);
        let mut values: Vec<usize> = worker.wait_all().into_iter().map(|c| c.value.unwrap()).collect();
        values.sort();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
        assert_eq!(worker.in_flight(), 0);
        assert!(worker.drain().is_empty());
    }

    #[test]
    fn test_wait_returns_label() {
        let mut worker: Worker<&'static str> = Worker::new();
        assert!(worker.wait(Duration::from_millis(1)).is_none());
        worker.dispatch("axisymmetric", || "done").unwrap();
        let c = worker.wait(Duration::from_secs(10)).unwrap();
        assert_eq!(c.label, "axisymmetric");
        assert_eq!(c.value, Ok("done"));
    }

    #[test]
    fn test_panicking_job_still_completes() {
        let mut worker: Worker<u32> = Worker::new();
        worker.dispatch("boom", || panic!("solver blew up")).unwrap();
        worker.dispatch("fine", || 7).unwrap();
        let mut done = worker.wait_all();
        done.sort_by(|a, b| a.label.cmp(&b.label));
        assert_eq!(worker.in_flight(), 0);
        assert_eq!(done.len(), 2);
        let err = done[0].value.clone().unwrap_err();
        assert_eq!(err.label, "boom");
        assert_eq!(err.message, "solver blew up");
        assert_eq!(done[1].value, Ok(7));
    }
}
