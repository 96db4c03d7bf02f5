//! Failure bookkeeping shared by column workers.
//!
//! Column workers never abort a parallel region early. A worker that hits
//! a problem records it here and carries on with its remaining columns; the
//! caller inspects the accumulator once every worker has drained.
//!
//! The error slot keeps the most recently recorded failure ("last writer
//! wins"), which is the status the engine reports.

use crate::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Shared per-call failure state.
///
/// # Example
///
/// ```rust
/// use cte_core::{Error, StatusAccumulator};
///
/// let acc = StatusAccumulator::new();
/// acc.record(Error::invalid_parameter("first"));
/// acc.record(Error::out_of_memory::<f64>(16));
/// assert!(acc.has_failed());
/// assert!(acc.into_result().unwrap_err().is_out_of_memory());
/// ```
#[derive(Debug, Default)]
pub struct StatusAccumulator {
    allocation_failed: AtomicBool,
    runtime_failed: AtomicBool,
    last: Mutex<Option<Error>>,
}

impl StatusAccumulator {
    /// Creates an accumulator with no recorded failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure, replacing any previously recorded one.
    pub fn record(&self, err: Error) {
        if err.is_out_of_memory() {
            self.allocation_failed.store(true, Ordering::Relaxed);
        } else {
            self.runtime_failed.store(true, Ordering::Relaxed);
        }
        warn!(status = err.status().code(), error = %err, "column worker failure");
        let mut slot = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(err);
    }

    /// Records the error of `result`, if any, and returns its value.
    pub fn capture<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(err) => {
                self.record(err);
                None
            }
        }
    }

    /// Returns `true` once any failure has been recorded.
    pub fn has_failed(&self) -> bool {
        self.allocation_failed.load(Ordering::Relaxed)
            || self.runtime_failed.load(Ordering::Relaxed)
    }

    /// Returns `true` if a scratch allocation failed.
    pub fn allocation_failed(&self) -> bool {
        self.allocation_failed.load(Ordering::Relaxed)
    }

    /// Returns `true` if a simulation step failed.
    pub fn runtime_failed(&self) -> bool {
        self.runtime_failed.load(Ordering::Relaxed)
    }

    /// Consumes the accumulator, yielding the last recorded failure.
    pub fn into_result(self) -> Result<()> {
        let slot = self.last.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
