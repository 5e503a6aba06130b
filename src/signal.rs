//! Completion signalling between the mover and the orchestrator.

use crate::error::{DopplerError, DopplerResult};
use crate::hw::CompletionToken;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Completions that can be outstanding at once: one per half.
pub const COMPLETION_DEPTH: usize = 2;

/// Counting event the mover posts half tokens into.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Sender<CompletionToken>,
    rx: Receiver<CompletionToken>,
    timeout: Option<Duration>,
}

impl CompletionSignal {
    /// `timeout` bounds every wait; `None` blocks until the token arrives.
    pub fn new(timeout: Option<Duration>) -> DopplerResult<Self> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(DopplerError::SemaphoreCreation);
        }
        let (tx, rx) = bounded(COMPLETION_DEPTH);
        Ok(Self { tx, rx, timeout })
    }

    /// Handle given to the mover for posting completions.
    pub fn sender(&self) -> &Sender<CompletionToken> {
        &self.tx
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Discard stale tokens; returns how many were dropped.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Block until the next completion and check it belongs to `expected`.
    pub fn wait_for(&self, expected: CompletionToken) -> DopplerResult<()> {
        let got = match self.timeout {
            Some(t) => self.rx.recv_timeout(t).map_err(|e| match e {
                RecvTimeoutError::Timeout => DopplerError::Timeout(expected),
                RecvTimeoutError::Disconnected => DopplerError::SemaphoreCreation,
            })?,
            None => self
                .rx
                .recv()
                .map_err(|_| DopplerError::SemaphoreCreation)?,
        };
        if got != expected {
            return Err(DopplerError::UnexpectedCompletion { expected, got });
        }
        Ok(())
    }
}
