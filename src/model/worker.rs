//! Background tokenization worker
//!
//! Each running model owns one worker thread. The thread consumes dirty line
//! indices from a request channel, re-tokenizes under the model's time
//! budget, and parks on the channel when there is nothing to do. Stopping
//! cancels the token and closes the channel, which wakes a parked worker.

use std::collections::VecDeque;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace};

use super::tokenization::{ModelInner, Pass};
use crate::grammar::Grammar;

/// Cooperative cancellation flag shared with a worker
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Model-side handle of a running worker
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    requests: Sender<usize>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// Start a worker with `seed` already queued
    pub fn spawn<G: Grammar>(model: Arc<ModelInner<G>>, seed: Vec<usize>, name: &str) -> io::Result<Self> {
        let (requests, receiver) = mpsc::channel();
        let worker = Worker {
            model,
            requests: receiver,
            cancel: CancellationToken::new(),
            pending: seed.into(),
            retry: Vec::new(),
        };
        let cancel = worker.cancel.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run())?;
        Ok(Self { requests, cancel })
    }

    /// Queue a dirty line
    pub fn request(&self, line: usize) {
        // A send only fails once the worker has exited
        let _ = self.requests.send(line);
    }

    /// Cancel and close the channel
    pub fn stop(self) {
        self.cancel.cancel();
        drop(self.requests);
    }
}

struct Worker<G: Grammar> {
    model: Arc<ModelInner<G>>,
    requests: Receiver<usize>,
    cancel: CancellationToken,
    /// FIFO of lines to look at, possibly stale or duplicated
    pending: VecDeque<usize>,
    /// Lines whose tokenization failed; retried on the next wake
    retry: Vec<usize>,
}

impl<G: Grammar> Worker<G> {
    fn run(mut self) {
        debug!(queued = self.pending.len(), "tokenizer worker started");

        while let Some(line) = self.next_line() {
            if !self.model.is_line_invalid(line) {
                // Already handled by an earlier pass
                continue;
            }
            match self.model.revalidate_tokens_now(line) {
                Pass::Completed => {}
                Pass::Deferred(next) => {
                    trace!(line = next, "budget exhausted");
                    self.model.invalidate(next);
                    self.pending.push_back(next);
                }
                Pass::Failed(failed) => self.retry.push(failed),
            }
        }

        debug!("tokenizer worker stopped");
    }

    /// Next queued line, blocking while idle; None once stopped
    fn next_line(&mut self) -> Option<usize> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let mut woken = false;
            loop {
                match self.requests.try_recv() {
                    Ok(line) => {
                        self.pending.push_back(line);
                        woken = true;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return None,
                }
            }

            if self.pending.is_empty() {
                let line = self.requests.recv().ok()?;
                if self.cancel.is_cancelled() {
                    return None;
                }
                self.pending.push_back(line);
                woken = true;
            }

            if woken && !self.retry.is_empty() {
                let retry = mem::take(&mut self.retry);
                self.pending.extend(retry);
            }

            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }
        }
    }
}
