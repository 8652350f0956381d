//! Background board writer.
//!
//! Durable writes (a file rename, an HTTP round trip) run on a dedicated
//! thread so the caller's event loop never waits on the store. Boards queued
//! while a write is in flight collapse to the newest one.

use crate::board::Board;
use crate::storage::{BoardStore, StorageResult};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};

/// A board handed to the writer thread.
struct WriteJob {
    seq: u64,
    board: Board,
}

/// Result of one write, covering every job up to `seq`.
struct WriteOutcome {
    seq: u64,
    result: StorageResult<()>,
}

fn run_writer<S: BoardStore>(storage: Arc<S>, job_rx: Receiver<WriteJob>, outcome_tx: Sender<WriteOutcome>) {
    log::debug!("Writer thread started");
    while let Ok(mut job) = job_rx.recv() {
        // Only the latest board matters
        while let Ok(newer) = job_rx.try_recv() {
            job = newer;
        }
        let result = storage.save(&job.board);
        if outcome_tx.send(WriteOutcome { seq: job.seq, result }).is_err() {
            break;
        }
    }
    log::debug!("Writer thread exiting");
}

/// Owns the writer thread and tracks which submitted boards have landed.
pub struct BackgroundWriter {
    job_tx: Option<Sender<WriteJob>>,
    outcome_rx: Receiver<WriteOutcome>,
    thread: Option<JoinHandle<()>>,
    /// Sequence number of the last submitted board.
    submitted: u64,
    /// Sequence number of the last board the thread reported on.
    completed: u64,
}

impl BackgroundWriter {
    pub fn spawn<S: BoardStore + 'static>(storage: Arc<S>) -> Self {
        let (job_tx, job_rx) = channel();
        let (outcome_tx, outcome_rx) = channel();
        let thread = thread::spawn(move || run_writer(storage, job_rx, outcome_tx));
        Self {
            job_tx: Some(job_tx),
            outcome_rx,
            thread: Some(thread),
            submitted: 0,
            completed: 0,
        }
    }

    /// Queue `board` for writing, superseding any board not yet picked up.
    pub fn submit(&mut self, board: Board) {
        let Some(tx) = &self.job_tx else {
            log::warn!("Writer is shut down; dropping board");
            return;
        };
        self.submitted += 1;
        if tx.send(WriteJob { seq: self.submitted, board }).is_err() {
            log::error!("Writer thread is gone; dropping board");
            self.completed = self.submitted;
        }
    }

    /// Whether a submitted board has not been reported on yet.
    pub fn is_busy(&self) -> bool {
        self.completed < self.submitted
    }

    /// Results of writes that finished since the last call, without blocking.
    pub fn poll(&mut self) -> Vec<StorageResult<()>> {
        let mut results = Vec::new();
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => results.push(self.complete(outcome)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.completed = self.submitted;
                    break;
                }
            }
        }
        results
    }

    /// Block until every submitted board has been written.
    pub fn wait_idle(&mut self) -> Vec<StorageResult<()>> {
        let mut results = Vec::new();
        while self.is_busy() {
            match self.outcome_rx.recv() {
                Ok(outcome) => results.push(self.complete(outcome)),
                Err(_) => self.completed = self.submitted,
            }
        }
        results
    }

    fn complete(&mut self, outcome: WriteOutcome) -> StorageResult<()> {
        self.completed = self.completed.max(outcome.seq);
        outcome.result
    }

    /// Finish outstanding writes and stop the thread.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Writer thread panicked");
            }
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
