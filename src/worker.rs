use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::alignment::OverlayPose;
use crate::error::{Error, Result};
use crate::pipeline::{Frame, LandmarkDetector, Tracker};

static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Outcomes kept for the owner before new ones start being dropped.
const OUTCOME_BACKLOG: usize = 64;

#[derive(Default)]
struct Inbox {
    frame: Option<Frame>,
    terminate: bool,
}

/// Single-slot hand-off to the worker thread. A frame the worker has not
/// picked up yet is replaced by the next one, so detection always starts on
/// the newest frame.
#[derive(Default)]
struct Mailbox {
    inbox: Mutex<Inbox>,
    ready: Condvar,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the frame that was displaced, if any.
    fn put(&self, frame: Frame) -> Option<Frame> {
        let stale = self.lock().frame.replace(frame);
        self.ready.notify_one();
        stale
    }

    fn terminate(&self) {
        self.lock().terminate = true;
        self.ready.notify_one();
    }

    /// Block until a frame is waiting. `None` once terminated.
    fn take(&self) -> Option<Frame> {
        let mut inbox = self.lock();
        loop {
            if inbox.terminate {
                return None;
            }
            if let Some(frame) = inbox.frame.take() {
                return Some(frame);
            }
            inbox = self
                .ready
                .wait(inbox)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Result of tracking one submitted frame.
#[derive(Debug)]
pub struct FrameOutcome {
    pub sequence: u64,
    pub result: Result<Option<OverlayPose>>,
}

/// Runs a [`Tracker`] on its own thread.
///
/// The camera side only has to [`submit`](Self::submit) frames; poses reach
/// the tracker's observers from the worker thread. Frames never queue up: if
/// the detector is still busy when a new frame arrives, the one waiting
/// behind it is discarded and produces no outcome.
///
/// Outcomes are queued for the owner up to a small backlog; once that is full
/// further outcomes are discarded rather than blocking the worker.
pub struct TrackingWorker {
    pub id: usize,
    mailbox: Arc<Mailbox>,
    outcomes: Receiver<FrameOutcome>,
    thread: Option<thread::JoinHandle<()>>,
}

impl TrackingWorker {
    pub fn spawn<D>(mut tracker: Tracker<D>) -> Result<Self>
    where
        D: LandmarkDetector + Send + 'static,
    {
        let id = WORKER_SEQ.fetch_add(1, Ordering::SeqCst);
        let mailbox = Arc::new(Mailbox::default());
        let (outcome_sender, outcomes) = mpsc::sync_channel(OUTCOME_BACKLOG);

        let inbox = Arc::clone(&mailbox);
        let thread = thread::Builder::new()
            .name(format!("tracking-worker-{id}"))
            .spawn(move || {
                tracing::info!(worker = id, "tracking worker started");
                while let Some(frame) = inbox.take() {
                    let outcome = track(&mut tracker, frame, id);
                    report(&outcome_sender, outcome);
                }
                tracing::info!(worker = id, "tracking worker stopped");
            })?;

        Ok(Self {
            id,
            mailbox,
            outcomes,
            thread: Some(thread),
        })
    }

    /// Hand a frame to the worker, replacing any frame still waiting.
    pub fn submit(&self, frame: Frame) -> Result<()> {
        if self.thread.as_ref().map_or(true, |t| t.is_finished()) {
            return Err(Error::WorkerClosed);
        }
        if let Some(stale) = self.mailbox.put(frame) {
            tracing::trace!(worker = self.id, sequence = stale.sequence, "stale frame skipped");
        }
        Ok(())
    }

    /// Block until the next outcome is available.
    pub fn recv_outcome(&self) -> Result<FrameOutcome> {
        self.outcomes.recv().map_err(|_| Error::WorkerClosed)
    }

    pub fn try_recv_outcome(&self) -> Result<Option<FrameOutcome>> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::WorkerClosed),
        }
    }
}

fn track<D: LandmarkDetector>(tracker: &mut Tracker<D>, frame: Frame, worker: usize) -> FrameOutcome {
    let sequence = frame.sequence;
    let result = tracker.process_frame(&frame);
    if let Err(err) = &result {
        tracing::warn!(worker, sequence, error = %err, "frame dropped");
    }
    FrameOutcome { sequence, result }
}

fn report(sender: &SyncSender<FrameOutcome>, outcome: FrameOutcome) {
    match sender.try_send(outcome) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(outcome)) => {
            tracing::trace!(sequence = outcome.sequence, "outcome backlog full");
        }
    }
}

impl Drop for TrackingWorker {
    fn drop(&mut self) {
        tracing::debug!(worker = self.id, "terminating tracking worker");
        self.mailbox.terminate();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(worker = self.id, "tracking worker panicked");
            }
        }
    }
}
