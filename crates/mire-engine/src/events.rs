//! Bounded event channel for log and error consumers.
//!
//! The engine publishes `(module, stage, message)` records here;
//! consumers (a UI, a file logger) subscribe externally. Publishing
//! never blocks the tick loop — when the channel is full the event is
//! dropped and counted, and the count is surfaced through metrics.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use mire_core::TickId;
use mire_module::Stage;

/// Event severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Informational (lifecycle milestones).
    Info,
    /// Recoverable anomaly (reconciliation correction, forming
    /// condition).
    Warning,
    /// Module failure or terminal transition.
    Error,
}

/// One published engine event.
#[derive(Clone, Debug)]
pub struct EngineEvent {
    /// Tick the event was recorded at.
    pub tick: TickId,
    /// Originating module, when the event has one.
    pub module: Option<String>,
    /// Stage the module was running in, when applicable.
    pub stage: Option<Stage>,
    /// Severity classification.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

/// Bounded publish channel for [`EngineEvent`]s.
pub struct EventBus {
    sender: Sender<EngineEvent>,
    receiver: Receiver<EngineEvent>,
    dropped: u64,
}

impl EventBus {
    /// A bus holding at most `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: 0,
        }
    }

    /// Publish an event, dropping (and counting) it when the channel
    /// is full. Never blocks.
    pub fn publish(&mut self, event: EngineEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }

    /// A receiver for the event stream.
    ///
    /// Receivers share one queue: each event is delivered to exactly
    /// one of them. Use a single subscriber unless work-stealing
    /// consumption is what you want.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.receiver.clone()
    }

    /// Number of events dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
