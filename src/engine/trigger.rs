// src/engine/trigger.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What the driving loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Start a new build iteration.
    Rebuild,
    /// Leave continuous mode.
    Stop,
}

/// Signal emitted once per armed watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub reason: String,
}

impl Trigger {
    pub fn rebuild(reason: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::Rebuild,
            reason: reason.into(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::Stop,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TriggerKind::Rebuild => write!(f, "rebuild ({})", self.reason),
            TriggerKind::Stop => write!(f, "stop ({})", self.reason),
        }
    }
}

/// Boundary between the watch engine and whatever drives rebuilds.
///
/// Called from the event consumer task, so implementations must not block.
pub trait TriggerSink: Send + Sync {
    fn deliver(&self, trigger: Trigger);
}

/// Sink that forwards triggers over an unbounded channel to the driving loop.
#[derive(Debug, Clone)]
pub struct ChannelTriggerSink {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl ChannelTriggerSink {
    pub fn new(tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self { tx }
    }

    /// Convenience: create a sink and the receiving end for the driver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl TriggerSink for ChannelTriggerSink {
    fn deliver(&self, trigger: Trigger) {
        debug!(%trigger, "delivering trigger");
        if let Err(err) = self.tx.send(trigger) {
            warn!("trigger receiver dropped; discarding {}", err.0);
        }
    }
}
