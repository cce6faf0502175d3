// src/watch/debounce.rs

//! Stop-then-fire debouncing.
//!
//! A single save in an editor routinely produces several raw notifications.
//! The [`Debouncer`] turns the first relevant one into exactly one
//! [`Trigger`], optionally absorbing the rest of the burst for a bounded
//! quiet period, and disarms the backend before the trigger leaves.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace};

use crate::engine::{Trigger, TriggerKind, TriggerSink};
use crate::watch::backend::{ActiveWatcher, EventStream};
use crate::watch::filter::{Cause, EventFilter, Relevance};

/// Default quiet period used to coalesce a burst of events.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Default upper bound between the first relevant event and the trigger.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Wait this long after the latest relevant event before firing.
    /// Zero fires on the first relevant event.
    pub quiet_period: Duration,
    /// Never wait longer than this after the first relevant event.
    pub max_delay: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl DebounceConfig {
    pub fn immediate() -> Self {
        Self {
            quiet_period: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

const ARMED: u8 = 0;
const CLAIMED: u8 = 1;
const FIRED: u8 = 2;
const CANCELLED: u8 = 3;

/// Once-only fire guard shared between a session and its debouncer.
///
/// `ARMED -> CLAIMED -> FIRED`, or `ARMED|CLAIMED -> CANCELLED` when the
/// session is reset. Only the thread that wins `claim` may `complete`.
#[derive(Debug, Clone)]
pub struct FireGuard {
    state: Arc<AtomicU8>,
}

impl Default for FireGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl FireGuard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ARMED)),
        }
    }

    /// Try to become the single writer for this session's trigger.
    pub fn claim(&self) -> bool {
        self.state
            .compare_exchange(ARMED, CLAIMED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Mark the claimed trigger as emitted. Returns false if the session was
    /// cancelled in the meantime, in which case the trigger must be dropped.
    pub fn complete(&self) -> bool {
        self.state
            .compare_exchange(CLAIMED, FIRED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Suppress any trigger that has not been emitted yet.
    pub fn cancel(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match current {
                ARMED | CLAIMED => Some(CANCELLED),
                _ => None,
            });
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FIRED
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    /// Claim, complete, and deliver in one step. Used for triggers that do not
    /// come from the event stream (e.g. registration failures).
    pub fn fire(&self, sink: &dyn TriggerSink, trigger: Trigger) -> bool {
        if self.claim() && self.complete() {
            sink.deliver(trigger);
            true
        } else {
            false
        }
    }
}

/// Trigger being assembled while the quiet period runs.
#[derive(Debug)]
struct PendingTrigger {
    first: Cause,
    escalation: Option<Cause>,
    absorbed: usize,
}

impl PendingTrigger {
    fn new(first: Cause) -> Self {
        Self {
            first,
            escalation: None,
            absorbed: 0,
        }
    }

    fn absorb(&mut self, cause: Cause) {
        self.absorbed += 1;
        if self.escalation.is_none()
            && self.first.trigger_kind() == TriggerKind::Rebuild
            && cause.trigger_kind() == TriggerKind::Stop
        {
            self.escalation = Some(cause);
        }
    }

    fn into_trigger(self) -> Trigger {
        let cause = self.escalation.unwrap_or(self.first);
        let mut reason = cause.describe();
        if self.absorbed > 0 {
            reason.push_str(&format!(" (+{} more events)", self.absorbed));
        }
        Trigger {
            kind: cause.trigger_kind(),
            reason,
        }
    }
}

/// Single consumer of one armed session's event stream.
pub struct Debouncer {
    config: DebounceConfig,
    guard: FireGuard,
    watcher: Arc<ActiveWatcher>,
    sink: Arc<dyn TriggerSink>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("config", &self.config)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    pub fn new(
        config: DebounceConfig,
        guard: FireGuard,
        watcher: Arc<ActiveWatcher>,
        sink: Arc<dyn TriggerSink>,
    ) -> Self {
        Self {
            config,
            guard,
            watcher,
            sink,
        }
    }

    /// Drain `events` until one relevant event fires the trigger, the stream
    /// ends, or the session is cancelled.
    pub async fn run(self, filter: EventFilter, mut events: EventStream) {
        let first = loop {
            let Some(event) = events.next().await else {
                debug!("event stream closed before any relevant event");
                return;
            };
            match filter.classify(&event) {
                Relevance::Relevant(cause) => break cause,
                Relevance::Irrelevant => trace!(?event, "dropping irrelevant event"),
            }
        };

        if !self.guard.claim() {
            debug!("session already fired or reset; dropping event");
            return;
        }

        debug!(cause = ?first, "first relevant event; claimed fire guard");
        let mut pending = PendingTrigger::new(first);
        self.absorb_burst(&filter, &mut events, &mut pending).await;

        // Nothing after this point awaits, so a reset can only win before
        // the guard completes.
        self.watcher.stop();
        drop(events);

        let trigger = pending.into_trigger();
        if self.guard.complete() {
            info!(%trigger, "file watch fired");
            self.sink.deliver(trigger);
        } else {
            debug!(%trigger, "session reset before firing; trigger suppressed");
        }
    }

    async fn absorb_burst(
        &self,
        filter: &EventFilter,
        events: &mut EventStream,
        pending: &mut PendingTrigger,
    ) {
        if self.config.quiet_period.is_zero() {
            return;
        }

        let hard_deadline = Instant::now() + self.config.max_delay;
        let mut quiet_deadline = Instant::now() + self.config.quiet_period;

        loop {
            let wait_until = quiet_deadline.min(hard_deadline);
            match timeout_at(wait_until, events.next()).await {
                Ok(Some(event)) => {
                    if let Relevance::Relevant(cause) = filter.classify(&event) {
                        trace!(?cause, "absorbing event into pending trigger");
                        pending.absorb(cause);
                        quiet_deadline = Instant::now() + self.config.quiet_period;
                    }
                }
                Ok(None) | Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_has_a_single_winner() {
        let guard = FireGuard::new();
        assert!(guard.claim());
        assert!(!guard.claim());
        assert!(guard.complete());
        assert!(!guard.complete());
        assert!(guard.has_fired());
    }

    #[test]
    fn cancel_suppresses_a_claimed_trigger() {
        let guard = FireGuard::new();
        assert!(guard.claim());
        guard.cancel();
        assert!(!guard.complete());
        assert!(guard.is_cancelled());
    }

    #[test]
    fn cancel_after_fire_is_a_no_op() {
        let guard = FireGuard::new();
        assert!(guard.claim() && guard.complete());
        guard.cancel();
        assert!(guard.has_fired());
    }

    #[test]
    fn pending_trigger_escalates_to_stop_and_counts_absorbed() {
        let mut pending = PendingTrigger::new(Cause::FileChange("/a".into()));
        pending.absorb(Cause::FileChange("/b".into()));
        pending.absorb(Cause::BackendFailure("gone".into()));
        let trigger = pending.into_trigger();
        assert_eq!(trigger.kind, TriggerKind::Stop);
        assert!(trigger.reason.starts_with("error gone"));
        assert!(trigger.reason.contains("+2 more events"));
    }

    #[test]
    fn single_event_reason_is_plain() {
        let trigger = PendingTrigger::new(Cause::FileChange("/a".into())).into_trigger();
        assert_eq!(trigger, Trigger::rebuild("file change"));
    }
}
