use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::{TransferError, TransferResult};
use crate::events::{TransferEvent, TransferTimings};

const EVENT_CAPACITY: usize = 256;

/// Lifecycle of an upload or download. `Finished`, `Errored` and
/// `Cancelled` are final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Started,
    Running,
    Paused,
    Finished,
    Errored(String),
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Finished | TransferState::Errored(_) | TransferState::Cancelled
        )
    }
}

#[derive(Default)]
struct Clock {
    started: Option<(Instant, DateTime<Utc>)>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

/// State, events and pause flag shared by a pipeline and its handle.
pub(crate) struct Control {
    state: watch::Sender<TransferState>,
    paused: watch::Sender<bool>,
    events: broadcast::Sender<TransferEvent>,
    clock: Mutex<Clock>,
}

impl Control {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(TransferState::Idle);
        let (paused, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            paused,
            events,
            clock: Mutex::new(Clock::default()),
        }
    }

    pub(crate) fn state(&self) -> TransferState {
        self.state.borrow().clone()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<TransferState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: TransferEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Move to `next` unless a final state was already reached.
    pub(crate) fn transition(&self, next: TransferState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                return false;
            }
            debug!(from = ?state, to = ?next, "transfer state");
            *state = next;
            true
        })
    }

    /// Claim the transfer for a first run.
    pub(crate) fn begin(&self) -> TransferResult<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state != TransferState::Idle {
                return false;
            }
            *state = TransferState::Started;
            true
        });
        if !claimed {
            return Err(TransferError::AlreadyStarted);
        }
        let mut clock = self.clock.lock().expect("lock poisoned");
        clock.started = Some((Instant::now(), Utc::now()));
        if *self.paused.borrow() {
            clock.paused_at = Some(Instant::now());
        }
        Ok(())
    }

    /// Enter `Running`, or `Paused` if a pause was requested meanwhile.
    pub(crate) fn run(&self) {
        if *self.paused.borrow() {
            self.transition(TransferState::Paused);
        } else {
            self.transition(TransferState::Running);
        }
    }

    /// Cancelled or errored: no new unit of work should start.
    pub(crate) fn is_stopped(&self) -> bool {
        matches!(
            *self.state.borrow(),
            TransferState::Cancelled | TransferState::Errored(_)
        )
    }

    pub(crate) fn check(&self) -> TransferResult<()> {
        if self.is_stopped() {
            return Err(TransferError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn pause(&self) {
        if self.state.borrow().is_terminal() {
            return;
        }
        let changed = self.paused.send_if_modified(|paused| !std::mem::replace(paused, true));
        if changed {
            let mut clock = self.clock.lock().expect("lock poisoned");
            if clock.started.is_some() {
                clock.paused_at = Some(Instant::now());
            }
        }
        self.state.send_if_modified(|state| {
            if *state != TransferState::Running {
                return false;
            }
            *state = TransferState::Paused;
            true
        });
    }

    pub(crate) fn resume(&self) {
        let changed = self.paused.send_if_modified(|paused| std::mem::replace(paused, false));
        if changed {
            let mut clock = self.clock.lock().expect("lock poisoned");
            if let Some(at) = clock.paused_at.take() {
                clock.paused_total += at.elapsed();
            }
        }
        self.state.send_if_modified(|state| {
            if *state != TransferState::Paused {
                return false;
            }
            *state = TransferState::Running;
            true
        });
    }

    /// Wait while paused. Returns at once when stopped.
    pub(crate) async fn wait_unpaused(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    pub(crate) fn cancel(&self) -> bool {
        let cancelled = self.transition(TransferState::Cancelled);
        self.paused.send_replace(false);
        cancelled
    }

    /// Record the outcome of a run and publish `Finished` on success.
    pub(crate) fn complete(&self, result: &TransferResult<()>) {
        match result {
            Ok(()) => {
                if self.transition(TransferState::Finished) {
                    if let Some(timings) = self.timings() {
                        self.emit(TransferEvent::Finished(timings));
                    }
                }
            }
            Err(TransferError::Cancelled) => {
                self.transition(TransferState::Cancelled);
            }
            Err(err) => {
                self.transition(TransferState::Errored(err.to_string()));
                self.paused.send_replace(false);
            }
        }
    }

    fn timings(&self) -> Option<TransferTimings> {
        let clock = self.clock.lock().expect("lock poisoned");
        let (started, start) = clock.started?;
        let real_duration = started.elapsed();
        let paused = clock.paused_total + clock.paused_at.map(|at| at.elapsed()).unwrap_or_default();
        Some(TransferTimings {
            start,
            end: Utc::now(),
            duration: real_duration.saturating_sub(paused),
            real_duration,
        })
    }

    /// Resolve once a final state is reached.
    pub(crate) async fn finished(&self) -> TransferResult<()> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(TransferState::is_terminal)
            .await
            .map_err(|_| TransferError::Cancelled)?
            .clone();
        match state {
            TransferState::Finished => Ok(()),
            TransferState::Cancelled => Err(TransferError::Cancelled),
            TransferState::Errored(reason) => Err(TransferError::Failed(reason)),
            _ => Err(TransferError::Failed("transfer stopped".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_states_stick() {
        let control = Control::new();
        control.begin().unwrap();
        control.run();
        assert_eq!(control.state(), TransferState::Running);
        assert!(control.cancel());
        assert!(!control.transition(TransferState::Finished));
        control.complete(&Ok(()));
        assert_eq!(control.state(), TransferState::Cancelled);
        assert!(control.is_stopped());
    }

    #[test]
    fn second_begin_is_rejected() {
        let control = Control::new();
        control.begin().unwrap();
        assert!(matches!(control.begin(), Err(TransferError::AlreadyStarted)));
    }

    #[test]
    fn pause_requested_before_run_wins() {
        let control = Control::new();
        control.pause();
        assert_eq!(control.state(), TransferState::Idle);
        control.begin().unwrap();
        control.run();
        assert_eq!(control.state(), TransferState::Paused);
        control.resume();
        assert_eq!(control.state(), TransferState::Running);
    }

    #[tokio::test]
    async fn finished_reports_outcome() {
        let control = Control::new();
        control.begin().unwrap();
        control.complete(&Err(TransferError::Unreachable("down".into())));
        let err = control.finished().await.unwrap_err();
        assert!(matches!(err, TransferError::Failed(reason) if reason.contains("down")));
    }

    #[tokio::test]
    async fn finished_event_carries_timings() {
        let control = Control::new();
        let mut events = control.subscribe();
        control.begin().unwrap();
        control.run();
        control.complete(&Ok(()));
        control.finished().await.unwrap();
        match events.recv().await.unwrap() {
            TransferEvent::Finished(t) => assert!(t.duration <= t.real_duration),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
