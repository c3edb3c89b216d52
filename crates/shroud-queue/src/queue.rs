use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use crate::error::{CommitError, QueueError, QueueResult};

type Committer<T> = Box<dyn FnOnce(T, u64) -> BoxFuture<'static, Result<(), CommitError>> + Send>;

/// A finished worker result waiting for its turn to commit.
struct Ready<T> {
    value: T,
    committer: Committer<T>,
}

struct State<T> {
    next_add: u64,
    next_commit: u64,
    ready: BTreeMap<u64, Ready<T>>,
    committing: bool,
    closed: bool,
    cancelled: bool,
}

/// Snapshot observed by waiters.
#[derive(Clone, Debug, Default)]
struct Progress {
    added: u64,
    committed: u64,
    closed: bool,
    cancelled: bool,
    failure: Option<QueueError>,
}

impl Progress {
    fn error(&self) -> Option<QueueError> {
        if let Some(failure) = &self.failure {
            return Some(failure.clone());
        }
        self.cancelled.then_some(QueueError::Cancelled)
    }
}

struct Inner<T> {
    window: u64,
    permits: Arc<Semaphore>,
    state: Mutex<State<T>>,
    progress: watch::Sender<Progress>,
}

/// Bounded-concurrency executor with strictly ordered commit.
///
/// Sequences must be added contiguously starting at 0.
pub struct OrderedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for OrderedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> OrderedQueue<T> {
    /// Queue running at most `concurrency` workers, with an add window of
    /// twice that.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self::with_window(concurrency, concurrency * 2)
    }

    /// Queue whose `add` waits while `sequence >= last_commit + window`.
    pub fn with_window(concurrency: usize, window: usize) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            inner: Arc::new(Inner {
                window: window.max(1) as u64,
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                state: Mutex::new(State {
                    next_add: 0,
                    next_commit: 0,
                    ready: BTreeMap::new(),
                    committing: false,
                    closed: false,
                    cancelled: false,
                }),
                progress,
            }),
        }
    }

    /// Schedule `worker(sequence)` and, once every smaller sequence has
    /// committed, `committer(result, sequence)`.
    ///
    /// Waits until the sequence fits in the add window. Fails immediately
    /// if the queue is closed, cancelled or failed, or if `sequence` is not
    /// the next expected one.
    pub async fn add<W, WF, C, CF>(&self, sequence: u64, worker: W, committer: C) -> QueueResult<()>
    where
        W: FnOnce(u64) -> WF + Send + 'static,
        WF: Future<Output = T> + Send + 'static,
        C: FnOnce(T, u64) -> CF + Send + 'static,
        CF: Future<Output = Result<(), CommitError>> + Send + 'static,
    {
        if let Some(err) = self.inner.progress.borrow().error() {
            return Err(err);
        }
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.closed {
                return Err(QueueError::Closed);
            }
            if sequence != state.next_add {
                return Err(QueueError::OutOfOrder {
                    expected: state.next_add,
                    actual: sequence,
                });
            }
            state.next_add += 1;
        }
        self.inner
            .progress
            .send_modify(|p| p.added = p.added.max(sequence + 1));

        let window = self.inner.window;
        let mut rx = self.inner.progress.subscribe();
        let admitted = rx
            .wait_for(|p| p.error().is_some() || sequence < p.committed + window)
            .await
            .map(|p| p.error())
            .map_err(|_| QueueError::Cancelled)?;
        if let Some(err) = admitted {
            return Err(err);
        }

        let committer: Committer<T> =
            Box::new(move |value, seq| -> BoxFuture<'static, Result<(), CommitError>> {
                Box::pin(committer(value, seq))
            });
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let Ok(_permit) = inner.permits.clone().acquire_owned().await else {
                return;
            };
            if inner.is_cancelled() {
                return;
            }
            let value = worker(sequence).await;
            drop(_permit);
            if inner.is_cancelled() {
                debug!(sequence, "discarding result of cancelled queue");
                return;
            }
            inner
                .state
                .lock()
                .expect("lock poisoned")
                .ready
                .insert(sequence, Ready { value, committer });
            inner.drain().await;
        });
        Ok(())
    }

    /// Resolve once `sequence` has been committed.
    pub async fn wait_for_commit(&self, sequence: u64) -> QueueResult<()> {
        let mut rx = self.inner.progress.subscribe();
        let snapshot = rx
            .wait_for(|p| p.committed > sequence || p.error().is_some())
            .await
            .map_err(|_| QueueError::Cancelled)?
            .clone();
        if snapshot.committed > sequence {
            Ok(())
        } else {
            Err(snapshot.error().unwrap_or(QueueError::Cancelled))
        }
    }

    /// Refuse any further additions.
    pub fn close(&self) {
        self.inner.state.lock().expect("lock poisoned").closed = true;
        self.inner.progress.send_modify(|p| p.closed = true);
    }

    /// Resolve once the queue is closed and everything added has committed.
    pub async fn wait_for_close(&self) -> QueueResult<()> {
        let mut rx = self.inner.progress.subscribe();
        let snapshot = rx
            .wait_for(|p| (p.closed && p.committed == p.added) || p.error().is_some())
            .await
            .map_err(|_| QueueError::Cancelled)?
            .clone();
        match snapshot.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stop scheduling work. Workers already running finish, but their
    /// results are discarded; every waiter fails with [`QueueError::Cancelled`].
    pub fn cancel(&self) {
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            state.cancelled = true;
            state.ready.clear();
        }
        self.inner.progress.send_modify(|p| p.cancelled = true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Number of sequences committed so far.
    pub fn committed(&self) -> u64 {
        self.inner.progress.borrow().committed
    }
}

impl<T: Send + 'static> Inner<T> {
    fn is_cancelled(&self) -> bool {
        self.state.lock().expect("lock poisoned").cancelled
    }

    /// Take the next committable result, claiming the committer role.
    ///
    /// Only one task holds the role at a time; a task that finds it taken
    /// leaves its result for the current holder.
    fn take_next(&self, holding: bool) -> Option<(u64, Ready<T>)> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.committing && !holding {
            return None;
        }
        if state.cancelled || self.progress.borrow().failure.is_some() {
            state.committing = false;
            return None;
        }
        let next = state.next_commit;
        match state.ready.remove(&next) {
            Some(ready) => {
                state.committing = true;
                Some((next, ready))
            }
            None => {
                state.committing = false;
                None
            }
        }
    }

    async fn drain(&self) {
        let mut holding = false;
        while let Some((sequence, ready)) = self.take_next(holding) {
            holding = true;
            match (ready.committer)(ready.value, sequence).await {
                Ok(()) => {
                    self.state.lock().expect("lock poisoned").next_commit = sequence + 1;
                    self.progress.send_modify(|p| p.committed = sequence + 1);
                    debug!(sequence, "committed");
                }
                Err(e) => {
                    warn!(sequence, error = %e, "committer failed");
                    {
                        let mut state = self.state.lock().expect("lock poisoned");
                        state.committing = false;
                        state.ready.clear();
                    }
                    self.progress.send_modify(|p| {
                        p.failure = Some(QueueError::CommitFailed {
                            sequence,
                            reason: e.to_string(),
                        })
                    });
                    return;
                }
            }
        }
    }
}
