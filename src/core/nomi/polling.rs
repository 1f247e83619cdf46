use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::message_sink::{forward, Delivery, MessageSink};
use super::nomi_client::NomiApi;
use super::nomi_models::{NomiMessage, NomiSession, PollTarget};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Where a poller left off. Only ever advances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCursor {
    pub last_message_id: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Result of one fetch-compare-forward cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    FetchFailed,
    Empty,
    Unchanged,
    /// Newest message is older than the one already seen.
    Stale,
    Forwarded {
        message_id: String,
        delivery: Delivery,
    },
}

/// Pick the newest message of a batch.
///
/// When every message has an RFC 3339 timestamp the latest one wins, with the
/// highest id breaking ties. Otherwise the API's ascending order is trusted
/// and the last element is taken.
pub fn select_newest(messages: &[NomiMessage]) -> Option<&NomiMessage> {
    let stamped: Option<Vec<(DateTime<Utc>, &NomiMessage)>> = messages
        .iter()
        .map(|m| m.sent_at().map(|at| (at, m)))
        .collect();

    match stamped {
        Some(stamped) if !stamped.is_empty() => stamped
            .into_iter()
            .max_by(|(a_at, a), (b_at, b)| a_at.cmp(b_at).then_with(|| a.id.cmp(&b.id)))
            .map(|(_, m)| m),
        _ => messages.last(),
    }
}

/// The poll-detect-forward loop for a single room.
///
/// Owns its cursor; the watch channel only publishes read-only snapshots.
pub struct PollingLoop<A: NomiApi, S: MessageSink> {
    api: A,
    sink: S,
    session: NomiSession,
    target: PollTarget,
    cursor: PollCursor,
    published: Arc<watch::Sender<PollCursor>>,
}

impl<A: NomiApi, S: MessageSink> PollingLoop<A, S> {
    /// Continue from whatever cursor was last published on `published`.
    pub fn resume(
        api: A,
        sink: S,
        session: NomiSession,
        target: PollTarget,
        published: Arc<watch::Sender<PollCursor>>,
    ) -> Self {
        let cursor = published.borrow().clone();
        Self {
            api,
            sink,
            session,
            target,
            cursor,
            published,
        }
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let room_id = self.target.room_id.as_str();
        let messages = match self.api.fetch_recent_messages(&self.session, room_id).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(room_id, status = ?err.status(), error = %err, "Failed to fetch Nomi messages");
                return CycleOutcome::FetchFailed;
            }
        };

        let Some(newest) = select_newest(&messages) else {
            return CycleOutcome::Empty;
        };

        if self.cursor.last_message_id.as_deref() == Some(newest.id.as_str()) {
            return CycleOutcome::Unchanged;
        }

        let sent_at = newest.sent_at();
        if let (Some(seen_at), Some(at)) = (self.cursor.last_message_at, sent_at) {
            if at < seen_at {
                tracing::debug!(room_id, message_id = %newest.id, "Ignoring stale Nomi message");
                return CycleOutcome::Stale;
            }
        }

        // Advance before forwarding so a failed send is never re-delivered.
        self.cursor.last_message_id = Some(newest.id.clone());
        if sent_at.is_some() {
            self.cursor.last_message_at = sent_at;
        }
        self.published.send_replace(self.cursor.clone());

        tracing::info!(
            room_id,
            message_id = %newest.id,
            channel_id = self.target.channel_id,
            "New Nomi message detected"
        );

        let delivery = forward(
            &self.sink,
            self.target.channel_id,
            &newest.text,
            newest.image(),
        )
        .await;

        CycleOutcome::Forwarded {
            message_id: newest.id.clone(),
            delivery,
        }
    }

    /// Run until `cancel` fires. Checked before each cycle and while sleeping.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = self.run_cycle().await;
            tracing::debug!(room_id = %self.target.room_id, ?outcome, "Nomi poll cycle finished");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!(room_id = %self.target.room_id, "Stopped polling Nomi room");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

struct Worker {
    channel_id: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Clears the active flag when the polling task ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Supervised handle around one room's [`PollingLoop`].
pub struct RoomPoller<A: NomiApi + 'static, S: MessageSink + 'static> {
    room_id: String,
    api: Arc<A>,
    sink: Arc<S>,
    session: NomiSession,
    interval: Duration,
    active: Arc<AtomicBool>,
    cursor: Arc<watch::Sender<PollCursor>>,
    worker: Mutex<Option<Worker>>,
}

impl<A: NomiApi + 'static, S: MessageSink + 'static> RoomPoller<A, S> {
    pub fn new(
        room_id: impl Into<String>,
        api: Arc<A>,
        sink: Arc<S>,
        session: NomiSession,
        interval: Duration,
    ) -> Self {
        let (tx, _rx) = watch::channel(PollCursor::default());
        Self {
            room_id: room_id.into(),
            api,
            sink,
            session,
            interval,
            active: Arc::new(AtomicBool::new(false)),
            cursor: Arc::new(tx),
            worker: Mutex::new(None),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn last_seen(&self) -> Option<String> {
        self.cursor.borrow().last_message_id.clone()
    }

    /// Channel of the current (or most recent) worker.
    pub async fn channel_id(&self) -> Option<u64> {
        self.worker.lock().await.as_ref().map(|w| w.channel_id)
    }

    /// Spawn the polling task, forwarding into `channel_id`. A no-op while a
    /// task is already running for this room.
    pub async fn start(&self, channel_id: u64) -> StartOutcome {
        let mut worker = self.worker.lock().await;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!(room_id = %self.room_id, "Polling already active for room");
            return StartOutcome::AlreadyActive;
        }

        let polling = PollingLoop::resume(
            Arc::clone(&self.api),
            Arc::clone(&self.sink),
            self.session.clone(),
            PollTarget {
                room_id: self.room_id.clone(),
                channel_id,
            },
            Arc::clone(&self.cursor),
        );
        let guard = ActiveGuard(Arc::clone(&self.active));
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            polling.run(interval, token).await;
        });

        tracing::info!(room_id = %self.room_id, channel_id, "Starting polling for Nomi room");
        *worker = Some(Worker {
            channel_id,
            cancel,
            handle: Some(handle),
        });

        StartOutcome::Started
    }

    /// Cancel the task and wait for it to exit. Returns false if nothing was running.
    ///
    /// The worker lock is held until the task has exited, so a concurrent
    /// [`start`](Self::start) waits and then spawns a fresh task.
    pub async fn stop(&self) -> bool {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.as_mut().and_then(|w| {
            w.cancel.cancel();
            w.handle.take()
        }) else {
            return false;
        };
        let was_running = self.is_running();

        if let Err(err) = handle.await {
            tracing::warn!(room_id = %self.room_id, error = %err, "Polling task ended abnormally");
        }
        drop(worker);

        was_running
    }
}
