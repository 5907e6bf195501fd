//! Session discovery poller.
//!
//! Periodically fetches the role-scoped session list from the directory,
//! evaluates every session against the eligibility policy, and publishes
//! the partitioned result through a `watch` channel.
//!
//! # Single Flight
//!
//! All fetches run on one task. A tick whose deadline passed while a fetch
//! was in flight is dropped rather than queued, so a fetch slower than the
//! interval is followed by the next period boundary, not an immediate
//! refetch. Manual refresh requests made while a fetch is in flight are
//! ignored.
//!
//! # Stale Data
//!
//! A failed fetch keeps the previous lists and sets `last_error`; the next
//! successful fetch clears it. Every published failure is retryable, whatever
//! its cause, since the poller keeps polling.
//!
//! # Cancellation
//!
//! `stop()` cancels the task's token and aborts it. A fetch that completes
//! after cancellation is discarded without touching the published view.

use crate::directory::SessionDirectory;
use crate::eligibility::{Clock, EligibilityPolicy, EligibilityResult, SessionView};
use crate::errors::ClassroomError;
use crate::models::{RoleContext, Session};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Poller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerSettings {
    /// Time between scheduled fetches.
    pub poll_interval: Duration,
    /// Windows used to classify each fetched session.
    pub policy: EligibilityPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECONDS),
            policy: EligibilityPolicy::default(),
        }
    }
}

/// A session together with its eligibility at the time of the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedSession {
    pub session: Session,
    pub eligibility: EligibilityResult,
}

/// Error surfaced inline next to stale lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollFailure {
    /// Stable error code (see `ClassroomError::code`).
    pub code: &'static str,
    /// Client-safe message.
    pub message: String,
    /// Whether the page should offer the retry action. Always set for
    /// failures published by the poller.
    pub retryable: bool,
}

impl From<&ClassroomError> for PollFailure {
    fn from(err: &ClassroomError) -> Self {
        Self {
            code: err.code(),
            message: err.client_message(),
            retryable: true,
        }
    }
}

/// Published discovery state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryView {
    /// Ongoing sessions, earliest first.
    pub live: Vec<EvaluatedSession>,
    /// Scheduled sessions that have not ended, soonest first.
    pub upcoming: Vec<EvaluatedSession>,
    /// Ended, completed and cancelled sessions, most recent first.
    pub past: Vec<EvaluatedSession>,
    /// Set when the latest fetch failed; lists above are from the last success.
    pub last_error: Option<PollFailure>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Completed fetches (successful or not) since the poller last started.
    pub fetch_count: u64,
}

impl DiscoveryView {
    /// All sessions across the three lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len() + self.upcoming.len() + self.past.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a session in any list.
    #[must_use]
    pub fn find(&self, session_id: common::types::SessionId) -> Option<&EvaluatedSession> {
        self.live
            .iter()
            .chain(&self.upcoming)
            .chain(&self.past)
            .find(|entry| entry.session.id == session_id)
    }
}

/// Evaluate and partition a fetched session list.
///
/// Pure; exposed so the ordering rules can be tested without a task.
#[must_use]
pub fn partition_sessions(
    sessions: Vec<Session>,
    policy: &EligibilityPolicy,
    now: DateTime<Utc>,
) -> (
    Vec<EvaluatedSession>,
    Vec<EvaluatedSession>,
    Vec<EvaluatedSession>,
) {
    let mut live = Vec::new();
    let mut upcoming = Vec::new();
    let mut past = Vec::new();

    for session in sessions {
        let eligibility = policy.evaluate(&session, now);
        let entry = EvaluatedSession {
            session,
            eligibility,
        };
        match entry.eligibility.bucket.view() {
            SessionView::Live => live.push(entry),
            SessionView::Upcoming => upcoming.push(entry),
            SessionView::Past => past.push(entry),
        }
    }

    live.sort_by_key(|e| e.session.scheduled_at);
    upcoming.sort_by_key(|e| e.session.scheduled_at);
    past.sort_by(|a, b| b.session.scheduled_at.cmp(&a.session.scheduled_at));

    (live, upcoming, past)
}

/// Handles of a running poll task.
struct RunningPoll {
    cancel_token: CancellationToken,
    refresh: Arc<Notify>,
    in_flight: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Everything the poll task needs, moved into it on start.
struct PollTask {
    directory: Arc<dyn SessionDirectory>,
    clock: Arc<dyn Clock>,
    settings: PollerSettings,
    ctx: RoleContext,
    view_tx: watch::Sender<DiscoveryView>,
    cancel_token: CancellationToken,
    refresh: Arc<Notify>,
    in_flight: Arc<AtomicBool>,
}

/// Repeatedly fetches and classifies sessions for one principal.
pub struct SessionDiscoveryPoller {
    directory: Arc<dyn SessionDirectory>,
    clock: Arc<dyn Clock>,
    settings: PollerSettings,
    view_tx: watch::Sender<DiscoveryView>,
    running: Option<RunningPoll>,
}

impl SessionDiscoveryPoller {
    /// Create a stopped poller.
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        clock: Arc<dyn Clock>,
        settings: PollerSettings,
    ) -> Self {
        let (view_tx, _) = watch::channel(DiscoveryView::default());
        Self {
            directory,
            clock,
            settings,
            view_tx,
            running: None,
        }
    }

    /// Start polling for `ctx`: one fetch immediately, then one per
    /// `poll_interval`.
    ///
    /// Starting a running poller restarts it under the new context and
    /// clears the published view.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, ctx: RoleContext) {
        if self.running.is_some() {
            debug!(target: "classroom.poller", "Restarting poller under new context");
            self.stop();
        }

        info!(
            target: "classroom.poller",
            principal_id = %ctx.principal_id,
            role = %ctx.role,
            interval_secs = self.settings.poll_interval.as_secs(),
            "Starting session discovery poller"
        );

        self.view_tx.send_replace(DiscoveryView::default());

        let cancel_token = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let in_flight = Arc::new(AtomicBool::new(false));

        let task = PollTask {
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            settings: self.settings.clone(),
            ctx,
            view_tx: self.view_tx.clone(),
            cancel_token: cancel_token.clone(),
            refresh: Arc::clone(&refresh),
            in_flight: Arc::clone(&in_flight),
        };

        self.running = Some(RunningPoll {
            cancel_token,
            refresh,
            in_flight,
            task: tokio::spawn(task.run()),
        });
    }

    /// Stop polling. No fetch begins after this returns and a fetch still
    /// in flight is discarded. Idempotent.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel_token.cancel();
            running.task.abort();
            info!(target: "classroom.poller", "Session discovery poller stopped");
        }
    }

    /// Fetch now (the retry action next to an inline error).
    ///
    /// Returns `false` when the request was ignored because the poller is
    /// stopped or a fetch is already in flight.
    pub fn request_refresh(&self) -> bool {
        let Some(running) = &self.running else {
            return false;
        };

        if running.in_flight.load(Ordering::SeqCst) {
            debug!(target: "classroom.poller", "Refresh ignored, fetch already in flight");
            metrics::record_poll("skipped");
            return false;
        }

        running.refresh.notify_one();
        true
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Whether a fetch is currently in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.in_flight.load(Ordering::SeqCst))
    }

    /// Subscribe to view updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DiscoveryView> {
        self.view_tx.subscribe()
    }

    /// Snapshot of the current view.
    #[must_use]
    pub fn view(&self) -> DiscoveryView {
        self.view_tx.borrow().clone()
    }
}

impl Drop for SessionDiscoveryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PollTask {
    #[instrument(skip_all, name = "classroom.task.discovery_poller", fields(principal_id = %self.ctx.principal_id))]
    async fn run(self) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_fetch_ended: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    break;
                }
                deadline = interval.tick() => {
                    // Skip only re-aligns later ticks; the missed one is
                    // still delivered as soon as the interval is polled.
                    if last_fetch_ended.is_some_and(|ended| deadline < ended) {
                        debug!(target: "classroom.poller", "Dropping tick that elapsed during a fetch");
                        metrics::record_poll("skipped");
                        continue;
                    }
                }
                () = self.refresh.notified() => {
                    debug!(target: "classroom.poller", "Manual refresh requested");
                }
            }

            if self.cancel_token.is_cancelled() {
                break;
            }

            self.poll_once().await;
            last_fetch_ended = Some(Instant::now());
        }

        debug!(target: "classroom.poller", "Poll task exiting");
    }

    async fn poll_once(&self) {
        self.in_flight.store(true, Ordering::SeqCst);
        let result = self.directory.list_sessions(&self.ctx).await;
        self.in_flight.store(false, Ordering::SeqCst);

        if self.cancel_token.is_cancelled() {
            debug!(target: "classroom.poller", "Discarding fetch result after stop");
            return;
        }

        match result {
            Ok(sessions) => {
                let now = self.clock.now();
                let (live, upcoming, past) =
                    partition_sessions(sessions, &self.settings.policy, now);

                metrics::record_poll("success");
                metrics::set_sessions_visible(live.len(), upcoming.len(), past.len());
                debug!(
                    target: "classroom.poller",
                    live = live.len(),
                    upcoming = upcoming.len(),
                    past = past.len(),
                    "Session lists refreshed"
                );

                self.view_tx.send_modify(|view| {
                    view.live = live;
                    view.upcoming = upcoming;
                    view.past = past;
                    view.last_error = None;
                    view.last_success_at = Some(now);
                    view.fetch_count += 1;
                });
            }
            Err(e) => {
                metrics::record_poll("error");
                warn!(
                    target: "classroom.poller",
                    error = %e,
                    "Session fetch failed, keeping previous lists"
                );

                let failure = PollFailure::from(&e);
                self.view_tx.send_modify(|view| {
                    view.last_error = Some(failure);
                    view.fetch_count += 1;
                });
            }
        }
    }
}
