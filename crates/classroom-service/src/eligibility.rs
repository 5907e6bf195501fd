//! Join/start eligibility for classroom sessions.
//!
//! A pure function of `(session, now)`: no I/O, no side effects. The same
//! policy serves the instructor and student views.
//!
//! | Status    | `can_start`              | `can_join`                                  |
//! |-----------|--------------------------|---------------------------------------------|
//! | Ongoing   | true                     | true                                        |
//! | Scheduled | `Δstart ≤ start_lead`    | `Δstart ≤ join_lead ∧ now ≤ scheduled+dur`  |
//! | Completed | false                    | false                                       |
//! | Cancelled | false                    | false                                       |
//!
//! `now` comes from the caller's clock. There is no reconciliation with
//! server time, so a skewed client clock opens the window early or late.

use crate::models::{Session, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// Minutes before `scheduled_at` from which an instructor may start.
pub const DEFAULT_START_LEAD_MINUTES: i64 = 15;

/// Minutes before `scheduled_at` from which participants may join.
pub const DEFAULT_JOIN_LEAD_MINUTES: i64 = 10;

/// Largest accepted lead time (one week).
pub const MAX_LEAD_MINUTES: i64 = 7 * 24 * 60;

/// Display bucket for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBucket {
    Live,
    ReadyToStart,
    StartingSoon,
    Upcoming,
    /// Window elapsed without the session ever going live.
    Ended,
    Completed,
    Cancelled,
}

impl SessionBucket {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionBucket::Live => "live",
            SessionBucket::ReadyToStart => "ready_to_start",
            SessionBucket::StartingSoon => "starting_soon",
            SessionBucket::Upcoming => "upcoming",
            SessionBucket::Ended => "ended",
            SessionBucket::Completed => "completed",
            SessionBucket::Cancelled => "cancelled",
        }
    }

    /// Which list of the discovery view this bucket belongs to.
    #[must_use]
    pub const fn view(&self) -> SessionView {
        match self {
            SessionBucket::Live => SessionView::Live,
            SessionBucket::ReadyToStart | SessionBucket::StartingSoon | SessionBucket::Upcoming => {
                SessionView::Upcoming
            }
            SessionBucket::Ended | SessionBucket::Completed | SessionBucket::Cancelled => {
                SessionView::Past
            }
        }
    }
}

impl fmt::Display for SessionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three lists republished by the discovery poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionView {
    Live,
    Upcoming,
    Past,
}

/// Result of evaluating one session at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    pub bucket: SessionBucket,
    pub can_join: bool,
    pub can_start: bool,
    pub time_label: String,
}

/// Lead times for the start and join windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    start_lead: Duration,
    join_lead: Duration,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_START_LEAD_MINUTES, DEFAULT_JOIN_LEAD_MINUTES)
    }
}

impl EligibilityPolicy {
    /// Leads outside the `TimeDelta` range saturate; `Config` rejects
    /// anything above [`MAX_LEAD_MINUTES`] before it gets here.
    #[must_use]
    pub fn new(start_lead_minutes: i64, join_lead_minutes: i64) -> Self {
        Self {
            start_lead: lead(start_lead_minutes),
            join_lead: lead(join_lead_minutes),
        }
    }

    #[must_use]
    pub fn start_lead(&self) -> Duration {
        self.start_lead
    }

    #[must_use]
    pub fn join_lead(&self) -> Duration {
        self.join_lead
    }

    /// Evaluate a session at `now`.
    #[must_use]
    pub fn evaluate(&self, session: &Session, now: DateTime<Utc>) -> EligibilityResult {
        let until_start = session.scheduled_at - now;

        match session.status {
            SessionStatus::Ongoing => EligibilityResult {
                bucket: SessionBucket::Live,
                can_join: true,
                can_start: true,
                time_label: "Live now".to_string(),
            },
            SessionStatus::Completed | SessionStatus::Cancelled => EligibilityResult {
                bucket: if session.status == SessionStatus::Completed {
                    SessionBucket::Completed
                } else {
                    SessionBucket::Cancelled
                },
                can_join: false,
                can_start: false,
                time_label: time_label(until_start),
            },
            SessionStatus::Scheduled => {
                let window_open = now <= session.ends_at();
                let can_start = until_start <= self.start_lead;
                let can_join = until_start <= self.join_lead && window_open;

                let bucket = if !window_open {
                    SessionBucket::Ended
                } else if can_join {
                    SessionBucket::ReadyToStart
                } else if can_start {
                    SessionBucket::StartingSoon
                } else {
                    SessionBucket::Upcoming
                };

                EligibilityResult {
                    bucket,
                    can_join,
                    can_start,
                    time_label: time_label(until_start),
                }
            }
        }
    }
}

fn lead(minutes: i64) -> Duration {
    Duration::try_minutes(minutes).unwrap_or(if minutes < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

/// Evaluate with the default 15/10 minute policy.
#[must_use]
pub fn evaluate(session: &Session, now: DateTime<Utc>) -> EligibilityResult {
    EligibilityPolicy::default().evaluate(session, now)
}

/// "Started" once the start time has passed, otherwise a countdown such as
/// `"2d 3h 5m"`, `"3h 0m"` or `"7m"`.
fn time_label(until_start: Duration) -> String {
    if until_start < Duration::zero() {
        return "Started".to_string();
    }

    let total_minutes = until_start.num_minutes();
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Source of "now" for eligibility decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{CourseRef, InstructorRef};
    use chrono::TimeZone;
    use common::types::{CourseId, PrincipalId, RoomId, SessionId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    fn session(status: SessionStatus, duration_minutes: u32) -> Session {
        Session {
            id: SessionId::new(),
            course: CourseRef {
                id: CourseId::new(),
                code: "CS101".to_string(),
                name: "Intro to CS".to_string(),
            },
            instructor: InstructorRef {
                id: PrincipalId::new(),
                name: "Prof. Ada".to_string(),
            },
            title: "Lecture".to_string(),
            description: String::new(),
            scheduled_at: t0(),
            duration_minutes,
            status,
            room_id: RoomId("cs101-lecture".to_string()),
            participant_count: 0,
        }
    }

    #[test]
    fn test_twenty_minutes_before_is_upcoming() {
        let result = evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() - Duration::minutes(20),
        );
        assert_eq!(result.bucket, SessionBucket::Upcoming);
        assert!(!result.can_join);
        assert!(!result.can_start);
        assert_eq!(result.time_label, "20m");
    }

    #[test]
    fn test_five_minutes_before_is_joinable() {
        let result = evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() - Duration::minutes(5),
        );
        assert!(result.can_join);
        assert!(result.can_start);
        assert_eq!(result.bucket, SessionBucket::ReadyToStart);
    }

    #[test]
    fn test_ongoing_is_live_at_any_time() {
        for offset in [-600, -5, 0, 30, 24 * 60 * 7] {
            let result = evaluate(
                &session(SessionStatus::Ongoing, 60),
                t0() + Duration::minutes(offset),
            );
            assert_eq!(result.bucket, SessionBucket::Live);
            assert!(result.can_join);
            assert!(result.can_start);
        }
    }

    #[test]
    fn test_elapsed_window_without_start_is_ended() {
        let result = evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() + Duration::minutes(65),
        );
        assert!(!result.can_join);
        assert_eq!(result.bucket, SessionBucket::Ended);
        assert_eq!(result.time_label, "Started");
    }

    #[test]
    fn test_between_join_and_start_leads_is_starting_soon() {
        let result = evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() - Duration::minutes(12),
        );
        assert_eq!(result.bucket, SessionBucket::StartingSoon);
        assert!(result.can_start);
        assert!(!result.can_join);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let s = session(SessionStatus::Scheduled, 60);

        let at_start_lead = evaluate(&s, t0() - Duration::minutes(15));
        assert!(at_start_lead.can_start);
        assert!(!at_start_lead.can_join);

        let just_outside = evaluate(&s, t0() - Duration::minutes(15) - Duration::seconds(1));
        assert!(!just_outside.can_start);

        let at_join_lead = evaluate(&s, t0() - Duration::minutes(10));
        assert!(at_join_lead.can_join);

        let at_end = evaluate(&s, t0() + Duration::minutes(60));
        assert!(at_end.can_join);
        assert_eq!(at_end.bucket, SessionBucket::ReadyToStart);

        let after_end = evaluate(&s, t0() + Duration::minutes(60) + Duration::seconds(1));
        assert!(!after_end.can_join);
        assert_eq!(after_end.bucket, SessionBucket::Ended);
    }

    #[test]
    fn test_terminal_statuses_never_joinable() {
        let now = t0() - Duration::minutes(5);

        let completed = evaluate(&session(SessionStatus::Completed, 60), now);
        assert_eq!(completed.bucket, SessionBucket::Completed);
        assert!(!completed.can_join && !completed.can_start);

        let cancelled = evaluate(&session(SessionStatus::Cancelled, 60), now);
        assert_eq!(cancelled.bucket, SessionBucket::Cancelled);
        assert!(!cancelled.can_join && !cancelled.can_start);
    }

    #[test]
    fn test_scheduled_start_and_join_properties_over_a_sweep() {
        let s = session(SessionStatus::Scheduled, 45);
        for minute in -24 * 60..=24 * 60 {
            let now = t0() + Duration::minutes(minute);
            let result = evaluate(&s, now);
            let until_start = s.scheduled_at - now;

            assert_eq!(result.can_start, until_start <= Duration::minutes(15));
            assert_eq!(
                result.can_join,
                until_start <= Duration::minutes(10) && now <= s.ends_at()
            );
            assert_ne!(result.bucket, SessionBucket::Live);
        }
    }

    #[test]
    fn test_custom_policy_leads() {
        let policy = EligibilityPolicy::new(30, 30);
        let result = policy.evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() - Duration::minutes(25),
        );
        assert!(result.can_join);
        assert!(result.can_start);
    }

    #[test]
    fn test_out_of_range_leads_saturate() {
        let policy = EligibilityPolicy::new(i64::MAX, i64::MIN);
        assert_eq!(policy.start_lead(), Duration::MAX);
        assert_eq!(policy.join_lead(), Duration::MIN);

        let result = policy.evaluate(
            &session(SessionStatus::Scheduled, 60),
            t0() - Duration::days(365),
        );
        assert!(result.can_start);
        assert!(!result.can_join);
    }

    #[test]
    fn test_session_at_end_of_time_range_is_upcoming() {
        let mut s = session(SessionStatus::Scheduled, 120);
        s.scheduled_at = DateTime::<Utc>::MAX_UTC - Duration::hours(1);

        let result = evaluate(&s, t0());

        assert_eq!(result.bucket, SessionBucket::Upcoming);
        assert!(!result.can_join);
        assert!(!result.can_start);
    }

    #[test]
    fn test_time_label_breakdown() {
        assert_eq!(time_label(Duration::minutes(0)), "0m");
        assert_eq!(time_label(Duration::minutes(59)), "59m");
        assert_eq!(time_label(Duration::minutes(180)), "3h 0m");
        assert_eq!(
            time_label(Duration::days(2) + Duration::hours(3) + Duration::minutes(5)),
            "2d 3h 5m"
        );
        assert_eq!(time_label(Duration::seconds(-1)), "Started");
    }

    #[test]
    fn test_bucket_views() {
        assert_eq!(SessionBucket::Live.view(), SessionView::Live);
        assert_eq!(SessionBucket::StartingSoon.view(), SessionView::Upcoming);
        assert_eq!(SessionBucket::Ended.view(), SessionView::Past);
        assert_eq!(SessionBucket::Cancelled.view(), SessionView::Past);
    }
}
