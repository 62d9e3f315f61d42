//! One monitoring cycle: fetch, parse, track thresholds, present.
//!
//! The [`Monitor`] owns all mutable state of the pipeline (tracker state,
//! last snapshot, auth alert debounce) and is driven by the
//! [`Scheduler`](crate::Scheduler) through `&mut self`, so a cycle never
//! overlaps another.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use quotabar_core::{
    Clock, Notification, NotificationEvent, Presenter, QuotaKind, StatusLine, ThresholdTracker,
    TrackerState, UsageSnapshot,
};
use quotabar_fetch::{FetchError, Fetcher, ParseError, parse_partial};

use crate::persistence::{load_json_or_default, save_json};
use crate::scheduler::Pipeline;

// ============================================================================
// Run Report
// ============================================================================

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Both quotas were read.
    Updated,
    /// One quota was read; the other failed to parse.
    Partial(ParseError),
    /// The response could not be parsed at all.
    ParseFailed(ParseError),
    /// The fetch failed.
    FetchFailed(FetchError),
}

impl RunOutcome {
    /// Returns true if at least one quota was read.
    pub fn has_data(&self) -> bool {
        matches!(self, RunOutcome::Updated | RunOutcome::Partial(_))
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The line handed to the presenter.
    pub status: StatusLine,
    /// Threshold crossings produced by this cycle, in delivery order.
    pub events: Vec<NotificationEvent>,
    /// How the cycle ended.
    pub outcome: RunOutcome,
    /// Session-expired alert raised by this cycle, if any.
    pub alert: Option<Notification>,
}

// ============================================================================
// Monitor
// ============================================================================

/// The fetch → parse → track → present pipeline.
pub struct Monitor {
    fetcher: Fetcher,
    tracker: ThresholdTracker,
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn Presenter>,
    notifications_enabled: bool,
    state_path: Option<PathBuf>,
    last_snapshot: Option<UsageSnapshot>,
    auth_expired: bool,
}

impl Monitor {
    /// Creates a monitor with notifications on and no persistence.
    pub fn new(
        fetcher: Fetcher,
        tracker: ThresholdTracker,
        clock: Arc<dyn Clock>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            fetcher,
            tracker,
            clock,
            presenter,
            notifications_enabled: true,
            state_path: None,
            last_snapshot: None,
            auth_expired: false,
        }
    }

    /// Saves tracker state to `path` after every cycle that changed it.
    #[must_use]
    pub fn with_state_path(mut self, path: Option<PathBuf>) -> Self {
        self.state_path = path;
        self
    }

    /// Turns notification delivery on or off. Thresholds are tracked either way.
    #[must_use]
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// The threshold tracker.
    pub fn tracker(&self) -> &ThresholdTracker {
        &self.tracker
    }

    /// The most recent complete snapshot.
    pub fn last_snapshot(&self) -> Option<&UsageSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Returns true while the session is known to be expired.
    pub fn is_auth_expired(&self) -> bool {
        self.auth_expired
    }

    /// Runs one cycle and delivers its output to the presenter.
    pub async fn run_once(&mut self) -> RunReport {
        let before = self.tracker.state().clone();
        let now = self.clock.now();

        let report = match self.fetcher.fetch().await {
            Ok(body) => {
                self.auth_expired = false;
                self.process_body(&body, now)
            }
            Err(err) => self.process_failure(err),
        };

        self.presenter.show_status(&report.status);
        if self.notifications_enabled {
            if let Some(alert) = &report.alert {
                self.presenter.notify(alert);
            }
            for event in &report.events {
                self.presenter.notify(&event.to_notification());
            }
        }

        if self.tracker.state() != &before {
            self.persist_state().await;
        }

        info!(status = %report.status, events = report.events.len(), "Refresh finished");
        report
    }

    fn process_body(&mut self, body: &str, now: chrono::DateTime<chrono::Utc>) -> RunReport {
        let usage = match parse_partial(body, now) {
            Ok(usage) => usage,
            Err(err) => {
                warn!(error = %err, "Cannot parse usage response");
                return RunReport {
                    status: StatusLine::unavailable(),
                    events: Vec::new(),
                    outcome: RunOutcome::ParseFailed(err),
                    alert: None,
                };
            }
        };

        let mut events = Vec::new();
        for quota in QuotaKind::ALL {
            match usage.reading(quota) {
                Ok(reading) => events.extend(self.tracker.observe(quota, reading, now)),
                Err(err) => warn!(quota = %quota, error = %err, "Quota unreadable this cycle"),
            }
        }

        let status = StatusLine::from_readings(usage.session.as_ref().ok(), usage.weekly.as_ref().ok());
        let any_read = status.session.is_some() || status.weekly.is_some();

        let outcome = match usage.into_snapshot() {
            Ok(snapshot) => {
                self.last_snapshot = Some(snapshot);
                RunOutcome::Updated
            }
            Err(err) if any_read => RunOutcome::Partial(err),
            Err(err) => RunOutcome::ParseFailed(err),
        };

        RunReport {
            status,
            events,
            outcome,
            alert: None,
        }
    }

    fn process_failure(&mut self, err: FetchError) -> RunReport {
        let mut alert = None;
        match &err {
            FetchError::AuthExpired(reason) => {
                if self.auth_expired {
                    debug!(reason = %reason, "Session still expired");
                } else {
                    warn!(reason = %reason, "Session expired, capture a fresh request");
                    self.auth_expired = true;
                    alert = Some(Notification::auth_expired());
                }
            }
            FetchError::ExecutorMissing(tool) => error!(tool = %tool, "Request executor disappeared"),
            FetchError::Timeout(_) | FetchError::Malformed(_) => warn!(error = %err, "Fetch failed"),
        }

        RunReport {
            status: StatusLine::unavailable().with_auth_expired(self.auth_expired),
            events: Vec::new(),
            outcome: RunOutcome::FetchFailed(err),
            alert,
        }
    }

    async fn persist_state(&self) {
        let Some(path) = &self.state_path else {
            return;
        };
        if let Err(e) = save_json(path, self.tracker.state()).await {
            warn!(path = %path.display(), error = %e, "Cannot save threshold state");
        }
    }
}

#[async_trait]
impl Pipeline for Monitor {
    async fn run(&mut self) {
        self.run_once().await;
    }
}

/// Loads persisted tracker state; missing or unreadable state is empty.
pub async fn load_tracker_state(path: Option<&Path>) -> TrackerState {
    match path {
        Some(path) => load_json_or_default(path).await,
        None => TrackerState::default(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use quotabar_core::{CrossingPolicy, ManualClock, Thresholds};
    use quotabar_fetch::{RawResponse, RequestDescriptor, RequestExecutor};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingPresenter {
        statuses: Mutex<Vec<StatusLine>>,
        notifications: Mutex<Vec<Notification>>,
    }

    impl Presenter for RecordingPresenter {
        fn show_status(&self, status: &StatusLine) {
            self.statuses.lock().unwrap().push(*status);
        }

        fn notify(&self, notification: &Notification) {
            self.notifications.lock().unwrap().push(notification.clone());
        }
    }

    /// Answers from a script; the last answer repeats.
    struct ScriptedExecutor {
        script: Mutex<VecDeque<Result<RawResponse, FetchError>>>,
        delay: Duration,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<Result<RawResponse, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl RequestExecutor for ScriptedExecutor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn execute(&self, _: &RequestDescriptor) -> Result<RawResponse, FetchError> {
            tokio::time::sleep(self.delay).await;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn body(session: f64, weekly: f64) -> Result<RawResponse, FetchError> {
        let session_reset = t0() + ChronoDuration::hours(5);
        let weekly_reset = t0() + ChronoDuration::days(7);
        Ok(RawResponse::new(
            Some(200),
            format!(
                r#"{{"five_hour":{{"utilization":{session},"resets_at":"{}"}},
                    "seven_day":{{"utilization":{weekly},"resets_at":"{}"}}}}"#,
                session_reset.to_rfc3339(),
                weekly_reset.to_rfc3339()
            ),
        ))
    }

    fn auth() -> Result<RawResponse, FetchError> {
        Ok(RawResponse::new(Some(401), "{}"))
    }

    struct Harness {
        monitor: Monitor,
        presenter: Arc<RecordingPresenter>,
        clock: Arc<ManualClock>,
    }

    fn harness(executor: ScriptedExecutor) -> Harness {
        let descriptor = RequestDescriptor::parse("curl https://claude.ai/api/usage").unwrap();
        let fetcher = Fetcher::new(descriptor, Arc::new(executor)).with_timeout(Duration::from_secs(5));
        let presenter = Arc::new(RecordingPresenter::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let tracker = ThresholdTracker::new(Thresholds::default(), CrossingPolicy::FireAll);
        let monitor = Monitor::new(fetcher, tracker, clock.clone(), presenter.clone());
        Harness {
            monitor,
            presenter,
            clock,
        }
    }

    fn thresholds(events: &[NotificationEvent]) -> Vec<(QuotaKind, u8)> {
        events.iter().map(|e| (e.quota, e.threshold)).collect()
    }

    // ------------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_successful_cycle_presents_and_notifies() {
        let mut h = harness(ScriptedExecutor::new(vec![body(53.4, 12.0)]));

        let report = h.monitor.run_once().await;

        assert_eq!(report.outcome, RunOutcome::Updated);
        assert_eq!(report.status.text(), "5h: 53% | 7d: 12%");
        assert_eq!(
            thresholds(&report.events),
            vec![(QuotaKind::Session, 25), (QuotaKind::Session, 50)]
        );
        assert!(h.monitor.last_snapshot().is_some());

        assert_eq!(h.presenter.statuses.lock().unwrap().len(), 1);
        let notes = h.presenter.notifications.lock().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].body, "5-hour session usage reached 53% (threshold: 50%)");
    }

    #[tokio::test]
    async fn test_crossings_across_cycles() {
        let mut h = harness(ScriptedExecutor::new(vec![
            body(10.0, 0.0),
            body(30.0, 0.0),
            body(60.0, 0.0),
            body(60.0, 0.0),
        ]));

        let mut fired = Vec::new();
        for _ in 0..4 {
            h.clock.advance(ChronoDuration::minutes(3));
            fired.push(thresholds(&h.monitor.run_once().await.events));
        }

        assert_eq!(
            fired,
            vec![
                vec![],
                vec![(QuotaKind::Session, 25)],
                vec![(QuotaKind::Session, 50)],
                vec![],
            ]
        );
    }

    #[tokio::test]
    async fn test_thresholds_refire_after_reset() {
        let mut h = harness(ScriptedExecutor::new(vec![body(30.0, 0.0)]));

        assert_eq!(h.monitor.run_once().await.events.len(), 1);
        assert!(h.monitor.run_once().await.events.is_empty());

        h.clock.advance(ChronoDuration::hours(5));
        assert_eq!(thresholds(&h.monitor.run_once().await.events), vec![(QuotaKind::Session, 25)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shows_unavailable_without_events() {
        let mut executor = ScriptedExecutor::new(vec![body(99.0, 99.0)]);
        executor.delay = Duration::from_secs(60);
        let mut h = harness(executor);

        let report = h.monitor.run_once().await;

        assert_eq!(report.outcome, RunOutcome::FetchFailed(FetchError::Timeout(Duration::from_secs(5))));
        assert_eq!(report.status.text(), "5h: N/A | 7d: N/A");
        assert!(report.events.is_empty());
        assert!(h.presenter.notifications.lock().unwrap().is_empty());
        assert_eq!(*h.presenter.statuses.lock().unwrap(), vec![StatusLine::unavailable()]);
    }

    #[tokio::test]
    async fn test_partial_response_keeps_healthy_quota() {
        let reset = (t0() + ChronoDuration::hours(5)).to_rfc3339();
        let mut h = harness(ScriptedExecutor::new(vec![Ok(RawResponse::new(
            Some(200),
            format!(r#"{{"five_hour":{{"utilization":80,"resets_at":"{reset}"}},"seven_day":null}}"#),
        ))]));

        let report = h.monitor.run_once().await;

        assert_eq!(report.outcome, RunOutcome::Partial(ParseError::MissingField("seven_day".to_string())));
        assert_eq!(report.status.text(), "5h: 80% | 7d: N/A");
        assert_eq!(report.events.len(), 3);
        assert!(h.monitor.last_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let mut h = harness(ScriptedExecutor::new(vec![Ok(RawResponse::new(Some(200), "<html>"))]));

        let report = h.monitor.run_once().await;

        assert!(matches!(report.outcome, RunOutcome::ParseFailed(ParseError::InvalidJson(_))));
        assert!(!report.outcome.has_data());
        assert_eq!(report.status, StatusLine::unavailable());
    }

    #[tokio::test]
    async fn test_auth_alert_is_debounced_and_rearms() {
        let mut h = harness(ScriptedExecutor::new(vec![
            auth(),
            auth(),
            auth(),
            body(1.0, 1.0),
            auth(),
        ]));

        for _ in 0..3 {
            let report = h.monitor.run_once().await;
            assert!(matches!(report.outcome, RunOutcome::FetchFailed(FetchError::AuthExpired(_))));
            assert!(report.status.auth_expired);
            assert_eq!(report.status.to_string(), "5h: N/A | 7d: N/A (auth expired)");
        }
        assert_eq!(h.presenter.notifications.lock().unwrap().len(), 1);
        assert!(h.monitor.is_auth_expired());

        let report = h.monitor.run_once().await;
        assert!(!report.status.auth_expired);
        assert!(!h.monitor.is_auth_expired());

        h.monitor.run_once().await;
        let notes = h.presenter.notifications.lock().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1], Notification::auth_expired());
    }

    #[tokio::test]
    async fn test_notifications_disabled_still_tracks() {
        let mut h = harness(ScriptedExecutor::new(vec![body(95.0, 0.0)]));
        h.monitor = h.monitor.with_notifications(false);

        let report = h.monitor.run_once().await;

        assert_eq!(report.events.len(), 4);
        assert!(h.presenter.notifications.lock().unwrap().is_empty());
        assert!(h.monitor.tracker().quota_state(QuotaKind::Session).has_fired(90));
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_state_is_persisted_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notification_state.json");

        let mut h = harness(ScriptedExecutor::new(vec![body(55.0, 0.0)]));
        h.monitor = h.monitor.with_state_path(Some(path.clone()));
        assert_eq!(h.monitor.run_once().await.events.len(), 2);

        let restored = load_tracker_state(Some(path.as_path())).await;
        assert_eq!(&restored, h.monitor.tracker().state());

        // A fresh monitor resuming from disk does not re-fire.
        let mut h2 = harness(ScriptedExecutor::new(vec![body(55.0, 0.0)]));
        h2.monitor.tracker =
            ThresholdTracker::with_state(Thresholds::default(), CrossingPolicy::FireAll, restored);
        assert!(h2.monitor.run_once().await.events.is_empty());
    }

    #[tokio::test]
    async fn test_missing_state_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(load_tracker_state(Some(path.as_path())).await, TrackerState::default());
        assert_eq!(load_tracker_state(None).await, TrackerState::default());
    }
}
