//! Per-quota threshold-crossing state machine.
//!
//! Each quota keeps the set of thresholds already notified in its current
//! reset cycle. Observing a new reading first checks whether the previously
//! recorded reset time has passed (clearing the set if so), then fires every
//! configured threshold the reading has reached that has not fired yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::models::{NotificationEvent, QuotaKind, QuotaReading, UsageSnapshot};
use crate::thresholds::{CrossingPolicy, Thresholds};

// ============================================================================
// Quota State
// ============================================================================

/// Notification memory for one quota's current reset cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// Thresholds already notified since the last observed reset.
    #[serde(default)]
    fired: BTreeSet<u8>,
    /// Reset time recorded from the previous observation.
    #[serde(default)]
    resets_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    /// Thresholds already fired this cycle, ascending.
    pub fn fired(&self) -> &BTreeSet<u8> {
        &self.fired
    }

    /// Reset time recorded from the previous observation.
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        self.resets_at
    }

    /// Returns true if `threshold` already fired this cycle.
    pub fn has_fired(&self, threshold: u8) -> bool {
        self.fired.contains(&threshold)
    }

    fn clear(&mut self) {
        self.fired.clear();
    }
}

/// Notification memory for both quotas. This is what gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    /// Session quota state.
    #[serde(default, rename = "five_hour")]
    pub session: QuotaState,
    /// Weekly quota state.
    #[serde(default, rename = "seven_day")]
    pub weekly: QuotaState,
}

impl TrackerState {
    /// Returns the state of one quota.
    pub fn get(&self, quota: QuotaKind) -> &QuotaState {
        match quota {
            QuotaKind::Session => &self.session,
            QuotaKind::Weekly => &self.weekly,
        }
    }

    fn get_mut(&mut self, quota: QuotaKind) -> &mut QuotaState {
        match quota {
            QuotaKind::Session => &mut self.session,
            QuotaKind::Weekly => &mut self.weekly,
        }
    }
}

// ============================================================================
// Threshold Tracker
// ============================================================================

/// Decides which notifications fire for each new reading.
///
/// The tracker never fails: any state it is handed is sanitized against the
/// configured thresholds, and an absent state means nothing has fired yet.
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    thresholds: Thresholds,
    policy: CrossingPolicy,
    state: TrackerState,
}

impl ThresholdTracker {
    /// Creates a tracker with empty state for both quotas.
    pub fn new(thresholds: Thresholds, policy: CrossingPolicy) -> Self {
        Self::with_state(thresholds, policy, TrackerState::default())
    }

    /// Creates a tracker resuming from previously saved state.
    ///
    /// Fired values that are not configured thresholds (e.g. after the
    /// threshold list changed) are dropped.
    pub fn with_state(thresholds: Thresholds, policy: CrossingPolicy, mut state: TrackerState) -> Self {
        for quota in QuotaKind::ALL {
            let quota_state = state.get_mut(quota);
            let before = quota_state.fired.len();
            quota_state.fired.retain(|t| thresholds.contains(*t));
            if quota_state.fired.len() != before {
                debug!(quota = %quota, "Dropped unknown thresholds from restored state");
            }
        }

        Self {
            thresholds,
            policy,
            state,
        }
    }

    /// Configured thresholds.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Crossing policy in effect.
    pub fn policy(&self) -> CrossingPolicy {
        self.policy
    }

    /// Current state of both quotas.
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Current state of one quota.
    pub fn quota_state(&self, quota: QuotaKind) -> &QuotaState {
        self.state.get(quota)
    }

    /// Feeds one quota's reading through the state machine.
    ///
    /// Returns the events to deliver, in ascending threshold order.
    ///
    /// Thresholds compare against the unrounded percentage, so 74.6 shows
    /// as `75%` on the status line but has not crossed 75 yet.
    pub fn observe(
        &mut self,
        quota: QuotaKind,
        reading: &QuotaReading,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        let state = self.state.get_mut(quota);

        if let Some(previous_reset) = state.resets_at {
            if now >= previous_reset && !state.fired.is_empty() {
                debug!(quota = %quota, reset = %previous_reset, "Reset boundary passed, clearing fired thresholds");
                state.clear();
            }
        }
        state.resets_at = Some(reading.resets_at);

        let crossed: Vec<u8> = self
            .thresholds
            .iter()
            .filter(|&t| reading.percent >= f64::from(t) && !state.fired.contains(&t))
            .collect();

        if crossed.is_empty() {
            return Vec::new();
        }

        state.fired.extend(crossed.iter().copied());

        let to_emit: &[u8] = match self.policy {
            CrossingPolicy::FireAll => &crossed,
            CrossingPolicy::HighestOnly => &crossed[crossed.len() - 1..],
        };

        debug!(
            quota = %quota,
            percent = reading.percent,
            crossed = ?crossed,
            emitted = to_emit.len(),
            "Thresholds crossed"
        );

        to_emit
            .iter()
            .map(|&threshold| NotificationEvent {
                quota,
                threshold,
                percent_at_fire: reading.percent,
                timestamp: now,
            })
            .collect()
    }

    /// Feeds both quotas of a snapshot, session first.
    pub fn observe_snapshot(
        &mut self,
        snapshot: &UsageSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        QuotaKind::ALL
            .into_iter()
            .flat_map(|quota| self.observe(quota, snapshot.reading(quota), now))
            .collect()
    }

    /// Forgets everything fired for one quota.
    pub fn reset(&mut self, quota: QuotaKind) {
        self.state.get_mut(quota).clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn tracker() -> ThresholdTracker {
        ThresholdTracker::new(Thresholds::default(), CrossingPolicy::FireAll)
    }

    fn thresholds_of(events: &[NotificationEvent]) -> Vec<u8> {
        events.iter().map(|e| e.threshold).collect()
    }

    #[test]
    fn test_monotonic_sequence_fires_each_threshold_once() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(10.0, reset), t0());
        assert!(events.is_empty());

        let events = tracker.observe(
            QuotaKind::Session,
            &QuotaReading::new(30.0, reset),
            t0() + Duration::minutes(3),
        );
        assert_eq!(thresholds_of(&events), vec![25]);

        let events = tracker.observe(
            QuotaKind::Session,
            &QuotaReading::new(60.0, reset),
            t0() + Duration::minutes(6),
        );
        assert_eq!(thresholds_of(&events), vec![50]);
    }

    #[test]
    fn test_single_tick_jump_fires_all_crossed_in_order() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);

        tracker.observe(QuotaKind::Session, &QuotaReading::new(0.0, reset), t0());
        let events = tracker.observe(
            QuotaKind::Session,
            &QuotaReading::new(80.0, reset),
            t0() + Duration::minutes(3),
        );

        assert_eq!(thresholds_of(&events), vec![25, 50, 75]);
        assert!(events.iter().all(|e| e.percent_at_fire == 80.0));
        assert!(events.iter().all(|e| e.quota == QuotaKind::Session));
    }

    #[test]
    fn test_threshold_compares_unrounded_percent() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);

        let reading = QuotaReading::new(74.6, reset);
        assert_eq!(reading.rounded_percent(), 75);
        let events = tracker.observe(QuotaKind::Session, &reading, t0());
        assert_eq!(thresholds_of(&events), vec![25, 50]);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(75.0, reset), t0());
        assert_eq!(thresholds_of(&events), vec![75]);
    }

    #[test]
    fn test_highest_only_policy() {
        let mut tracker = ThresholdTracker::new(Thresholds::default(), CrossingPolicy::HighestOnly);
        let reset = t0() + Duration::hours(5);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(80.0, reset), t0());
        assert_eq!(thresholds_of(&events), vec![75]);

        // Lower thresholds were marked as fired and stay quiet.
        let fired: Vec<u8> = tracker.quota_state(QuotaKind::Session).fired().iter().copied().collect();
        assert_eq!(fired, vec![25, 50, 75]);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(92.0, reset), t0());
        assert_eq!(thresholds_of(&events), vec![90]);
    }

    #[test]
    fn test_same_reading_twice_is_idempotent() {
        let mut tracker = tracker();
        let reading = QuotaReading::new(55.0, t0() + Duration::hours(5));

        let first = tracker.observe(QuotaKind::Weekly, &reading, t0());
        assert_eq!(thresholds_of(&first), vec![25, 50]);

        let second = tracker.observe(QuotaKind::Weekly, &reading, t0() + Duration::minutes(3));
        assert!(second.is_empty());
    }

    #[test]
    fn test_reset_boundary_rearms_thresholds() {
        let mut tracker = tracker();
        let first_reset = t0() + Duration::hours(5);
        let second_reset = first_reset + Duration::hours(5);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(60.0, first_reset), t0());
        assert_eq!(thresholds_of(&events), vec![25, 50]);

        // Before the boundary nothing re-fires.
        let events = tracker.observe(
            QuotaKind::Session,
            &QuotaReading::new(60.0, first_reset),
            first_reset - Duration::seconds(1),
        );
        assert!(events.is_empty());

        // Exactly at the boundary the cycle rolls over.
        let events = tracker.observe(
            QuotaKind::Session,
            &QuotaReading::new(30.0, second_reset),
            first_reset,
        );
        assert_eq!(thresholds_of(&events), vec![25]);
        assert_eq!(
            tracker.quota_state(QuotaKind::Session).resets_at(),
            Some(second_reset)
        );
    }

    #[test]
    fn test_dropping_usage_without_reset_does_not_rearm() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);

        tracker.observe(QuotaKind::Session, &QuotaReading::new(55.0, reset), t0());
        tracker.observe(QuotaKind::Session, &QuotaReading::new(5.0, reset), t0());
        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(55.0, reset), t0());

        assert!(events.is_empty());
    }

    #[test]
    fn test_quotas_are_independent() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);

        let events = tracker.observe(QuotaKind::Session, &QuotaReading::new(30.0, reset), t0());
        assert_eq!(thresholds_of(&events), vec![25]);

        let events = tracker.observe(QuotaKind::Weekly, &QuotaReading::new(30.0, reset), t0());
        assert_eq!(thresholds_of(&events), vec![25]);
        assert_eq!(events[0].quota, QuotaKind::Weekly);
    }

    #[test]
    fn test_observe_snapshot_orders_session_first() {
        let mut tracker = tracker();
        let reset = t0() + Duration::hours(5);
        let snapshot = UsageSnapshot::new(
            QuotaReading::new(51.0, reset),
            QuotaReading::new(26.0, reset),
            t0(),
        );

        let events = tracker.observe_snapshot(&snapshot, t0());
        let order: Vec<(QuotaKind, u8)> = events.iter().map(|e| (e.quota, e.threshold)).collect();
        assert_eq!(
            order,
            vec![
                (QuotaKind::Session, 25),
                (QuotaKind::Session, 50),
                (QuotaKind::Weekly, 25)
            ]
        );
    }

    #[test]
    fn test_restored_state_drops_unknown_thresholds() {
        let mut state = TrackerState::default();
        state.session.fired.extend([25, 33, 50]);

        let tracker = ThresholdTracker::with_state(Thresholds::default(), CrossingPolicy::FireAll, state);
        let fired: Vec<u8> = tracker.quota_state(QuotaKind::Session).fired().iter().copied().collect();
        assert_eq!(fired, vec![25, 50]);
    }

    #[test]
    fn test_manual_reset() {
        let mut tracker = tracker();
        let reading = QuotaReading::new(30.0, t0() + Duration::hours(5));

        tracker.observe(QuotaKind::Session, &reading, t0());
        tracker.reset(QuotaKind::Session);
        let events = tracker.observe(QuotaKind::Session, &reading, t0());

        assert_eq!(thresholds_of(&events), vec![25]);
    }
}
