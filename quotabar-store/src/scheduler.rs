//! Refresh scheduling.
//!
//! The [`Scheduler`] fires the pipeline on a fixed interval and whenever a
//! [`RefreshHandle`] asks for an update. Runs are awaited inline, so at most
//! one is ever in flight; a manual request that arrives during a run is
//! rejected rather than queued.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Something the scheduler runs once per accepted trigger.
#[async_trait]
pub trait Pipeline: Send {
    /// Runs one cycle. Failures are the pipeline's own business.
    async fn run(&mut self);
}

// ============================================================================
// Refresh Handle
// ============================================================================

/// Answer to a manual refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A run will start shortly.
    Accepted,
    /// A run is in flight; the request was dropped.
    Busy,
    /// The scheduler has stopped.
    Stopped,
}

/// Cloneable "update now" button.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<()>,
    busy: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Requests an immediate run.
    pub fn trigger(&self) -> TriggerOutcome {
        if self.busy.load(Ordering::SeqCst) {
            debug!("Refresh already in progress, ignoring trigger");
            return TriggerOutcome::Busy;
        }

        match self.tx.try_send(()) {
            // A full channel already holds a pending request.
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => TriggerOutcome::Accepted,
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Stopped,
        }
    }

    /// Returns true while a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

enum Trigger {
    Tick,
    Manual,
}

/// Drives a [`Pipeline`] on an interval plus manual triggers.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    busy: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a scheduler and the handle that triggers it.
    pub fn new(interval: Duration) -> (Self, RefreshHandle) {
        let (tx, trigger_rx) = mpsc::channel(1);
        let busy = Arc::new(AtomicBool::new(false));

        let scheduler = Self {
            interval,
            trigger_rx,
            busy: busy.clone(),
        };
        (scheduler, RefreshHandle { tx, busy })
    }

    /// The automatic refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// The first run starts immediately. A shutdown request during a run
    /// takes effect once that run returns.
    pub async fn run<P: Pipeline>(mut self, pipeline: &mut P, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut manual_open = true;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let trigger = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                msg = self.trigger_rx.recv(), if manual_open => match msg {
                    Some(()) => Trigger::Manual,
                    None => {
                        debug!("All refresh handles dropped");
                        manual_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => Trigger::Tick,
            };

            match trigger {
                Trigger::Tick => debug!("Scheduled refresh"),
                Trigger::Manual => debug!("Manual refresh"),
            }

            self.busy.store(true, Ordering::SeqCst);
            pipeline.run().await;
            self.busy.store(false, Ordering::SeqCst);

            // Anything that slipped in between the trigger and the busy flag
            // is stale now.
            while self.trigger_rx.try_recv().is_ok() {}

            if matches!(trigger, Trigger::Manual) {
                ticker.reset();
            }
        }

        info!("Scheduler stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
