//! Expiry countdown for a payment session

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

struct ActiveCountdown {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Once-per-second countdown that fires a callback at the deadline
pub struct CountdownTimer {
    active: Mutex<Option<ActiveCountdown>>,
    remaining_secs: Arc<AtomicU64>,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            remaining_secs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count down to `expires_at`, replacing any running countdown
    pub fn start<F>(&self, expires_at: DateTime<Utc>, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let left = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.start_at(Instant::now() + left, on_expire);
    }

    /// Count down to a deadline on the runtime clock
    pub fn start_at<F>(&self, deadline: Instant, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            previous.stopped.store(true, Ordering::SeqCst);
            previous.task.abort();
        }

        let left = deadline.saturating_duration_since(Instant::now());
        self.remaining_secs.store(whole_seconds(left), Ordering::SeqCst);

        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(countdown_loop(
            deadline,
            stopped.clone(),
            self.remaining_secs.clone(),
            on_expire,
        ));

        debug!(remaining_secs = whole_seconds(left), "Countdown started");
        *active = Some(ActiveCountdown { stopped, task });
    }

    /// Stop the countdown; safe to call in any state
    pub fn stop(&self) {
        if let Some(current) = self.lock_active().take() {
            current.stopped.store(true, Ordering::SeqCst);
            current.task.abort();
            debug!("Countdown stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|c| !c.stopped.load(Ordering::SeqCst) && !c.task.is_finished())
    }

    /// Time left as of the last tick
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.remaining_secs.load(Ordering::SeqCst))
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveCountdown>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn countdown_loop<F>(
    deadline: Instant,
    stopped: Arc<AtomicBool>,
    remaining_secs: Arc<AtomicU64>,
    on_expire: F,
) where
    F: FnOnce() + Send + 'static,
{
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if stopped.load(Ordering::SeqCst) {
            return;
        }

        let left = deadline.saturating_duration_since(Instant::now());
        remaining_secs.store(whole_seconds(left), Ordering::SeqCst);

        if left.is_zero() {
            if !stopped.swap(true, Ordering::SeqCst) {
                info!("Payment window elapsed");
                on_expire();
            }
            return;
        }
    }
}

// partial seconds count as a full second so the display never shows 0:00 early
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
