//! Recurring payment status check
//!
//! One poll loop per poller. The loop asks the backend at a fixed interval
//! whether the referenced payment arrived, reports a confirmation once and
//! stops itself. Failed ticks are logged and retried on the next tick.

use crate::domain::gateway::{PaymentGateway, PaymentReference};
use crate::shared::metrics::FlowMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

struct ActivePoll {
    reference: PaymentReference,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ActivePoll {
    fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    fn halt(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Cancellable repeating status check
pub struct StatusPoller {
    gateway: Arc<dyn PaymentGateway>,
    interval: Duration,
    metrics: Arc<FlowMetrics>,
    active: Mutex<Option<ActivePoll>>,
}

impl StatusPoller {
    pub fn new(gateway: Arc<dyn PaymentGateway>, interval: Duration, metrics: Arc<FlowMetrics>) -> Self {
        Self {
            gateway,
            interval,
            metrics,
            active: Mutex::new(None),
        }
    }

    /// Start polling `reference`; the first check runs immediately
    ///
    /// Returns `false` without doing anything when a poll for the same
    /// reference is already running. A poll for another reference is
    /// replaced.
    pub fn start<F>(&self, reference: PaymentReference, on_confirmed: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut active = self.lock_active();
        if let Some(current) = active.as_ref() {
            if current.reference == reference && current.is_running() {
                debug!(order_id = %reference.order_id, "Status poll already running");
                return false;
            }
            current.halt();
        }

        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(poll_loop(
            self.gateway.clone(),
            self.metrics.clone(),
            reference.clone(),
            self.interval,
            stopped.clone(),
            on_confirmed,
        ));

        info!(
            order_id = %reference.order_id,
            payment_id = ?reference.payment_id,
            interval_secs = self.interval.as_secs(),
            "Status poll started"
        );
        *active = Some(ActivePoll { reference, stopped, task });
        true
    }

    /// Halt future ticks; idempotent
    pub fn stop(&self) {
        if let Some(current) = self.lock_active().take() {
            current.halt();
            debug!(order_id = %current.reference.order_id, "Status poll stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_active().as_ref().is_some_and(ActivePoll::is_running)
    }

    /// Reference of the current poll, if any
    pub fn reference(&self) -> Option<PaymentReference> {
        self.lock_active().as_ref().map(|p| p.reference.clone())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActivePoll>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<F>(
    gateway: Arc<dyn PaymentGateway>,
    metrics: Arc<FlowMetrics>,
    reference: PaymentReference,
    interval: Duration,
    stopped: Arc<AtomicBool>,
    on_confirmed: F,
) where
    F: FnOnce() + Send + 'static,
{
    let mut on_confirmed = Some(on_confirmed);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        metrics.record_poll();
        match gateway.is_paid(&reference).await {
            Ok(true) => {
                if !stopped.swap(true, Ordering::SeqCst) {
                    info!(order_id = %reference.order_id, "Payment confirmed by backend");
                    if let Some(callback) = on_confirmed.take() {
                        callback();
                    }
                }
                break;
            }
            Ok(false) => {
                debug!(order_id = %reference.order_id, "Payment not received yet");
            }
            Err(e) => {
                metrics.record_poll_error();
                warn!(
                    order_id = %reference.order_id,
                    error = %e,
                    "Payment status check failed, retrying on next tick"
                );
            }
        }
    }
}
