//! Payment flow controller
//!
//! Owns the single active [`PaymentSession`] of a checkout and drives it
//! through `idle → initializing → awaiting_payment → {completed | expired |
//! cancelled}`. While awaiting payment a [`StatusPoller`] and a
//! [`CountdownTimer`] run concurrently. Neither touches the session: both
//! send events to a driver task that applies them one at a time under the
//! controller lock, confirmations first. Expiry is only committed after one
//! last status check, so a payment confirmed at the deadline is never
//! reported as expired.

use crate::application::services::countdown::CountdownTimer;
use crate::application::services::status_poller::StatusPoller;
use crate::config::AppConfig;
use crate::domain::currency::{ConversionTable, Currency};
use crate::domain::flow::{CheckoutHost, CloseReason, FlowState, PaymentView};
use crate::domain::gateway::{CheckoutOrder, PaymentGateway};
use crate::domain::payments::PaymentSession;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;
use crate::shared::metrics::FlowMetrics;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Timing and defaults for new sessions
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub default_currency: Currency,
    pub poll_interval: Duration,
    pub session_window: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            default_currency: config.default_currency()?,
            poll_interval: config.poll_interval(),
            session_window: config.session_window(),
        })
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            default_currency: Currency::Usdt,
            poll_interval: Duration::from_secs(10),
            session_window: Duration::from_secs(900),
        }
    }
}

/// Signals from the background tasks; the derive order is the apply order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FlowEvent {
    Confirmed,
    Expired,
}

/// Host callback decided under the lock, invoked after releasing it
enum HostNotice {
    Success(PaymentSession),
    Close(CloseReason),
}

struct FlowInner {
    state: FlowState,
    session: Option<PaymentSession>,
    generation: u64,
    /// Bumped by every currency switch request; the latest one wins
    switch_seq: u64,
    events: Option<UnboundedSender<FlowEvent>>,
    driver: Option<JoinHandle<()>>,
    host_notified: bool,
}

struct FlowShared {
    gateway: Arc<dyn PaymentGateway>,
    table: Arc<ConversionTable>,
    host: Arc<dyn CheckoutHost>,
    metrics: Arc<FlowMetrics>,
    poller: StatusPoller,
    timer: CountdownTimer,
    inner: Mutex<FlowInner>,
}

/// Orchestrates one checkout's payment
pub struct PaymentFlowController {
    shared: Arc<FlowShared>,
    settings: FlowSettings,
}

impl PaymentFlowController {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        table: Arc<ConversionTable>,
        host: Arc<dyn CheckoutHost>,
        metrics: Arc<FlowMetrics>,
        settings: FlowSettings,
    ) -> Self {
        let poller = StatusPoller::new(gateway.clone(), settings.poll_interval, metrics.clone());
        let shared = FlowShared {
            gateway,
            table,
            host,
            metrics,
            poller,
            timer: CountdownTimer::new(),
            inner: Mutex::new(FlowInner {
                state: FlowState::Idle,
                session: None,
                generation: 0,
                switch_seq: 0,
                events: None,
                driver: None,
                host_notified: false,
            }),
        };
        Self {
            shared: Arc::new(shared),
            settings,
        }
    }

    pub fn state(&self) -> FlowState {
        self.shared.lock_inner().state
    }

    pub fn session(&self) -> Option<PaymentSession> {
        self.shared.lock_inner().session.clone()
    }

    /// What the payment modal shows right now
    pub fn view(&self) -> Option<PaymentView> {
        let inner = self.shared.lock_inner();
        self.shared.view_of(&inner)
    }

    /// Open the flow for `order`, discarding any previous session
    ///
    /// `currency` defaults to the configured currency.
    pub async fn start(&self, order: &CheckoutOrder, currency: Option<Currency>) -> AppResult<PaymentView> {
        let currency = currency.unwrap_or(self.settings.default_currency);
        self.shared.table.rate_of(currency)?;
        let session = PaymentSession::new(
            order.order_id.clone(),
            order.total_amount,
            currency,
            self.settings.session_window,
        )?;

        let generation = {
            let mut guard = self.shared.lock_inner();
            let inner = &mut *guard;
            self.shared.teardown(inner);
            if let Some(previous) = inner.session.as_ref() {
                info!(
                    previous_order_id = %previous.order_id(),
                    order_id = %order.order_id,
                    "Replacing payment session"
                );
            }
            inner.generation += 1;
            inner.session = Some(session);
            inner.host_notified = false;
            self.shared.set_state(inner, FlowState::Initializing);
            inner.generation
        };

        self.shared.metrics.record_flow_started();
        self.initialize(generation).await
    }

    /// Re-run initialization after `InitializationFailed`
    pub async fn retry(&self) -> AppResult<PaymentView> {
        let generation = {
            let mut guard = self.shared.lock_inner();
            let inner = &mut *guard;
            if inner.state != FlowState::Idle || inner.session.is_none() {
                return Err(AppError::invalid_transition("retry initialization", inner.state));
            }
            self.shared.set_state(inner, FlowState::Initializing);
            inner.generation
        };
        self.initialize(generation).await
    }

    /// Switch the payment currency without leaving the current state
    pub async fn switch_currency(&self, currency: Currency) -> AppResult<PaymentView> {
        let (generation, state, seq, mut session) = {
            let mut inner = self.shared.lock_inner();
            if inner.state == FlowState::Initializing {
                return Err(AppError::invalid_transition("switch currency", inner.state));
            }
            let session = inner
                .session
                .clone()
                .ok_or_else(|| AppError::invalid_transition("switch currency", inner.state))?;
            inner.switch_seq += 1;
            (inner.generation, inner.state, inner.switch_seq, session)
        };

        let previous_currency = session.currency();
        session
            .switch_currency(currency, self.shared.gateway.as_ref(), &self.shared.table)
            .await?;

        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        if inner.generation != generation || inner.state != state {
            // the flow moved on while the backend answered
            return Err(AppError::invalid_transition("switch currency", inner.state));
        }
        if inner.switch_seq != seq {
            info!(currency = %currency, "Dropping currency switch superseded by a newer one");
            return Err(AppError::invalid_transition(
                "apply superseded currency switch",
                inner.state,
            ));
        }

        let new_reference = session.reference();
        let restart_poll = state == FlowState::AwaitingPayment
            && self.shared.poller.reference().as_ref() != Some(&new_reference);
        inner.session = Some(session);

        if restart_poll {
            if let Some(events) = inner.events.clone() {
                self.shared.poller.start(new_reference, move || {
                    let _ = events.send(FlowEvent::Confirmed);
                });
            }
        }

        if previous_currency != currency {
            self.shared.metrics.record_currency_switch();
            info!(
                order_id = %inner.session.as_ref().map(|s| s.order_id()).unwrap_or_default(),
                from = %previous_currency,
                to = %currency,
                "Payment currency switched"
            );
        }

        self.shared
            .view_of(inner)
            .ok_or_else(|| AppError::Internal("session vanished during currency switch".into()))
    }

    /// User closed the flow before confirmation
    ///
    /// No-op once the flow reached a terminal state.
    pub fn cancel(&self) {
        let notice = {
            let mut guard = self.shared.lock_inner();
            let inner = &mut *guard;
            let cancellable = matches!(
                inner.state,
                FlowState::Idle | FlowState::Initializing | FlowState::AwaitingPayment
            );
            if !cancellable || inner.session.is_none() {
                return;
            }

            self.shared.teardown(inner);
            if let Some(session) = inner.session.as_mut() {
                if let Err(e) = session.cancel() {
                    warn!(error = %e, "Session refused cancellation");
                }
            }
            self.shared.set_state(inner, FlowState::Cancelled);
            self.shared.metrics.record_outcome(CloseReason::Cancelled.as_str());
            FlowShared::take_notice(inner, HostNotice::Close(CloseReason::Cancelled))
        };
        self.shared.notify(notice);
    }

    /// Stop all background activity without callbacks (host unmount)
    pub fn shutdown(&self) {
        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        self.shared.teardown(inner);
        inner.host_notified = true;
    }

    pub fn is_polling(&self) -> bool {
        self.shared.poller.is_running()
    }

    pub fn is_counting_down(&self) -> bool {
        self.shared.timer.is_running()
    }

    async fn initialize(&self, generation: u64) -> AppResult<PaymentView> {
        let mut session = {
            let inner = self.shared.lock_inner();
            inner
                .session
                .clone()
                .ok_or_else(|| AppError::Internal("no session to initialize".into()))?
        };

        let result = session
            .initialize(self.shared.gateway.as_ref(), &self.shared.table)
            .await;

        let mut guard = self.shared.lock_inner();
        let inner = &mut *guard;
        if inner.generation != generation || inner.state != FlowState::Initializing {
            return Err(AppError::invalid_transition("finish initialization", inner.state));
        }

        if let Err(e) = result {
            LoggingUtils::log_backend_failure(session.order_id(), "create_payment", &e, 1);
            self.shared.set_state(inner, FlowState::Idle);
            return Err(e);
        }

        let reference = session.reference();
        let expires_at = session.expires_at();
        inner.session = Some(session);

        let (events, receiver) = mpsc::unbounded_channel();
        let confirmed = events.clone();
        self.shared.poller.start(reference, move || {
            let _ = confirmed.send(FlowEvent::Confirmed);
        });
        let expired = events.clone();
        self.shared.timer.start(expires_at, move || {
            let _ = expired.send(FlowEvent::Expired);
        });
        inner.events = Some(events);
        inner.driver = Some(tokio::spawn(FlowShared::drive(
            self.shared.clone(),
            generation,
            receiver,
        )));
        self.shared.set_state(inner, FlowState::AwaitingPayment);

        self.shared
            .view_of(inner)
            .ok_or_else(|| AppError::Internal("session vanished during initialization".into()))
    }
}

impl Drop for PaymentFlowController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl FlowShared {
    fn lock_inner(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut FlowInner, next: FlowState) {
        let order_id = inner.session.as_ref().map(|s| s.order_id()).unwrap_or_default();
        LoggingUtils::log_transition(order_id, inner.state.as_str(), next.as_str());
        inner.state = next;
    }

    /// Stop poller, timer and driver of the current session
    fn teardown(&self, inner: &mut FlowInner) {
        self.poller.stop();
        self.timer.stop();
        inner.events = None;
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
    }

    fn take_notice(inner: &mut FlowInner, notice: HostNotice) -> Option<HostNotice> {
        if inner.host_notified {
            None
        } else {
            inner.host_notified = true;
            Some(notice)
        }
    }

    fn notify(&self, notice: Option<HostNotice>) {
        match notice {
            Some(HostNotice::Success(session)) => self.host.on_success(&session),
            Some(HostNotice::Close(reason)) => self.host.on_close(reason),
            None => {}
        }
    }

    async fn drive(shared: Arc<FlowShared>, generation: u64, mut receiver: UnboundedReceiver<FlowEvent>) {
        while let Some(first) = receiver.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = receiver.try_recv() {
                batch.push(next);
            }
            batch.sort();

            // a status check may still be in flight at the deadline
            if batch.first() == Some(&FlowEvent::Expired) {
                if shared.paid_at_deadline(generation).await {
                    batch.push(FlowEvent::Confirmed);
                }
                while let Ok(next) = receiver.try_recv() {
                    batch.push(next);
                }
                batch.sort();
            }

            for event in batch {
                if shared.apply(generation, event) {
                    return;
                }
            }
        }
    }

    /// Last status check before the session is allowed to expire
    ///
    /// Halts the poller first so a check cut short by the deadline is
    /// replaced by this one rather than racing it.
    async fn paid_at_deadline(&self, generation: u64) -> bool {
        let reference = {
            let inner = self.lock_inner();
            if inner.generation != generation || inner.state != FlowState::AwaitingPayment {
                return false;
            }
            self.poller.stop();
            self.timer.stop();
            match inner.session.as_ref() {
                Some(session) => session.reference(),
                None => return false,
            }
        };

        self.metrics.record_poll();
        match self.gateway.is_paid(&reference).await {
            Ok(paid) => {
                info!(order_id = %reference.order_id, paid = paid, "Final status check at deadline");
                paid
            }
            Err(e) => {
                self.metrics.record_poll_error();
                warn!(order_id = %reference.order_id, error = %e, "Final status check failed, expiring");
                false
            }
        }
    }

    /// Apply one event; returns true once the session is finished
    fn apply(&self, generation: u64, event: FlowEvent) -> bool {
        let notice = {
            let mut guard = self.lock_inner();
            let inner = &mut *guard;
            if inner.generation != generation || inner.state != FlowState::AwaitingPayment {
                return true;
            }

            let (next, outcome) = match event {
                FlowEvent::Confirmed => (FlowState::Completed, "completed"),
                FlowEvent::Expired => (FlowState::Expired, "expired"),
            };

            // both stop before the transition so nothing can follow it
            self.timer.stop();
            self.poller.stop();
            inner.events = None;
            inner.driver = None;

            let Some(session) = inner.session.as_mut() else {
                return true;
            };
            let transition = match event {
                FlowEvent::Confirmed => session.complete(),
                FlowEvent::Expired => session.expire(),
            };
            if let Err(e) = transition {
                warn!(error = %e, "Dropping flow event");
                return true;
            }

            let notice = match event {
                FlowEvent::Confirmed => HostNotice::Success(session.clone()),
                FlowEvent::Expired => HostNotice::Close(CloseReason::Expired),
            };
            self.set_state(inner, next);
            self.metrics.record_outcome(outcome);
            Self::take_notice(inner, notice)
        };

        self.notify(notice);
        true
    }

    fn view_of(&self, inner: &FlowInner) -> Option<PaymentView> {
        let session = inner.session.as_ref()?;
        let remaining = match inner.state {
            FlowState::AwaitingPayment => self.timer.remaining().as_secs(),
            state if state.is_terminal() => 0,
            _ => (session.expires_at() - Utc::now()).num_seconds().max(0) as u64,
        };
        let target = session.target();

        Some(PaymentView {
            order_id: session.order_id().to_string(),
            state: inner.state,
            status: session.status(),
            currency: session.currency(),
            amount_fiat: session.amount_fiat(),
            amount_crypto: session.amount_crypto(),
            wallet_address: target.map(|t| t.wallet_address.clone()),
            payment_uri: target.map(|t| t.payment_uri()),
            rate: self.table.describe_rate(session.currency()).ok(),
            expires_at: session.expires_at(),
            remaining_seconds: remaining,
        })
    }
}
