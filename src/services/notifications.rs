//! Order-arrival push channel and the operator alert it triggers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::entities::order;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderArrived {
    pub order_id: i32,
    pub customer_name: String,
    pub address: String,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&order::Model> for OrderArrived {
    fn from(order: &order::Model) -> Self {
        Self {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            address: order.address.clone(),
            total: order.subtotal + order.delivery_fee,
            created_at: order.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Clone)]
pub struct OrderFeed {
    tx: broadcast::Sender<OrderArrived>,
}

impl OrderFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: OrderArrived) -> usize {
        tracing::info!(order_id = event.order_id, "Order arrived");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderArrived> {
        self.tx.subscribe()
    }

    /// Run `handler` for every arrival until the returned subscription is dropped.
    pub fn on_order_arrived<F>(&self, handler: F) -> Subscription
    where
        F: Fn(OrderArrived) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => handler(event),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Order subscriber lagged behind");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription { cancel }
    }
}

pub struct Subscription {
    cancel: CancellationToken,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Operator-facing signal, e.g. a sound or a desktop notification.
pub trait Alerter: Send + Sync + 'static {
    fn ring(&self, pending_orders: usize);
}

pub struct TracingAlerter;

impl Alerter for TracingAlerter {
    fn ring(&self, pending_orders: usize) {
        tracing::warn!(pending_orders, "New order waiting for acknowledgement");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStatus {
    pub alerting: bool,
    pub pending_orders: usize,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct AlertState {
    running: Option<(u64, CancellationToken)>,
    generation: u64,
    pending_orders: usize,
    since: Option<DateTime<Utc>>,
}

struct AlertInner {
    alerter: Arc<dyn Alerter>,
    interval: Duration,
    duration: Duration,
    state: Mutex<AlertState>,
}

impl AlertInner {
    fn state(&self) -> std::sync::MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AlertInner {
    fn drop(&mut self) {
        if let Some((_, token)) = self.state().running.take() {
            token.cancel();
        }
    }
}

/// Repeating alert: rings at once, then every `interval`, until acknowledged
/// or until `duration` has passed since the latest order.
#[derive(Clone)]
pub struct OrderAlert {
    inner: Arc<AlertInner>,
}

impl OrderAlert {
    pub fn new(alerter: Arc<dyn Alerter>, interval: Duration, duration: Duration) -> Self {
        Self {
            inner: Arc::new(AlertInner {
                alerter,
                interval,
                duration,
                state: Mutex::new(AlertState::default()),
            }),
        }
    }

    /// A new order (re)starts the loop with a fresh auto-stop deadline.
    pub fn start(&self, event: &OrderArrived) {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.inner.state();
            if let Some((_, previous)) = state.running.take() {
                previous.cancel();
            }
            state.generation += 1;
            state.pending_orders += 1;
            state.since.get_or_insert(event.created_at);
            state.running = Some((state.generation, token.clone()));
            state.generation
        };

        tracing::info!(order_id = event.order_id, "Order alert started");

        let inner = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        let duration = self.inner.duration;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let deadline = tokio::time::sleep(duration);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return,
                    () = &mut deadline => break,
                    _ = ticker.tick() => {
                        let Some(inner) = inner.upgrade() else { return };
                        let pending = inner.state().pending_orders;
                        inner.alerter.ring(pending);
                    }
                }
            }

            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state();
                if matches!(state.running, Some((current, _)) if current == generation) {
                    state.running = None;
                    tracing::info!(
                        pending_orders = state.pending_orders,
                        "Order alert timed out"
                    );
                }
            }
        });
    }

    /// Stop ringing and forget pending orders. Returns whether anything was
    /// outstanding.
    pub fn acknowledge(&self) -> bool {
        let mut state = self.inner.state();
        let was_pending = state.pending_orders > 0;
        if let Some((_, token)) = state.running.take() {
            token.cancel();
        }
        state.pending_orders = 0;
        state.since = None;
        if was_pending {
            tracing::info!("Order alert acknowledged");
        }
        was_pending
    }

    pub fn is_alerting(&self) -> bool {
        self.inner.state().running.is_some()
    }

    pub fn status(&self) -> AlertStatus {
        let state = self.inner.state();
        AlertStatus {
            alerting: state.running.is_some(),
            pending_orders: state.pending_orders,
            since: state.since,
        }
    }
}
