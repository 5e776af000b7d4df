use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::settings::DeliverySettings;

/// Source of the current store-local time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Tz>;
}

#[derive(Debug, Clone, Copy)]
pub struct StoreClock {
    tz: Tz,
}

impl StoreClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for StoreClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Anything that can hand out the settings currently in force.
pub trait SettingsSource: Send + Sync + 'static {
    fn current(&self) -> DeliverySettings;
}

impl SettingsSource for DeliverySettings {
    fn current(&self) -> DeliverySettings {
        self.clone()
    }
}

/// `start <= hour < end`; an end of 24 keeps the store open until midnight.
pub fn is_ordering_allowed<T: Timelike>(now: &T, settings: &DeliverySettings) -> bool {
    let hour = now.hour();
    settings.order_start_hour <= hour && hour < settings.order_end_hour
}

pub fn ordering_hours_message(settings: &DeliverySettings) -> String {
    format!(
        "Orders accepted {}:00–{}:00.",
        settings.order_start_hour, settings.order_end_hour
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ordering is currently closed. {hours_message}")]
pub struct OrderingClosed {
    pub hours_message: String,
}

/// Submit-time gate. Always evaluated against the clock, never a cached status.
pub fn check_ordering_allowed<T: Timelike>(
    now: &T,
    settings: &DeliverySettings,
) -> Result<(), OrderingClosed> {
    if is_ordering_allowed(now, settings) {
        Ok(())
    } else {
        Err(OrderingClosed {
            hours_message: ordering_hours_message(settings),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    pub accepting_orders: bool,
    pub hours_message: String,
}

impl WindowStatus {
    pub fn evaluate<T: Timelike>(now: &T, settings: &DeliverySettings) -> Self {
        Self {
            accepting_orders: is_ordering_allowed(now, settings),
            hours_message: ordering_hours_message(settings),
        }
    }
}

/// Periodically re-evaluates the order window for as long as it is held.
///
/// The status it publishes is advisory. Dropping the monitor cancels the
/// background task.
pub struct OrderWindowMonitor {
    rx: watch::Receiver<WindowStatus>,
    cancel: CancellationToken,
}

impl OrderWindowMonitor {
    pub fn spawn(
        clock: Arc<dyn Clock>,
        settings: Arc<dyn SettingsSource>,
        period: Duration,
    ) -> Self {
        let initial = WindowStatus::evaluate(&clock.now(), &settings.current());
        let (tx, rx) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately and the initial status is already published
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let status = WindowStatus::evaluate(&clock.now(), &settings.current());
                        tx.send_if_modified(|current| {
                            if *current == status {
                                return false;
                            }
                            tracing::info!(
                                accepting_orders = status.accepting_orders,
                                hours = %status.hours_message,
                                "Order window changed"
                            );
                            *current = status;
                            true
                        });
                    }
                }
            }

            tracing::debug!("Order window monitor stopped");
        });

        Self { rx, cancel }
    }

    pub fn status(&self) -> WindowStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. `None` once the monitor task has ended.
    pub async fn changed(&mut self) -> Option<WindowStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for OrderWindowMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use chrono_tz::Europe::Belgrade;

    use super::*;

    fn at_hour(hour: u32, minute: u32) -> DateTime<Tz> {
        Belgrade
            .with_ymd_and_hms(2025, 3, 14, hour, minute, 0)
            .unwrap()
    }

    fn scenario_settings() -> DeliverySettings {
        DeliverySettings {
            order_start_hour: 8,
            order_end_hour: 20,
            ..Default::default()
        }
    }

    struct FixedClock(Mutex<DateTime<Tz>>);

    impl FixedClock {
        fn set(&self, now: DateTime<Tz>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Tz> {
            *self.0.lock().unwrap()
        }
    }

    struct CountingSource {
        settings: DeliverySettings,
        reads: Arc<AtomicUsize>,
    }

    impl SettingsSource for CountingSource {
        fn current(&self) -> DeliverySettings {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.settings.clone()
        }
    }

    #[test]
    fn window_is_half_open() {
        let settings = scenario_settings();
        assert!(!is_ordering_allowed(&at_hour(7, 59), &settings));
        assert!(is_ordering_allowed(&at_hour(8, 0), &settings));
        assert!(is_ordering_allowed(&at_hour(19, 59), &settings));
        assert!(!is_ordering_allowed(&at_hour(20, 0), &settings));
        assert!(!is_ordering_allowed(&at_hour(21, 0), &settings));
    }

    #[test]
    fn end_hour_24_means_open_until_midnight() {
        let settings = DeliverySettings {
            order_start_hour: 0,
            order_end_hour: 24,
            ..Default::default()
        };
        assert!(is_ordering_allowed(&at_hour(0, 0), &settings));
        assert!(is_ordering_allowed(&at_hour(23, 59), &settings));
    }

    #[test]
    fn closed_gate_explains_hours() {
        let err = check_ordering_allowed(&at_hour(21, 0), &scenario_settings()).unwrap_err();
        assert!(err.to_string().contains("8:00–20:00"), "{err}");
        assert_eq!(err.hours_message, "Orders accepted 8:00–20:00.");
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_publishes_window_closing() {
        let clock = Arc::new(FixedClock(Mutex::new(at_hour(19, 59))));
        let mut monitor = OrderWindowMonitor::spawn(
            clock.clone(),
            Arc::new(scenario_settings()),
            Duration::from_secs(60),
        );
        assert!(monitor.status().accepting_orders);

        clock.set(at_hour(20, 0));
        let status = monitor.changed().await.unwrap();
        assert!(!status.accepting_orders);
        assert!(!monitor.status().accepting_orders);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_monitor_stops_rechecks() {
        let reads = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            settings: scenario_settings(),
            reads: reads.clone(),
        };
        let clock = Arc::new(FixedClock(Mutex::new(at_hour(10, 0))));
        let monitor =
            OrderWindowMonitor::spawn(clock, Arc::new(source), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(150)).await;
        let while_held = reads.load(Ordering::SeqCst);
        assert!(while_held >= 2, "expected periodic reads, got {while_held}");

        drop(monitor);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(reads.load(Ordering::SeqCst), while_held);
    }
}
