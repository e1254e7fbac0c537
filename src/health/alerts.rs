//! Alert log with per-(exchange, level) cooldown, and the alert publish/subscribe bus

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use crate::types::{Alert, AlertFilter, AlertLevel};

struct AlertLogState {
    alerts: Vec<Alert>,
    last_emitted: HashMap<(String, AlertLevel), Instant>,
    cooldown: Duration,
}

/// Append-only alert history. An alert is recorded only if no alert of the same
/// (exchange, level) was recorded within the cooldown.
pub struct AlertLog {
    state: Mutex<AlertLogState>,
    max_size: usize,
}

impl AlertLog {
    pub fn new(cooldown: Duration, max_size: usize) -> Self {
        Self {
            state: Mutex::new(AlertLogState {
                alerts: Vec::new(),
                last_emitted: HashMap::new(),
                cooldown,
            }),
            max_size,
        }
    }

    /// Passes `candidate` through the cooldown gate. Returns the recorded alert, or `None`
    /// when it was suppressed.
    pub fn try_record(&self, candidate: Alert) -> Option<Alert> {
        let now = Instant::now();
        let key = (candidate.exchange_name.clone(), candidate.level);
        let mut state = self.state.lock();

        if let Some(last) = state.last_emitted.get(&key) {
            if now.saturating_duration_since(*last) < state.cooldown {
                debug!(
                    exchange = %candidate.exchange_name,
                    level = %candidate.level,
                    "Alert suppressed by cooldown"
                );
                return None;
            }
        }

        state.last_emitted.insert(key, now);
        state.alerts.push(candidate.clone());
        if state.alerts.len() > self.max_size {
            let excess = state.alerts.len() - self.max_size;
            state.alerts.drain(..excess);
        }
        Some(candidate)
    }

    pub fn list(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.state
            .lock()
            .alerts
            .iter()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect()
    }

    pub fn resolve(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        match state.alerts.iter_mut().find(|a| a.id == id && !a.resolved) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn set_cooldown(&self, cooldown: Duration) {
        self.state.lock().cooldown = cooldown;
    }

    pub fn len(&self) -> usize {
        self.state.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SubscriptionId = u64;

/// Asynchronous alert consumer. Each delivery runs on its own task.
#[async_trait]
pub trait AlertHandler: Send + Sync {
    async fn on_alert(&self, alert: Alert);
}

enum Subscriber {
    Channel(mpsc::UnboundedSender<Alert>),
    Callback(Arc<dyn Fn(&Alert) + Send + Sync>),
    Handler(Arc<dyn AlertHandler>),
}

/// Publish/subscribe fan-out for recorded alerts.
///
/// Every subscriber registered at publish time receives each alert at least once.
/// No ordering is guaranteed across subscribers; a single channel subscriber sees alerts
/// in publish order. Channel subscribers whose receiver was dropped are pruned on the
/// next publish.
#[derive(Default)]
pub struct AlertBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
}

impl AlertBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers.lock().push((id, subscriber));
        id
    }

    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.add(Subscriber::Channel(tx)), rx)
    }

    /// Runs `callback` inline on the publishing task; keep it short.
    pub fn subscribe_fn(&self, callback: impl Fn(&Alert) + Send + Sync + 'static) -> SubscriptionId {
        self.add(Subscriber::Callback(Arc::new(callback)))
    }

    pub fn subscribe_handler(&self, handler: Arc<dyn AlertHandler>) -> SubscriptionId {
        self.add(Subscriber::Handler(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers `alert` to every subscriber and returns how many accepted it.
    pub fn publish(&self, alert: &Alert) -> usize {
        let mut callbacks = Vec::new();
        let mut handlers = Vec::new();
        let mut delivered = 0;
        {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|(_, subscriber)| match subscriber {
                Subscriber::Channel(tx) => {
                    let open = tx.send(alert.clone()).is_ok();
                    if open {
                        delivered += 1;
                    }
                    open
                }
                Subscriber::Callback(callback) => {
                    callbacks.push(callback.clone());
                    true
                }
                Subscriber::Handler(handler) => {
                    handlers.push(handler.clone());
                    true
                }
            });
        }

        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        for callback in callbacks {
            callback(alert);
            delivered += 1;
        }
        for handler in handlers {
            let alert = alert.clone();
            tokio::spawn(async move { handler.on_alert(alert).await });
            delivered += 1;
        }
        delivered
    }
}
