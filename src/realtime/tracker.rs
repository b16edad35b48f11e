use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::order::OrderStatus;
use crate::realtime::events::ServerEvent;
use crate::realtime::hub::Hub;
use crate::realtime::room::Room;

const RECONNECT_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocation {
    pub driver_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

/// Consumer-side adapter for tracking one order. Joins `order-{id}` and
/// exposes the latest status, latest driver location, and connection health
/// as watch channels updated purely by incoming events.
///
/// The fan-out layer is a hint, not a source of truth: after a gap the
/// observables hold the last value seen, and `health` tells the consumer
/// when a direct read is worth doing instead. Dropping the tracker leaves
/// the room on every exit path.
pub struct OrderTracker {
    status: watch::Receiver<Option<OrderStatus>>,
    location: watch::Receiver<Option<DriverLocation>>,
    health: watch::Receiver<ConnectionHealth>,
    task: JoinHandle<()>,
}

impl OrderTracker {
    pub fn start(hub: Arc<Hub>, order_id: Uuid) -> Self {
        let (status_tx, status) = watch::channel(None);
        let (location_tx, location) = watch::channel(None);
        let (health_tx, health) = watch::channel(ConnectionHealth::Disconnected);

        let task = tokio::spawn(track(hub, order_id, status_tx, location_tx, health_tx));

        Self {
            status,
            location,
            health,
            task,
        }
    }

    /// Latest order status observed over the wire; `None` until the first
    /// event arrives.
    pub fn status(&self) -> watch::Receiver<Option<OrderStatus>> {
        self.status.clone()
    }

    pub fn location(&self) -> watch::Receiver<Option<DriverLocation>> {
        self.location.clone()
    }

    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn track(
    hub: Arc<Hub>,
    order_id: Uuid,
    status_tx: watch::Sender<Option<OrderStatus>>,
    location_tx: watch::Sender<Option<DriverLocation>>,
    health_tx: watch::Sender<ConnectionHealth>,
) {
    loop {
        health_tx.send_replace(ConnectionHealth::Connecting);

        if hub.is_closed() {
            health_tx.send_replace(ConnectionHealth::Disconnected);
            return;
        }

        // Joining is subscription; the receiver is the room membership and
        // is rebuilt from scratch after every disconnect.
        let mut events = hub.subscribe(Room::Order(order_id));
        health_tx.send_replace(ConnectionHealth::Connected);
        debug!(order_id = %order_id, "tracker joined order room");

        loop {
            match events.recv().await {
                Ok(ServerEvent::OrderStatusUpdate {
                    order_id: event_order,
                    status,
                    ..
                }) if event_order == order_id => {
                    status_tx.send_replace(Some(status));
                }
                Ok(ServerEvent::LocationUpdate {
                    order_id: event_order,
                    driver_id,
                    lat,
                    lng,
                    timestamp,
                }) if event_order == order_id => {
                    location_tx.send_replace(Some(DriverLocation {
                        driver_id,
                        lat,
                        lng,
                        timestamp,
                    }));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    // Delivery is at-most-once; skipped events stay skipped
                    // and the next one carries the current state.
                    warn!(order_id = %order_id, missed, "tracker lagged behind fan-out");
                }
                Err(RecvError::Closed) => break,
            }
        }

        health_tx.send_replace(ConnectionHealth::Disconnected);

        if hub.is_closed() {
            return;
        }

        sleep(RECONNECT_DELAY).await;
    }
}
