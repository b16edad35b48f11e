use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::realtime::events::ServerEvent;
use crate::realtime::room::Room;

/// Room-based fan-out broker. One broadcast channel per live room; rooms are
/// created on first subscribe and pruned once the last subscriber is gone.
/// Broadcasting into an empty room drops the event silently.
///
/// Constructed once at startup and injected into both the HTTP layer and the
/// realtime layer; `shutdown` drains every room so connections close.
pub struct Hub {
    rooms: DashMap<Room, broadcast::Sender<ServerEvent>>,
    capacity: usize,
    closed: AtomicBool,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Join a room. The receiver is the membership: dropping it leaves the
    /// room.
    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Fire-and-forget delivery to every current subscriber of `room`.
    /// Returns the number of subscribers reached; zero is not an error.
    pub fn broadcast(&self, room: Room, event: ServerEvent) -> usize {
        let Some(sender) = self.rooms.get(&room).map(|entry| entry.value().clone()) else {
            return 0;
        };

        match sender.send(event) {
            Ok(reached) => reached,
            Err(_) => {
                // Last receiver left between lookup and send; prune the room.
                self.rooms
                    .remove_if(&room, |_, sender| sender.receiver_count() == 0);
                debug!(room = %room, "dropped event for empty room");
                0
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drop every room sender so all subscribers observe a closed channel and
    /// their connections drain.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.rooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::order::OrderStatus;

    fn status_event(order_id: Uuid) -> ServerEvent {
        ServerEvent::OrderStatusUpdate {
            order_id,
            status: OrderStatus::Confirmed,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_for_its_room_only() {
        let hub = Hub::new(16);
        let order_x = Uuid::new_v4();
        let order_y = Uuid::new_v4();

        let mut rx_x = hub.subscribe(Room::Order(order_x));
        let mut rx_y = hub.subscribe(Room::Order(order_y));

        assert_eq!(hub.broadcast(Room::Order(order_x), status_event(order_x)), 1);

        let event = rx_x.recv().await.unwrap();
        match event {
            ServerEvent::OrderStatusUpdate { order_id, .. } => assert_eq!(order_id, order_x),
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(rx_y.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_is_silent() {
        let hub = Hub::new(16);
        assert_eq!(
            hub.broadcast(Room::Order(Uuid::new_v4()), status_event(Uuid::new_v4())),
            0
        );
    }

    #[tokio::test]
    async fn room_pruned_after_last_subscriber_leaves() {
        let hub = Hub::new(16);
        let order = Uuid::new_v4();

        let rx = hub.subscribe(Room::Order(order));
        assert_eq!(hub.room_count(), 1);
        drop(rx);

        hub.broadcast(Room::Order(order), status_event(order));
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_subscribers() {
        let hub = Hub::new(16);
        let mut rx = hub.subscribe(Room::Order(Uuid::new_v4()));

        hub.shutdown();
        assert!(hub.is_closed());
        assert!(matches!(
            rx.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Closed)
        ));
    }
}
