use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

/// Messages a connected client may send. `event` selects the variant,
/// `data` carries the payload, matching the browser client's frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    JoinOrder { id: Uuid, ticket: String },
    JoinRestaurant { id: Uuid, ticket: String },
    JoinUser { id: Uuid, ticket: String },
    JoinDriver { id: Uuid, ticket: String },
    LeaveOrder { id: Uuid },
    DriverLocationUpdate { order_id: Uuid, lat: f64, lng: f64 },
    DeliveryStatusUpdate {
        order_id: Uuid,
        restaurant_id: Uuid,
        status: OrderStatus,
    },
}

/// Events fanned out to room subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    OrderStatusUpdate {
        order_id: Uuid,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    LocationUpdate {
        order_id: Uuid,
        driver_id: Uuid,
        lat: f64,
        lng: f64,
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::OrderStatusUpdate { .. } => "order-status-update",
            ServerEvent::LocationUpdate { .. } => "location-update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_join_frame_parses() {
        let raw = json!({
            "event": "join-order",
            "data": { "id": "00000000-0000-0000-0000-000000000042", "ticket": "abc" }
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, ClientMessage::JoinOrder { .. }));
    }

    #[test]
    fn client_location_frame_uses_camel_case_fields() {
        let raw = json!({
            "event": "driver-location-update",
            "data": {
                "orderId": "00000000-0000-0000-0000-000000000042",
                "lat": 52.52,
                "lng": 13.405
            }
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ClientMessage::DriverLocationUpdate { lat, .. } => assert_eq!(lat, 52.52),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn server_status_event_serializes_to_wire_shape() {
        let event = ServerEvent::OrderStatusUpdate {
            order_id: uuid::Uuid::nil(),
            status: OrderStatus::OutForDelivery,
            timestamp: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "order-status-update");
        assert_eq!(value["data"]["status"], "out_for_delivery");
        assert!(value["data"]["orderId"].is_string());
    }
}
