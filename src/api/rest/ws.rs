use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::driver::GeoPoint;
use crate::realtime::events::{ClientMessage, ServerEvent};
use crate::realtime::room::Room;
use crate::state::{AppState, LocationSample};

const OUTBOUND_BUFFER: usize = 64;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    state.metrics.ws_connections.inc();
    info!("websocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);
    let mut conn = Connection::new(out_tx);

    let send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => handle_client_message(&state, &mut conn, msg),
            Err(err) => warn!(error = %err, "unparseable client frame"),
        }
    }

    // Membership is connection-scoped: everything joined here leaves here.
    conn.leave_all();
    send_task.abort();
    state.metrics.ws_connections.dec();
    info!("websocket client disconnected");
}

/// Per-connection room membership. Each joined room gets a forwarder task
/// pumping that room's events into the connection's outbound queue.
struct Connection {
    joined: HashMap<Room, JoinHandle<()>>,
    out_tx: mpsc::Sender<ServerEvent>,
}

impl Connection {
    fn new(out_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            joined: HashMap::new(),
            out_tx,
        }
    }

    fn join(&mut self, state: &AppState, room: Room) {
        if self.joined.contains_key(&room) {
            return;
        }

        let mut events = state.hub.subscribe(room);
        let out = self.out_tx.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if out.send(event).await.is_err() {
                            break;
                        }
                    }
                    // At-most-once: lagged events are gone for this client.
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.joined.insert(room, forwarder);
    }

    fn leave(&mut self, room: Room) {
        if let Some(forwarder) = self.joined.remove(&room) {
            forwarder.abort();
        }
    }

    fn leave_all(&mut self) {
        for (_, forwarder) in self.joined.drain() {
            forwarder.abort();
        }
    }
}

fn handle_client_message(state: &AppState, conn: &mut Connection, msg: ClientMessage) {
    let now = Utc::now();

    match msg {
        ClientMessage::JoinOrder { id, ticket } => try_join(state, conn, Room::Order(id), &ticket),
        ClientMessage::JoinRestaurant { id, ticket } => {
            try_join(state, conn, Room::Restaurant(id), &ticket)
        }
        ClientMessage::JoinUser { id, ticket } => try_join(state, conn, Room::User(id), &ticket),
        ClientMessage::JoinDriver { id, ticket } => {
            try_join(state, conn, Room::Driver(id), &ticket)
        }
        ClientMessage::LeaveOrder { id } => conn.leave(Room::Order(id)),
        ClientMessage::DriverLocationUpdate { order_id, lat, lng } => {
            // The driver identity comes from the delivery bound to the
            // order, not from the frame.
            let Some(driver_id) = state
                .store
                .delivery_for_order(order_id)
                .and_then(|delivery| delivery.driver_id)
            else {
                debug!(order_id = %order_id, "location update for order with no driver");
                return;
            };

            // Broadcast-only hot path; persistence happens in the flush task.
            state.live_locations.insert(
                driver_id,
                LocationSample {
                    point: GeoPoint { lat, lng },
                    recorded_at: now,
                },
            );

            let event = ServerEvent::LocationUpdate {
                order_id,
                driver_id,
                lat,
                lng,
                timestamp: now,
            };
            state.hub.broadcast(Room::Order(order_id), event.clone());
            state
                .metrics
                .events_broadcast_total
                .with_label_values(&[event.kind()])
                .inc();
        }
        ClientMessage::DeliveryStatusUpdate {
            order_id,
            restaurant_id,
            status,
        } => {
            // Relay path used by driver/owner clients; the REST transition
            // already emitted the authoritative event.
            let event = ServerEvent::OrderStatusUpdate {
                order_id,
                status,
                timestamp: now,
            };
            for room in [Room::Order(order_id), Room::Restaurant(restaurant_id)] {
                state.hub.broadcast(room, event.clone());
                state
                    .metrics
                    .events_broadcast_total
                    .with_label_values(&[event.kind()])
                    .inc();
            }
        }
    }
}

fn try_join(state: &AppState, conn: &mut Connection, room: Room, ticket: &str) {
    match state.tickets.verify(ticket, room, Utc::now()) {
        Ok(()) => {
            conn.join(state, room);
            debug!(room = %room, "client joined room");
        }
        Err(err) => {
            warn!(room = %room, error = %err, "rejected room join");
        }
    }
}
