use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::user::{AuthUser, Role};
use crate::realtime::room::Room;
use crate::state::AppState;

use super::{ApiResponse, ok};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/realtime/tickets", post(issue_ticket))
}

#[derive(Deserialize)]
pub struct TicketRequest {
    pub room: Room,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub room: Room,
    pub ticket: String,
}

/// Issues a join capability for one room. Entitlement mirrors the REST read
/// paths: you can only watch what you could fetch.
async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Json(payload): Json<TicketRequest>,
) -> Result<Json<ApiResponse<TicketResponse>>, AppError> {
    entitled(&state, &actor, payload.room)?;

    let ticket = state.tickets.issue(payload.room, Utc::now());
    Ok(ok(TicketResponse {
        room: payload.room,
        ticket,
    }))
}

fn entitled(state: &AppState, actor: &AuthUser, room: Room) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }

    let allowed = match room {
        Room::Order(order_id) => {
            let order = state
                .store
                .order(order_id)
                .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

            order.customer_id == actor.id
                || state
                    .store
                    .restaurant(order.restaurant_id)
                    .is_some_and(|restaurant| restaurant.owner_id == actor.id)
                || state
                    .store
                    .delivery_for_order(order_id)
                    .is_some_and(|delivery| delivery.driver_id == Some(actor.id))
        }
        Room::Restaurant(restaurant_id) => state
            .store
            .restaurant(restaurant_id)
            .ok_or_else(|| AppError::NotFound(format!("restaurant {restaurant_id} not found")))?
            .owner_id
            == actor.id,
        Room::User(user_id) => user_id == actor.id,
        Room::Driver(driver_id) => driver_id == actor.id && actor.role == Role::Driver,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "not entitled to this room".to_string(),
        ))
    }
}
