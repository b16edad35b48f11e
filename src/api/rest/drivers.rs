use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post, put};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::assignment::{self, EarningsSummary};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::{DriverProfile, DriverStatus, GeoPoint};
use crate::models::order::Order;
use crate::models::user::{AuthUser, Role};
use crate::state::AppState;

use super::{ApiResponse, ok, ok_with};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/driver/available-deliveries", get(available_deliveries))
        .route("/driver/deliveries", get(my_deliveries))
        .route("/driver/deliveries/:id/accept", post(accept_delivery))
        .route("/driver/deliveries/:id/status", put(update_delivery_status))
        .route("/driver/earnings", get(driver_earnings))
        .route("/driver/status", patch(update_driver_status))
        .route("/driver/location", patch(update_driver_location))
}

fn require_driver(actor: &AuthUser) -> Result<(), AppError> {
    if actor.role == Role::Driver {
        Ok(())
    } else {
        Err(AppError::Forbidden("driver role required".to_string()))
    }
}

async fn available_deliveries(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    require_driver(&actor)?;
    Ok(ok(assignment::list_available(&state.store)))
}

async fn my_deliveries(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
) -> Result<Json<ApiResponse<Vec<Delivery>>>, AppError> {
    require_driver(&actor)?;
    Ok(ok(assignment::driver_deliveries(&state.store, actor.id)))
}

/// `:id` is the order id; accepting mirrors the claim semantics.
async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Delivery>>, AppError> {
    require_driver(&actor)?;
    let delivery = assignment::claim(&state, id, actor.id)?;
    Ok(ok_with(delivery, "Delivery accepted successfully"))
}

#[derive(Deserialize)]
pub struct UpdateDeliveryStatusRequest {
    pub status: DeliveryStatus,
}

async fn update_delivery_status(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<ApiResponse<Delivery>>, AppError> {
    require_driver(&actor)?;
    let delivery = assignment::update_delivery_status(&state, id, payload.status, actor.id)?;
    Ok(ok_with(delivery, "Delivery status updated successfully"))
}

async fn driver_earnings(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
) -> Result<Json<ApiResponse<EarningsSummary>>, AppError> {
    require_driver(&actor)?;
    Ok(ok(assignment::earnings(&state.store, actor.id, Utc::now())))
}

#[derive(Deserialize)]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Json(payload): Json<UpdateDriverStatusRequest>,
) -> Result<Json<ApiResponse<DriverProfile>>, AppError> {
    require_driver(&actor)?;
    assignment::set_driver_status(&state, actor.id, payload.status)?;

    let profile = state
        .store
        .driver(actor.id)
        .ok_or_else(|| AppError::Internal("driver vanished".to_string()))?;
    Ok(ok_with(profile, "Driver status updated successfully"))
}

#[derive(Deserialize)]
pub struct UpdateDriverLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Json(payload): Json<UpdateDriverLocationRequest>,
) -> Result<Json<ApiResponse<DriverProfile>>, AppError> {
    require_driver(&actor)?;
    assignment::set_driver_location(
        &state,
        actor.id,
        GeoPoint {
            lat: payload.lat,
            lng: payload.lng,
        },
        Utc::now(),
    )?;

    let profile = state
        .store
        .driver(actor.id)
        .ok_or_else(|| AppError::Internal("driver vanished".to_string()))?;
    Ok(ok_with(profile, "Location updated successfully"))
}
