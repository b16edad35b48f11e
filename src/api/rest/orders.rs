use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::{assignment, state_machine};
use crate::models::delivery::Delivery;
use crate::models::order::{
    DeliveryAddress, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::models::user::{AuthUser, Role};
use crate::state::AppState;

use super::{ApiResponse, ok, ok_with};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_status))
        .route("/orders/:id/cancel", put(cancel_order))
        .route("/orders/:id/assign-driver", put(assign_driver))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<CreateOrderItem>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), AppError> {
    let restaurant = state
        .store
        .restaurant(payload.restaurant_id)
        .ok_or_else(|| AppError::NotFound("restaurant not found".to_string()))?;

    if !restaurant.is_open {
        return Err(AppError::Validation(
            "restaurant is currently closed".to_string(),
        ));
    }
    if payload.items.is_empty() {
        return Err(AppError::Validation("order has no items".to_string()));
    }

    let mut subtotal = 0.0;
    let mut items = Vec::with_capacity(payload.items.len());

    for line in &payload.items {
        let menu_item = state
            .store
            .menu_items
            .get(&line.menu_item_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                AppError::NotFound(format!("menu item {} not found", line.menu_item_id))
            })?;

        if menu_item.restaurant_id != restaurant.id {
            return Err(AppError::Validation(format!(
                "menu item {} does not belong to this restaurant",
                menu_item.name
            )));
        }
        if !menu_item.is_available {
            return Err(AppError::Validation(format!(
                "menu item {} is not available",
                menu_item.name
            )));
        }
        if line.quantity == 0 {
            return Err(AppError::Validation("quantity must be > 0".to_string()));
        }

        let line_subtotal = menu_item.price * f64::from(line.quantity);
        subtotal += line_subtotal;
        items.push(OrderItem {
            menu_item_id: menu_item.id,
            name: menu_item.name,
            unit_price: menu_item.price,
            quantity: line.quantity,
            subtotal: line_subtotal,
        });
    }

    if subtotal < restaurant.min_order_amount {
        return Err(AppError::Validation(format!(
            "minimum order amount is {:.2}",
            restaurant.min_order_amount
        )));
    }

    let order = Order {
        id: Uuid::new_v4(),
        customer_id: actor.id,
        restaurant_id: restaurant.id,
        items,
        subtotal,
        delivery_fee: restaurant.delivery_fee,
        total: subtotal + restaurant.delivery_fee,
        status: OrderStatus::Pending,
        payment_method: payload.payment_method,
        payment_status: PaymentStatus::Pending,
        delivery_address: payload.delivery_address,
        created_at: Utc::now(),
        scheduled_for: payload.scheduled_for,
        actual_delivery_time: None,
        version: 0,
    };

    state.store.orders.insert(order.id, order.clone());
    tracing::info!(order_id = %order.id, restaurant_id = %restaurant.id, "order created");

    Ok((
        StatusCode::CREATED,
        ok_with(order, "Order created successfully"),
    ))
}

#[derive(Serialize)]
pub struct OrderWithDelivery {
    #[serde(flatten)]
    pub order: Order,
    pub delivery: Option<Delivery>,
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderWithDelivery>>, AppError> {
    let order = state
        .store
        .order(id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    let delivery = state.store.delivery_for_order(id);

    let is_customer = order.customer_id == actor.id;
    let is_owner = state
        .store
        .restaurant(order.restaurant_id)
        .is_some_and(|restaurant| restaurant.owner_id == actor.id);
    let is_assigned_driver = delivery
        .as_ref()
        .is_some_and(|delivery| delivery.driver_id == Some(actor.id));

    if !(is_customer || is_owner || is_assigned_driver || actor.is_admin()) {
        return Err(AppError::Forbidden(
            "not authorized to view this order".to_string(),
        ));
    }

    Ok(ok(OrderWithDelivery { order, delivery }))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state_machine::attempt_transition(&state, id, payload.status, &actor)?;
    Ok(ok_with(order, "Order status updated successfully"))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state_machine::attempt_transition(&state, id, OrderStatus::Cancelled, &actor)?;
    Ok(ok_with(order, "Order cancelled successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<Json<ApiResponse<Delivery>>, AppError> {
    if !matches!(actor.role, Role::Owner | Role::Admin) {
        return Err(AppError::Forbidden(
            "only restaurant staff may assign drivers".to_string(),
        ));
    }

    let delivery = assignment::assign_driver(&state, id, payload.driver_id, &actor)?;
    Ok(ok_with(delivery, "Driver assigned successfully"))
}
