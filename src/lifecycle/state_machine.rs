use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::transitions::can_transition;
use crate::models::delivery::DeliveryStatus;
use crate::models::driver::DriverStatus;
use crate::models::order::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::models::user::{AuthUser, Role};
use crate::realtime::events::ServerEvent;
use crate::realtime::room::Room;
use crate::state::AppState;

/// Validates and applies one order status transition, running its side
/// effects and emitting exactly one fan-out event on success.
///
/// The write is conditioned on the status observed before taking the order
/// guard; a concurrent transition that got there first makes this one fail
/// instead of overwriting it. Side effects and the broadcast happen inside
/// the per-order critical section, so subscribers observe events for one
/// order in commit order.
pub fn attempt_transition(
    state: &AppState,
    order_id: Uuid,
    requested: OrderStatus,
    actor: &AuthUser,
) -> Result<Order, AppError> {
    let snapshot = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    authorize(state, &snapshot, requested, actor)?;

    if !can_transition(snapshot.status, requested) {
        state
            .metrics
            .transitions_total
            .with_label_values(&["invalid_transition"])
            .inc();
        return Err(AppError::InvalidTransition {
            from: snapshot.status,
            to: requested,
        });
    }

    // Upstream side effect before the write: a declined capture must leave
    // the order untouched.
    if requested == OrderStatus::Confirmed
        && snapshot.payment_method == PaymentMethod::Card
        && snapshot.payment_status == PaymentStatus::Pending
    {
        state
            .payments
            .capture(&snapshot)
            .map_err(|err| AppError::Payment(err.reason))?;
    }

    let expected = snapshot.status;
    let now = Utc::now();

    let updated = {
        let mut entry = state
            .store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();

        // Conditioned write: someone else may have moved the order between
        // our read and this lock.
        if order.status != expected {
            state
                .metrics
                .transitions_total
                .with_label_values(&["conflict"])
                .inc();
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: requested,
            });
        }

        order.status = requested;
        order.version += 1;

        if requested == OrderStatus::Confirmed && order.payment_method == PaymentMethod::Card {
            order.payment_status = PaymentStatus::Paid;
        }
        if requested == OrderStatus::Delivered {
            order.actual_delivery_time = Some(now);
        }

        let updated = order.clone();

        match requested {
            OrderStatus::Delivered => settle_delivery(state, order_id, now),
            OrderStatus::Cancelled => cancel_open_delivery(state, order_id),
            _ => {}
        }

        broadcast_status(state, &updated, now);
        updated
    };

    state
        .metrics
        .transitions_total
        .with_label_values(&["success"])
        .inc();

    info!(
        order_id = %order_id,
        from = %expected,
        to = %requested,
        actor = %actor.role,
        "order status changed"
    );

    Ok(updated)
}

fn authorize(
    state: &AppState,
    order: &Order,
    requested: OrderStatus,
    actor: &AuthUser,
) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }

    let owns_restaurant = state
        .store
        .restaurant(order.restaurant_id)
        .is_some_and(|restaurant| restaurant.owner_id == actor.id);
    if owns_restaurant {
        return Ok(());
    }

    let is_assigned_driver = state
        .store
        .delivery_for_order(order.id)
        .is_some_and(|delivery| delivery.driver_id == Some(actor.id));
    if is_assigned_driver {
        return Ok(());
    }

    // Customers may only cancel, and only their own order.
    if requested == OrderStatus::Cancelled
        && actor.role == Role::Customer
        && order.customer_id == actor.id
    {
        return Ok(());
    }

    Err(AppError::Forbidden(
        "not authorized to update this order".to_string(),
    ))
}

/// Marks the order's delivery delivered and pays the driver. Accrual keys
/// off `driver_fee` being unset: once settled, calling this again changes
/// nothing, however the duplicate arrives.
///
/// Caller holds the order guard; guards here follow the store lock order.
pub(crate) fn settle_delivery(state: &AppState, order_id: Uuid, now: DateTime<Utc>) {
    let Some(delivery_id) = state.store.delivery_by_order.get(&order_id).map(|e| *e) else {
        return;
    };
    let Some(mut entry) = state.store.deliveries.get_mut(&delivery_id) else {
        return;
    };
    let delivery = entry.value_mut();

    delivery.status = DeliveryStatus::Delivered;
    if delivery.pickup_time.is_none() {
        delivery.pickup_time = Some(now);
    }
    if delivery.delivery_time.is_none() {
        delivery.delivery_time = Some(now);
    }

    if delivery.driver_fee.is_some() {
        return; // already settled
    }
    let Some(driver_id) = delivery.driver_id else {
        return;
    };

    let fee = delivery.estimated_earnings;
    delivery.driver_fee = Some(fee);
    drop(entry);

    if let Some(mut driver) = state.store.drivers.get_mut(&driver_id) {
        driver.total_deliveries += 1;
        driver.total_earnings += fee;
        driver.status = DriverStatus::Online;
    }

    info!(order_id = %order_id, driver_id = %driver_id, fee, "delivery settled");
}

/// Cancelling an order with an open delivery cancels the leg and frees the
/// driver.
fn cancel_open_delivery(state: &AppState, order_id: Uuid) {
    let Some(delivery_id) = state.store.delivery_by_order.get(&order_id).map(|e| *e) else {
        return;
    };
    let Some(mut entry) = state.store.deliveries.get_mut(&delivery_id) else {
        return;
    };
    let delivery = entry.value_mut();

    if matches!(
        delivery.status,
        DeliveryStatus::Delivered | DeliveryStatus::Cancelled
    ) {
        return;
    }

    delivery.status = DeliveryStatus::Cancelled;
    let driver_id = delivery.driver_id;
    drop(entry);

    if let Some(driver_id) = driver_id {
        if let Some(mut driver) = state.store.drivers.get_mut(&driver_id) {
            if driver.status == DriverStatus::Busy {
                driver.status = DriverStatus::Online;
            }
        }
    }
}

/// One status event per committed transition, fanned out to the order room
/// and the restaurant room. Must be called inside the order's critical
/// section, after the write.
pub(crate) fn broadcast_status(state: &AppState, order: &Order, timestamp: DateTime<Utc>) {
    let event = ServerEvent::OrderStatusUpdate {
        order_id: order.id,
        status: order.status,
        timestamp,
    };

    for room in [Room::Order(order.id), Room::Restaurant(order.restaurant_id)] {
        state.hub.broadcast(room, event.clone());
        state
            .metrics
            .events_broadcast_total
            .with_label_values(&[event.kind()])
            .inc();
    }
}
