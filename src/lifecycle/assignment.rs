use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::lifecycle::state_machine::{broadcast_status, settle_delivery};
use crate::lifecycle::transitions::{can_transition, can_transition_delivery};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::{DriverStatus, GeoPoint};
use crate::models::order::{Order, OrderStatus};
use crate::models::user::AuthUser;
use crate::state::AppState;
use crate::store::Store;

/// Orders a driver may claim: `ready_for_pickup` with no delivery record,
/// newest first. Read-only; re-querying never mutates.
pub fn list_available(store: &Store) -> Vec<Order> {
    let mut orders: Vec<Order> = store
        .orders
        .iter()
        .filter(|entry| {
            entry.value().status == OrderStatus::ReadyForPickup
                && !store.delivery_by_order.contains_key(entry.key())
        })
        .map(|entry| entry.value().clone())
        .collect();

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// A driver takes ownership of a ready order. The delivery write, the order
/// flipping to `out_for_delivery`, and the driver flipping to `busy` are one
/// logical unit under the order's entry guard, so two racing claims resolve
/// to exactly one winner.
pub fn claim(state: &AppState, order_id: Uuid, driver_id: Uuid) -> Result<Delivery, AppError> {
    let now = Utc::now();

    let claim_outcome = |outcome: &str| {
        state.metrics.claims_total.with_label_values(&[outcome]).inc();
    };

    let delivery = {
        let mut entry = state
            .store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();

        let existing = state.store.delivery_for_order(order_id);

        if let Some(existing) = &existing {
            // Re-claiming by the same driver is a no-op success.
            if existing.driver_id == Some(driver_id) {
                claim_outcome("idempotent");
                return Ok(existing.clone());
            }
            if existing.driver_id.is_some() {
                claim_outcome("already_assigned");
                return Err(AppError::AlreadyAssigned);
            }
        }

        if order.status != OrderStatus::ReadyForPickup {
            claim_outcome("invalid_state");
            return Err(AppError::InvalidState(format!(
                "order is not ready for pickup (status {})",
                order.status
            )));
        }

        {
            // One active delivery per driver, enforced here and nowhere else.
            // Check and flip to busy under a single guard: a driver racing
            // claims on two different orders must lose the second one.
            let mut driver = state
                .store
                .drivers
                .get_mut(&driver_id)
                .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
            if driver.status == DriverStatus::Busy {
                claim_outcome("driver_busy");
                return Err(AppError::InvalidState(
                    "driver already has an active delivery".to_string(),
                ));
            }
            driver.status = DriverStatus::Busy;
        }

        let restaurant = state.store.restaurant(order.restaurant_id);
        let distance_km = restaurant
            .as_ref()
            .and_then(|r| r.location)
            .zip(order.delivery_address.location)
            .map(|(from, to)| haversine_km(&from, &to));
        let estimated_duration_min = restaurant
            .map(|r| r.estimated_delivery_time_min)
            .unwrap_or(0);

        let delivery = match existing {
            // Unassigned record left by a staff pre-assignment: bind it.
            Some(unassigned) => {
                let mut entry = state
                    .store
                    .deliveries
                    .get_mut(&unassigned.id)
                    .ok_or_else(|| AppError::Internal("delivery index out of sync".to_string()))?;
                let delivery = entry.value_mut();
                delivery.driver_id = Some(driver_id);
                delivery.status = DeliveryStatus::Assigned;
                delivery.estimated_earnings = order.delivery_fee;
                delivery.clone()
            }
            None => {
                let delivery = Delivery {
                    id: Uuid::new_v4(),
                    order_id,
                    driver_id: Some(driver_id),
                    status: DeliveryStatus::Assigned,
                    pickup_time: None,
                    delivery_time: None,
                    estimated_earnings: order.delivery_fee,
                    driver_fee: None,
                    distance_km,
                    estimated_duration_min,
                    created_at: now,
                };
                state
                    .store
                    .delivery_by_order
                    .insert(order_id, delivery.id);
                state.store.deliveries.insert(delivery.id, delivery.clone());
                delivery
            }
        };

        order.status = OrderStatus::OutForDelivery;
        order.version += 1;

        broadcast_status(state, &order.clone(), now);
        delivery
    };

    claim_outcome("success");
    info!(order_id = %order_id, driver_id = %driver_id, "delivery claimed");

    Ok(delivery)
}

/// Staff path: bind a driver to an order's delivery without the driver
/// claiming it. The order status is left for the normal transition flow.
pub fn assign_driver(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
    actor: &AuthUser,
) -> Result<Delivery, AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let owns_restaurant = state
        .store
        .restaurant(order.restaurant_id)
        .is_some_and(|restaurant| restaurant.owner_id == actor.id);
    if !actor.is_admin() && !owns_restaurant {
        return Err(AppError::Forbidden(
            "not authorized to assign a driver for this order".to_string(),
        ));
    }

    let now = Utc::now();

    let delivery = {
        let entry = state
            .store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        // Reread under the guard: the order may have been cancelled or
        // delivered since the authorization snapshot.
        if entry.value().status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "order is {}",
                entry.value().status
            )));
        }

        if let Some(existing) = state.store.delivery_for_order(order_id) {
            if existing.driver_id == Some(driver_id) {
                return Ok(existing);
            }
            if existing.driver_id.is_some() {
                return Err(AppError::AlreadyAssigned);
            }
        }

        {
            // Same atomic check-and-set as the claim path.
            let mut driver = state
                .store
                .drivers
                .get_mut(&driver_id)
                .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
            if driver.status == DriverStatus::Busy {
                return Err(AppError::InvalidState(
                    "driver already has an active delivery".to_string(),
                ));
            }
            driver.status = DriverStatus::Busy;
        }

        let restaurant = state.store.restaurant(order.restaurant_id);
        let delivery = match state.store.delivery_for_order(order_id) {
            Some(unassigned) => {
                let mut entry = state
                    .store
                    .deliveries
                    .get_mut(&unassigned.id)
                    .ok_or_else(|| AppError::Internal("delivery index out of sync".to_string()))?;
                let delivery = entry.value_mut();
                delivery.driver_id = Some(driver_id);
                delivery.clone()
            }
            None => {
                let delivery = Delivery {
                    id: Uuid::new_v4(),
                    order_id,
                    driver_id: Some(driver_id),
                    status: DeliveryStatus::Assigned,
                    pickup_time: None,
                    delivery_time: None,
                    estimated_earnings: order.delivery_fee,
                    driver_fee: None,
                    distance_km: restaurant
                        .as_ref()
                        .and_then(|r| r.location)
                        .zip(order.delivery_address.location)
                        .map(|(from, to)| haversine_km(&from, &to)),
                    estimated_duration_min: restaurant
                        .map(|r| r.estimated_delivery_time_min)
                        .unwrap_or(0),
                    created_at: now,
                };
                state
                    .store
                    .delivery_by_order
                    .insert(order_id, delivery.id);
                state.store.deliveries.insert(delivery.id, delivery.clone());
                delivery
            }
        };

        delivery
    };

    info!(order_id = %order_id, driver_id = %driver_id, "driver assigned");
    Ok(delivery)
}

/// Driver-side delivery transition. Keeps the parent order synchronized:
/// `picked_up`/`in_transit` imply `out_for_delivery`, `delivered` implies
/// `delivered` plus settlement.
pub fn update_delivery_status(
    state: &AppState,
    delivery_id: Uuid,
    new_status: DeliveryStatus,
    driver_id: Uuid,
) -> Result<Delivery, AppError> {
    let snapshot = state
        .store
        .delivery(delivery_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    if snapshot.driver_id != Some(driver_id) {
        return Err(AppError::Forbidden(
            "delivery belongs to another driver".to_string(),
        ));
    }

    if !can_transition_delivery(snapshot.status, new_status) {
        return Err(AppError::InvalidState(format!(
            "cannot move delivery from {} to {}",
            snapshot.status, new_status
        )));
    }

    let order_id = snapshot.order_id;
    let now = Utc::now();

    let updated = {
        let mut order_entry = state
            .store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = order_entry.value_mut();

        match new_status {
            DeliveryStatus::PickedUp | DeliveryStatus::InTransit => {
                let mut entry = state
                    .store
                    .deliveries
                    .get_mut(&delivery_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("delivery {delivery_id} not found"))
                    })?;
                let delivery = entry.value_mut();
                if delivery.status != snapshot.status {
                    return Err(AppError::InvalidState(
                        "delivery was updated concurrently".to_string(),
                    ));
                }

                delivery.status = new_status;
                if delivery.pickup_time.is_none() {
                    delivery.pickup_time = Some(now);
                }
                let updated = delivery.clone();
                drop(entry);

                if order.status != OrderStatus::OutForDelivery
                    && can_transition(order.status, OrderStatus::OutForDelivery)
                {
                    order.status = OrderStatus::OutForDelivery;
                    order.version += 1;
                    broadcast_status(state, &order.clone(), now);
                }

                updated
            }
            DeliveryStatus::Delivered => {
                {
                    let entry = state.store.deliveries.get(&delivery_id).ok_or_else(|| {
                        AppError::NotFound(format!("delivery {delivery_id} not found"))
                    })?;
                    if entry.value().status != snapshot.status {
                        return Err(AppError::InvalidState(
                            "delivery was updated concurrently".to_string(),
                        ));
                    }
                }

                if order.status != OrderStatus::Delivered {
                    order.status = OrderStatus::Delivered;
                    order.version += 1;
                    order.actual_delivery_time = Some(now);
                }
                settle_delivery(state, order_id, now);
                broadcast_status(state, &order.clone(), now);

                state
                    .store
                    .delivery(delivery_id)
                    .ok_or_else(|| AppError::Internal("delivery vanished".to_string()))?
            }
            DeliveryStatus::Cancelled => {
                let mut entry = state
                    .store
                    .deliveries
                    .get_mut(&delivery_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("delivery {delivery_id} not found"))
                    })?;
                let delivery = entry.value_mut();
                if delivery.status != snapshot.status {
                    return Err(AppError::InvalidState(
                        "delivery was updated concurrently".to_string(),
                    ));
                }

                delivery.status = DeliveryStatus::Cancelled;
                let updated = delivery.clone();
                drop(entry);

                if let Some(mut driver) = state.store.drivers.get_mut(&driver_id) {
                    if driver.status == DriverStatus::Busy {
                        driver.status = DriverStatus::Online;
                    }
                }

                updated
            }
            DeliveryStatus::Assigned => {
                return Err(AppError::InvalidState(
                    "delivery cannot move back to assigned".to_string(),
                ));
            }
        }
    };

    info!(
        delivery_id = %delivery_id,
        order_id = %order_id,
        status = %new_status,
        "delivery status changed"
    );

    Ok(updated)
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub total: f64,
    pub today: f64,
    pub week: f64,
    pub month: f64,
}

/// Lifetime total from the driver row; the windows aggregate settled fees
/// of delivered legs.
pub fn earnings(store: &Store, driver_id: Uuid, now: DateTime<Utc>) -> EarningsSummary {
    let total = store
        .driver(driver_id)
        .map(|driver| driver.total_earnings)
        .unwrap_or(0.0);

    let today_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let mut today = 0.0;
    let mut week = 0.0;
    let mut month = 0.0;

    for entry in store.deliveries.iter() {
        let delivery = entry.value();
        if delivery.driver_id != Some(driver_id)
            || delivery.status != DeliveryStatus::Delivered
        {
            continue;
        }
        let (Some(fee), Some(delivered_at)) = (delivery.driver_fee, delivery.delivery_time) else {
            continue;
        };

        if delivered_at >= month_start {
            month += fee;
        }
        if delivered_at >= week_start {
            week += fee;
        }
        if delivered_at >= today_start {
            today += fee;
        }
    }

    EarningsSummary {
        total,
        today,
        week,
        month,
    }
}

/// Delivery history for one driver, newest first.
pub fn driver_deliveries(store: &Store, driver_id: Uuid) -> Vec<Delivery> {
    let mut deliveries: Vec<Delivery> = store
        .deliveries
        .iter()
        .filter(|entry| entry.value().driver_id == Some(driver_id))
        .map(|entry| entry.value().clone())
        .collect();

    deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    deliveries
}

pub fn set_driver_status(
    state: &AppState,
    driver_id: Uuid,
    status: DriverStatus,
) -> Result<(), AppError> {
    let mut driver = state
        .store
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    driver.status = status;
    Ok(())
}

pub fn set_driver_location(
    state: &AppState,
    driver_id: Uuid,
    point: GeoPoint,
    at: DateTime<Utc>,
) -> Result<(), AppError> {
    let mut driver = state
        .store
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    driver.location = Some(point);
    driver.location_updated_at = Some(at);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::driver::DriverProfile;
    use crate::models::order::{
        DeliveryAddress, Order, OrderItem, PaymentMethod, PaymentStatus,
    };
    use crate::models::restaurant::Restaurant;
    use crate::models::user::Role;
    use crate::payment::AutoCapture;
    use crate::realtime::ticket::TicketIssuer;
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            64,
            TicketIssuer::new("test-secret", 300),
            Arc::new(AutoCapture),
        ))
    }

    fn seed_restaurant(state: &AppState) -> Restaurant {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Testaurant".to_string(),
            is_open: true,
            delivery_fee: 4.5,
            min_order_amount: 10.0,
            estimated_delivery_time_min: 30,
            location: None,
        };
        state
            .store
            .restaurants
            .insert(restaurant.id, restaurant.clone());
        restaurant
    }

    fn seed_ready_order(state: &AppState, restaurant: &Restaurant) -> Order {
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            restaurant_id: restaurant.id,
            items: vec![OrderItem {
                menu_item_id: Uuid::new_v4(),
                name: "Pad Thai".to_string(),
                unit_price: 12.0,
                quantity: 1,
                subtotal: 12.0,
            }],
            subtotal: 12.0,
            delivery_fee: restaurant.delivery_fee,
            total: 16.5,
            status: OrderStatus::ReadyForPickup,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            delivery_address: DeliveryAddress {
                street: "1 Test Lane".to_string(),
                location: None,
                instructions: None,
            },
            created_at: Utc::now(),
            scheduled_for: None,
            actual_delivery_time: None,
            version: 0,
        };
        state.store.orders.insert(order.id, order.clone());
        order
    }

    fn seed_driver(state: &AppState, status: DriverStatus) -> Uuid {
        let mut driver = DriverProfile::new(Uuid::new_v4(), "Test Driver");
        driver.status = status;
        let id = driver.id;
        state.store.drivers.insert(id, driver);
        id
    }

    #[tokio::test]
    async fn claim_binds_delivery_order_and_driver_atomically() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        let delivery = claim(&state, order.id, driver).unwrap();

        assert_eq!(delivery.driver_id, Some(driver));
        assert_eq!(delivery.status, DeliveryStatus::Assigned);
        assert_eq!(delivery.estimated_earnings, restaurant.delivery_fee);
        assert_eq!(
            state.store.order(order.id).unwrap().status,
            OrderStatus::OutForDelivery
        );
        assert_eq!(
            state.store.driver(driver).unwrap().status,
            DriverStatus::Busy
        );
    }

    #[tokio::test]
    async fn reclaim_by_same_driver_is_noop_success() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        let first = claim(&state, order.id, driver).unwrap();
        let second = claim(&state, order.id, driver).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(state.store.deliveries.len(), 1);
    }

    #[tokio::test]
    async fn second_driver_loses_claim() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let winner = seed_driver(&state, DriverStatus::Online);
        let loser = seed_driver(&state, DriverStatus::Online);

        claim(&state, order.id, winner).unwrap();
        let err = claim(&state, order.id, loser).unwrap_err();

        assert!(matches!(err, AppError::AlreadyAssigned));
        assert_eq!(
            state.store.delivery_for_order(order.id).unwrap().driver_id,
            Some(winner)
        );
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let d1 = seed_driver(&state, DriverStatus::Online);
        let d2 = seed_driver(&state, DriverStatus::Online);

        let s1 = state.clone();
        let s2 = state.clone();
        let t1 = std::thread::spawn(move || claim(&s1, order.id, d1));
        let t2 = std::thread::spawn(move || claim(&s2, order.id, d2));

        let results = [t1.join().unwrap(), t2.join().unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let delivery = state.store.delivery_for_order(order.id).unwrap();
        let winner_id = results
            .iter()
            .find_map(|r| r.as_ref().ok())
            .and_then(|d| d.driver_id)
            .unwrap();
        assert_eq!(delivery.driver_id, Some(winner_id));
        assert_eq!(state.store.deliveries.len(), 1);
    }

    #[tokio::test]
    async fn one_driver_racing_two_orders_wins_only_one() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order_a = seed_ready_order(&state, &restaurant);
        let order_b = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        let s1 = state.clone();
        let s2 = state.clone();
        let t1 = std::thread::spawn(move || claim(&s1, order_a.id, driver));
        let t2 = std::thread::spawn(move || claim(&s2, order_b.id, driver));

        let results = [t1.join().unwrap(), t2.join().unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let active = state
            .store
            .deliveries
            .iter()
            .filter(|entry| entry.value().driver_id == Some(driver))
            .count();
        assert_eq!(active, 1);
        assert_eq!(
            state.store.driver(driver).unwrap().status,
            DriverStatus::Busy
        );

        // The losing order is untouched and still claimable by someone else.
        let out_for_delivery = [order_a.id, order_b.id]
            .into_iter()
            .filter(|id| state.store.order(*id).unwrap().status == OrderStatus::OutForDelivery)
            .count();
        assert_eq!(out_for_delivery, 1);
    }

    #[tokio::test]
    async fn assign_driver_rejects_busy_driver() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Busy);
        let actor = AuthUser {
            id: restaurant.owner_id,
            role: Role::Owner,
        };

        let err = assign_driver(&state, order.id, driver, &actor).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(state.store.delivery_for_order(order.id).is_none());
    }

    #[tokio::test]
    async fn driver_cannot_be_assigned_to_a_cancelled_order() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        state.store.orders.get_mut(&order.id).unwrap().status = OrderStatus::Cancelled;
        let driver = seed_driver(&state, DriverStatus::Online);
        let actor = AuthUser {
            id: restaurant.owner_id,
            role: Role::Owner,
        };

        let err = assign_driver(&state, order.id, driver, &actor).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(
            state.store.driver(driver).unwrap().status,
            DriverStatus::Online
        );
        assert!(state.store.delivery_for_order(order.id).is_none());
    }

    #[tokio::test]
    async fn busy_driver_cannot_take_a_second_delivery() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Busy);

        let err = claim(&state, order.id, driver).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(
            state.store.order(order.id).unwrap().status,
            OrderStatus::ReadyForPickup
        );
    }

    #[tokio::test]
    async fn settlement_pays_the_fee_exactly_once() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        claim(&state, order.id, driver).unwrap();

        // Simulate duplicate delivery of the "delivered" event.
        let now = Utc::now();
        settle_delivery(&state, order.id, now);
        settle_delivery(&state, order.id, now);

        let profile = state.store.driver(driver).unwrap();
        assert_eq!(profile.total_deliveries, 1);
        assert_eq!(profile.total_earnings, restaurant.delivery_fee);
        assert_eq!(profile.status, DriverStatus::Online);

        let delivery = state.store.delivery_for_order(order.id).unwrap();
        assert_eq!(delivery.driver_fee, Some(restaurant.delivery_fee));
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn delivered_leg_completes_order_and_frees_driver() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        let delivery = claim(&state, order.id, driver).unwrap();
        update_delivery_status(&state, delivery.id, DeliveryStatus::PickedUp, driver).unwrap();
        let done =
            update_delivery_status(&state, delivery.id, DeliveryStatus::Delivered, driver)
                .unwrap();

        assert_eq!(done.status, DeliveryStatus::Delivered);
        assert!(done.pickup_time.is_some());
        assert!(done.delivery_time.is_some());

        let order = state.store.order(order.id).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.actual_delivery_time.is_some());

        assert_eq!(
            state.store.driver(driver).unwrap().status,
            DriverStatus::Online
        );
    }

    #[tokio::test]
    async fn wrong_driver_cannot_advance_a_delivery() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let order = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);
        let imposter = seed_driver(&state, DriverStatus::Online);

        let delivery = claim(&state, order.id, driver).unwrap();
        let err =
            update_delivery_status(&state, delivery.id, DeliveryStatus::PickedUp, imposter)
                .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn available_list_excludes_claimed_orders_and_sorts_newest_first() {
        let state = test_state();
        let restaurant = seed_restaurant(&state);
        let older = seed_ready_order(&state, &restaurant);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer = seed_ready_order(&state, &restaurant);
        let claimed = seed_ready_order(&state, &restaurant);
        let driver = seed_driver(&state, DriverStatus::Online);

        claim(&state, claimed.id, driver).unwrap();

        let available = list_available(&state.store);
        let ids: Vec<Uuid> = available.iter().map(|o| o.id).collect();
        assert!(ids.contains(&older.id));
        assert!(ids.contains(&newer.id));
        assert!(!ids.contains(&claimed.id));
        assert!(
            ids.iter().position(|id| *id == newer.id).unwrap()
                < ids.iter().position(|id| *id == older.id).unwrap()
        );
    }
}
