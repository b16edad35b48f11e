use dashmap::DashMap;
use uuid::Uuid;

use crate::models::delivery::Delivery;
use crate::models::driver::DriverProfile;
use crate::models::order::Order;
use crate::models::restaurant::{MenuItem, Restaurant};

/// In-process stand-in for the relational store. Each table is a sharded map;
/// a `get_mut` guard on an order row is the per-order critical section for
/// status writes and claims.
///
/// Lock order when holding more than one guard:
/// orders -> restaurants -> delivery_by_order -> deliveries -> drivers.
/// Guards are never held across an `.await`.
pub struct Store {
    pub restaurants: DashMap<Uuid, Restaurant>,
    pub menu_items: DashMap<Uuid, MenuItem>,
    pub orders: DashMap<Uuid, Order>,
    pub deliveries: DashMap<Uuid, Delivery>,
    /// One-to-one index: order id -> delivery id.
    pub delivery_by_order: DashMap<Uuid, Uuid>,
    pub drivers: DashMap<Uuid, DriverProfile>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            restaurants: DashMap::new(),
            menu_items: DashMap::new(),
            orders: DashMap::new(),
            deliveries: DashMap::new(),
            delivery_by_order: DashMap::new(),
            drivers: DashMap::new(),
        }
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn delivery(&self, id: Uuid) -> Option<Delivery> {
        self.deliveries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn delivery_for_order(&self, order_id: Uuid) -> Option<Delivery> {
        let delivery_id = *self.delivery_by_order.get(&order_id)?;
        self.delivery(delivery_id)
    }

    pub fn restaurant(&self, id: Uuid) -> Option<Restaurant> {
        self.restaurants.get(&id).map(|entry| entry.value().clone())
    }

    pub fn driver(&self, id: Uuid) -> Option<DriverProfile> {
        self.drivers.get(&id).map(|entry| entry.value().clone())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
