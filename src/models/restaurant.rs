use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

/// Catalog rows the lifecycle core reads but never manages; seeded by the
/// composition root (catalog CRUD lives elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_open: bool,
    pub delivery_fee: f64,
    pub min_order_amount: f64,
    pub estimated_delivery_time_min: u32,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: f64,
    pub is_available: bool,
}
