use crate::models::delivery::DeliveryStatus;
use crate::models::order::OrderStatus;

/// Legal next statuses for an order. This is the canonical table (the variant
/// that keeps the `preparing` stage); authorization is checked separately.
pub fn allowed_next(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Preparing, Cancelled],
        Preparing => &[ReadyForPickup, OutForDelivery, Cancelled],
        ReadyForPickup => &[OutForDelivery, Delivered],
        OutForDelivery => &[Delivered],
        Delivered => &[],
        Cancelled => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_next(from).contains(&to)
}

/// Legal next statuses for a delivery leg.
pub fn allowed_next_delivery(from: DeliveryStatus) -> &'static [DeliveryStatus] {
    use DeliveryStatus::*;

    match from {
        Assigned => &[PickedUp, InTransit, Cancelled],
        PickedUp => &[InTransit, Delivered],
        InTransit => &[Delivered],
        Delivered => &[],
        Cancelled => &[],
    }
}

pub fn can_transition_delivery(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    allowed_next_delivery(from).contains(&to)
}
