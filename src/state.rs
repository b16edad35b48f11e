use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::observability::metrics::Metrics;
use crate::payment::PaymentGateway;
use crate::realtime::hub::Hub;
use crate::realtime::ticket::TicketIssuer;
use crate::store::Store;

/// Last coordinate pushed by a driver over the wire. Staged here and flushed
/// into the driver row by the periodic persistence task; the broadcast path
/// never waits on it.
#[derive(Debug, Clone, Copy)]
pub struct LocationSample {
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

pub struct AppState {
    pub store: Store,
    pub hub: Arc<Hub>,
    pub tickets: TicketIssuer,
    pub payments: Arc<dyn PaymentGateway>,
    pub live_locations: DashMap<Uuid, LocationSample>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        tickets: TicketIssuer,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store: Store::new(),
            hub: Arc::new(Hub::new(event_buffer_size)),
            tickets,
            payments,
            live_locations: DashMap::new(),
            metrics: Metrics::new(),
        }
    }
}
