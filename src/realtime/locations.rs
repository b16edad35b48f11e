use std::sync::Arc;

use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::state::AppState;

/// Moves staged driver coordinates into the driver rows. Location updates
/// are broadcast-only on the hot path; this is the periodic persistence
/// side task.
pub fn flush_locations(state: &AppState) -> usize {
    let mut flushed = 0;

    state.live_locations.retain(|driver_id, sample| {
        if let Some(mut driver) = state.store.drivers.get_mut(driver_id) {
            driver.location = Some(sample.point);
            driver.location_updated_at = Some(sample.recorded_at);
            flushed += 1;
        }
        false
    });

    flushed
}

pub async fn run_location_flush(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "location flush task started");
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;
        let flushed = flush_locations(&state);
        if flushed > 0 {
            debug!(flushed, "persisted driver locations");
        }
    }
}
