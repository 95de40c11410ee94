use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::SharedState;

/// Periodically end sessions whose host went silent and evict finished ones.
pub async fn run(state: SharedState) {
    let config = state.config();
    let (period, grace, retention) = (config.sweep_interval, config.host_grace, config.retention);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&state, grace, retention).await;
    }
}

async fn sweep_once(state: &SharedState, grace: Duration, retention: Duration) {
    let report = state
        .registry()
        .expire_idle(Instant::now(), grace, retention)
        .await;
    if report.expired > 0 || report.evicted > 0 {
        info!(
            expired = report.expired,
            evicted = report.evicted,
            remaining = state.registry().len(),
            "session sweep completed"
        );
    } else {
        debug!(remaining = state.registry().len(), "session sweep found nothing to do");
    }
}
