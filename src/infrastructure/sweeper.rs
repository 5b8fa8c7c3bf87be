use crate::domain::ports::{ClockRef, SessionStoreRef};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Evicts idle sessions every `period` until the returned task is aborted.
///
/// With `period` shorter than the session timeout, an idle session is gone
/// at most one period after it expires.
pub fn spawn_sweeper(store: SessionStoreRef, clock: ClockRef, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.sweep(clock.now()).await {
                Ok(0) => {}
                Ok(evicted) => {
                    let remaining = store.active_count().await;
                    tracing::debug!(evicted, remaining, "Swept idle sessions")
                }
                Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}
