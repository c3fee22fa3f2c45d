//! Background deletion of expired sessions
//!
//! Refresh leaves expired sessions in place; this task removes them on an
//! interval. Abort the returned handle to stop it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::store::SessionStore;

/// Spawn a task that calls `delete_expired` every `interval`
///
/// The first sweep runs immediately. Each sweep is abandoned after
/// `call_timeout` (if set). Store failures and timeouts are logged and the
/// task keeps going.
pub fn spawn_session_reaper(
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    call_timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sweep = store.delete_expired(clock.now());
            let outcome = match call_timeout {
                Some(limit) => match tokio::time::timeout(limit, sweep).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(timeout_ms = limit.as_millis() as u64, "Expired-session sweep timed out");
                        continue;
                    }
                },
                None => sweep.await,
            };
            match outcome {
                Ok(0) => debug!("No expired sessions"),
                Ok(removed) => info!(removed, "Deleted expired sessions"),
                Err(e) => warn!(error = %e, "Expired-session sweep failed"),
            }
        }
    })
}
