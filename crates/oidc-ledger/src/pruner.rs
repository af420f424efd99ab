//! Background removal of fully expired grants.
//!
//! Expired artifacts are still returned by lookups, so pruning is purely a
//! storage concern. It is off by default (`pruning.enabled`).

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::PruningConfig;
use crate::ledger::AuthorizationLedger;

/// Spawns a task that calls [`AuthorizationLedger::remove_expired`] every
/// `interval`.
///
/// The first run happens after one interval. Store failures are logged and
/// the task keeps running; abort the returned handle to stop it.
pub fn spawn_pruner(ledger: Arc<AuthorizationLedger>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match ledger.remove_expired(OffsetDateTime::now_utc()).await {
                Ok(removed) => debug!(removed, "Pruned expired authorization grants"),
                Err(e) => warn!(error = %e, "Failed to prune expired authorization grants"),
            }
        }
    })
}

/// Spawns the pruner if the configuration enables it.
pub fn spawn_configured_pruner(
    ledger: Arc<AuthorizationLedger>,
    config: &PruningConfig,
) -> Option<JoinHandle<()>> {
    config
        .enabled
        .then(|| spawn_pruner(ledger, config.interval))
}
