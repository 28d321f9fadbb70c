use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::db::DbPool;
use crate::services::TokenRegistry;

/// Spawns the background expiry sweep
///
/// Expired tokens are already rejected lazily on every access; the sweep
/// reclaims their rows and cascaded logs. Deletion goes through the same
/// pool as in-flight captures, so a sweep can never tear a half-admitted
/// entry out from under a transaction.
pub fn spawn(pool: DbPool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match TokenRegistry::delete_expired(&pool, Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => log::info!("Expiry sweep removed {} token(s)", removed),
                Err(e) => log::error!("Expiry sweep failed: {:?}", e),
            }
        }
    })
}
