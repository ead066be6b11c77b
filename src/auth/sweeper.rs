//! Background purge of stale revocation entries.

use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::revocation::RevocationLedger;

/// Spawn a task that purges expired ledger entries every `interval`.
///
/// Returns `None` when `interval` is zero (sweeping disabled). Purging never
/// changes which tokens are accepted.
pub fn spawn_revocation_sweeper(
    ledger: Arc<dyn RevocationLedger>,
    interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        debug!("Revocation sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match ledger.purge_expired().await {
                Ok(0) => debug!("No expired revocation entries"),
                Ok(purged) => info!(purged, "Purged expired revocation entries"),
                Err(err) => error!("revocation sweep failed: {err}"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryRevocationLedger;
    use anyhow::Result;
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn zero_interval_disables_sweeper() {
        let ledger: Arc<dyn RevocationLedger> = Arc::new(MemoryRevocationLedger::default());
        assert!(spawn_revocation_sweeper(ledger, Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_stale_entries() -> Result<()> {
        let ledger = Arc::new(MemoryRevocationLedger::default());
        let now = Utc::now();
        ledger.revoke("stale", now - ChronoDuration::minutes(1)).await?;
        ledger.revoke("live", now + ChronoDuration::hours(1)).await?;

        let handle = spawn_revocation_sweeper(ledger.clone(), Duration::from_secs(60));
        assert!(handle.is_some());

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            if ledger.len().await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(ledger.len().await, 1);
        assert!(ledger.is_revoked("live").await?);

        if let Some(handle) = handle {
            handle.abort();
        }
        Ok(())
    }
}
