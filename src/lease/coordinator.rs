use super::store::CoordinationStore;
use super::types::Lease;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Grants and renews shard leases on behalf of the manager.
///
/// Holds no lease state of its own: the coordination store is the single source of truth,
/// so any number of coordinators sharing one store stay consistent.
pub struct LeaseCoordinator {
    store: Arc<dyn CoordinationStore>,
    /// Fixed acquisition order.
    shards: Vec<String>,
    duration: Duration,
}

impl LeaseCoordinator {
    pub fn new(store: Arc<dyn CoordinationStore>, shards: Vec<String>, duration: Duration) -> Self {
        tracing::info!(
            "Lease coordinator managing {} shard(s): {:?}",
            shards.len(),
            shards
        );

        Self {
            store,
            shards,
            duration,
        }
    }

    pub fn shards(&self) -> &[String] {
        &self.shards
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn new_lease(&self, shard: &str, holder: &str) -> Lease {
        Lease {
            shard_name: shard.to_string(),
            holder: holder.to_string(),
            duration: self.duration.as_secs(),
        }
    }

    /// Renews `renew` for `holder` if it still holds it, otherwise hands back any shard the
    /// holder already owns, otherwise grants the first free shard.
    ///
    /// Returns `Ok(None)` when every shard is taken; the caller retries later. A failed
    /// renewal is not an error: the holder simply competes for a shard like a newcomer.
    pub async fn lease(&self, holder: &str, renew: Option<&str>) -> Result<Option<Lease>> {
        if let Some(shard) = renew {
            match self.store.extend_if_equals(shard, holder, self.duration).await {
                Ok(true) => {
                    tracing::debug!("Renewed {} for {}", shard, holder);
                    return Ok(Some(self.new_lease(shard, holder)));
                }
                Ok(false) => {
                    tracing::info!("Renewal of {} denied for {}", shard, holder);
                }
                Err(e) => {
                    tracing::warn!("Renewal of {} for {} failed: {}", shard, holder, e);
                }
            }
        }

        // A grant whose reply never reached the holder is handed out again, not doubled.
        for shard in self.shards.iter().filter(|s| Some(s.as_str()) != renew) {
            if self.store.extend_if_equals(shard, holder, self.duration).await? {
                tracing::info!("{} already holds {}, extended", holder, shard);
                return Ok(Some(self.new_lease(shard, holder)));
            }
        }

        for shard in &self.shards {
            if self.store.set_if_absent(shard, holder, self.duration).await? {
                tracing::info!("Leased {} to {}", shard, holder);
                return Ok(Some(self.new_lease(shard, holder)));
            }
        }

        tracing::warn!("No free shard to lease to {}", holder);
        Ok(None)
    }

    /// Identity currently holding `shard`, if any.
    pub async fn holder(&self, shard: &str) -> Result<Option<String>> {
        self.store.get(shard).await
    }
}
