// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! Aggregation of table-row-lock timestamps across the cluster.
//!
//! Every computing node may hold row-level table locks on behalf of long
//! readers or DDL. The minimum start ts over all of them caps the GC safe
//! point, so a peer that cannot be reached is a hard failure: missing its
//! locks could let GC run past an active reader.

use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;
use log::warn;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::backoff::{Backoff, PEER_LOCKS_BACKOFF};
use crate::{Error, Result};

/// The network endpoint of a computing node.
#[derive(new, Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TableLockType {
    Table,
    Row,
}

/// A table lock held by a computing node.
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct TableLock {
    pub lock_type: TableLockType,
    pub lock_ts: u64,
}

/// The "show locks" surface of one computing node, local or remote.
#[async_trait]
pub trait PeerClient: Send + Sync + 'static {
    async fn table_locks(&self) -> Result<Vec<TableLock>>;
}

/// The cluster membership service.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Endpoints of all computing nodes currently registered, including the
    /// local one.
    async fn computing_locations(&self) -> Result<Vec<Location>>;

    /// A proxy to the given peer's "show locks" API.
    async fn peer(&self, location: &Location) -> Result<Arc<dyn PeerClient>>;
}

/// The minimum start ts over all ROW table locks held anywhere in the
/// cluster, or `None` when nobody holds one.
///
/// Remote peers are retried with bounded backoff; exhausting the retries
/// fails the caller's tick.
pub async fn min_row_lock_ts(
    cluster: &impl ClusterClient,
    local: &dyn PeerClient,
    local_location: &Location,
) -> Result<Option<u64>> {
    let mut min = fold_min(None, local.table_locks().await?);
    for location in cluster.computing_locations().await? {
        if location == *local_location {
            continue;
        }
        min = fold_min(min, peer_locks_with_retry(cluster, &location).await?);
    }
    Ok(min)
}

fn fold_min(mut min: Option<u64>, locks: Vec<TableLock>) -> Option<u64> {
    for lock in locks {
        if lock.lock_type == TableLockType::Row {
            min = Some(min.map_or(lock.lock_ts, |m| m.min(lock.lock_ts)));
        }
    }
    min
}

async fn peer_locks_with_retry(
    cluster: &impl ClusterClient,
    location: &Location,
) -> Result<Vec<TableLock>> {
    let mut backoff = PEER_LOCKS_BACKOFF;
    loop {
        let err = match cluster.peer(location).await {
            Ok(peer) => match peer.table_locks().await {
                Ok(locks) => return Ok(locks),
                Err(e) => e,
            },
            Err(e) => e,
        };
        match backoff.next_delay_duration() {
            Some(delay) => {
                warn!("fetch table locks from {} failed, retry: {}", location, err);
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(Error::PeerUnreachable {
                    location: location.to_string(),
                    source: Box::new(err),
                });
            }
        }
    }
}
