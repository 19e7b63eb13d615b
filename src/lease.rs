// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! A cluster-unique lock built on coordinator kv sessions.
//!
//! Acquisition is a compare-and-set of the lock key bound to a fresh session
//! lease; the key exists exactly as long as the session does. A background
//! task heartbeats the session and flips a watch channel when the session can
//! no longer be kept alive, which surfaces to the owner via
//! [`Lease::on_lost`]. Mutual exclusion holds modulo the usual split-brain
//! window of the session TTL.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::info;
use log::warn;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordinator::CoordinatorClient;
use crate::coordinator::LeaseId;
use crate::Error;
use crate::Result;

/// Factory for [`Lease`]s of one named cluster-wide lock.
pub struct LockService<C> {
    name: String,
    holder: String,
    client: Arc<C>,
    session_ttl: Duration,
}

/// A held cluster-unique lock. Dropping it stops the heartbeat, letting the
/// session expire and the lock key vanish.
pub struct Lease {
    name: String,
    id: LeaseId,
    lost_rx: watch::Receiver<bool>,
    keeper: JoinHandle<()>,
}

impl Lease {
    pub fn id(&self) -> LeaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves with [`Error::LeaseLost`] when the lease is revoked or its
    /// session dies. Holding the lock is no longer guaranteed afterwards.
    pub async fn on_lost(&mut self) -> Error {
        while !*self.lost_rx.borrow() {
            if self.lost_rx.changed().await.is_err() {
                break;
            }
        }
        Error::LeaseLost {
            name: self.name.clone(),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.keeper.abort();
    }
}

impl<C: CoordinatorClient> LockService<C> {
    pub fn new(
        name: impl Into<String>,
        holder: impl Into<String>,
        client: Arc<C>,
        session_ttl: Duration,
    ) -> Self {
        LockService {
            name: name.into(),
            holder: holder.into(),
            client,
            session_ttl,
        }
    }

    /// Wait until this process holds the lock, however long that takes.
    ///
    /// Coordinator errors propagate to the caller; contention does not. When
    /// another node holds the lock, acquisition parks on a delete watch of
    /// the lock key and retries the compare-and-set once the holder's key is
    /// gone.
    pub async fn acquire(&self) -> Result<Lease> {
        let key = self.name.as_bytes();
        loop {
            let id = self.client.lease_grant(self.session_ttl).await?;
            if self
                .client
                .put_if_absent(key, self.holder.clone().into_bytes(), id)
                .await?
            {
                info!("acquired lease {} with session {}", self.name, id);
                let (lost_tx, lost_rx) = watch::channel(false);
                let keeper = tokio::spawn(keep_alive(
                    self.client.clone(),
                    self.name.clone(),
                    id,
                    keep_alive_period(self.session_ttl),
                    lost_tx,
                ));
                return Ok(Lease {
                    name: self.name.clone(),
                    id,
                    lost_rx,
                    keeper,
                });
            }
            self.client.lease_revoke(id).await?;
            debug!("lease {} is held by another node, waiting", self.name);
            self.client.watch_delete(key).await?;
        }
    }
}

fn keep_alive_period(session_ttl: Duration) -> Duration {
    (session_ttl / 3).max(Duration::from_millis(1))
}

async fn keep_alive<C: CoordinatorClient>(
    client: Arc<C>,
    name: String,
    id: LeaseId,
    period: Duration,
    lost_tx: watch::Sender<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = client.lease_keep_alive(id).await {
            warn!("lease {} session {} keep-alive failed: {}", name, id, e);
            let _ = lost_tx.send(true);
            return;
        }
    }
}
