// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! Dispatch of transaction RPCs to the shard service owning a region.
//!
//! Store and index regions are served by different backends but share the
//! lock-resolution capability set, so the dispatch by
//! [`RegionType`](crate::region::RegionType) happens here at the connect
//! boundary and the scan-and-resolve engine only ever sees
//! [`RegionService`]s. Clients are cached per region id with a small TTL and
//! dropped eagerly when a caller reports them stale.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::coordinator::CoordinatorClient;
use crate::kv::Key;
use crate::proto::*;
use crate::region::Region;
use crate::region::RegionId;
use crate::Error;
use crate::Result;

/// The lock-resolution capability set shared by store and index shard
/// services.
#[async_trait]
pub trait RegionService: Send + Sync + 'static {
    async fn txn_scan_lock(
        &self,
        req_ts: u64,
        req: TxnScanLockRequest,
    ) -> Result<TxnScanLockResponse>;

    async fn txn_check_txn_status(
        &self,
        req_ts: u64,
        req: TxnCheckTxnStatusRequest,
    ) -> Result<TxnCheckTxnStatusResponse>;

    async fn txn_pessimistic_rollback(
        &self,
        req_ts: u64,
        req: TxnPessimisticRollbackRequest,
    ) -> Result<TxnPessimisticRollbackResponse>;

    async fn txn_resolve_lock(
        &self,
        req_ts: u64,
        req: TxnResolveLockRequest,
    ) -> Result<TxnResolveLockResponse>;
}

/// A trait for connecting to the shard service backing a region. The
/// returned client applies `timeout` as the deadline of every request.
#[async_trait]
pub trait RegionConnect: Send + Sync + 'static {
    type Service: RegionService + Clone + Send + Sync + 'static;

    async fn connect(&self, region: &Region, timeout: Duration) -> Result<Self::Service>;
}

struct CachedService<S> {
    service: S,
    created: Instant,
}

struct RegionMapCache {
    by_start_key: BTreeMap<Key, Region>,
    fetched: Option<Instant>,
}

impl RegionMapCache {
    fn lookup(&self, key: &Key) -> Option<Region> {
        let (_, region) = self.by_start_key.range(..=key.clone()).next_back()?;
        if region.contains(key) {
            Some(region.clone())
        } else {
            None
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched.map_or(false, |at| at.elapsed() < ttl)
    }

    fn replace(&mut self, regions: Vec<Region>) {
        self.by_start_key = regions
            .into_iter()
            .map(|r| (r.start_key.clone(), r))
            .collect();
        self.fetched = Some(Instant::now());
    }
}

pub struct RegionRouter<C, Conn: RegionConnect> {
    coordinator: Arc<C>,
    connect: Conn,
    client_ttl: Duration,
    timeout: Duration,
    services: RwLock<HashMap<RegionId, CachedService<Conn::Service>>>,
    regions: RwLock<RegionMapCache>,
}

impl<C: CoordinatorClient, Conn: RegionConnect> RegionRouter<C, Conn> {
    pub fn new(coordinator: Arc<C>, connect: Conn, client_ttl: Duration, timeout: Duration) -> Self {
        RegionRouter {
            coordinator,
            connect,
            client_ttl,
            timeout,
            services: RwLock::new(HashMap::new()),
            regions: RwLock::new(RegionMapCache {
                by_start_key: BTreeMap::new(),
                fetched: None,
            }),
        }
    }

    /// A client bound to the shard service owning `region`, reusing a cached
    /// one when it is still within its TTL.
    pub async fn service_for_region(&self, region: &Region) -> Result<Conn::Service> {
        {
            let services = self.services.read().await;
            if let Some(cached) = services.get(&region.id) {
                if cached.created.elapsed() < self.client_ttl {
                    return Ok(cached.service.clone());
                }
            }
        }
        let service = self.connect.connect(region, self.timeout).await?;
        self.services.write().await.insert(
            region.id,
            CachedService {
                service: service.clone(),
                created: Instant::now(),
            },
        );
        Ok(service)
    }

    /// The region currently containing `key`, together with a client for it.
    /// Used for status probes, which always target the region owning the
    /// transaction's primary key.
    pub async fn service_for_key(
        &self,
        req_ts: u64,
        key: &Key,
    ) -> Result<(Region, Conn::Service)> {
        let region = self.region_for_key(req_ts, key).await?;
        let service = self.service_for_region(&region).await?;
        Ok((region, service))
    }

    async fn region_for_key(&self, req_ts: u64, key: &Key) -> Result<Region> {
        {
            let regions = self.regions.read().await;
            if regions.is_fresh(self.client_ttl) {
                if let Some(region) = regions.lookup(key) {
                    return Ok(region);
                }
            }
        }
        let map = self.coordinator.get_region_map(req_ts).await?;
        let mut regions = self.regions.write().await;
        regions.replace(map);
        regions.lookup(key).ok_or_else(|| Error::RegionForKeyNotFound {
            key: key.as_ref().to_vec(),
        })
    }

    /// Drop the cached client for a region, e.g. after a region-not-found or
    /// region-split response.
    pub async fn invalidate(&self, region_id: RegionId) {
        self.services.write().await.remove(&region_id);
    }
}
