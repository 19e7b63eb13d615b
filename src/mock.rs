// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! Various mock versions of the various clients and other objects.
//!
//! The goal is to be able to test functionality independently of the rest of
//! the system, in particular without requiring a coordinator quorum, shard
//! services, or an RPC layer.

use std::any::Any;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::coordinator::CoordinatorClient;
use crate::coordinator::LeaseId;
use crate::internal_err;
use crate::peers::{ClusterClient, Location, PeerClient, TableLock};
use crate::proto::*;
use crate::region::Region;
use crate::router::{RegionConnect, RegionService};
use crate::timestamp::TimestampExt;
use crate::tso::TsoClient;
use crate::{Error, Result};

/// An in-memory coordinator: versioned kv, session leases and a recorder of
/// published safe points.
#[derive(Default)]
pub struct MockCluster {
    kv: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    regions: Mutex<Vec<Region>>,
    safe_points: Mutex<Vec<u64>>,
    lock_table: Mutex<HashMap<Vec<u8>, LeaseId>>,
    granted: Mutex<HashSet<LeaseId>>,
    next_lease: AtomicI64,
    keep_alive_broken: AtomicBool,
    lease_grant_failures: AtomicUsize,
    deleted: Notify,
}

impl MockCluster {
    pub fn with_regions(regions: Vec<Region>) -> MockCluster {
        MockCluster {
            regions: Mutex::new(regions),
            ..Default::default()
        }
    }

    pub fn put_kv(&self, key: &[u8], value: &[u8]) {
        self.kv.lock().unwrap().insert(key.to_vec(), value.to_vec());
    }

    /// Safe points published so far, in order.
    pub fn safe_points(&self) -> Vec<u64> {
        self.safe_points.lock().unwrap().clone()
    }

    pub fn holds_lock(&self, key: &[u8]) -> bool {
        self.lock_table.lock().unwrap().contains_key(key)
    }

    /// Make every subsequent keep-alive fail, as if the coordinator declared
    /// the session dead.
    pub fn fail_keep_alive(&self) {
        self.keep_alive_broken.store(true, Ordering::SeqCst);
    }

    pub fn heal_keep_alive(&self) {
        self.keep_alive_broken.store(false, Ordering::SeqCst);
    }

    /// Fail the next `n` lease grants.
    pub fn fail_lease_grants(&self, n: usize) {
        self.lease_grant_failures.store(n, Ordering::SeqCst);
    }

    /// Kill a session from the outside, releasing its keys.
    pub async fn revoke(&self, lease: LeaseId) {
        self.lease_revoke(lease).await.unwrap();
    }

    /// Expire every granted session at once, as the coordinator would after
    /// their TTLs lapse.
    pub async fn expire_all(&self) {
        let granted: Vec<LeaseId> = self.granted.lock().unwrap().iter().copied().collect();
        for lease in granted {
            self.lease_revoke(lease).await.unwrap();
        }
    }
}

#[async_trait]
impl CoordinatorClient for MockCluster {
    async fn kv_range(&self, _req_ts: u64, key: &[u8]) -> Result<Vec<KeyValue>> {
        Ok(self
            .kv
            .lock()
            .unwrap()
            .get(key)
            .map(|value| KeyValue {
                key: key.to_vec(),
                value: value.clone(),
            })
            .into_iter()
            .collect())
    }

    async fn get_region_map(&self, _req_ts: u64) -> Result<Vec<Region>> {
        Ok(self.regions.lock().unwrap().clone())
    }

    async fn update_gc_safe_point(&self, _req_ts: u64, safe_point: u64) -> Result<()> {
        self.safe_points.lock().unwrap().push(safe_point);
        Ok(())
    }

    async fn lease_grant(&self, _ttl: Duration) -> Result<LeaseId> {
        let failures = self.lease_grant_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.lease_grant_failures
                .store(failures - 1, Ordering::SeqCst);
            return Err(Error::StringError("injected lease grant failure".to_owned()));
        }
        let id = self.next_lease.fetch_add(1, Ordering::SeqCst) + 1;
        self.granted.lock().unwrap().insert(id);
        Ok(id)
    }

    async fn lease_keep_alive(&self, lease: LeaseId) -> Result<()> {
        if self.keep_alive_broken.load(Ordering::SeqCst)
            || !self.granted.lock().unwrap().contains(&lease)
        {
            return Err(Error::StringError(format!("lease {} expired", lease)));
        }
        Ok(())
    }

    async fn lease_revoke(&self, lease: LeaseId) -> Result<()> {
        self.granted.lock().unwrap().remove(&lease);
        self.lock_table
            .lock()
            .unwrap()
            .retain(|_, owner| *owner != lease);
        self.deleted.notify_waiters();
        Ok(())
    }

    async fn put_if_absent(&self, key: &[u8], _value: Vec<u8>, lease: LeaseId) -> Result<bool> {
        let mut lock_table = self.lock_table.lock().unwrap();
        if lock_table.contains_key(key) {
            return Ok(false);
        }
        lock_table.insert(key.to_vec(), lease);
        Ok(true)
    }

    async fn watch_delete(&self, key: &[u8]) -> Result<()> {
        loop {
            let deleted = self.deleted.notified();
            if !self.lock_table.lock().unwrap().contains_key(key) {
                return Ok(());
            }
            deleted.await;
        }
    }
}

/// A timestamp oracle pinned to one timestamp, so tests can predict every
/// derived value.
pub struct MockTso {
    ts: Timestamp,
}

impl MockTso {
    pub fn with_ts(ts: Timestamp) -> MockTso {
        MockTso { ts }
    }

    pub fn with_version(version: u64) -> MockTso {
        MockTso {
            ts: Timestamp::from_version(version),
        }
    }
}

#[async_trait]
impl TsoClient for MockTso {
    async fn tso(&self) -> Result<Timestamp> {
        Ok(self.ts)
    }
}

/// One computing node's "show locks" surface.
#[derive(Default)]
pub struct MockPeer {
    locks: Vec<TableLock>,
    failures: AtomicUsize,
}

impl MockPeer {
    pub fn with_locks(locks: Vec<TableLock>) -> MockPeer {
        MockPeer {
            locks,
            failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls; `usize::MAX` fails forever.
    pub fn fail_times(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerClient for MockPeer {
    async fn table_locks(&self) -> Result<Vec<TableLock>> {
        let failures = self.failures.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != usize::MAX {
                self.failures.store(failures - 1, Ordering::SeqCst);
            }
            return Err(Error::StringError("injected peer failure".to_owned()));
        }
        Ok(self.locks.clone())
    }
}

/// Cluster membership with a fixed set of peers.
#[derive(Default)]
pub struct MockPeers {
    locations: Vec<Location>,
    peers: HashMap<Location, Arc<MockPeer>>,
}

impl MockPeers {
    pub fn add_peer(&mut self, location: Location, peer: MockPeer) {
        self.locations.push(location.clone());
        self.peers.insert(location, Arc::new(peer));
    }

    /// Register a location without a reachable peer, e.g. the local node.
    pub fn add_location(&mut self, location: Location) {
        self.locations.push(location);
    }
}

#[async_trait]
impl ClusterClient for MockPeers {
    async fn computing_locations(&self) -> Result<Vec<Location>> {
        Ok(self.locations.clone())
    }

    async fn peer(&self, location: &Location) -> Result<Arc<dyn PeerClient>> {
        self.peers
            .get(location)
            .cloned()
            .map(|peer| peer as Arc<dyn PeerClient>)
            .ok_or_else(|| Error::StringError(format!("no peer at {}", location)))
    }
}

pub type DispatchHook =
    dyn Fn(&Region, &(dyn Any + Send + Sync)) -> Result<Box<dyn Any + Send>> + Send + Sync;

/// Connects [`MockRegionService`]s and counts how often it is asked to.
#[derive(Clone)]
pub struct MockConnect {
    hook: Arc<DispatchHook>,
    delay: Option<Duration>,
    connects: Arc<AtomicUsize>,
}

impl MockConnect {
    /// Every request succeeds with a default response.
    pub fn ok() -> MockConnect {
        MockConnect::with_dispatch_hook(default_dispatch)
    }

    pub fn with_dispatch_hook(
        hook: impl Fn(&Region, &(dyn Any + Send + Sync)) -> Result<Box<dyn Any + Send>> + Send + Sync + 'static,
    ) -> MockConnect {
        MockConnect {
            hook: Arc::new(hook),
            delay: None,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before answering each request, to widen race windows under test.
    pub fn with_delay(mut self, delay: Duration) -> MockConnect {
        self.delay = Some(delay);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

fn default_dispatch(_: &Region, req: &(dyn Any + Send + Sync)) -> Result<Box<dyn Any + Send>> {
    if req.is::<TxnScanLockRequest>() {
        Ok(Box::new(TxnScanLockResponse::default()))
    } else if req.is::<TxnCheckTxnStatusRequest>() {
        Ok(Box::new(TxnCheckTxnStatusResponse::default()))
    } else if req.is::<TxnPessimisticRollbackRequest>() {
        Ok(Box::new(TxnPessimisticRollbackResponse::default()))
    } else if req.is::<TxnResolveLockRequest>() {
        Ok(Box::new(TxnResolveLockResponse::default()))
    } else {
        Err(internal_err!("unexpected request type"))
    }
}

#[async_trait]
impl RegionConnect for MockConnect {
    type Service = MockRegionService;

    async fn connect(&self, region: &Region, _timeout: Duration) -> Result<MockRegionService> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockRegionService {
            region: region.clone(),
            hook: self.hook.clone(),
            delay: self.delay,
        })
    }
}

#[derive(Clone)]
pub struct MockRegionService {
    region: Region,
    hook: Arc<DispatchHook>,
    delay: Option<Duration>,
}

impl std::fmt::Debug for MockRegionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegionService")
            .field("region", &self.region)
            .field("delay", &self.delay)
            .finish()
    }
}

impl MockRegionService {
    async fn dispatch<Resp: 'static>(&self, req: &(dyn Any + Send + Sync)) -> Result<Resp> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let resp = (self.hook)(&self.region, req)?;
        Ok(*resp
            .downcast::<Resp>()
            .expect("mock dispatch hook returned the wrong response type"))
    }
}

#[async_trait]
impl RegionService for MockRegionService {
    async fn txn_scan_lock(
        &self,
        _req_ts: u64,
        req: TxnScanLockRequest,
    ) -> Result<TxnScanLockResponse> {
        self.dispatch(&req).await
    }

    async fn txn_check_txn_status(
        &self,
        _req_ts: u64,
        req: TxnCheckTxnStatusRequest,
    ) -> Result<TxnCheckTxnStatusResponse> {
        self.dispatch(&req).await
    }

    async fn txn_pessimistic_rollback(
        &self,
        _req_ts: u64,
        req: TxnPessimisticRollbackRequest,
    ) -> Result<TxnPessimisticRollbackResponse> {
        self.dispatch(&req).await
    }

    async fn txn_resolve_lock(
        &self,
        _req_ts: u64,
        req: TxnResolveLockRequest,
    ) -> Result<TxnResolveLockResponse> {
        self.dispatch(&req).await
    }
}
