// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! The periodic safe-point update task.
//!
//! A single driver instance runs cluster-wide, elected through the
//! `safe-point-update` lease. While the lease is held, a tick fires every
//! `tick_period`: it computes a candidate safe ts from the configured
//! transaction retention window and the table locks held across the cluster,
//! sweeps every table-keyspace region for older locks, and publishes the
//! possibly-lowered result to the coordinator. Publication is the tick's
//! single commit point; everything before it is side-effect free with
//! respect to the safe point.

use std::convert::TryInto;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::backoff::lease_retry_backoff;
use crate::backoff::Backoff;
use crate::config::Config;
use crate::coordinator::CoordinatorClient;
use crate::coordinator::DEFAULT_TXN_DURATION_MS;
use crate::coordinator::SAFE_POINT_DISABLE_KEY;
use crate::coordinator::SAFE_POINT_LOCK_NAME;
use crate::coordinator::TXN_DURATION_KEY;
use crate::internal_err;
use crate::lease::LockService;
use crate::peers;
use crate::peers::ClusterClient;
use crate::peers::PeerClient;
use crate::resolve;
use crate::router::RegionConnect;
use crate::router::RegionRouter;
use crate::stats;
use crate::timestamp::Timestamp;
use crate::timestamp::TimestampExt;
use crate::tso::TsoClient;
use crate::Result;

/// Ceiling for lease re-acquisition delays once the backoff is exhausted.
const LEASE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// The cluster-singleton GC safe-point driver.
///
/// Owned by `main` and shared with the runtime via [`Arc`]; all cluster-wide
/// coordination state (the lease, the re-entrancy latch, the region client
/// cache) lives in this value rather than in process globals.
pub struct SafePointDriver<C, T, Cl, Conn: RegionConnect> {
    config: Config,
    coordinator: Arc<C>,
    tso: Arc<T>,
    cluster: Arc<Cl>,
    local_locks: Arc<dyn PeerClient>,
    router: RegionRouter<C, Conn>,
    lock_service: LockService<C>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<C, T, Cl, Conn> SafePointDriver<C, T, Cl, Conn>
where
    C: CoordinatorClient,
    T: TsoClient,
    Cl: ClusterClient,
    Conn: RegionConnect,
{
    pub fn new(
        config: Config,
        coordinator: Arc<C>,
        tso: Arc<T>,
        cluster: Arc<Cl>,
        local_locks: Arc<dyn PeerClient>,
        connect: Conn,
    ) -> Self {
        let router = RegionRouter::new(
            coordinator.clone(),
            connect,
            config.region_client_ttl,
            config.timeout,
        );
        let lock_service = LockService::new(
            SAFE_POINT_LOCK_NAME,
            config.local_location.to_string(),
            coordinator.clone(),
            config.lease_ttl,
        );
        SafePointDriver {
            config,
            coordinator,
            tso,
            cluster,
            local_locks,
            router,
            lock_service,
            running: AtomicBool::new(false),
        }
    }

    /// Drive the safe-point update task forever.
    ///
    /// Acquires the cluster-unique lease, ticks at the configured cadence
    /// while it is held, and re-enters acquisition whenever the lease is
    /// lost. A tick in flight at that moment is cancelled at its next
    /// suspension point.
    pub async fn run(self: Arc<Self>) {
        let mut backoff = lease_retry_backoff();
        loop {
            let mut lease = match self.lock_service.acquire().await {
                Ok(lease) => lease,
                Err(e) => {
                    error!("acquire {} lease failed: {}", SAFE_POINT_LOCK_NAME, e);
                    let delay = backoff.next_delay_duration().unwrap_or(LEASE_RETRY_INTERVAL);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            backoff = lease_retry_backoff();
            info!("start safe point update task");
            tokio::select! {
                err = lease.on_lost() => {
                    warn!("{}, restart safe point update task", err);
                }
                _ = self.tick_loop() => {}
            }
        }
    }

    async fn tick_loop(&self) {
        let start = tokio::time::Instant::now() + self.config.initial_delay;
        let mut interval = tokio::time::interval_at(start, self.config.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = self.safe_point_update().await {
                error!("update safe point error, skip this run: {}", e);
            }
        }
    }

    /// Run one safe-point update tick now.
    ///
    /// Returns without doing anything when a previous tick is still running;
    /// ticks never overlap and are never queued.
    pub async fn safe_point_update(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("safe point update task still running, skip this tick");
            stats::observe_tick_skipped();
            return Ok(());
        }
        let _running = RunningGuard(&self.running);
        let tick = stats::TickStats::new();
        match self.update_once().await {
            Ok(published) => {
                tick.done(if published { "success" } else { "disabled" });
                Ok(())
            }
            Err(e) => {
                tick.done("failed");
                Err(e)
            }
        }
    }

    async fn update_once(&self) -> Result<bool> {
        let req_ts = self.tso.tso().await?.version();
        let mut safe_ts = self.compute_safe_ts(req_ts).await?;
        info!(
            "run safe point update task, current ts: {}, safe ts: {}",
            req_ts, safe_ts
        );
        let regions = self.coordinator.get_region_map(req_ts).await?;
        for region in &regions {
            if !region.is_table_space() {
                continue;
            }
            safe_ts = resolve::scan_and_resolve_region(
                &self.router,
                region,
                safe_ts,
                req_ts,
                self.config.scan_limit,
            )
            .await?;
        }
        info!("update safe point to: {}", safe_ts);
        if self.is_disabled(req_ts).await? {
            info!("safe point update task disabled, skip call coordinator");
            return Ok(false);
        }
        let safe_point = safe_ts - 1;
        self.coordinator
            .update_gc_safe_point(req_ts, safe_point)
            .await?;
        stats::observe_safe_point(safe_point);
        Ok(true)
    }

    /// The candidate safe ts: `req_ts` moved back by the transaction
    /// retention window, capped by the oldest ROW table lock held anywhere in
    /// the cluster.
    async fn compute_safe_ts(&self, req_ts: u64) -> Result<u64> {
        let kvs = self.coordinator.kv_range(req_ts, TXN_DURATION_KEY).await?;
        let safe_ts = match kvs.first() {
            Some(kv) => req_ts.saturating_sub(decode_txn_duration(&kv.value)? as u64),
            None => {
                let wall = Timestamp::from_version(req_ts).wall_ms();
                Timestamp::from_wall_ms(wall - DEFAULT_TXN_DURATION_MS).version()
            }
        };
        let min_lock_ts = peers::min_row_lock_ts(
            self.cluster.as_ref(),
            self.local_locks.as_ref(),
            &self.config.local_location,
        )
        .await?;
        Ok(min_lock_ts.map_or(safe_ts, |min| min.min(safe_ts)))
    }

    async fn is_disabled(&self, req_ts: u64) -> Result<bool> {
        Ok(!self
            .coordinator
            .kv_range(req_ts, SAFE_POINT_DISABLE_KEY)
            .await?
            .is_empty())
    }
}

fn decode_txn_duration(value: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| internal_err!("malformed txn-duration value: {:?}", value))?;
    let ms = i64::from_be_bytes(bytes);
    if ms < 0 {
        return Err(internal_err!("negative txn-duration: {}", ms));
    }
    Ok(ms)
}
