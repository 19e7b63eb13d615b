// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! The scan-and-resolve engine.
//!
//! Pages through every lock older than the candidate safe ts on one region,
//! probes the owning transaction's primary lock for its fate and either rolls
//! the lock back, resolves it to the transaction's commit state, or leaves it
//! alone. Leaving a lock alone is the only outcome that constrains the tick:
//! the safe ts is lowered to the lock's start ts so the locked transaction's
//! writes stay visible to GC as live.
//!
//! Within a tick the safe ts only ever decreases. Every per-lock failure is
//! absorbed into that downgrade; only transport-level errors abort the tick.

use std::cmp::min;

use log::debug;
use log::info;

use crate::coordinator::CoordinatorClient;
use crate::kv::HexRepr;
use crate::kv::Key;
use crate::proto::*;
use crate::region::Region;
use crate::router::{RegionConnect, RegionRouter, RegionService};
use crate::stats;
use crate::Result;

const PESSIMISTIC_ROLLBACK_ACTIONS: [Action; 3] = [
    Action::LockNotExistRollback,
    Action::TtlExpirePessimisticRollback,
    Action::TtlExpireRollback,
];

pub fn new_scan_lock_request(
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    max_ts: u64,
    limit: u32,
) -> TxnScanLockRequest {
    TxnScanLockRequest {
        start_key,
        end_key,
        max_ts,
        limit,
    }
}

pub fn new_check_txn_status_request(safe_ts: u64, lock: &LockInfo) -> TxnCheckTxnStatusRequest {
    TxnCheckTxnStatusRequest {
        primary_key: lock.primary_lock.clone(),
        lock_ts: lock.lock_ts,
        caller_start_ts: safe_ts,
        current_ts: safe_ts,
    }
}

pub fn new_pessimistic_rollback_request(lock: &LockInfo) -> TxnPessimisticRollbackRequest {
    TxnPessimisticRollbackRequest {
        start_ts: lock.lock_ts,
        for_update_ts: lock.for_update_ts,
        keys: vec![lock.key.clone()],
    }
}

pub fn new_resolve_lock_request(lock: &LockInfo, commit_ts: u64) -> TxnResolveLockRequest {
    TxnResolveLockRequest {
        start_ts: lock.lock_ts,
        commit_ts,
        keys: vec![lock.key.clone()],
    }
}

/// Page through all locks on `region` older than `safe_ts` and resolve each
/// of them. Returns the (possibly lowered) safe ts.
pub async fn scan_and_resolve_region<C: CoordinatorClient, Conn: RegionConnect>(
    router: &RegionRouter<C, Conn>,
    region: &Region,
    mut safe_ts: u64,
    req_ts: u64,
    limit: u32,
) -> Result<u64> {
    info!("scan {} locks", region.id);
    let end_key: Vec<u8> = region.end_key.clone().into();
    let mut start_key: Vec<u8> = region.start_key.clone().into();
    loop {
        debug!(
            "scan {} locks range: [{}, {})",
            region.id,
            HexRepr(&start_key),
            HexRepr(&end_key)
        );
        let service = router.service_for_region(region).await?;
        let resp = service
            .txn_scan_lock(
                req_ts,
                new_scan_lock_request(start_key, end_key.clone(), safe_ts, limit),
            )
            .await?;
        if !resp.locks.is_empty() {
            safe_ts = resolve_locks(router, region, resp.locks, safe_ts, req_ts).await?;
        }
        if resp.has_more {
            start_key = resp.end_key;
        } else {
            return Ok(safe_ts);
        }
    }
}

/// Determine the fate of each scanned lock and act on it. Returns the safe
/// ts, lowered to the start ts of every lock that could not be cleanly
/// resolved.
pub async fn resolve_locks<C: CoordinatorClient, Conn: RegionConnect>(
    router: &RegionRouter<C, Conn>,
    region: &Region,
    locks: Vec<LockInfo>,
    safe_ts: u64,
    req_ts: u64,
) -> Result<u64> {
    let mut result = safe_ts;
    for lock in locks {
        let status = check_txn(router, safe_ts, req_ts, &lock).await?;
        if status.txn_result.is_some() {
            stats::observe_lock_outcome("left");
            result = min(result, lock.lock_ts);
            continue;
        }
        if is_pessimistic_rollback_status(&lock, status.action) {
            if pessimistic_rollback(router, region, req_ts, &lock).await? {
                stats::observe_lock_outcome("pessimistic_rolled_back");
            } else {
                stats::observe_lock_outcome("left");
                result = min(result, lock.lock_ts);
            }
        } else if is_resolve_lock_status(&status) {
            if resolve(router, region, req_ts, &lock, status.commit_ts).await? {
                stats::observe_lock_outcome(if status.commit_ts > 0 {
                    "committed"
                } else {
                    "rolled_back"
                });
            } else {
                stats::observe_lock_outcome("left");
                result = min(result, lock.lock_ts);
            }
        } else {
            stats::observe_lock_outcome("left");
            result = min(result, lock.lock_ts);
        }
    }
    Ok(result)
}

/// Probe the status of the transaction owning `lock`, addressed to the shard
/// owning the primary lock. That may be a different region than the one the
/// lock was scanned on.
async fn check_txn<C: CoordinatorClient, Conn: RegionConnect>(
    router: &RegionRouter<C, Conn>,
    safe_ts: u64,
    req_ts: u64,
    lock: &LockInfo,
) -> Result<TxnCheckTxnStatusResponse> {
    debug!("check lock: {:?}, check ts: {}", lock, req_ts);
    let primary = Key::from(lock.primary_lock.clone());
    let (_, service) = router.service_for_key(req_ts, &primary).await?;
    service
        .txn_check_txn_status(req_ts, new_check_txn_status_request(safe_ts, lock))
        .await
}

async fn pessimistic_rollback<C: CoordinatorClient, Conn: RegionConnect>(
    router: &RegionRouter<C, Conn>,
    region: &Region,
    req_ts: u64,
    lock: &LockInfo,
) -> Result<bool> {
    info!("rollback pessimistic lock: {:?}, resolve ts: {}", lock, req_ts);
    let service = router.service_for_region(region).await?;
    let resp = service
        .txn_pessimistic_rollback(req_ts, new_pessimistic_rollback_request(lock))
        .await?;
    Ok(resp.txn_result.is_none())
}

async fn resolve<C: CoordinatorClient, Conn: RegionConnect>(
    router: &RegionRouter<C, Conn>,
    region: &Region,
    req_ts: u64,
    lock: &LockInfo,
    commit_ts: u64,
) -> Result<bool> {
    info!(
        "resolve lock: {:?}, resolve ts: {}, commit ts: {}",
        lock, req_ts, commit_ts
    );
    let service = router.service_for_region(region).await?;
    let resp = service
        .txn_resolve_lock(req_ts, new_resolve_lock_request(lock, commit_ts))
        .await?;
    Ok(resp.txn_result.is_none())
}

fn is_pessimistic_rollback_status(lock: &LockInfo, action: Action) -> bool {
    lock.lock_type == Op::Lock
        && lock.for_update_ts != 0
        && PESSIMISTIC_ROLLBACK_ACTIONS.contains(&action)
}

fn is_resolve_lock_status(status: &TxnCheckTxnStatusResponse) -> bool {
    status.commit_ts > 0 || (status.lock_ttl == 0 && status.commit_ts == 0)
}
