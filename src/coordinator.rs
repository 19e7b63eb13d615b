// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! The client seam for the coordinator quorum.
//!
//! The coordinator owns the region map, the cluster GC safe point and a small
//! linearizable versioned kv store. The kv store doubles as the backing for
//! lease sessions: a key written with `put_if_absent` stays alive only while
//! its lease is kept alive, which is what [`LockService`](crate::LockService)
//! builds the cluster-unique driver election on.

use std::time::Duration;

use async_trait::async_trait;

use crate::proto::KeyValue;
use crate::region::Region;
use crate::Result;

/// Name of the lease electing the single driver process.
pub const SAFE_POINT_LOCK_NAME: &str = "safe-point-update";

/// Operator-managed kv key; its presence suppresses safe point publication.
pub const SAFE_POINT_DISABLE_KEY: &[u8] = b"safe-point-update-disable";

/// Operator-managed kv key holding the transaction retention window as a
/// big-endian i64 millisecond count.
pub const TXN_DURATION_KEY: &[u8] = b"txn-duration";

/// Retention window applied when `txn-duration` is absent: 7 days.
pub const DEFAULT_TXN_DURATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Identifier of a kv session lease granted by the coordinator.
pub type LeaseId = i64;

#[async_trait]
pub trait CoordinatorClient: Send + Sync + 'static {
    /// Read the kv entries stored under `key`.
    async fn kv_range(&self, req_ts: u64, key: &[u8]) -> Result<Vec<KeyValue>>;

    /// All regions currently known to the coordinator.
    async fn get_region_map(&self, req_ts: u64) -> Result<Vec<Region>>;

    /// Publish a new cluster GC safe point. Versions with commit ts at or
    /// below it become eligible for compaction.
    async fn update_gc_safe_point(&self, req_ts: u64, safe_point: u64) -> Result<()>;

    /// Create a session lease with the given TTL.
    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId>;

    /// Extend a session lease by its TTL. Fails once the lease expired or was
    /// revoked.
    async fn lease_keep_alive(&self, lease: LeaseId) -> Result<()>;

    /// Drop a session lease, deleting every key bound to it.
    async fn lease_revoke(&self, lease: LeaseId) -> Result<()>;

    /// Write `key = value` bound to `lease` iff `key` is currently absent.
    /// Returns whether the write took effect.
    async fn put_if_absent(&self, key: &[u8], value: Vec<u8>, lease: LeaseId) -> Result<bool>;

    /// Resolve once `key` is absent from the kv store, whether it was deleted
    /// or expired with its lease. Returns immediately if it is already absent.
    async fn watch_delete(&self, key: &[u8]) -> Result<()>;
}
