// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! Typed messages exchanged with the coordinator, store and index services.
//!
//! These mirror the wire schema one-to-one; the transport binding (gRPC
//! channel management, deadlines, authentication) lives in the service
//! crates and is injected through the client traits.

/// A timestamp produced by the cluster timestamp oracle.
///
/// See [`TimestampExt`](crate::timestamp::TimestampExt) for conversion between
/// a `Timestamp` and its single-integer version form.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Timestamp {
    pub physical: i64,
    pub logical: i64,
}

/// The kind of write a lock protects.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Op {
    #[default]
    Put,
    Del,
    /// A pessimistic read-phase lock; carries no prewritten value.
    Lock,
    Rollback,
}

/// What the store did (or expects the caller to do) as a consequence of a
/// `TxnCheckTxnStatus` probe.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Action {
    #[default]
    NoAction,
    TtlExpireRollback,
    LockNotExistRollback,
    MinCommitTsPushed,
    TtlExpirePessimisticRollback,
    LockNotExistDoNothing,
}

/// A live lock observed on a region.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct LockInfo {
    /// The primary key of the owning transaction.
    pub primary_lock: Vec<u8>,
    /// The locked user key.
    pub key: Vec<u8>,
    /// The transaction start timestamp.
    pub lock_ts: u64,
    /// Nonzero iff the lock was taken pessimistically.
    pub for_update_ts: u64,
    /// Remaining TTL in milliseconds; 0 means expired.
    pub lock_ttl: u64,
    pub lock_type: Op,
}

/// Carries a transaction-protocol failure in a response. A non-`None`
/// `txn_result` field means the request did not take effect and the
/// authoritative status of the transaction was not obtained.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnResultInfo {
    pub locked: Option<LockInfo>,
    pub retryable: String,
    pub abort: String,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnScanLockRequest {
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    /// Only locks with `lock_ts < max_ts` are returned.
    pub max_ts: u64,
    pub limit: u32,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnScanLockResponse {
    pub locks: Vec<LockInfo>,
    /// True when the scan stopped at `limit` before exhausting the range.
    pub has_more: bool,
    /// Continuation cursor for the next page when `has_more` is set.
    pub end_key: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnCheckTxnStatusRequest {
    pub primary_key: Vec<u8>,
    pub lock_ts: u64,
    pub caller_start_ts: u64,
    pub current_ts: u64,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnCheckTxnStatusResponse {
    /// Remaining TTL of the primary lock; 0 when there is no live lock.
    pub lock_ttl: u64,
    /// Commit timestamp of the transaction; 0 when not committed.
    pub commit_ts: u64,
    pub action: Action,
    pub txn_result: Option<TxnResultInfo>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnPessimisticRollbackRequest {
    pub start_ts: u64,
    pub for_update_ts: u64,
    pub keys: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnPessimisticRollbackResponse {
    pub txn_result: Option<TxnResultInfo>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnResolveLockRequest {
    pub start_ts: u64,
    /// 0 rolls the transaction back; nonzero commits it at this timestamp.
    pub commit_ts: u64,
    pub keys: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct TxnResolveLockResponse {
    pub txn_result: Option<TxnResultInfo>,
}

/// An entry of the coordinator's versioned kv store.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}
