// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! This crate provides the garbage-collection safe-point driver for a
//! sharded, multi-version key-value store using Percolator-style two-phase
//! commit.
//!
//! The driver periodically advances the cluster-wide GC safe point: the
//! highest commit timestamp below which older versions may be compacted
//! without breaking any reader or in-flight transaction. Each tick it scans
//! every table-keyspace region for transaction locks older than a candidate
//! safe ts, resolves each one against its primary lock (commit, roll back, or
//! leave alone), and lowers the candidate whenever a lock cannot yet be
//! resolved. The final value, minus one, is published to the coordinator.
//!
//! Exactly one driver instance runs per cluster, elected through a
//! coordinator-backed lease; see [`LockService`]. The heavy lifting per tick
//! happens in the [`resolve`] module.
//!
//! The cluster services the driver talks to (coordinator quorum, store and
//! index shard services, timestamp oracle, peer nodes) are injected through
//! the [`CoordinatorClient`], [`RegionConnect`], [`TsoClient`],
//! [`ClusterClient`] and [`PeerClient`] traits, so the transport layer stays
//! entirely outside this crate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use safepoint_driver::{Config, Location, SafePointDriver};
//! # async fn wire(
//! #     coordinator: Arc<impl safepoint_driver::CoordinatorClient>,
//! #     tso: Arc<impl safepoint_driver::TsoClient>,
//! #     cluster: Arc<impl safepoint_driver::ClusterClient>,
//! #     local_locks: Arc<dyn safepoint_driver::PeerClient>,
//! #     connect: impl safepoint_driver::RegionConnect,
//! # ) {
//! let config = Config::new(
//!     vec!["192.168.0.100:22001", "192.168.0.101:22001"],
//!     Location::new("192.168.0.100".to_owned(), 8765),
//! );
//! let driver = Arc::new(SafePointDriver::new(
//!     config, coordinator, tso, cluster, local_locks, connect,
//! ));
//! tokio::spawn(driver.run());
//! # }
//! ```

pub mod backoff;
pub mod proto;
pub mod resolve;

mod config;
mod coordinator;
mod driver;
mod errors;
mod kv;
mod lease;
mod peers;
mod region;
mod router;
mod stats;
mod timestamp;
mod tso;

#[cfg(test)]
mod mock;

#[doc(inline)]
pub use crate::config::Config;
#[doc(inline)]
pub use crate::coordinator::CoordinatorClient;
#[doc(inline)]
pub use crate::coordinator::LeaseId;
#[doc(inline)]
pub use crate::coordinator::DEFAULT_TXN_DURATION_MS;
#[doc(inline)]
pub use crate::coordinator::SAFE_POINT_DISABLE_KEY;
#[doc(inline)]
pub use crate::coordinator::SAFE_POINT_LOCK_NAME;
#[doc(inline)]
pub use crate::coordinator::TXN_DURATION_KEY;
#[doc(inline)]
pub use crate::driver::SafePointDriver;
#[doc(inline)]
pub use crate::errors::Error;
#[doc(inline)]
pub use crate::errors::Result;
#[doc(inline)]
pub use crate::kv::Key;
#[doc(inline)]
pub use crate::lease::Lease;
#[doc(inline)]
pub use crate::lease::LockService;
#[doc(inline)]
pub use crate::peers::ClusterClient;
#[doc(inline)]
pub use crate::peers::Location;
#[doc(inline)]
pub use crate::peers::PeerClient;
#[doc(inline)]
pub use crate::peers::TableLock;
#[doc(inline)]
pub use crate::peers::TableLockType;
#[doc(inline)]
pub use crate::region::Region;
#[doc(inline)]
pub use crate::region::RegionId;
#[doc(inline)]
pub use crate::region::RegionType;
#[doc(inline)]
pub use crate::region::TABLE_PREFIX;
#[doc(inline)]
pub use crate::router::RegionConnect;
#[doc(inline)]
pub use crate::router::RegionRouter;
#[doc(inline)]
pub use crate::router::RegionService;
#[doc(inline)]
pub use crate::timestamp::Timestamp;
#[doc(inline)]
pub use crate::timestamp::TimestampExt;
#[doc(inline)]
pub use crate::tso::TsoClient;
