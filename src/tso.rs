// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

//! The client seam for the cluster timestamp oracle (TSO).
//!
//! The oracle hands out monotonically increasing timestamps; implementations
//! typically batch concurrent requests over a single streaming RPC to the
//! coordinator leader. The driver only ever needs one fresh timestamp per
//! tick, which then serves as `req_ts` for every request of that tick.

use async_trait::async_trait;

use crate::proto::Timestamp;
use crate::Result;

#[async_trait]
pub trait TsoClient: Send + Sync + 'static {
    /// Fetch a fresh, cluster-monotone timestamp.
    async fn tso(&self) -> Result<Timestamp>;
}
