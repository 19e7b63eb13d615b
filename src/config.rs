// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

use crate::peers::Location;

/// The configuration for a [`SafePointDriver`](crate::SafePointDriver).
///
/// Because the cluster is managed by a coordinator quorum, the endpoints for
/// the coordinators must be provided, **not** the storage nodes.
///
/// It's important to **include more than one coordinator endpoint** (include
/// all, if possible!) This helps avoid having a *single point of failure*.
///
/// `local_location` must be the endpoint this node registers with the cluster
/// service; it is used to exclude the local node when polling peers for their
/// table locks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub(crate) coordinator_endpoints: Vec<String>,
    pub(crate) local_location: Location,
    pub(crate) tick_period: Duration,
    pub(crate) initial_delay: Duration,
    pub(crate) scan_limit: u32,
    pub(crate) region_client_ttl: Duration,
    pub(crate) lease_ttl: Duration,
    pub(crate) timeout: Duration,
}

const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(600);
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_SCAN_LIMIT: u32 = 1024;
const DEFAULT_REGION_CLIENT_TTL: Duration = Duration::from_secs(30);
const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for Config {
    fn default() -> Config {
        Config {
            coordinator_endpoints: Vec::new(),
            local_location: Location::default(),
            tick_period: DEFAULT_TICK_PERIOD,
            initial_delay: DEFAULT_INITIAL_DELAY,
            scan_limit: DEFAULT_SCAN_LIMIT,
            region_client_ttl: DEFAULT_REGION_CLIENT_TTL,
            lease_ttl: DEFAULT_LEASE_TTL,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a new [`Config`](Config) which coordinates with the given
    /// coordinator endpoints and identifies the local node by `local_location`.
    ///
    /// ```rust
    /// # use safepoint_driver::{Config, Location};
    /// let config = Config::new(
    ///     vec!["192.168.0.100:22001", "192.168.0.101:22001"],
    ///     Location::new("192.168.0.100".to_owned(), 8765),
    /// );
    /// ```
    pub fn new(
        coordinator_endpoints: impl IntoIterator<Item = impl Into<String>>,
        local_location: Location,
    ) -> Self {
        Config {
            coordinator_endpoints: coordinator_endpoints.into_iter().map(Into::into).collect(),
            local_location,
            ..Default::default()
        }
    }

    /// The coordinator endpoints, for wiring up transport implementations of
    /// the client traits.
    pub fn coordinator_endpoints(&self) -> &[String] {
        &self.coordinator_endpoints
    }

    /// Set the cadence of the safe-point update task. The first tick fires
    /// `initial_delay` after the lease is acquired, subsequent ticks every
    /// `tick_period`.
    pub fn with_tick_period(mut self, tick_period: Duration, initial_delay: Duration) -> Self {
        self.tick_period = tick_period;
        self.initial_delay = initial_delay;
        self
    }

    /// Set the maximum number of locks returned by one scan page.
    pub fn with_scan_limit(mut self, scan_limit: u32) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Set how long a cached region client may be reused before reconnecting.
    pub fn with_region_client_ttl(mut self, ttl: Duration) -> Self {
        self.region_client_ttl = ttl;
        self
    }

    /// Set the session TTL of the driver's exclusive lease.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Set the per-request deadline for region service calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
