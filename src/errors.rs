// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

use std::result;
use thiserror::Error;

/// An error originating from the safe-point driver or its dependencies.
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster-unique lease backing the driver was revoked or its session
    /// could not be kept alive.
    #[error("lease {name} was lost")]
    LeaseLost { name: String },
    /// A peer could not report its table locks, even after retries. The whole
    /// tick is failed rather than risking GC past an unseen reader.
    #[error("peer {location} is unreachable: {source}")]
    PeerUnreachable {
        location: String,
        source: Box<Error>,
    },
    /// No region is found for the given key.
    #[error("region is not found for key: {:?}", key)]
    RegionForKeyNotFound { key: Vec<u8> },
    /// Wraps a `std::io::Error`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Represents that a futures oneshot channel was cancelled.
    #[error("a futures oneshot channel was canceled. {0}")]
    Canceled(#[from] futures::channel::oneshot::Canceled),
    /// Can't join tokio tasks
    #[error("failed to join tokio tasks")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("{}", message)]
    InternalError { message: String },
    #[error("{0}")]
    StringError(String),
}

/// A result holding an [`Error`](enum@Error).
pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! internal_err {
    ($e:expr) => ({
        $crate::Error::InternalError {
            message: format!("[{}:{}]: {}", file!(), line!(),  $e)
        }
    });
    ($f:tt, $($arg:expr),+) => ({
        internal_err!(format!($f, $($arg),+))
    });
}
