// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

// https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/

use rand::{thread_rng, Rng};
use std::time::Duration;

/// Retry pacing for a peer that failed to report its table locks. Exhausting
/// it fails the whole tick.
pub const PEER_LOCKS_BACKOFF: NoJitterBackoff = NoJitterBackoff::new(100, 1000, 3);

/// Pacing for lease re-acquisition after a coordinator error. Jittered so
/// drivers restarted together do not stampede the coordinator.
pub fn lease_retry_backoff() -> FullJitterBackoff {
    FullJitterBackoff::new(100, 1000, 8)
}

pub trait Backoff: Clone + Send + 'static {
    // Returns the delay period for next retry. If the maximum retry count is hit returns None.
    fn next_delay_duration(&mut self) -> Option<Duration>;
}

// Exponential backoff means that the retry delay should multiply a constant
// after each attempt, up to a maximum value. After each attempt, the new retry
// delay should be:
//
// new_delay = min(max_delay, base_delay * 2 ** attempts)
#[derive(Clone)]
pub struct NoJitterBackoff {
    current_attempts: u32,
    max_attempts: u32,
    current_delay_ms: u64,
    max_delay_ms: u64,
}

impl NoJitterBackoff {
    pub const fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            current_attempts: 0,
            max_attempts,
            current_delay_ms: base_delay_ms,
            max_delay_ms,
        }
    }
}

impl Backoff for NoJitterBackoff {
    fn next_delay_duration(&mut self) -> Option<Duration> {
        if self.current_attempts >= self.max_attempts {
            return None;
        }

        let delay_ms = self.max_delay_ms.min(self.current_delay_ms);

        self.current_attempts += 1;
        self.current_delay_ms <<= 1;

        Some(Duration::from_millis(delay_ms))
    }
}

// Adds Jitter to the basic exponential backoff. Returns a random value between
// zero and the calculated exponential backoff:
//
// temp = min(max_delay, base_delay * 2 ** attempts)
// new_delay = random_between(0, temp)
#[derive(Clone)]
pub struct FullJitterBackoff {
    current_attempts: u32,
    max_attempts: u32,
    current_delay_ms: u64,
    max_delay_ms: u64,
}

impl FullJitterBackoff {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        if base_delay_ms == 0 || max_delay_ms == 0 {
            panic!("Both base_delay_ms and max_delay_ms must be positive");
        }

        Self {
            current_attempts: 0,
            max_attempts,
            current_delay_ms: base_delay_ms,
            max_delay_ms,
        }
    }
}

impl Backoff for FullJitterBackoff {
    fn next_delay_duration(&mut self) -> Option<Duration> {
        if self.current_attempts >= self.max_attempts {
            return None;
        }

        let delay_ms = self.max_delay_ms.min(self.current_delay_ms);

        let mut rng = thread_rng();
        let delay_ms: u64 = rng.gen_range(0..delay_ms);

        self.current_attempts += 1;
        self.current_delay_ms <<= 1;

        Some(Duration::from_millis(delay_ms))
    }
}
