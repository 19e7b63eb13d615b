// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

use std::time::Duration;
use std::time::Instant;

use prometheus::register_histogram;
use prometheus::register_int_counter_vec;
use prometheus::register_int_gauge;
use prometheus::Histogram;
use prometheus::IntCounterVec;
use prometheus::IntGauge;

pub struct TickStats {
    start: Instant,
}

impl TickStats {
    pub fn new() -> Self {
        TickStats {
            start: Instant::now(),
        }
    }

    pub fn done(&self, result: &'static str) {
        TICK_DURATION_HISTOGRAM.observe(duration_to_sec(self.start.elapsed()));
        TICK_COUNTER_VEC.with_label_values(&[result]).inc();
    }
}

pub fn observe_tick_skipped() {
    TICK_COUNTER_VEC.with_label_values(&["skipped"]).inc();
}

pub fn observe_lock_outcome(outcome: &'static str) {
    RESOLVED_LOCK_COUNTER_VEC.with_label_values(&[outcome]).inc();
}

pub fn observe_safe_point(safe_point: u64) {
    GC_SAFE_POINT_GAUGE.set(safe_point as i64);
}

fn duration_to_sec(d: Duration) -> f64 {
    d.as_secs_f64()
}

lazy_static::lazy_static! {
    static ref TICK_DURATION_HISTOGRAM: Histogram = register_histogram!(
        "safepoint_tick_duration_seconds",
        "Bucketed histogram of safe point update tick duration"
    )
    .unwrap();
    static ref TICK_COUNTER_VEC: IntCounterVec = register_int_counter_vec!(
        "safepoint_tick_total",
        "Total number of safe point update ticks",
        &["result"]
    )
    .unwrap();
    static ref RESOLVED_LOCK_COUNTER_VEC: IntCounterVec = register_int_counter_vec!(
        "safepoint_scanned_lock_total",
        "Total number of locks scanned during safe point updates",
        &["outcome"]
    )
    .unwrap();
    static ref GC_SAFE_POINT_GAUGE: IntGauge = register_int_gauge!(
        "safepoint_published",
        "The last GC safe point published to the coordinator"
    )
    .unwrap();
}
