// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Process-wide decode statistics.
//!
//! Keeps a rolling window of decode rates, in the same way the capture loop
//! samples its frame rate. The window is shared by every decoder in the
//! process; [`init`] sizes it and [`reset`] clears it.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Window length used when [`init`] was never called.
pub const DEFAULT_WINDOW: usize = 30;

struct Stats {
    history: Vec<u64>,
    index: usize,
    decodes: u64,
    failures: u64,
}

impl Stats {
    const fn empty() -> Self {
        Self {
            history: Vec::new(),
            index: 0,
            decodes: 0,
            failures: 0,
        }
    }
}

static STATS: Mutex<Stats> = Mutex::new(Stats::empty());

/// Snapshot returned by [`snapshot`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub decodes: u64,
    pub failures: u64,
    /// Average decodes per second over the window.
    pub rate: u64,
}

fn with_stats<R>(f: impl FnOnce(&mut Stats) -> R) -> R {
    let mut stats = STATS.lock().unwrap_or_else(PoisonError::into_inner);
    if stats.history.is_empty() {
        stats.history = vec![0; DEFAULT_WINDOW];
    }
    f(&mut stats)
}

fn average(history: &[u64]) -> u64 {
    (history.iter().sum::<u64>() as f64 / history.len() as f64).round() as u64
}

/// Clears the statistics and sets the window length.
pub fn init(window: usize) {
    let mut stats = STATS.lock().unwrap_or_else(PoisonError::into_inner);
    *stats = Stats::empty();
    stats.history = vec![0; window.max(1)];
}

/// Clears the statistics, keeping the window length.
pub fn reset() {
    with_stats(|stats| {
        let window = stats.history.len();
        *stats = Stats::empty();
        stats.history = vec![0; window];
    });
}

/// Records one successful decode that took `elapsed` and returns the
/// average rate over the window.
pub fn record(elapsed: Duration) -> u64 {
    with_stats(|stats| {
        let nanos = elapsed.as_nanos().max(1);
        let index = stats.index;
        stats.history[index] = (1_000_000_000 / nanos) as u64;
        stats.index = (index + 1) % stats.history.len();
        stats.decodes += 1;
        average(&stats.history)
    })
}

pub fn record_failure() {
    with_stats(|stats| stats.failures += 1);
}

pub fn snapshot() -> Snapshot {
    with_stats(|stats| Snapshot {
        decodes: stats.decodes,
        failures: stats.failures,
        rate: average(&stats.history),
    })
}
