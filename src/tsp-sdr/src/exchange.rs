// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded single-producer/single-consumer hand-off of raw IQ blocks.
//!
//! The producer never blocks: when the queue is full the incoming block is
//! discarded (drop-newest). The consumer waits with a timeout so it can poll
//! for cancellation and detect stalls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::clock::Clock;
use crate::device::RawSampleBlock;

/// Result of offering a block to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// Queue was full; the block was discarded.
    Dropped,
    /// The consumer is gone.
    Disconnected,
}

#[derive(Debug, PartialEq)]
pub enum Dequeue {
    Block(RawSampleBlock),
    /// Nothing arrived within the timeout.
    Empty,
    /// The producer is gone and the queue is drained.
    Disconnected,
}

struct ExchangeStats {
    clock: Arc<dyn Clock>,
    last_enqueue: Mutex<Instant>,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

impl ExchangeStats {
    fn mark_enqueue(&self) {
        let now = self.clock.now();
        if let Ok(mut last) = self.last_enqueue.lock() {
            *last = now;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn since_last_enqueue(&self) -> Duration {
        let now = self.clock.now();
        let last = self
            .last_enqueue
            .lock()
            .map(|last| *last)
            .unwrap_or(now);
        now.saturating_duration_since(last)
    }
}

/// Read-only view of the exchange counters, shareable with the supervisor.
#[derive(Clone)]
pub struct ExchangeStatsHandle(Arc<ExchangeStats>);

impl ExchangeStatsHandle {
    pub fn dropped(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.0.delivered.load(Ordering::Relaxed)
    }

    pub fn since_last_enqueue(&self) -> Duration {
        self.0.since_last_enqueue()
    }
}

pub struct ExchangeProducer {
    tx: Sender<RawSampleBlock>,
    stats: Arc<ExchangeStats>,
}

impl ExchangeProducer {
    /// Offer a block without blocking.
    pub fn try_enqueue(&self, block: RawSampleBlock) -> Enqueue {
        match self.tx.try_send(block) {
            Ok(()) => {
                self.stats.mark_enqueue();
                Enqueue::Queued
            }
            Err(TrySendError::Full(block)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "IQ queue full, dropping block of {} samples ({} dropped so far)",
                    block.len(),
                    dropped
                );
                Enqueue::Dropped
            }
            Err(TrySendError::Disconnected(_)) => Enqueue::Disconnected,
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn stats(&self) -> ExchangeStatsHandle {
        ExchangeStatsHandle(self.stats.clone())
    }
}

pub struct ExchangeConsumer {
    rx: Receiver<RawSampleBlock>,
    stats: Arc<ExchangeStats>,
}

impl ExchangeConsumer {
    /// Wait up to `timeout` for the next block.
    pub fn dequeue(&self, timeout: Duration) -> Dequeue {
        match self.rx.recv_timeout(timeout) {
            Ok(block) => Dequeue::Block(block),
            Err(RecvTimeoutError::Timeout) => Dequeue::Empty,
            Err(RecvTimeoutError::Disconnected) => Dequeue::Disconnected,
        }
    }

    /// Time since the producer last queued a block (or since creation).
    pub fn since_last_enqueue(&self) -> Duration {
        self.stats.since_last_enqueue()
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn stats(&self) -> ExchangeStatsHandle {
        ExchangeStatsHandle(self.stats.clone())
    }
}

/// Create an exchange holding at most `capacity` blocks (at least one).
///
/// The stall timer starts at creation time.
pub fn bounded_exchange(
    capacity: usize,
    clock: Arc<dyn Clock>,
) -> (ExchangeProducer, ExchangeConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let now = clock.now();
    let stats = Arc::new(ExchangeStats {
        clock,
        last_enqueue: Mutex::new(now),
        dropped: AtomicU64::new(0),
        delivered: AtomicU64::new(0),
    });
    (
        ExchangeProducer {
            tx,
            stats: stats.clone(),
        },
        ExchangeConsumer { rx, stats },
    )
}
