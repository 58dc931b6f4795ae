// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Trailing-edge debounce of block notifications.
//!
//! Every notification (re)arms a deadline one window after it arrives. When
//! the deadline passes with no newer notification, the latest block number is
//! released. A steady stream of notifications closer together than the window
//! therefore releases nothing until it pauses.

use alloy_primitives::BlockNumber;
use std::time::Duration;
use tokio::time::Instant;

/// Collects block notifications and releases the latest one once they quiet
/// down.
///
/// The debouncer does not sleep on its own. The owner waits until
/// [`deadline`](Self::deadline) and then calls [`poll`](Self::poll).
///
/// ```rust
/// use poolbatch::BlockDebouncer;
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut debouncer = BlockDebouncer::new(Duration::from_millis(250));
/// let start = Instant::now();
///
/// debouncer.observe(100, start);
/// debouncer.observe(101, start + Duration::from_millis(100));
///
/// assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
/// assert_eq!(debouncer.poll(start + Duration::from_millis(350)), Some(101));
/// ```
#[derive(Debug, Clone)]
pub struct BlockDebouncer {
    window: Duration,
    pending: Option<(BlockNumber, Instant)>,
}

impl BlockDebouncer {
    /// Creates a debouncer with the given quiescence window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// The quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a notification received at `now`, replacing any pending one.
    pub fn observe(&mut self, block_number: BlockNumber, now: Instant) {
        self.pending = Some((block_number, now + self.window));
    }

    /// When the pending block becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }

    /// Releases the pending block if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<BlockNumber> {
        match self.pending {
            Some((block_number, deadline)) if deadline <= now => {
                self.pending = None;
                Some(block_number)
            }
            _ => None,
        }
    }

    /// Whether a block is waiting to be released.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Block numbers a trailing-edge debounce releases for an event sequence.
///
/// `events` are `(block_number, offset)` pairs in arrival order, where offset
/// is the arrival time relative to any fixed origin. An event is released when
/// the next event arrives `window` or more after it, or when it is the last
/// one.
///
/// ```rust
/// use poolbatch::debounce_block_events;
/// use std::time::Duration;
///
/// let ms = Duration::from_millis;
/// let events = [(10, ms(0)), (11, ms(100)), (12, ms(600)), (13, ms(700))];
///
/// assert_eq!(debounce_block_events(&events, ms(250)), vec![11, 13]);
/// ```
pub fn debounce_block_events(
    events: &[(BlockNumber, Duration)],
    window: Duration,
) -> Vec<BlockNumber> {
    events
        .iter()
        .enumerate()
        .filter(|(i, (_, at))| match events.get(i + 1) {
            Some((_, next)) => next.saturating_sub(*at) >= window,
            None => true,
        })
        .map(|(_, (block_number, _))| *block_number)
        .collect()
}
