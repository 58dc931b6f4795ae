// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Block notifications: where they come from and how bursts are collapsed.
//!
//! This module provides:
//! - Debouncing of new-head notifications ([`BlockDebouncer`], and the pure
//!   [`debounce_block_events`])
//! - Block number streams from a provider ([`poll_block_numbers`], and
//!   `subscribe_block_numbers` with the `ws` feature)

mod debounce;
mod watch;

pub use debounce::{debounce_block_events, BlockDebouncer};
#[cfg(feature = "ws")]
pub use watch::subscribe_block_numbers;
pub use watch::{poll_block_numbers, MIN_POLL_INTERVAL};
