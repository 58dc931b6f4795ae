// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Block number streams.

use alloy_primitives::BlockNumber;
use alloy_provider::Provider;
use futures::stream::{self, Stream};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[cfg(feature = "ws")]
use crate::errors::RpcError;

/// Shortest polling interval; shorter ones, including zero, are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls `provider` for the chain head every `interval`.
///
/// Yields a block number only when it differs from the previous one. Polling
/// errors are logged and the next tick tries again; the stream never ends.
/// `interval` is raised to [`MIN_POLL_INTERVAL`] if shorter.
///
/// # Examples
///
/// ```rust,ignore
/// use poolbatch::{poll_block_numbers, BLOCK_POLL_INTERVAL};
///
/// let blocks = poll_block_numbers(provider.clone(), BLOCK_POLL_INTERVAL);
/// handle.feed_blocks(blocks);
/// ```
pub fn poll_block_numbers<P>(provider: P, interval: Duration) -> impl Stream<Item = BlockNumber> + Send
where
    P: Provider + 'static,
{
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold(
        (provider, ticker, None::<BlockNumber>),
        |(provider, mut ticker, last)| async move {
            loop {
                ticker.tick().await;
                match provider.get_block_number().await {
                    Ok(block_number) if Some(block_number) != last => {
                        debug!(block_number, "Polled new block number");
                        return Some((block_number, (provider, ticker, Some(block_number))));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to poll block number"),
                }
            }
        },
    )
}

/// Subscribes to new heads over a pub/sub provider and yields their numbers.
///
/// # Errors
///
/// Returns [`RpcError::SubscriptionFailed`] if the subscription cannot be
/// established.
#[cfg(feature = "ws")]
pub async fn subscribe_block_numbers<P>(
    provider: &P,
) -> Result<impl Stream<Item = BlockNumber> + Send + 'static, RpcError>
where
    P: Provider,
{
    use futures::StreamExt;

    let subscription = provider
        .subscribe_blocks()
        .await
        .map_err(|e| RpcError::subscription_failed("blocks", e))?;

    debug!("Block subscription established");
    Ok(subscription.into_stream().map(|header| header.number))
}
