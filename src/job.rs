// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Background task that owns a [`Batcher`].
//!
//! All access goes through a [`BatcherHandle`], which sends commands over a
//! channel. The task handles one command at a time, so the store is never
//! touched concurrently. Block notifications are debounced inside the task:
//! a flush runs once notifications have been quiet for the configured window.

use alloy_primitives::BlockNumber;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::blocks::BlockDebouncer;
use crate::cache::CacheStats;
use crate::config::constants::COMMAND_CHANNEL_CAPACITY;
use crate::connection::Connection;
use crate::dispatcher::{Batcher, DataRequest, QueryOutcome};
use crate::errors::BatcherError;
use crate::store::StoreEvent;

type Responder<T> = oneshot::Sender<T>;

/// Runs a [`Batcher`] on its own task, serializing every command through one
/// channel and debouncing observed blocks before they flush.
pub struct BatcherJob;

impl BatcherJob {
    /// Spawns the task owning `batcher` and returns a handle to it.
    ///
    /// The task stops once every handle has been dropped.
    pub fn init(batcher: Batcher) -> BatcherHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(BatcherJob::run(batcher, rx));
        BatcherHandle { tx }
    }

    async fn run(mut batcher: Batcher, mut rx: mpsc::Receiver<Command>) {
        let mut debouncer = BlockDebouncer::new(batcher.config().block_debounce);

        loop {
            let deadline = debouncer.deadline();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => {
                        BatcherJob::handle_command(&mut batcher, &mut debouncer, command).await;
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(block_number) = debouncer.poll(Instant::now()) {
                        BatcherJob::handle_block(&mut batcher, block_number).await;
                    }
                }
            }
        }

        debug!("Batcher job stopped");
    }

    async fn handle_command(batcher: &mut Batcher, debouncer: &mut BlockDebouncer, command: Command) {
        match command {
            Command::Query(cmd) => {
                let result = batcher.independently_query(cmd.request).await;
                if cmd.responder.send(result).is_err() {
                    error!("Failed to send response");
                }
            }
            Command::BlockObserved(block_number) => {
                debouncer.observe(block_number, Instant::now());
            }
            Command::Connect(cmd) => {
                batcher.connect(cmd.connection, cmd.block_number).await;
                if cmd.responder.send(()).is_err() {
                    error!("Failed to send response");
                }
            }
            Command::Disconnect(responder) => {
                batcher.disconnect();
                // Drop a block that was observed for the old connection
                *debouncer = BlockDebouncer::new(debouncer.window());
                if responder.send(()).is_err() {
                    error!("Failed to send response");
                }
            }
            Command::Subscribe(responder) => {
                if responder.send(batcher.subscribe()).is_err() {
                    error!("Failed to send response");
                }
            }
            Command::CacheStats(responder) => {
                if responder.send(batcher.store().cache().stats().clone()).is_err() {
                    error!("Failed to send response");
                }
            }
        }
    }

    /// Handles a debounced block number by flushing pending batches.
    async fn handle_block(batcher: &mut Batcher, block_number: BlockNumber) {
        match batcher.change_block_number(block_number).await {
            Ok(report) if report.block_changed => {
                debug!(
                    block_number,
                    on_chain_calls = report.on_chain_calls,
                    off_chain_calls = report.off_chain_calls,
                    on_chain_failed = report.on_chain_failed,
                    "Flushed pending batches"
                );
            }
            Ok(_) => {}
            Err(e) => error!(block_number, error = %e, "Failed to flush pending batches"),
        }
    }
}

/// Cloneable handle to a running [`BatcherJob`].
#[derive(Clone, Debug)]
pub struct BatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl BatcherHandle {
    /// Submits a caller's request. See [`Batcher::independently_query`].
    pub async fn query(&self, request: DataRequest) -> Result<QueryOutcome, BatcherError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Query(QueryCommand { request, responder }))
            .await?;
        rx.await.map_err(|_| BatcherError::JobStopped)?
    }

    /// Reports a new chain head. Flushes happen after the debounce window.
    pub async fn observe_block(&self, block_number: BlockNumber) -> Result<(), BatcherError> {
        self.send(Command::BlockObserved(block_number)).await
    }

    /// Installs a connection. See [`Batcher::connect`].
    pub async fn connect(
        &self,
        connection: Connection,
        block_number: Option<BlockNumber>,
    ) -> Result<(), BatcherError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Connect(ConnectCommand {
            connection,
            block_number,
            responder,
        }))
        .await?;
        rx.await.map_err(|_| BatcherError::JobStopped)
    }

    /// Drops the connection. See [`Batcher::disconnect`].
    pub async fn disconnect(&self) -> Result<(), BatcherError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Disconnect(responder)).await?;
        rx.await.map_err(|_| BatcherError::JobStopped)
    }

    /// Subscribes to store events.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<StoreEvent>, BatcherError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Subscribe(responder)).await?;
        rx.await.map_err(|_| BatcherError::JobStopped)
    }

    /// Current cache statistics.
    pub async fn cache_stats(&self) -> Result<CacheStats, BatcherError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::CacheStats(responder)).await?;
        rx.await.map_err(|_| BatcherError::JobStopped)
    }

    /// Forwards every block number of `blocks` to the job.
    ///
    /// The returned task ends when the stream ends or the job stops.
    pub fn feed_blocks<S>(&self, blocks: S) -> JoinHandle<()>
    where
        S: Stream<Item = BlockNumber> + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut blocks = std::pin::pin!(blocks);
            while let Some(block_number) = blocks.next().await {
                if handle.observe_block(block_number).await.is_err() {
                    info!("Batcher job stopped, no longer feeding blocks");
                    break;
                }
            }
        })
    }

    async fn send(&self, command: Command) -> Result<(), BatcherError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| BatcherError::JobStopped)
    }
}

enum Command {
    Query(QueryCommand),
    BlockObserved(BlockNumber),
    Connect(ConnectCommand),
    Disconnect(Responder<()>),
    Subscribe(Responder<broadcast::Receiver<StoreEvent>>),
    CacheStats(Responder<CacheStats>),
}

struct QueryCommand {
    request: DataRequest,
    responder: Responder<Result<QueryOutcome, BatcherError>>,
}

struct ConnectCommand {
    connection: Connection,
    block_number: Option<BlockNumber>,
    responder: Responder<()>,
}
