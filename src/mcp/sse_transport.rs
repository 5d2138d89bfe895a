// ABOUTME: Persistent MCP push channel over Server-Sent Events with keepalive and cancellation
// ABOUTME: Reads newline-delimited JSON-RPC from the request body and pushes replies as events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Persistent Push Channel
//!
//! One channel owns two concurrency units:
//!
//! - a reader task decoding newline-delimited requests from the inbound body
//!   into a bounded queue
//! - the outbound event stream, which waits on cancellation, the keepalive
//!   timer and the queue, servicing whichever is ready first
//!
//! The outbound stream is the only producer of events, so keepalives and
//! replies are written one at a time and never interleave. Dropping the
//! stream (client disconnect) cancels the channel token, which stops the
//! reader task as well.

use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use bytes::Bytes;
use futures_util::Stream;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{ProtocolHandler, UserContext};
use crate::constants::{limits, protocol};

/// Observable state of an open channel
#[derive(Clone, Debug)]
pub struct ChannelLifecycle {
    cancel: CancellationToken,
    reader_finished: Arc<AtomicBool>,
    stream_finished: Arc<AtomicBool>,
}

impl ChannelLifecycle {
    /// Close the channel from the server side
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the channel token has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the reader task has exited
    #[must_use]
    pub fn reader_finished(&self) -> bool {
        self.reader_finished.load(Ordering::SeqCst)
    }

    /// Whether the outbound stream has been dropped or ended
    #[must_use]
    pub fn stream_finished(&self) -> bool {
        self.stream_finished.load(Ordering::SeqCst)
    }
}

/// Sets its flag when dropped, however the owner exits
struct FinishedFlag(Arc<AtomicBool>);

impl Drop for FinishedFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// What the dispatch loop does next
enum Step {
    Stop(&'static str),
    Keepalive,
    Inbound(String),
}

/// Open a persistent channel
///
/// `parent` is the server shutdown token; the channel token is its child, so
/// server shutdown also closes every open channel.
pub fn open_channel<S>(
    inbound: S,
    handler: Arc<ProtocolHandler>,
    user: UserContext,
    keepalive_interval: Duration,
    parent: &CancellationToken,
) -> (
    impl Stream<Item = Result<Event, Infallible>> + Send + 'static,
    ChannelLifecycle,
)
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
{
    let lifecycle = ChannelLifecycle {
        cancel: parent.child_token(),
        reader_finished: Arc::new(AtomicBool::new(false)),
        stream_finished: Arc::new(AtomicBool::new(false)),
    };

    let (tx, rx) = mpsc::channel(limits::CHANNEL_QUEUE_CAPACITY);
    spawn_reader(inbound, tx, &lifecycle);
    let stream = outbound_stream(rx, handler, user, keepalive_interval, &lifecycle);

    (stream, lifecycle)
}

fn spawn_reader<S>(inbound: S, tx: mpsc::Sender<String>, lifecycle: &ChannelLifecycle)
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
{
    let cancel = lifecycle.cancel.clone();
    let finished = FinishedFlag(Arc::clone(&lifecycle.reader_finished));

    tokio::spawn(async move {
        let _finished = finished;
        let mut lines = StreamReader::new(Box::pin(inbound)).lines();

        loop {
            let line = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let sent = tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        sent = tx.send(line) => sent,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("MCP channel inbound body reached end of stream");
                    break;
                }
                Err(e) => {
                    warn!("Error reading MCP channel message: {}", e);
                    break;
                }
            }
        }
        // Dropping the sender tells the dispatch loop no more requests will come
    });
}

fn outbound_stream(
    mut rx: mpsc::Receiver<String>,
    handler: Arc<ProtocolHandler>,
    user: UserContext,
    keepalive_interval: Duration,
    lifecycle: &ChannelLifecycle,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let cancel = lifecycle.cancel.clone();
    let finished = FinishedFlag(Arc::clone(&lifecycle.stream_finished));
    // Dropping the stream (client gone) cancels the reader too, polled or not
    let cancel_on_drop = cancel.clone().drop_guard();

    async_stream::stream! {
        let _finished = finished;
        let _cancel_on_drop = cancel_on_drop;

        let mut keepalive = interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(user = %user.login, "MCP channel opened");

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Stop("cancelled"),
                _ = keepalive.tick() => Step::Keepalive,
                message = rx.recv() => message.map_or(Step::Stop("inbound closed"), Step::Inbound),
            };

            match step {
                Step::Stop(reason) => {
                    info!(user = %user.login, reason, "MCP channel closed");
                    break;
                }
                Step::Keepalive => {
                    yield Ok(Event::default().data(protocol::KEEPALIVE_PAYLOAD));
                }
                Step::Inbound(line) => {
                    let Some(reply) = handler.handle_message(line.as_bytes(), &user).await else {
                        continue;
                    };
                    match serde_json::to_string(&reply) {
                        Ok(data) => yield Ok(Event::default().event(protocol::MESSAGE_EVENT).data(data)),
                        Err(e) => warn!("Failed to serialize MCP channel reply: {}", e),
                    }
                }
            }
        }
    }
}
