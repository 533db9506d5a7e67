//! # Live Query Subscriptions
//!
//! A subscription is a lazy, restartable sequence of full snapshots.
//!
//! ## Task Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subscribe(store, query)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  listen to store.changes()   (before the first read, so nothing is     │
//! │       │                       missed between snapshot and listen)      │
//! │       ▼                                                                 │
//! │  ┌──► run query ──► same as last snapshot? ──yes──┐                     │
//! │  │        │                                       │                     │
//! │  │        no ──► send snapshot                    │                     │
//! │  │                    │                           │                     │
//! │  │                    ▼                           ▼                     │
//! │  └──── change for query.path / Lagged ◄─── wait for next event         │
//! │                                                                         │
//! │  Receiver dropped or cancel() ──► task ends                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Consumers re-derive their view from each snapshot; nothing is diffed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::document::Document;
use crate::query::Query;
use crate::store::DocumentStore;

/// Snapshots buffered before the task waits for the consumer.
const SNAPSHOT_BUFFER: usize = 16;

/// Aborts the subscription task when dropped.
#[derive(Debug)]
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a running live query.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Vec<Document>>,
    guard: TaskGuard,
}

impl Subscription {
    /// Waits for the next snapshot. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }

    /// Stops the background task. Later `next()` calls return `None`.
    pub fn cancel(&mut self) {
        self.guard.0.abort();
        self.rx.close();
    }

    pub fn is_finished(&self) -> bool {
        self.guard.0.is_finished()
    }

    /// Adapts the subscription into a `Stream` of snapshots.
    pub fn into_stream(self) -> SnapshotStream {
        SnapshotStream {
            inner: ReceiverStream::new(self.rx),
            _guard: self.guard,
        }
    }
}

/// `Stream` form of a [`Subscription`].
#[derive(Debug)]
pub struct SnapshotStream {
    inner: ReceiverStream<Vec<Document>>,
    _guard: TaskGuard,
}

impl Stream for SnapshotStream {
    type Item = Vec<Document>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Starts a live query.
///
/// The first snapshot is the full current result set; a new subscription
/// always replays the current state.
pub fn subscribe(store: Arc<dyn DocumentStore>, query: Query) -> Subscription {
    let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
    let mut changes = store.changes();

    let handle = tokio::spawn(async move {
        let mut last: Option<Vec<Document>> = None;

        loop {
            match store.query(&query).await {
                Ok(snapshot) => {
                    if last.as_ref() != Some(&snapshot) {
                        if tx.send(snapshot.clone()).await.is_err() {
                            debug!(path = %query.path, "subscriber gone, stopping");
                            return;
                        }
                        last = Some(snapshot);
                    }
                }
                Err(e) => {
                    warn!(path = %query.path, error = %e, "subscription query failed");
                }
            }

            // Wait for a change that concerns this collection.
            loop {
                match changes.recv().await {
                    Ok(event) if event.path == query.path => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(path = %query.path, skipped, "subscription lagged, re-querying");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    });

    Subscription {
        rx,
        guard: TaskGuard(handle),
    }
}
