//! Live broadcast hub.
//!
//! The hub owns the set of connected viewers and is the only place that set
//! is read or changed. Callers never touch it directly: they hold a
//! [`HubHandle`] and submit requests, which the control loop applies one at a
//! time in the order they were queued.
//!
//! ```text
//!  ingest task ──broadcast()──┐
//!  ingest task ──broadcast()──┤      ┌───────────────┐     try_send()     ┌──────────┐
//!  /ws handler ──register()───┼────> │ request queue │ ──> control loop ─>│ viewer 1 │
//!  /ws handler ──unregister()─┘      └───────────────┘         │          └──────────┘
//!                                                               └───────> │ viewer N │
//! ```
//!
//! Delivery is at-most-once and best-effort. A viewer whose `try_send` fails
//! is removed and closed on the spot; every other viewer still receives the
//! record. Nothing is retried and late joiners get no backlog.

mod viewer;

pub use viewer::{ChannelViewer, Viewer, ViewerId, ViewerOutbox};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::HubError;
use crate::record::Record;

// constants
const DEFAULT_REQUEST_QUEUE: usize = 1024;
const DEFAULT_VIEWER_OUTBOX: usize = 256;

/// hub sizing
#[derive(Debug, Clone)]
pub struct HubDesc {
    /// bound of the request queue; submitters wait while it is full
    pub request_queue: usize,
    /// undelivered records a single viewer may have queued before it is dropped
    pub viewer_outbox: usize,
}

impl Default for HubDesc {
    fn default() -> Self {
        Self {
            request_queue: DEFAULT_REQUEST_QUEUE,
            viewer_outbox: DEFAULT_VIEWER_OUTBOX,
        }
    }
}

/// counters maintained by the control loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub active_viewers: usize,
    pub registered_total: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub dropped: u64,
}

enum HubRequest {
    Register(Box<dyn Viewer>),
    Unregister(ViewerId),
    Broadcast(Arc<Record>),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

/// submission side of a running hub
#[derive(Clone)]
pub struct HubHandle {
    requests: mpsc::Sender<HubRequest>,
}

impl HubHandle {
    /// make `viewer` visible to every broadcast processed after this request
    ///
    /// callers must not register the same connection twice
    pub async fn register(&self, viewer: Box<dyn Viewer>) -> Result<(), HubError> {
        self.submit(HubRequest::Register(viewer)).await
    }

    /// remove and close a viewer; a no-op if it is already gone
    pub async fn unregister(&self, id: ViewerId) -> Result<(), HubError> {
        self.submit(HubRequest::Unregister(id)).await
    }

    /// deliver `record` to every viewer registered when the loop reaches it
    pub async fn broadcast(&self, record: impl Into<Arc<Record>>) -> Result<(), HubError> {
        self.submit(HubRequest::Broadcast(record.into())).await
    }

    /// counters as of the moment the loop processes this request
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, response) = oneshot::channel();
        self.submit(HubRequest::Stats(reply)).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// close every viewer and stop the control loop
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.submit(HubRequest::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn submit(&self, request: HubRequest) -> Result<(), HubError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| HubError::Closed)
    }
}

/// state owned by the control loop
pub struct Hub {
    viewers: Vec<Box<dyn Viewer>>,
    stats: HubStats,
}

impl Hub {
    /// start the control loop on the current tokio runtime
    ///
    /// the loop ends on [`HubHandle::shutdown`] or once every handle is
    /// dropped; the join handle yields the final counters
    pub fn spawn(desc: &HubDesc) -> (HubHandle, JoinHandle<HubStats>) {
        let (sender, receiver) = mpsc::channel(desc.request_queue.max(1));
        let handle = tokio::spawn(Self::new().run(receiver));
        (HubHandle { requests: sender }, handle)
    }

    fn new() -> Self {
        Self {
            viewers: Vec::new(),
            stats: HubStats::default(),
        }
    }

    async fn run(mut self, mut requests: mpsc::Receiver<HubRequest>) -> HubStats {
        log::debug!("Hub control loop started");

        while let Some(request) = requests.recv().await {
            match request {
                HubRequest::Register(viewer) => self.register(viewer),
                HubRequest::Unregister(id) => self.unregister(id),
                HubRequest::Broadcast(record) => self.broadcast(&record),
                HubRequest::Stats(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                HubRequest::Shutdown => {
                    log::debug!("Hub shutdown requested");
                    break;
                }
            }
        }

        // refuse new requests, then settle the ones already queued
        requests.close();
        while let Ok(request) = requests.try_recv() {
            self.discard(request);
        }

        self.close_all();
        log::debug!("Hub control loop stopped");
        self.snapshot()
    }

    /// handle a request that arrived after shutdown
    fn discard(&mut self, request: HubRequest) {
        match request {
            HubRequest::Register(mut viewer) => {
                log::debug!("Viewer {} registered after shutdown, closing it", viewer.id());
                viewer.close();
            }
            // dropping the reply sender fails the caller with `HubError::Closed`
            HubRequest::Stats(_) => {}
            HubRequest::Unregister(_) | HubRequest::Broadcast(_) | HubRequest::Shutdown => {}
        }
    }

    fn register(&mut self, viewer: Box<dyn Viewer>) {
        let id = viewer.id();
        if self.viewers.iter().any(|v| v.id() == id) {
            log::warn!("Viewer {} registered twice, it will see duplicates", id);
        }
        log::info!("Viewer {} ({}) connected", id, viewer.label());

        self.viewers.push(viewer);
        self.stats.registered_total += 1;
    }

    fn unregister(&mut self, id: ViewerId) {
        let before = self.viewers.len();
        self.viewers.retain_mut(|viewer| {
            if viewer.id() != id {
                return true;
            }
            viewer.close();
            false
        });

        if self.viewers.len() == before {
            log::debug!("Viewer {} already gone, nothing to unregister", id);
        } else {
            log::info!("Viewer {} disconnected", id);
        }
    }

    fn broadcast(&mut self, record: &Arc<Record>) {
        let mut delivered = 0;
        let mut dropped = 0;

        // a failed send retires that viewer only
        self.viewers
            .retain_mut(|viewer| match viewer.try_send(record) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    log::info!("Dropping viewer {} ({}): {}", viewer.id(), viewer.label(), e);
                    viewer.close();
                    dropped += 1;
                    false
                }
            });

        self.stats.broadcasts += 1;
        self.stats.deliveries += delivered;
        self.stats.dropped += dropped;
    }

    fn close_all(&mut self) {
        if !self.viewers.is_empty() {
            log::info!("Closing {} viewers", self.viewers.len());
        }
        for mut viewer in self.viewers.drain(..) {
            viewer.close();
        }
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            active_viewers: self.viewers.len(),
            ..self.stats
        }
    }
}
