//! # loglens-core
//!
//! Ingestion and live fan-out of structured (NDJSON) log records.
//!
//! ## Overview
//!
//! Records come in as newline-delimited JSON, get validated one line at a
//! time, and are either printed once ([`dump()`]) or pushed to every connected
//! viewer through the broadcast [`hub`].
//!
//! ```text
//! ┌──────────────┐  validated Record   ┌─────────────┐  try_send()  ┌────────────┐
//! │ Ingest task  │ ──────────────────> │ Hub control │ ───────────> │ Viewer 1…N │
//! └──────────────┘   broadcast()       │    loop     │              └────────────┘
//!                                      └─────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! - **[`Record`]**: one validated JSON object, immutable and shared as
//!   `Arc<Record>`.
//! - **[`Hub`]**: a single task owning the set of viewers. Everything else
//!   talks to it through a [`HubHandle`]; requests are applied strictly in
//!   the order they were queued.
//! - **[`Viewer`]**: the seam to a transport. The hub only ever calls a
//!   non-blocking `try_send` and an idempotent `close`.
//! - **[`ingest()`]**: reads a source line by line and feeds the hub.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loglens_core::{ChannelViewer, Hub, HubDesc, spawn_ingest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (hub, _hub_task) = Hub::spawn(&HubDesc::default());
//!
//! // a transport would drain `outbox` and write each record to its peer
//! let (viewer, mut outbox) = ChannelViewer::new("example", 256);
//! hub.register(Box::new(viewer)).await?;
//!
//! let source = std::io::Cursor::new(b"{\"level\":\"info\",\"message\":\"start\"}\n".to_vec());
//! spawn_ingest("example", source, hub.clone());
//!
//! while let Some(record) = outbox.recv().await {
//!     println!("{}", record.raw());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery Guarantees
//!
//! At-most-once, best effort. A viewer that cannot take a record right away
//! is dropped; nothing is retried and a viewer that connects later does not
//! see earlier records.

pub mod dump;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod record;

// re-export commonly used types
pub use dump::{DEFAULT_DUMP_PATH, DumpReport, dump, dump_path};
pub use error::{DumpError, HubError, IngestError, RecordError, SendError};
pub use hub::{ChannelViewer, Hub, HubDesc, HubHandle, HubStats, Viewer, ViewerId, ViewerOutbox};
pub use ingest::{IngestReport, ingest, ingest_path, spawn_ingest};
pub use record::Record;
