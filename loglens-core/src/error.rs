//! Error types for loglens-core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// why a source line was not accepted as a record
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    Malformed(#[source] serde_json::Error),

    #[error("expected a JSON object, found {kind}")]
    NotAnObject { kind: &'static str },
}

/// failure to hand a record to one viewer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// outbox is at its bound, the viewer is not keeping up
    #[error("viewer outbox full")]
    Full,

    /// transport writer has gone away
    #[error("viewer connection closed")]
    Closed,
}

/// hub control loop is no longer accepting requests
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("hub closed during ingest")]
    HubClosed(#[from] HubError),
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("write error: {0}")]
    Write(#[from] io::Error),
}
