//! Ingest task: NDJSON source → validated records → hub.
//!
//! An ingest task reads its source line by line, validates each line and
//! broadcasts the valid records in source order. Malformed lines are logged,
//! counted and skipped; they never end the task. Only failing to open or read
//! the source, or the hub going away, ends it early.
//!
//! Several ingest tasks may feed one hub at the same time. Their records
//! interleave in whatever order the hub receives them.

use std::fmt;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::error::IngestError;
use crate::hub::HubHandle;
use crate::record::Record;

/// what one ingest task did with its source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub lines: usize,
    pub forwarded: usize,
    pub malformed: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines, {} forwarded, {} malformed",
            self.lines, self.forwarded, self.malformed
        )
    }
}

/// read `reader` to the end, broadcasting every valid record through `hub`
///
/// suspends whenever the hub's request queue is full
pub async fn ingest<R>(mut reader: R, hub: &HubHandle) -> Result<IngestReport, IngestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = IngestReport::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| IngestError::Read {
                line: report.lines,
                source,
            })?;
        if n == 0 {
            break;
        }
        report.lines += 1;

        // invalid UTF-8 is decoded lossily, JSON validation decides the rest
        let line = String::from_utf8_lossy(&buf);
        match Record::parse(&line) {
            Ok(record) => {
                hub.broadcast(record).await?;
                report.forwarded += 1;
            }
            Err(e) => {
                log::warn!(
                    "Skipping malformed line {}: {} (raw: {})",
                    report.lines,
                    e,
                    line.trim_end()
                );
                report.malformed += 1;
            }
        }
    }

    Ok(report)
}

/// open a local NDJSON file and ingest it
pub async fn ingest_path(
    path: impl AsRef<Path>,
    hub: &HubHandle,
) -> Result<IngestReport, IngestError> {
    let path = path.as_ref();
    let file = File::open(path).await.map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    ingest(BufReader::new(file), hub).await
}

/// run [`ingest`] as a detached background task
///
/// the outcome is logged when the task finishes; callers that do not need it
/// can drop the join handle
pub fn spawn_ingest<R>(
    name: impl Into<String>,
    reader: R,
    hub: HubHandle,
) -> JoinHandle<Result<IngestReport, IngestError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        log::debug!("Ingest task {} started", name);

        let result = ingest(reader, &hub).await;
        match &result {
            Ok(report) => log::info!("Ingest task {} finished: {}", name, report),
            Err(e) => log::error!("Ingest task {} failed: {}", name, e),
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ChannelViewer, Hub, HubDesc, ViewerOutbox};
    use std::io::{Cursor, Write};

    async fn hub_with_viewer() -> (HubHandle, ViewerOutbox) {
        let (hub, _join) = Hub::spawn(&HubDesc::default());
        let (viewer, outbox) = ChannelViewer::new("test", 64);
        hub.register(Box::new(viewer)).await.unwrap();
        (hub, outbox)
    }

    async fn drain(hub: &HubHandle, outbox: &mut ViewerOutbox) -> Vec<String> {
        hub.shutdown().await.unwrap();
        let mut lines = Vec::new();
        while let Some(record) = outbox.recv().await {
            lines.push(record.raw().to_string());
        }
        lines
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped_in_order() {
        let (hub, mut outbox) = hub_with_viewer().await;
        let source = concat!(
            "{\"level\":\"info\",\"message\":\"start\"}\n",
            "not json\n",
            "{\"level\":\"error\",\"message\":\"boom\"}\n",
            "{\"unterminated\":\n",
            "{\"level\":\"info\",\"message\":\"done\"}\n",
        );

        let report = ingest(source.as_bytes(), &hub).await.unwrap();

        assert_eq!(report.lines, 5);
        assert_eq!(report.forwarded, 3);
        assert_eq!(report.malformed, 2);
        assert_eq!(
            drain(&hub, &mut outbox).await,
            vec![
                r#"{"level":"info","message":"start"}"#,
                r#"{"level":"error","message":"boom"}"#,
                r#"{"level":"info","message":"done"}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_lines_are_malformed_and_final_newline_is_optional() {
        let (hub, mut outbox) = hub_with_viewer().await;
        let source = "\n{\"a\":1}\r\n   \n{\"b\":2}";

        let report = ingest(source.as_bytes(), &hub).await.unwrap();

        assert_eq!(
            report,
            IngestReport {
                lines: 4,
                forwarded: 2,
                malformed: 2,
            }
        );
        assert_eq!(drain(&hub, &mut outbox).await, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let (hub, _outbox) = hub_with_viewer().await;
        let source: &[u8] = b"{\"a\":\"\xff\xfe\"}\n{\"ok\":true}\n";

        let report = ingest(source, &hub).await.unwrap();

        // lossy decoding keeps the first line valid JSON with replacement chars
        assert_eq!(report.forwarded, 2);

        let source: &[u8] = b"\xff\xfe\n";
        let report = ingest(source, &hub).await.unwrap();
        assert_eq!(report.malformed, 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_returned() {
        let (hub, _join) = Hub::spawn(&HubDesc::default());
        let err = ingest_path("/definitely/not/here.jsonl", &hub)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
        assert!(!hub.is_closed());
    }

    #[tokio::test]
    async fn test_ingest_path_reads_file() {
        let (hub, mut outbox) = hub_with_viewer().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"message":"from file"}}"#).unwrap();
        writeln!(file, "garbage").unwrap();

        let report = ingest_path(file.path(), &hub).await.unwrap();

        assert_eq!(report.forwarded, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(
            drain(&hub, &mut outbox).await,
            vec![r#"{"message":"from file"}"#]
        );
    }

    #[tokio::test]
    async fn test_closed_hub_ends_ingest() {
        let (hub, join) = Hub::spawn(&HubDesc::default());
        hub.shutdown().await.unwrap();
        join.await.unwrap();

        let err = ingest("{\"a\":1}\n".as_bytes(), &hub).await.unwrap_err();
        assert!(matches!(err, IngestError::HubClosed(_)));
    }

    #[tokio::test]
    async fn test_spawned_ingest_runs_in_background() {
        let (hub, mut outbox) = hub_with_viewer().await;
        let source = Cursor::new(b"{\"n\":1}\n{\"n\":2}\n".to_vec());

        let report = spawn_ingest("upload", source, hub.clone())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.forwarded, 2);
        assert_eq!(drain(&hub, &mut outbox).await, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }
}
