//! One-shot dump: pretty-print every record of an NDJSON source.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::DumpError;
use crate::record::Record;

/// source read when no path is given
pub const DEFAULT_DUMP_PATH: &str = "logs.jsonl";

/// separator printed after every record
pub const RECORD_SEPARATOR: &str = "---";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpReport {
    pub printed: usize,
    pub malformed: usize,
}

/// print each valid record of `reader` to `out` as indented JSON
///
/// malformed lines, blank ones included, print a diagnostic and the raw
/// line, then are skipped
pub fn dump<R, W>(mut reader: R, mut out: W) -> Result<DumpReport, DumpError>
where
    R: BufRead,
    W: Write,
{
    let mut report = DumpReport::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| DumpError::Read {
                line: line_no,
                source,
            })?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let line = String::from_utf8_lossy(&buf);
        match Record::parse(&line) {
            Ok(record) => {
                let pretty = match record.to_pretty() {
                    Ok(pretty) => pretty,
                    Err(e) => {
                        writeln!(out, "Error formatting JSON: {}", e)?;
                        continue;
                    }
                };
                writeln!(out, "{}", pretty)?;
                writeln!(out, "{}", RECORD_SEPARATOR)?;
                report.printed += 1;
            }
            Err(e) => {
                log::debug!("Malformed line {}: {}", line_no, e);
                writeln!(out, "Error parsing JSON: {}", e)?;
                writeln!(out, "Raw line: {}", line.trim_end_matches(['\r', '\n']))?;
                report.malformed += 1;
            }
        }
    }

    out.flush()?;
    Ok(report)
}

/// open `path` and [`dump`] it
pub fn dump_path<W: Write>(path: impl AsRef<Path>, out: W) -> Result<DumpReport, DumpError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DumpError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    dump(BufReader::new(file), out)
}
