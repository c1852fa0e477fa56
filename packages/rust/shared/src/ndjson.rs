//! Newline-delimited JSON input and output.
//!
//! Reading isolates failures per line: a malformed line is logged, counted and
//! skipped. Only an unreadable file aborts.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Result, SieveError};
use crate::types::{RawLink, Record};

/// Records parsed from an input file plus the number of lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ReadReport {
    pub records: Vec<Record>,
    pub skipped: usize,
}

/// Read crawler output (`{url, num_occurrences, loc}` per line) into records.
pub fn read_links(path: &Path) -> Result<ReadReport> {
    let file = File::open(path).map_err(|e| SieveError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut report = ReadReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| SieveError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_link_line(&line) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed input line");
                report.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        records = report.records.len(),
        skipped = report.skipped,
        "input read"
    );

    Ok(report)
}

/// Parse a single crawler line. The url must yield a domain key.
pub fn parse_link_line(line: &str) -> Result<Record> {
    let raw: RawLink = serde_json::from_str(line)
        .map_err(|e| SieveError::parse(format!("invalid link object: {e}")))?;

    let record = Record::from(raw);
    if record.domain_key().is_none() {
        return Err(SieveError::validation(format!(
            "url '{}' has no domain",
            record.url
        )));
    }
    Ok(record)
}

/// Append records to `path` as one JSON object per line, creating parent directories.
pub fn append_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SieveError::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SieveError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)
            .map_err(|e| SieveError::parse(format!("failed to encode record: {e}")))?;
        writer
            .write_all(b"\n")
            .map_err(|e| SieveError::io(path, e))?;
    }
    writer.flush().map_err(|e| SieveError::io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixture_and_skips_bad_lines() {
        let report = read_links(Path::new("../../../fixtures/ndjson/crawled_links.fixture.ndjson"))
            .expect("read fixture");

        assert_eq!(report.records.len(), 5);
        // invalid JSON, missing num_occurrences, url without a host
        assert_eq!(report.skipped, 3);
        assert_eq!(report.records[0].url, "https://www.panaderia-sol.es/contacto");
        assert_eq!(report.records[0].locations, vec!["Spain"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_links(Path::new("/definitely/not/here.ndjson")).unwrap_err();
        assert!(matches!(err, SieveError::Io { .. }));
    }

    #[test]
    fn append_creates_dirs_and_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run").join("analyser").join("out.json");

        let first = Record {
            url: "http://a.com/x".into(),
            occurrence_count: Some(2),
            locations: vec!["UK".into()],
            ..Record::default()
        };
        let second = Record {
            url: "http://b.com/z".into(),
            ..first.clone()
        };

        append_records(&path, std::slice::from_ref(&first)).expect("first append");
        append_records(&path, std::slice::from_ref(&second)).expect("second append");

        let content = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Record = serde_json::from_str(lines[1]).expect("parse line");
        assert_eq!(parsed, second);
    }
}
