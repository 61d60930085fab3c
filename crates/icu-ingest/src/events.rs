//! Bounded-memory streaming of source event tables.
//!
//! A table is read as a sequence of batches of at most `chunk_size` rows.
//! Only the current batch is held in memory; consumers fold each batch into
//! their own running aggregate before asking for the next one.

use std::path::{Path, PathBuf};

use icu_model::{CodeKind, EventCode, EventRecord, SourceTable, SubjectId};
use serde::{Deserialize, Serialize};

use crate::csv_util::{
    CsvReader, get_f64, get_i64, get_str, open_reader, read_headers, require_column,
};
use crate::error::IngestError;
use crate::timestamp::parse_timestamp;

/// Default number of rows per batch.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

/// Options for batched table reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingOptions {
    /// Rows per batch. Defaults to 500000.
    pub chunk_size: usize,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamingOptions {
    /// Set the batch size; zero is treated as one.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct EventColumns {
    subject: usize,
    code: usize,
    time: Option<usize>,
    value: Option<usize>,
}

/// Iterator over the batches of one source table.
///
/// A batch containing an unreadable row is reported as
/// [`IngestError::Batch`] as a whole; iteration resumes with the next batch.
/// After an I/O failure the iterator ends.
pub struct EventBatches {
    path: PathBuf,
    reader: CsvReader,
    record: csv::StringRecord,
    columns: EventColumns,
    code_kind: CodeKind,
    chunk_size: usize,
    batches: usize,
    rows_read: usize,
    rows_dropped: usize,
    done: bool,
}

/// Opens `source` under `data_root` for batched reading.
///
/// The subject and code columns must exist, as must the time and value
/// columns when the table declares them.
pub fn stream_events(
    data_root: &Path,
    source: &SourceTable,
    code_kind: CodeKind,
    options: &StreamingOptions,
) -> Result<EventBatches, IngestError> {
    let path = data_root.join(&source.path);
    let mut reader = open_reader(&path)?;
    let headers = read_headers(&mut reader, &path)?;
    let optional = |column: &Option<String>| -> Result<Option<usize>, IngestError> {
        column
            .as_deref()
            .map(|name| require_column(&headers, name, &path))
            .transpose()
    };
    let columns = EventColumns {
        subject: require_column(&headers, &source.subject_column, &path)?,
        code: require_column(&headers, &source.code_column, &path)?,
        time: optional(&source.time_column)?,
        value: optional(&source.value_column)?,
    };
    Ok(EventBatches {
        path,
        reader,
        record: csv::StringRecord::new(),
        columns,
        code_kind,
        chunk_size: options.chunk_size.max(1),
        batches: 0,
        rows_read: 0,
        rows_dropped: 0,
        done: false,
    })
}

impl EventBatches {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Batches yielded so far, failed ones included.
    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Rows without a usable subject id or code.
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped
    }

    fn parse_current(&self) -> Option<EventRecord> {
        let row = &self.record;
        let subject_id = get_str(row, Some(self.columns.subject))?
            .parse::<SubjectId>()
            .ok()?;
        let code = match self.code_kind {
            CodeKind::Item => match get_i64(row, Some(self.columns.code)) {
                Some(id) => EventCode::Item(id),
                None => EventCode::Text(get_str(row, Some(self.columns.code))?.to_string()),
            },
            CodeKind::Hierarchical | CodeKind::DrugName => {
                EventCode::Text(get_str(row, Some(self.columns.code))?.to_string())
            }
        };
        Some(EventRecord {
            subject_id,
            timestamp: self
                .columns
                .time
                .and_then(|idx| row.get(idx))
                .and_then(parse_timestamp),
            code,
            value: get_f64(row, self.columns.value),
        })
    }
}

impl Iterator for EventBatches {
    type Item = Result<Vec<EventRecord>, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut records = Vec::with_capacity(self.chunk_size.min(8192));
        let mut failure: Option<String> = None;
        let mut rows = 0usize;
        while rows < self.chunk_size {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    rows += 1;
                    if failure.is_some() {
                        continue;
                    }
                    match self.parse_current() {
                        Some(record) => records.push(record),
                        None => self.rows_dropped += 1,
                    }
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(err) => {
                    rows += 1;
                    let io = matches!(err.kind(), csv::ErrorKind::Io(_));
                    failure.get_or_insert_with(|| err.to_string());
                    if io {
                        self.done = true;
                        break;
                    }
                }
            }
        }
        if rows == 0 {
            return None;
        }
        self.rows_read += rows;
        self.batches += 1;
        Some(match failure {
            Some(message) => Err(IngestError::Batch {
                path: self.path.clone(),
                batch: self.batches,
                message,
            }),
            None => Ok(records),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn labs_source() -> SourceTable {
        SourceTable::new("labevents", "labevents.csv", "itemid")
            .with_time_column("charttime")
            .with_value_column("valuenum")
    }

    fn write_table(dir: &TempDir, body: &str) {
        fs::write(dir.path().join("labevents.csv"), body).unwrap();
    }

    #[test]
    fn splits_rows_into_bounded_batches() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("subject_id,itemid,charttime,valuenum\n");
        for i in 0..5 {
            body.push_str(&format!("{},50912,2180-01-01 10:00:00,1.{}\n", i, i));
        }
        write_table(&dir, &body);
        let options = StreamingOptions::default().with_chunk_size(2);
        let batches: Vec<_> = stream_events(dir.path(), &labs_source(), CodeKind::Item, &options)
            .unwrap()
            .collect();
        let sizes: Vec<usize> = batches
            .into_iter()
            .map(|batch| batch.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn unparseable_cells_become_missing() {
        let dir = TempDir::new().unwrap();
        write_table(
            &dir,
            "subject_id,itemid,charttime,valuenum\n\
             1,50912.0,not a time,abc\n\
             x,50912,2180-01-01 10:00:00,1.0\n",
        );
        let mut batches = stream_events(
            dir.path(),
            &labs_source(),
            CodeKind::Item,
            &StreamingOptions::default(),
        )
        .unwrap();
        let batch = batches.next().unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].code, EventCode::Item(50912));
        assert_eq!(batch[0].timestamp, None);
        assert_eq!(batch[0].value, None);
        assert_eq!(batches.rows_dropped(), 1);
        assert!(batches.next().is_none());
    }

    #[test]
    fn missing_value_column_is_reported() {
        let dir = TempDir::new().unwrap();
        write_table(&dir, "subject_id,itemid,charttime\n1,50912,2180-01-01\n");
        let err = stream_events(
            dir.path(),
            &labs_source(),
            CodeKind::Item,
            &StreamingOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "valuenum"));
    }

    #[test]
    fn invalid_utf8_fails_only_its_batch() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"subject_id,itemid,charttime,valuenum\n1,50912,2180-01-01,1.0\n".to_vec();
        bytes.extend_from_slice(b"2,50912,2180-01-01,\xff\xfe\n");
        bytes.extend_from_slice(b"3,50912,2180-01-01,2.0\n");
        fs::write(dir.path().join("labevents.csv"), bytes).unwrap();
        let options = StreamingOptions::default().with_chunk_size(2);
        let results: Vec<_> = stream_events(dir.path(), &labs_source(), CodeKind::Item, &options)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(IngestError::Batch { batch: 1, .. })));
        let last = results[1].as_ref().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].subject_id, SubjectId::new(3));
    }
}
