use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::IngestError;

pub(crate) type CsvReader = csv::Reader<BufReader<File>>;

/// Opens a headed, flexible CSV reader over `path`.
pub(crate) fn open_reader(path: &Path) -> Result<CsvReader, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

pub(crate) fn read_headers(
    reader: &mut CsvReader,
    path: &Path,
) -> Result<csv::StringRecord, IngestError> {
    reader
        .headers()
        .cloned()
        .map_err(|e| IngestError::csv(path, &e))
}

/// Case-insensitive header lookup; a leading byte-order mark is ignored.
pub(crate) fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_matches('\u{feff}').eq_ignore_ascii_case(name))
}

pub(crate) fn require_column(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, IngestError> {
    header_index(headers, name).ok_or_else(|| IngestError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    })
}

pub(crate) fn get_str(row: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn get_string(row: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    get_str(row, idx).map(str::to_string)
}

pub(crate) fn get_f64(row: &csv::StringRecord, idx: Option<usize>) -> Option<f64> {
    get_str(row, idx)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Integer cell; integral floats such as `"50912.0"` are accepted.
pub(crate) fn get_i64(row: &csv::StringRecord, idx: Option<usize>) -> Option<i64> {
    let raw = get_str(row, idx)?;
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() && float.fract() == 0.0 => Some(float as i64),
        _ => None,
    }
}
