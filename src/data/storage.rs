//! Snapshot file I/O.

use super::processing::PriceRow;
use crate::error::LoadError;
use std::path::Path;
use tempfile::NamedTempFile;

fn io_error(path: &Path, source: std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> LoadError {
    LoadError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `rows` to `path` as CSV, replacing any previous snapshot.
///
/// The rows go to a temporary file next to `path`, which is renamed over the
/// destination once fully flushed. On error the previous snapshot is left as it
/// was and the temporary file is removed. The header row is always written,
/// even for an empty slice.
pub fn write_snapshot(path: &Path, rows: &[PriceRow]) -> Result<(), LoadError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir).map_err(|e| io_error(path, e))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(staged.as_file_mut());

        writer
            .write_record(PriceRow::COLUMNS)
            .map_err(|e| csv_error(path, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| csv_error(path, e))?;
        }
        writer.flush().map_err(|e| io_error(path, e))?;
    }

    staged.persist(path).map_err(|e| io_error(path, e.error))?;

    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`].
#[cfg(test)]
pub fn read_snapshot(path: &Path) -> Result<Vec<PriceRow>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;

    reader
        .deserialize()
        .collect::<Result<Vec<PriceRow>, _>>()
        .map_err(|e| csv_error(path, e))
}
