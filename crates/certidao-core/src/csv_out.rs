//! CSV output: one header row of column names, one row per record.

use std::io;
use std::path::Path;

use tracing::info;

use crate::{CertidaoRecord, CoreError, Field};

/// Write records as CSV. Absent values become empty cells.
///
/// The header is written even when `records` is empty.
pub fn write_csv<W: io::Write>(writer: W, records: &[CertidaoRecord]) -> Result<(), CoreError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(Field::ALL.iter().map(|f| f.column()))?;
    for record in records {
        wtr.write_record(Field::ALL.iter().map(|&f| record.get(f).unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write records to `path`, creating or truncating the file.
pub fn write_csv_file(path: &Path, records: &[CertidaoRecord]) -> Result<(), CoreError> {
    let file = std::fs::File::create(path)?;
    write_csv(io::BufWriter::new(file), records)?;
    info!(path = %path.display(), rows = records.len(), "wrote CSV");
    Ok(())
}
