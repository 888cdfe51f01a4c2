//! On-disk CSV stores: the known registry, the unknown registry and the observation log.
//!
//! All writers append. Nothing in this module rewrites or truncates an existing file.
//!
//! The stores assume a single writer. Running two processes against the same files can
//! append the same unknown identifier twice.

mod known;
mod observations;
mod unknown;

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

pub use known::KnownRegistry;
pub use observations::ObservationLog;
pub use observations::HEADER as OBSERVATION_HEADER;
pub use observations::TIMESTAMP_FORMAT;
pub use unknown::UnknownRegistry;
pub use unknown::HEADER as UNKNOWN_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error on {0}: {1}")]
    Csv(PathBuf, #[source] csv::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open `path` for appending, writing `header` first if the file is missing or empty.
///
/// Missing parent directories are created. A file whose last line is unterminated (typically
/// after a manual edit) gets a line break first, so the next record starts on its own row.
pub(crate) fn open_writer(path: &Path, header: &[&str]) -> Result<csv::Writer<File>> {
    let io_err = |e| StoreError::Io(path.to_path_buf(), e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let empty = file.metadata().map_err(io_err)?.len() == 0;
    if !empty && !ends_with_newline(&mut file).map_err(io_err)? {
        file.write_all(b"\n").map_err(io_err)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if empty {
        writer
            .write_record(header)
            .map_err(|e| StoreError::Csv(path.to_path_buf(), e))?;
    }
    Ok(writer)
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Flush a writer returned by [`open_writer`].
pub(crate) fn finish(path: &Path, mut writer: csv::Writer<File>) -> Result<()> {
    writer
        .flush()
        .map_err(|e| StoreError::Io(path.to_path_buf(), e))
}

/// Open a lenient reader: no header handling, ragged rows allowed, fields trimmed.
pub(crate) fn lenient_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}
