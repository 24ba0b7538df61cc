//! CSV archiving functionality
//!
//! An [`Archiver`] writes serialisable records as rows of a CSV file. The header row is written
//! when the file is created, so an archive with no records still names its columns.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::{Path, PathBuf};
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    path: PathBuf,
    writer: Writer<File>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not create the archive file {0:?}: {1}")]
    CreateError(PathBuf, std::io::Error),

    #[error("Could not write the record: {0}")]
    WriteError(csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver writing to the given path and write the header row.
    ///
    /// Any existing file at the path is truncated. Missing parent directories are created. The
    /// header must list the columns in the order the record's fields are serialised.
    pub fn from_path<P: AsRef<Path>>(path: P, header: &[&str]) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;
            }
        }

        // Create (or truncate) the file, then append to it
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record(header).map_err(ArchiveError::WriteError)?;
        writer.flush().map_err(ArchiveError::FlushError)?;

        Ok(Self {
            path,
            writer
        })
    }

    /// Serialise a record into the archive.
    ///
    /// The row is flushed to disk immediately so that the archive survives a crash.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer.serialize(record).map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
