// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
This module implements the core error types used by Apersharp crates.

Higher-level crates define their own error enums and wrap this one
transparently, so that low-level table and I/O failures keep their context
as they propagate up to the command-line driver.

*/

use std::{io, path::PathBuf};
use thiserror::Error;

/// The core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O-related error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An error raised by the CSV reader or writer.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// A table was asked for a column it does not have.
    #[error("no column named \"{0}\" in table")]
    MissingColumn(String),

    /// A column was added to a table that already has one by that name.
    #[error("table already has a column named \"{0}\"")]
    DuplicateColumn(String),

    /// Two tables could not be stacked because their column sets differ.
    #[error("column sets differ: {0}")]
    SchemaMismatch(String),

    /// A column or row has the wrong number of entries.
    #[error("expected {expected} entries but found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A cell could not be interpreted as the requested type.
    #[error("cannot interpret value \"{value}\" in column \"{column}\" as {wanted}")]
    BadValue {
        column: String,
        value: String,
        wanted: &'static str,
    },

    /// A file that must be backed up is not a regular file with a name.
    #[error("cannot make a backup of \"{0}\"")]
    BadBackupSource(PathBuf),
}

/// A `Result` type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
