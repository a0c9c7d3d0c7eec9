// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! Core types and traits for Apersharp.
//!
//! This crate provides the pieces shared by the Apersharp pipeline stages: a
//! common error type, the user notification framework, a small value-type
//! table with CSV I/O, timestamped backups, and NaN-aware numerics on top of
//! `ndarray`.

pub use ndarray;

pub mod errors;
pub mod io;
pub mod notify;
pub mod num;
pub mod table;

pub use errors::{Error, Result};
pub use table::{ColumnType, Table, Value};
