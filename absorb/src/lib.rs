// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! Cross-beam reconciliation of multi-beam source catalogs, and the search
//! for HI absorption candidates in their spectra.
//!
//! Each beam of a compound-beam observation is processed independently by
//! the spectral-extraction tool, which leaves behind a source catalog and one
//! spectrum file per source. This crate turns those per-beam products into a
//! single master table ([`catalog`]), flags sources detected in more than one
//! overlapping beam ([`crossmatch`]), and scores every spectrum for
//! significant absorption ([`candidates`]).

use std::path::PathBuf;
use thiserror::Error;

pub mod beams;
pub mod candidates;
pub mod catalog;
pub mod columns;
pub mod coords;
pub mod crossmatch;
pub mod layout;
pub mod source_id;
pub mod spectrum;

pub use beams::{Beam, BeamAdjacency, N_BEAMS};
pub use coords::SkyPosition;
pub use source_id::SourceId;

/// Errors arising in the pipeline stages.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] apersharp_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("beam number {0} is outside the footprint (0 to 39)")]
    InvalidBeam(i64),

    #[error("\"{0}\" is not a beam number")]
    BadBeamName(String),

    #[error("beam {0} has no overlapping neighbors; the adjacency table is broken")]
    NoNeighbors(Beam),

    #[error("did not find any beam directories in \"{0}\"")]
    NoBeamDirectories(PathBuf),

    #[error("no source information was found for any beam of cube directory \"{0}\"")]
    EmptyAggregate(PathBuf),

    #[error("required input file \"{0}\" does not exist")]
    MissingInput(PathBuf),

    #[error("cannot determine the {what} from cube directory \"{path}\"")]
    UnknownProvenance { what: &'static str, path: PathBuf },

    #[error("bad sky position: {0}")]
    BadPosition(String),

    #[error("bad source identifier \"{0}\"")]
    BadSourceId(String),

    #[error("bad spectrum file \"{path}\": {reason}")]
    BadSpectrum { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
