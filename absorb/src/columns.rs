// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! Names of the master-table columns.
//!
//! These match the tables written by earlier versions of the pipeline, which
//! downstream plotting and inspection tools still expect.

pub const SOURCE_ID: &str = "Source_ID";
pub const CUBE: &str = "Cube";
pub const BEAM: &str = "Beam";
pub const BEAM_SOURCE_ID: &str = "Beam_Source_ID";

// As written by the extraction tool.
pub const CATALOG_ID: &str = "ID";
pub const J2000: &str = "J2000";
pub const RA: &str = "ra";
pub const DEC: &str = "dec";
pub const FFLAG: &str = "FFLAG";

/// Columns every per-beam catalog must provide.
pub const REQUIRED_CATALOG_COLUMNS: &[&str] = &[CATALOG_ID, J2000, RA, DEC, FFLAG];

pub const SDSS_ID: &str = "sdss_id";
pub const SDSS_RA: &str = "sdss_ra";
pub const SDSS_DEC: &str = "sdss_dec";
pub const SDSS_RADIO_SEP: &str = "sdss_radio_sep";
pub const SDSS_REDSHIFT: &str = "sdss_redshift";

pub const MATCHING_SOURCES: &str = "Matching_Sources";

/// Recorded in [`MATCHING_SOURCES`] when a source has no counterpart.
pub const NO_MATCH: &str = "-";

pub const MEAN_NOISE: &str = "Mean_Noise";
pub const MEDIAN_NOISE: &str = "Median_Noise";
pub const RMS: &str = "RMS";
pub const MIN_FLUX: &str = "Min_Flux";
pub const MAX_FLUX: &str = "Max_Flux";
pub const MEAN_FLUX: &str = "Mean_Flux";
pub const MEDIAN_FLUX: &str = "Median_Flux";
pub const CANDIDATE_SNR: &str = "Candidate_SNR";
pub const MAX_NEGATIVE_SNR: &str = "Max_Negative_SNR";
pub const MAX_NEGATIVE_SNR_CHANNEL: &str = "Max_Negative_SNR_Channel";
pub const MAX_NEGATIVE_SNR_FREQUENCY: &str = "Max_Negative_SNR_Frequency";
pub const MAX_POSITIVE_SNR: &str = "Max_Positive_SNR";
pub const MAX_POSITIVE_SNR_CHANNEL: &str = "Max_Positive_SNR_Channel";
pub const MAX_POSITIVE_SNR_FREQUENCY: &str = "Max_Positive_SNR_Frequency";

/// Every column added by the candidate scorer, in table order.
pub const ANALYSIS_COLUMNS: &[&str] = &[
    MEAN_NOISE,
    MEDIAN_NOISE,
    RMS,
    MIN_FLUX,
    MAX_FLUX,
    MEAN_FLUX,
    MEDIAN_FLUX,
    CANDIDATE_SNR,
    MAX_NEGATIVE_SNR,
    MAX_NEGATIVE_SNR_CHANNEL,
    MAX_NEGATIVE_SNR_FREQUENCY,
    MAX_POSITIVE_SNR,
    MAX_POSITIVE_SNR_CHANNEL,
    MAX_POSITIVE_SNR_FREQUENCY,
];
