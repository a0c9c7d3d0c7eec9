// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Finding sources detected in more than one beam.

Neighboring compound beams overlap on the sky, so a bright source near the
edge of one beam is usually also cataloged by its neighbor. The matcher
compares every source against the sources of the *adjacent* beams only (never
its own beam) and records, in the `Matching_Sources` column, the IDs of all
sources closer than a fixed angular separation. Sources without a
counterpart get `-`.

 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use apersharp_core::{an_note, notify::NotificationBackend, ColumnType, Table, Value};

use crate::{
    beams::{Beam, BeamAdjacency},
    columns,
    coords::{parse_dec, parse_ra, SkyPosition},
    Error, Result,
};

/// The default matching radius, in arcseconds.
pub const DEFAULT_MAX_SEPARATION_ARCSEC: f64 = 3.0;

/// Separations are compared at this resolution, in arcseconds, so that
/// rounding noise in the trigonometry cannot decide a match at the threshold.
const SEPARATION_RESOLUTION_ARCSEC: f64 = 1e-6;

/// What [`cross_match`] did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchSummary {
    pub n_sources: usize,

    /// Sources with at least one counterpart in a neighboring beam.
    pub n_matched: usize,
}

fn row_context(table: &Table, row: usize) -> String {
    match table.str_value(row, columns::SOURCE_ID) {
        Ok(id) => format!("row {} ({})", row + 1, id),
        Err(_) => format!("row {}", row + 1),
    }
}

fn position_of(table: &Table, row: usize) -> Result<SkyPosition> {
    let coord = |name: &str, parse: fn(&str) -> Result<f64>| -> Result<f64> {
        match table.get(row, name)? {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(x) => Ok(*x),
            Value::Str(s) => parse(s),
            Value::Null => Err(Error::BadPosition(format!("empty \"{name}\" cell"))),
        }
    };

    coord(columns::RA, parse_ra)
        .and_then(|ra| Ok((ra, coord(columns::DEC, parse_dec)?)))
        .and_then(|(ra, dec)| SkyPosition::from_degrees(ra, dec))
        .map_err(|e| match e {
            Error::BadPosition(msg) => {
                Error::BadPosition(format!("{}: {}", row_context(table, row), msg))
            }
            other => other,
        })
}

/// Whether *a* and *b* lie strictly closer than *max_separation_arcsec*.
///
/// Both sides are compared as whole multiples of the resolution.
fn is_within(a: &SkyPosition, b: &SkyPosition, max_separation_arcsec: f64) -> bool {
    let steps = |arcsec: f64| (arcsec / SEPARATION_RESOLUTION_ARCSEC).round();
    steps(a.separation_arcsec(b)) < steps(max_separation_arcsec)
}

/// Add the `Matching_Sources` column to a master table.
///
/// Any existing match column is replaced. For each source, the IDs of all
/// sources in adjacent beams that lie strictly closer than
/// *max_separation_arcsec* are listed, comma-separated, in table order.
pub fn annotate_matches(
    mut table: Table,
    max_separation_arcsec: f64,
    adjacency: &BeamAdjacency,
) -> Result<Table> {
    if table.has_column(columns::MATCHING_SOURCES) {
        table.drop_columns(&[columns::MATCHING_SOURCES])?;
    }

    let n = table.n_rows();
    let mut beams = Vec::with_capacity(n);
    let mut positions = Vec::with_capacity(n);
    let mut ids = Vec::with_capacity(n);

    for row in 0..n {
        beams.push(Beam::new(table.int_value(row, columns::BEAM)?)?);
        positions.push(position_of(&table, row)?);
        ids.push(table.str_value(row, columns::SOURCE_ID)?.into_owned());
    }

    let mut by_beam: BTreeMap<Beam, Vec<usize>> = BTreeMap::new();

    for (row, &beam) in beams.iter().enumerate() {
        by_beam.entry(beam).or_default().push(row);
    }

    let mut matches = vec![String::new(); n];

    for (&beam, members) in &by_beam {
        let neighbors = adjacency.neighbors(beam)?;
        let pool: Vec<usize> = (0..n).filter(|&r| neighbors.contains(&beams[r])).collect();

        for &row in members {
            let found: Vec<&str> = pool
                .iter()
                .filter(|&&other| {
                    is_within(&positions[row], &positions[other], max_separation_arcsec)
                })
                .map(|&other| ids[other].as_str())
                .collect();

            matches[row] = if found.is_empty() {
                columns::NO_MATCH.to_owned()
            } else {
                found.join(",")
            };
        }
    }

    table.add_column(
        columns::MATCHING_SOURCES,
        ColumnType::Str,
        matches.into_iter().map(Value::Str).collect(),
    )?;
    Ok(table)
}

/// Annotate the master table file at *master_path* with cross-beam matches,
/// rewriting it in place.
pub fn cross_match<P: AsRef<Path>>(
    master_path: P,
    max_separation_arcsec: f64,
    adjacency: &BeamAdjacency,
    nbe: &mut dyn NotificationBackend,
) -> Result<MatchSummary> {
    let master_path = master_path.as_ref();

    let table = match Table::read_csv_if_exists(master_path)? {
        Some(t) => t,
        None => return Err(Error::MissingInput(PathBuf::from(master_path))),
    };

    if table.has_column(columns::MATCHING_SOURCES) {
        an_note!(nbe, "replacing the existing match column");
    }

    an_note!(
        nbe,
        "matching {} sources across adjacent beams within {}″",
        table.n_rows(),
        max_separation_arcsec
    );

    let table = annotate_matches(table, max_separation_arcsec, adjacency)?;

    let n_matched = table
        .column(columns::MATCHING_SOURCES)?
        .iter()
        .filter(|v| !matches!(v, Value::Str(s) if s == columns::NO_MATCH))
        .count();

    table.write_csv(master_path)?;

    an_note!(
        nbe,
        "{} of {} sources have a counterpart in a neighboring beam",
        n_matched,
        table.n_rows()
    );

    Ok(MatchSummary {
        n_sources: table.n_rows(),
        n_matched,
    })
}
