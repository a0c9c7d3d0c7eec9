// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Aggregating the per-beam source catalogs of one cube into a master table.

The extraction tool writes one catalog per beam. When an optical
cross-match succeeded, that catalog is `radio_sdss_src_match.csv` and
carries the `sdss_*` columns; otherwise only the plain radio catalog
`mir_src_sharp.csv` exists. Both are folded into a single table with a
uniform schema, one row per source, keyed by a survey-wide source
identifier (see [`crate::source_id`]).

Aggregation can be re-run after some beams have been reprocessed. In that
case the rows of the re-aggregated beams replace the old ones in the
existing master table, and the rows of the other beams are kept.

 */

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use apersharp_core::{
    an_note, an_warning, io::backup_file, notify::NotificationBackend, ColumnType, Table, Value,
};

use crate::{
    beams::Beam,
    columns::{self, REQUIRED_CATALOG_COLUMNS},
    layout::CubeLayout,
    source_id::SourceId,
    Error, Result,
};

/// The default name of the per-beam catalog with optical cross-matches.
pub const PRIMARY_CATALOG_NAME: &str = "radio_sdss_src_match.csv";

/// The default name of the plain per-beam radio catalog.
pub const FALLBACK_CATALOG_NAME: &str = "mir_src_sharp.csv";

/// The optical cross-match columns that every master table carries, and
/// their types. Catalogs without them get zero placeholders.
const SDSS_SCHEMA: &[(&str, ColumnType)] = &[
    (columns::SDSS_ID, ColumnType::Int),
    (columns::SDSS_RA, ColumnType::Float),
    (columns::SDSS_DEC, ColumnType::Float),
    (columns::SDSS_RADIO_SEP, ColumnType::Float),
    (columns::SDSS_REDSHIFT, ColumnType::Float),
];

/// Settings for [`aggregate`].
#[derive(Clone, Debug)]
pub struct AggregateOptions {
    /// Where the master table is written.
    pub output_path: PathBuf,

    /// The cube directory holding the beam subdirectories.
    pub cube_dir: PathBuf,

    /// The observation's task ID. If unset, the name of the directory
    /// containing `cube_dir` is used.
    pub taskid: Option<String>,

    /// The cube number. If unset, it is taken from the name of `cube_dir`,
    /// which should look like `cube_<n>`.
    pub cube_nr: Option<u32>,

    /// The beams to aggregate. If unset, every beam with a directory in
    /// `cube_dir` is used.
    pub beams: Option<Vec<Beam>>,

    pub primary_catalog_name: String,
    pub fallback_catalog_name: String,

    /// Replace an existing master table outright instead of merging.
    pub overwrite: bool,

    /// Copy an existing master table aside before replacing it.
    pub make_backup: bool,

    /// Append to an existing master table without removing the old rows of
    /// the aggregated beams. Source IDs may then be duplicated.
    pub allow_duplicates: bool,
}

impl AggregateOptions {
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(output_path: P1, cube_dir: P2) -> Self {
        AggregateOptions {
            output_path: output_path.into(),
            cube_dir: cube_dir.into(),
            taskid: None,
            cube_nr: None,
            beams: None,
            primary_catalog_name: PRIMARY_CATALOG_NAME.to_owned(),
            fallback_catalog_name: FALLBACK_CATALOG_NAME.to_owned(),
            overwrite: false,
            make_backup: true,
            allow_duplicates: false,
        }
    }

    fn resolve_taskid(&self) -> Result<String> {
        if let Some(t) = &self.taskid {
            return Ok(t.clone());
        }

        let full = fs::canonicalize(&self.cube_dir).unwrap_or_else(|_| self.cube_dir.clone());

        full.parent()
            .and_then(Path::file_name)
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_owned())
            .ok_or_else(|| Error::UnknownProvenance {
                what: "task ID",
                path: self.cube_dir.clone(),
            })
    }

    fn resolve_cube_nr(&self) -> Result<u32> {
        if let Some(n) = self.cube_nr {
            return Ok(n);
        }

        self.cube_dir
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit('_').next())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::UnknownProvenance {
                what: "cube number",
                path: self.cube_dir.clone(),
            })
    }
}

/// What [`aggregate`] did.
#[derive(Clone, Debug, Default)]
pub struct AggregateSummary {
    /// Beams whose catalogs were ingested.
    pub beams_used: Vec<Beam>,

    /// Beams skipped because they had no usable catalog.
    pub beams_skipped: Vec<Beam>,

    /// Rows in the written master table.
    pub n_rows: usize,

    /// Rows of a pre-existing master table that were replaced.
    pub n_replaced: usize,

    /// Where the previous master table was copied, if it was.
    pub backup: Option<PathBuf>,
}

/// Add any missing optical cross-match columns to a catalog, filled with
/// zeros of the right type.
pub fn reconcile_sdss_schema(table: &mut Table) -> Result<()> {
    let n = table.n_rows();

    for &(name, ctype) in SDSS_SCHEMA {
        if table.has_column(name) {
            continue;
        }

        let zero = match ctype {
            ColumnType::Int => Value::Int(0),
            ColumnType::Float => Value::Float(0.),
            ColumnType::Str => Value::Str(String::new()),
        };

        table.add_column(name, ctype, vec![zero; n])?;
    }

    Ok(())
}

/// Read one beam's catalog and bring it into master-table form.
///
/// Returns `Ok(None)` if the beam has no usable catalog.
fn load_beam(
    layout: &CubeLayout,
    beam: Beam,
    taskid: &str,
    cube_nr: u32,
    opts: &AggregateOptions,
    nbe: &mut dyn NotificationBackend,
) -> Result<Option<Table>> {
    let primary = layout.catalog_path(beam, &opts.primary_catalog_name);

    let mut table = match Table::read_csv_if_exists(&primary)? {
        Some(t) => t,

        None => {
            let fallback = layout.catalog_path(beam, &opts.fallback_catalog_name);

            match Table::read_csv_if_exists(&fallback)? {
                Some(t) => {
                    an_warning!(
                        nbe,
                        "beam {}: no catalog `{}`; using `{}` with empty optical columns",
                        beam,
                        primary.display(),
                        fallback.display()
                    );
                    t
                }

                None => {
                    an_warning!(
                        nbe,
                        "beam {}: no source catalog found in `{}`; skipping it",
                        beam,
                        primary.parent().unwrap_or(&primary).display()
                    );
                    return Ok(None);
                }
            }
        }
    };

    if let Some(missing) = REQUIRED_CATALOG_COLUMNS
        .iter()
        .find(|c| !table.has_column(c))
    {
        an_warning!(
            nbe,
            "beam {}: catalog has no column \"{}\"; skipping it",
            beam,
            missing
        );
        return Ok(None);
    }

    reconcile_sdss_schema(&mut table)?;
    table.rename_column(columns::CATALOG_ID, columns::BEAM_SOURCE_ID)?;
    table.cast_to_str(columns::FFLAG)?;

    let n = table.n_rows();
    let mut ids = Vec::with_capacity(n);

    for row in 0..n {
        let index = table.int_value(row, columns::BEAM_SOURCE_ID)?;
        let label = table.str_value(row, columns::J2000)?;
        ids.push(SourceId::new(taskid, cube_nr, beam, index, label.as_ref()).to_string());
    }

    table.insert_column(
        0,
        columns::SOURCE_ID,
        ColumnType::Str,
        ids.into_iter().map(Value::Str).collect(),
    )?;
    table.insert_column(
        1,
        columns::CUBE,
        ColumnType::Int,
        vec![Value::Int(cube_nr as i64); n],
    )?;
    table.insert_column(
        2,
        columns::BEAM,
        ColumnType::Int,
        vec![Value::Int(beam.number() as i64); n],
    )?;

    an_note!(nbe, "beam {}: found {} sources", beam, n);
    Ok(Some(table))
}

/// The `(cube, beam)` provenance of every row of a master table.
fn provenance(table: &Table) -> Result<Vec<(i64, i64)>> {
    (0..table.n_rows())
        .map(|r| {
            Ok((
                table.int_value(r, columns::CUBE)?,
                table.int_value(r, columns::BEAM)?,
            ))
        })
        .collect()
}

/// Fold a freshly aggregated table into an existing master table.
///
/// Returns the merged table and the number of old rows that were dropped.
fn merge(
    mut old: Table,
    new: Table,
    allow_duplicates: bool,
    nbe: &mut dyn NotificationBackend,
) -> Result<(Table, usize)> {
    let mut n_replaced = 0;

    if !allow_duplicates {
        let fresh: HashSet<(i64, i64)> = provenance(&new)?.into_iter().collect();
        let old_keys = provenance(&old)?;
        let n_before = old.n_rows();
        old.retain_rows(|r| !fresh.contains(&old_keys[r]));
        n_replaced = n_before - old.n_rows();
    }

    // Match lists and spectral scores refer to the old source set, and must
    // be recomputed by the later stages anyway.
    let stale: Vec<&str> = std::iter::once(columns::MATCHING_SOURCES)
        .chain(columns::ANALYSIS_COLUMNS.iter().copied())
        .filter(|c| old.has_column(c) && !new.has_column(c))
        .collect();

    if !stale.is_empty() {
        an_note!(
            nbe,
            "dropping {} derived columns from the existing master table; re-run matching and scoring",
            stale.len()
        );
        old.drop_columns(&stale)?;
    }

    old.vstack(new)?;
    Ok((old, n_replaced))
}

/// Collect the catalogs of all beams of a cube into the master table.
pub fn aggregate(
    opts: &AggregateOptions,
    nbe: &mut dyn NotificationBackend,
) -> Result<AggregateSummary> {
    let layout = CubeLayout::new(&opts.cube_dir);
    let taskid = opts.resolve_taskid()?;
    let cube_nr = opts.resolve_cube_nr()?;

    an_note!(
        nbe,
        "collecting sources of cube {} of task {} from `{}`",
        cube_nr,
        taskid,
        opts.cube_dir.display()
    );

    let beams = match &opts.beams {
        Some(b) => b.clone(),
        None => layout.list_beams()?,
    };

    if beams.is_empty() {
        return Err(Error::NoBeamDirectories(opts.cube_dir.clone()));
    }

    let mut summary = AggregateSummary::default();
    let mut combined = Table::new();

    for beam in beams {
        match load_beam(&layout, beam, &taskid, cube_nr, opts, nbe)? {
            Some(t) => {
                combined.vstack(t)?;
                summary.beams_used.push(beam);
            }
            None => summary.beams_skipped.push(beam),
        }
    }

    if combined.is_empty() {
        return Err(Error::EmptyAggregate(opts.cube_dir.clone()));
    }

    let mut table = match Table::read_csv_if_exists(&opts.output_path)? {
        None => combined,

        Some(old) => {
            if opts.make_backup {
                let dest = backup_file(&opts.output_path)?;
                an_note!(nbe, "saved the previous master table to `{}`", dest.display());
                summary.backup = Some(dest);
            }

            if opts.overwrite {
                an_note!(nbe, "replacing the existing master table");
                combined
            } else {
                let (merged, n_replaced) = merge(old, combined, opts.allow_duplicates, nbe)?;
                summary.n_replaced = n_replaced;
                merged
            }
        }
    };

    table.sort_by_str_column(columns::SOURCE_ID)?;
    table.write_csv(&opts.output_path)?;
    summary.n_rows = table.n_rows();

    an_note!(
        nbe,
        "wrote {} sources to `{}`",
        summary.n_rows,
        opts.output_path.display()
    );
    Ok(summary)
}
