// Copyright 2017-2024 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! The main apersharp driver command

This provides command-line access to each stage of the cross-beam absorption
pipeline, and to the whole chain at once. The heavy lifting all happens in
the `apersharp_absorb` crate; this file only turns arguments into option
structures and reports the outcome.

*/

use anyhow::{anyhow, Context, Result};
use apersharp_absorb::{
    candidates::{self, BaselineMode, ScoreOptions},
    catalog::{self, AggregateOptions},
    crossmatch::{self, DEFAULT_MAX_SEPARATION_ARCSEC},
    layout::CubeLayout,
    Beam, BeamAdjacency, SourceId,
};
use apersharp_core::{
    an_note,
    notify::{ClapNotificationArgsExt, NotificationBackend},
};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("missing required argument {0}")]
pub struct MissingArgumentError(&'static str);

fn main() {
    let matches = make_app().get_matches();

    process::exit(apersharp_core::notify::run_with_notifications(
        matches,
        |matches, nbe| -> Result<i32> {
            match matches.subcommand() {
                Some(("prepare", m)) => do_prepare(m, nbe),
                Some(("aggregate", m)) => do_aggregate(m, nbe),
                Some(("match", m)) => do_match(m, nbe),
                Some(("score", m)) => do_score(m, nbe),
                Some(("run", m)) => do_run(m, nbe),
                Some(("neighbors", m)) => do_neighbors(m, nbe),
                Some(("parse-id", m)) => do_parse_id(m, nbe),
                _ => {
                    make_app().print_long_help()?;
                    Ok(0)
                }
            }
        },
    ));
}

fn cube_dir_arg() -> Arg {
    Arg::new("CUBE-DIR")
        .help("The cube directory containing the beam subdirectories")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn beam_arg() -> Arg {
    Arg::new("beam")
        .long("beam")
        .short('b')
        .value_name("N")
        .help("Process only this beam (may be repeated)")
        .action(ArgAction::Append)
}

fn aggregate_args(cmd: Command) -> Command {
    cmd.arg(beam_arg())
        .arg(
            Arg::new("taskid")
                .long("taskid")
                .value_name("ID")
                .help("The task ID [default: name of the directory above CUBE-DIR]"),
        )
        .arg(
            Arg::new("cube_nr")
                .long("cube-nr")
                .value_name("N")
                .help("The cube number [default: from the name of CUBE-DIR]")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("primary_name")
                .long("catalog")
                .value_name("NAME")
                .help("The file name of the per-beam catalog")
                .default_value(catalog::PRIMARY_CATALOG_NAME),
        )
        .arg(
            Arg::new("fallback_name")
                .long("fallback-catalog")
                .value_name("NAME")
                .help("The file name of the catalog to use when the main one is missing")
                .default_value(catalog::FALLBACK_CATALOG_NAME),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Replace an existing master table instead of merging into it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("allow_duplicates")
                .long("allow-duplicates")
                .help("Append to an existing master table without replacing old rows")
                .action(ArgAction::SetTrue),
        )
}

fn match_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("max_sep")
            .long("max-sep")
            .value_name("ARCSEC")
            .help("The matching radius in arcseconds")
            .value_parser(value_parser!(f64))
            .default_value("3.0"),
    )
}

fn score_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("baseline")
            .long("baseline")
            .value_name("MODE")
            .help("How to estimate the continuum level that is subtracted")
            .value_parser(["median", "mean", "none"])
            .default_value("median"),
    )
    .arg(
        Arg::new("per_channel_noise")
            .long("per-channel-noise")
            .help("Use the noise column of each spectrum instead of its rms")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("negative_threshold")
            .long("negative-threshold")
            .value_name("SNR")
            .help("A candidate's most negative SNR must be at or below this")
            .value_parser(value_parser!(f64))
            .allow_negative_numbers(true)
            .default_value("-5.0"),
    )
    .arg(
        Arg::new("positive_threshold")
            .long("positive-threshold")
            .value_name("SNR")
            .help("A candidate's most positive SNR must be at or below this")
            .value_parser(value_parser!(f64))
            .allow_negative_numbers(true)
            .default_value("5.0"),
    )
    .arg(
        Arg::new("index_offset")
            .long("index-offset")
            .value_name("N")
            .help("Added to the catalog index of a source to get its spectrum file number")
            .value_parser(value_parser!(i64))
            .allow_negative_numbers(true)
            .default_value("0"),
    )
}

fn no_backup_arg() -> Arg {
    Arg::new("no_backup")
        .long("no-backup")
        .help("Do not keep a timestamped copy of files that are replaced")
        .action(ArgAction::SetTrue)
}

fn make_app() -> Command {
    Command::new("apersharp")
        .version(crate_version!())
        .about("Cross-beam source reconciliation and HI absorption candidate search")
        .apersharp_notify_args()
        .subcommand(
            Command::new("prepare")
                .about("Create the directory structure for one cube")
                .arg(
                    Arg::new("BASEDIR")
                        .help("The base directory of the observation")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("CUBE")
                        .help("The cube number")
                        .value_parser(value_parser!(u32))
                        .required(true),
                )
                .arg(beam_arg()),
        )
        .subcommand(aggregate_args(
            Command::new("aggregate")
                .about("Collect the per-beam source catalogs into a master table")
                .arg(cube_dir_arg())
                .arg(
                    Arg::new("OUTPUT")
                        .help("The path of the master table")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(no_backup_arg()),
        ))
        .subcommand(match_args(
            Command::new("match")
                .about("Find sources detected in more than one beam")
                .arg(
                    Arg::new("MASTER")
                        .help("The path of the master table, which is updated in place")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        ))
        .subcommand(score_args(
            Command::new("score")
                .about("Score the source spectra and select absorption candidates")
                .arg(
                    Arg::new("MASTER")
                        .help("The path of the master table, which is updated in place")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("CANDIDATES")
                        .help("The path of the candidates table to write")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(cube_dir_arg())
                .arg(no_backup_arg()),
        ))
        .subcommand(score_args(match_args(aggregate_args(
            Command::new("run")
                .about("Aggregate, match and score one cube")
                .arg(cube_dir_arg())
                .arg(
                    Arg::new("master")
                        .long("master")
                        .value_name("PATH")
                        .help("The master table [default: CUBE-DIR/all_sources.csv]")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("candidates")
                        .long("candidates")
                        .value_name("PATH")
                        .help("The candidates table [default: CUBE-DIR/candidates.csv]")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(no_backup_arg()),
        ))))
        .subcommand(
            Command::new("neighbors")
                .about("List the beams overlapping a beam")
                .arg(Arg::new("BEAM").help("The beam number").required(true)),
        )
        .subcommand(
            Command::new("parse-id")
                .about("Show the parts of a source identifier")
                .arg(Arg::new("ID").help("The source identifier").required(true)),
        )
}

fn path_arg<'a>(matches: &'a ArgMatches, name: &'static str) -> Result<&'a Path> {
    Ok(matches
        .get_one::<PathBuf>(name)
        .ok_or(MissingArgumentError(name))?
        .as_path())
}

fn beams_arg(matches: &ArgMatches) -> Result<Option<Vec<Beam>>> {
    match matches.get_many::<String>("beam") {
        None => Ok(None),
        Some(vals) => vals
            .map(|v| v.parse::<Beam>().with_context(|| format!("bad --beam value \"{v}\"")))
            .collect::<Result<Vec<_>>>()
            .map(Some),
    }
}

fn aggregate_options(
    matches: &ArgMatches,
    cube_dir: &Path,
    output: &Path,
) -> Result<AggregateOptions> {
    let mut opts = AggregateOptions::new(output, cube_dir);
    opts.taskid = matches.get_one::<String>("taskid").cloned();
    opts.cube_nr = matches.get_one::<u32>("cube_nr").copied();
    opts.beams = beams_arg(matches)?;

    if let Some(n) = matches.get_one::<String>("primary_name") {
        opts.primary_catalog_name = n.clone();
    }

    if let Some(n) = matches.get_one::<String>("fallback_name") {
        opts.fallback_catalog_name = n.clone();
    }

    opts.overwrite = matches.get_flag("overwrite");
    opts.allow_duplicates = matches.get_flag("allow_duplicates");
    opts.make_backup = !matches.get_flag("no_backup");
    Ok(opts)
}

fn score_options(
    matches: &ArgMatches,
    master: &Path,
    candidates: &Path,
    cube_dir: &Path,
) -> Result<ScoreOptions> {
    let mut opts = ScoreOptions::new(master, candidates, cube_dir);

    if let Some(b) = matches.get_one::<String>("baseline") {
        opts.baseline = b.parse::<BaselineMode>().map_err(|e| anyhow!(e))?;
    }

    opts.use_rms_normalization = !matches.get_flag("per_channel_noise");

    if let Some(&t) = matches.get_one::<f64>("negative_threshold") {
        opts.negative_snr_threshold = t;
    }

    if let Some(&t) = matches.get_one::<f64>("positive_threshold") {
        opts.positive_snr_threshold = t;
    }

    if let Some(&o) = matches.get_one::<i64>("index_offset") {
        opts.spectrum_index_offset = o;
    }

    opts.make_backup = !matches.get_flag("no_backup");
    Ok(opts)
}

fn max_sep_arg(matches: &ArgMatches) -> f64 {
    matches
        .get_one::<f64>("max_sep")
        .copied()
        .unwrap_or(DEFAULT_MAX_SEPARATION_ARCSEC)
}

fn do_prepare(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let basedir = path_arg(matches, "BASEDIR")?;
    let cube = matches
        .get_one::<u32>("CUBE")
        .copied()
        .ok_or(MissingArgumentError("CUBE"))?;
    let beams = beams_arg(matches)?.unwrap_or_else(|| Beam::all().collect());

    let layout = CubeLayout::for_cube(basedir, cube);
    let created = layout
        .prepare(&beams, nbe)
        .with_context(|| format!("failed to create directories in `{}`", basedir.display()))?;

    for &beam in &beams {
        let n_spectra = layout.list_spectra(beam)?.len();

        if n_spectra > 0 {
            an_note!(nbe, "beam {} already holds {} spectra", beam, n_spectra);
        }
    }

    an_note!(
        nbe,
        "cube directory `{}` is ready ({} directories created)",
        layout.cube_dir().display(),
        created.len()
    );
    Ok(0)
}

fn do_aggregate(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let cube_dir = path_arg(matches, "CUBE-DIR")?;
    let output = path_arg(matches, "OUTPUT")?;
    let opts = aggregate_options(matches, cube_dir, output)?;

    let summary = catalog::aggregate(&opts, nbe)
        .with_context(|| format!("failed to aggregate the catalogs of `{}`", cube_dir.display()))?;

    if !summary.beams_skipped.is_empty() {
        let skipped: Vec<String> = summary.beams_skipped.iter().map(|b| b.to_string()).collect();
        an_note!(nbe, "beams without a catalog: {}", skipped.join(" "));
    }

    Ok(0)
}

fn do_match(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let master = path_arg(matches, "MASTER")?;

    crossmatch::cross_match(master, max_sep_arg(matches), &BeamAdjacency::apertif(), nbe)
        .with_context(|| format!("failed to cross-match the sources in `{}`", master.display()))?;
    Ok(0)
}

fn do_score(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let master = path_arg(matches, "MASTER")?;
    let cands = path_arg(matches, "CANDIDATES")?;
    let cube_dir = path_arg(matches, "CUBE-DIR")?;
    let opts = score_options(matches, master, cands, cube_dir)?;

    candidates::score(&opts, nbe)
        .with_context(|| format!("failed to score the sources in `{}`", master.display()))?;
    Ok(0)
}

fn do_run(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let cube_dir = path_arg(matches, "CUBE-DIR")?;
    let master = matches
        .get_one::<PathBuf>("master")
        .cloned()
        .unwrap_or_else(|| cube_dir.join("all_sources.csv"));
    let cands = matches
        .get_one::<PathBuf>("candidates")
        .cloned()
        .unwrap_or_else(|| cube_dir.join("candidates.csv"));

    let opts = aggregate_options(matches, cube_dir, &master)?;
    catalog::aggregate(&opts, nbe)
        .with_context(|| format!("failed to aggregate the catalogs of `{}`", cube_dir.display()))?;

    crossmatch::cross_match(&master, max_sep_arg(matches), &BeamAdjacency::apertif(), nbe)
        .with_context(|| format!("failed to cross-match the sources in `{}`", master.display()))?;

    let opts = score_options(matches, &master, &cands, cube_dir)?;
    let found = candidates::score(&opts, nbe)
        .with_context(|| format!("failed to score the sources in `{}`", master.display()))?;

    an_note!(
        nbe,
        "cube `{}` done: {} absorption candidates in `{}`",
        cube_dir.display(),
        found.len(),
        cands.display()
    );
    Ok(0)
}

fn do_neighbors(matches: &ArgMatches, _nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let text = matches
        .get_one::<String>("BEAM")
        .ok_or(MissingArgumentError("BEAM"))?;
    let beam: Beam = text.parse()?;
    let neighbors = BeamAdjacency::apertif().neighbors(beam)?;

    let names: Vec<String> = neighbors.iter().map(|b| b.to_string()).collect();
    println!("{}: {}", beam, names.join(" "));
    Ok(0)
}

fn do_parse_id(matches: &ArgMatches, _nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let text = matches
        .get_one::<String>("ID")
        .ok_or(MissingArgumentError("ID"))?;
    let id: SourceId = text.parse()?;

    println!("taskid: {}", id.taskid);
    println!("cube:   {}", id.cube);
    println!("beam:   {}", id.beam);
    println!("index:  {}", id.index);
    println!("label:  J{}", id.label);
    Ok(0)
}
