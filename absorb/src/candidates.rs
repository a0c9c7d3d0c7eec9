// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Scoring source spectra for HI absorption.

Every source in the master table has a spectrum extracted against it. The
scorer reduces each spectrum to a handful of statistics, most importantly the
most negative and most positive excursions in signal-to-noise units, and
flags as *candidates* the sources with a significant negative excursion and
no comparably significant positive one. A strong positive excursion next to
the dip usually means a calibration or continuum-subtraction artifact rather
than absorption.

Before computing signal-to-noise ratios, a constant baseline (by default the
median flux) is subtracted from the spectrum to remove residual continuum.
The ratios are then taken either against a single rms for the spectrum,
computed from the corrected flux, or channel by channel against the noise
column of the spectrum file.

 */

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use apersharp_core::{
    an_note, an_warning,
    io::backup_file,
    ndarray::{Array1, ArrayView1},
    notify::NotificationBackend,
    num::{nan_argmax, nan_argmin, nan_mean, nan_median, nan_std},
    Table,
};

use crate::{beams::Beam, columns, layout::CubeLayout, spectrum::SpectrumSeries, Error, Result};

pub const DEFAULT_NEGATIVE_SNR_THRESHOLD: f64 = -5.0;
pub const DEFAULT_POSITIVE_SNR_THRESHOLD: f64 = 5.0;

/// How the continuum level is estimated before it is subtracted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BaselineMode {
    /// Subtract the median flux. Robust to the excursions being looked for.
    #[default]
    Median,

    /// Subtract the mean flux.
    Mean,

    /// Leave the flux as it is.
    None,
}

impl fmt::Display for BaselineMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BaselineMode::Median => "median",
            BaselineMode::Mean => "mean",
            BaselineMode::None => "none",
        })
    }
}

impl FromStr for BaselineMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(BaselineMode::Median),
            "mean" => Ok(BaselineMode::Mean),
            "none" => Ok(BaselineMode::None),
            other => Err(format!(
                "unknown baseline mode \"{other}\"; expected median, mean or none"
            )),
        }
    }
}

/// Subtract the baseline estimated by *mode* from a flux series.
///
/// If no baseline can be estimated (all channels blank), the flux is returned
/// unchanged.
pub fn subtract_baseline(flux: ArrayView1<f64>, mode: BaselineMode) -> Array1<f64> {
    let baseline = match mode {
        BaselineMode::Median => nan_median(flux),
        BaselineMode::Mean => nan_mean(flux),
        BaselineMode::None => None,
    };

    match baseline {
        Some(b) => flux.mapv(|x| x - b),
        None => flux.to_owned(),
    }
}

/// Why a spectrum has no usable signal-to-noise ratios.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnrProblem {
    /// The noise column is zero in every channel.
    ZeroNoise,

    /// The rms of the corrected flux is zero or not finite.
    BadRms,

    /// Every channel's ratio is blank.
    NoValidChannels,
}

impl fmt::Display for SnrProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SnrProblem::ZeroNoise => "the noise column is zero in every channel",
            SnrProblem::BadRms => "the rms of the spectrum is not positive",
            SnrProblem::NoValidChannels => "no channel has a valid signal-to-noise ratio",
        })
    }
}

/// The statistics of one spectrum.
///
/// Flux statistics refer to the baseline-corrected flux. When
/// `snr_problem` is set, all the `max_*_snr*` fields are zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrumMetrics {
    pub mean_noise: f64,
    pub median_noise: f64,
    pub rms: f64,
    pub min_flux: f64,
    pub max_flux: f64,
    pub mean_flux: f64,
    pub median_flux: f64,
    pub max_negative_snr: f64,
    pub max_negative_snr_channel: usize,
    pub max_negative_snr_frequency: f64,
    pub max_positive_snr: f64,
    pub max_positive_snr_channel: usize,
    pub max_positive_snr_frequency: f64,
    pub snr_problem: Option<SnrProblem>,
}

impl SpectrumMetrics {
    /// Whether these metrics pass the dual-threshold candidate test.
    pub fn is_candidate(&self, negative_threshold: f64, positive_threshold: f64) -> bool {
        self.max_negative_snr <= negative_threshold && self.max_positive_snr <= positive_threshold
    }
}

fn signal_to_noise(
    corrected: &Array1<f64>,
    noise: ArrayView1<f64>,
    rms: f64,
    use_rms: bool,
) -> std::result::Result<Array1<f64>, SnrProblem> {
    let mut measured = noise.iter().filter(|x| !x.is_nan()).peekable();

    if measured.peek().is_some() && measured.all(|&x| x == 0.) {
        return Err(SnrProblem::ZeroNoise);
    }

    if use_rms {
        if !(rms.is_finite() && rms > 0.) {
            return Err(SnrProblem::BadRms);
        }

        return Ok(corrected / rms);
    }

    // Zero-noise channels are blanked rather than divided by.
    Ok(corrected
        .iter()
        .zip(noise.iter())
        .map(|(&f, &n)| if n == 0. { f64::NAN } else { f / n })
        .collect())
}

/// Compute the statistics of one spectrum.
pub fn analyse_spectrum(
    spectrum: &SpectrumSeries,
    baseline: BaselineMode,
    use_rms_normalization: bool,
) -> SpectrumMetrics {
    let nan = f64::NAN;
    let noise = spectrum.noise.view();
    let corrected = subtract_baseline(spectrum.flux.view(), baseline);
    let cview = corrected.view();

    let mut m = SpectrumMetrics {
        mean_noise: nan_mean(noise).unwrap_or(nan),
        median_noise: nan_median(noise).unwrap_or(nan),
        rms: nan_std(cview).unwrap_or(nan),
        min_flux: nan_argmin(cview).map_or(nan, |(_, x)| x),
        max_flux: nan_argmax(cview).map_or(nan, |(_, x)| x),
        mean_flux: nan_mean(cview).unwrap_or(nan),
        median_flux: nan_median(cview).unwrap_or(nan),
        ..SpectrumMetrics::default()
    };

    let extremes = signal_to_noise(&corrected, noise, m.rms, use_rms_normalization).and_then(
        |ratio| match (nan_argmin(ratio.view()), nan_argmax(ratio.view())) {
            (Some(lo), Some(hi)) => Ok((lo, hi)),
            _ => Err(SnrProblem::NoValidChannels),
        },
    );

    match extremes {
        Ok(((lo_chan, lo), (hi_chan, hi))) => {
            m.max_negative_snr = lo;
            m.max_negative_snr_channel = lo_chan;
            m.max_negative_snr_frequency = spectrum.frequency[lo_chan];
            m.max_positive_snr = hi;
            m.max_positive_snr_channel = hi_chan;
            m.max_positive_snr_frequency = spectrum.frequency[hi_chan];
        }

        Err(problem) => m.snr_problem = Some(problem),
    }

    m
}

/// Settings for [`score`].
#[derive(Clone, Debug)]
pub struct ScoreOptions {
    /// The master table, which is rewritten with the analysis columns.
    pub master_path: PathBuf,

    /// Where the candidate rows of the master table are written.
    pub candidates_path: PathBuf,

    /// The cube directory holding the spectra.
    pub cube_dir: PathBuf,

    pub baseline: BaselineMode,

    /// Compute signal-to-noise against the rms of the spectrum rather than
    /// its per-channel noise column.
    pub use_rms_normalization: bool,

    pub negative_snr_threshold: f64,
    pub positive_snr_threshold: f64,

    /// Copy an existing candidates file aside before replacing it.
    pub make_backup: bool,

    /// Added to a source's catalog index to get the number in its spectrum
    /// file name.
    pub spectrum_index_offset: i64,
}

impl ScoreOptions {
    pub fn new<P1, P2, P3>(master_path: P1, candidates_path: P2, cube_dir: P3) -> Self
    where
        P1: Into<PathBuf>,
        P2: Into<PathBuf>,
        P3: Into<PathBuf>,
    {
        ScoreOptions {
            master_path: master_path.into(),
            candidates_path: candidates_path.into(),
            cube_dir: cube_dir.into(),
            baseline: BaselineMode::default(),
            use_rms_normalization: true,
            negative_snr_threshold: DEFAULT_NEGATIVE_SNR_THRESHOLD,
            positive_snr_threshold: DEFAULT_POSITIVE_SNR_THRESHOLD,
            make_backup: true,
            spectrum_index_offset: 0,
        }
    }
}

/// Find, load and analyse the spectrum of one master-table row.
///
/// Returns `Ok(None)` if the source has to be skipped; the reason has then
/// been reported.
fn score_source(
    table: &Table,
    row: usize,
    layout: &CubeLayout,
    opts: &ScoreOptions,
    nbe: &mut dyn NotificationBackend,
) -> Result<Option<SpectrumMetrics>> {
    let src_id = table.str_value(row, columns::SOURCE_ID)?;

    let path = match spectrum_path_of(table, row, layout, opts) {
        Ok(p) => p,
        Err(e) => {
            an_warning!(nbe, "{}: cannot locate the spectrum; skipping", src_id; e);
            return Ok(None);
        }
    };

    if !path.is_file() {
        an_warning!(
            nbe,
            "{}: no spectrum at `{}`; skipping",
            src_id,
            path.display()
        );
        return Ok(None);
    }

    let spectrum = match SpectrumSeries::read(&path) {
        Ok(s) => s,
        Err(e) => {
            an_warning!(nbe, "{}: cannot read the spectrum; skipping", src_id; e);
            return Ok(None);
        }
    };

    if spectrum.n_channels() == 0 {
        an_warning!(nbe, "{}: the spectrum `{}` is empty; skipping", src_id, path.display());
        return Ok(None);
    }

    let metrics = analyse_spectrum(&spectrum, opts.baseline, opts.use_rms_normalization);

    if let Some(problem) = metrics.snr_problem {
        an_warning!(
            nbe,
            "{}: cannot compute the signal-to-noise ratio: {}",
            src_id,
            problem
        );
    }

    Ok(Some(metrics))
}

fn spectrum_path_of(
    table: &Table,
    row: usize,
    layout: &CubeLayout,
    opts: &ScoreOptions,
) -> Result<PathBuf> {
    let beam = Beam::new(table.int_value(row, columns::BEAM)?)?;
    let index = table.int_value(row, columns::BEAM_SOURCE_ID)? + opts.spectrum_index_offset;
    let label = table.str_value(row, columns::J2000)?;
    Ok(layout.spectrum_path(beam, index, &label))
}

fn add_analysis_columns(
    table: &mut Table,
    metrics: &[SpectrumMetrics],
    flags: Vec<i64>,
) -> Result<()> {
    let floats = |f: fn(&SpectrumMetrics) -> f64| metrics.iter().map(f).collect::<Vec<_>>();
    let ints = |f: fn(&SpectrumMetrics) -> usize| {
        metrics.iter().map(|m| f(m) as i64).collect::<Vec<_>>()
    };

    table.add_float_column(columns::MEAN_NOISE, floats(|m| m.mean_noise))?;
    table.add_float_column(columns::MEDIAN_NOISE, floats(|m| m.median_noise))?;
    table.add_float_column(columns::RMS, floats(|m| m.rms))?;
    table.add_float_column(columns::MIN_FLUX, floats(|m| m.min_flux))?;
    table.add_float_column(columns::MAX_FLUX, floats(|m| m.max_flux))?;
    table.add_float_column(columns::MEAN_FLUX, floats(|m| m.mean_flux))?;
    table.add_float_column(columns::MEDIAN_FLUX, floats(|m| m.median_flux))?;
    table.add_int_column(columns::CANDIDATE_SNR, flags)?;
    table.add_float_column(columns::MAX_NEGATIVE_SNR, floats(|m| m.max_negative_snr))?;
    table.add_int_column(
        columns::MAX_NEGATIVE_SNR_CHANNEL,
        ints(|m| m.max_negative_snr_channel),
    )?;
    table.add_float_column(
        columns::MAX_NEGATIVE_SNR_FREQUENCY,
        floats(|m| m.max_negative_snr_frequency),
    )?;
    table.add_float_column(columns::MAX_POSITIVE_SNR, floats(|m| m.max_positive_snr))?;
    table.add_int_column(
        columns::MAX_POSITIVE_SNR_CHANNEL,
        ints(|m| m.max_positive_snr_channel),
    )?;
    table.add_float_column(
        columns::MAX_POSITIVE_SNR_FREQUENCY,
        floats(|m| m.max_positive_snr_frequency),
    )?;
    Ok(())
}

/// Score the spectra of every source in the master table.
///
/// The master table is rewritten with the analysis columns and the candidate
/// rows are written to their own table. Returns the IDs of the candidates.
pub fn score(opts: &ScoreOptions, nbe: &mut dyn NotificationBackend) -> Result<Vec<String>> {
    if opts.make_backup && opts.candidates_path.is_file() {
        let dest = backup_file(&opts.candidates_path)?;
        an_note!(nbe, "saved the previous candidates table to `{}`", dest.display());
    }

    let mut table = match Table::read_csv_if_exists(&opts.master_path)? {
        Some(t) => t,
        None => return Err(Error::MissingInput(opts.master_path.clone())),
    };

    for &name in &[columns::SOURCE_ID, columns::BEAM, columns::BEAM_SOURCE_ID, columns::J2000] {
        if !table.has_column(name) {
            return Err(apersharp_core::Error::MissingColumn(name.to_owned()).into());
        }
    }

    let stale: Vec<&str> = columns::ANALYSIS_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect();

    if !stale.is_empty() {
        an_note!(nbe, "replacing the results of a previous scoring run");
        table.drop_columns(&stale)?;
    }

    if table.is_masked() {
        table.unmask();
    }

    let layout = CubeLayout::new(&opts.cube_dir);
    let n = table.n_rows();
    an_note!(nbe, "scoring the spectra of {} sources", n);

    let mut metrics = Vec::with_capacity(n);
    let mut candidates = Vec::new();
    let mut n_skipped = 0;

    for row in 0..n {
        match score_source(&table, row, &layout, opts, nbe)? {
            Some(m) => {
                if m.is_candidate(opts.negative_snr_threshold, opts.positive_snr_threshold) {
                    candidates.push(table.str_value(row, columns::SOURCE_ID)?.into_owned());
                }

                metrics.push(m);
            }

            None => {
                n_skipped += 1;
                metrics.push(SpectrumMetrics::default());
            }
        }
    }

    if n_skipped > 0 {
        an_warning!(nbe, "{} of {} sources were skipped", n_skipped, n);
    }

    let wanted: HashSet<&str> = candidates.iter().map(|s| s.as_str()).collect();
    let mut flags = Vec::with_capacity(n);
    let mut candidate_rows = Vec::new();

    for row in 0..n {
        let hit = wanted.contains(table.str_value(row, columns::SOURCE_ID)?.as_ref());
        flags.push(hit as i64);

        if hit {
            candidate_rows.push(row);
        }
    }

    add_analysis_columns(&mut table, &metrics, flags)?;

    table
        .select_rows(&candidate_rows)
        .write_csv(&opts.candidates_path)?;
    table.write_csv(&opts.master_path)?;

    if candidates.is_empty() {
        an_note!(nbe, "no absorption candidates found");
    } else {
        an_note!(
            nbe,
            "found {} absorption candidates: {}",
            candidates.len(),
            candidates.join(", ")
        );
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{aggregate, AggregateOptions, FALLBACK_CATALOG_NAME};
    use apersharp_core::notify::{BufferingNotificationBackend, NotificationKind};
    use std::fs;

    fn series(flux: &[f64], noise: &[f64]) -> SpectrumSeries {
        let freq: Vec<f64> = (0..flux.len()).map(|i| 1.4e9 + 1e5 * i as f64).collect();
        SpectrumSeries::new(
            Array1::from(freq),
            Array1::from(flux.to_vec()),
            Array1::from(noise.to_vec()),
        )
        .unwrap()
    }

    #[test]
    fn baseline_modes() {
        let flux = Array1::from(vec![1., 2., 3., 100., 3., 2., 1.]);
        assert_eq!(
            subtract_baseline(flux.view(), BaselineMode::Median).to_vec(),
            vec![-1., 0., 1., 98., 1., 0., -1.]
        );
        assert_eq!(
            subtract_baseline(flux.view(), BaselineMode::None).to_vec(),
            flux.to_vec()
        );

        let mean = subtract_baseline(flux.view(), BaselineMode::Mean);
        assert!(mean.sum().abs() < 1e-9);

        assert_eq!("Mean".parse::<BaselineMode>().unwrap(), BaselineMode::Mean);
        assert!("mode".parse::<BaselineMode>().is_err());
        assert_eq!(BaselineMode::default(), BaselineMode::Median);
    }

    #[test]
    fn corrected_flux_statistics() {
        let s = series(&[1., 2., 3., 100., 3., 2., 1.], &[1.; 7]);
        let m = analyse_spectrum(&s, BaselineMode::Median, false);

        assert_eq!(m.min_flux, -1.);
        assert_eq!(m.max_flux, 98.);
        assert_eq!(m.median_flux, 0.);
        assert!((m.mean_flux - 14.).abs() < 1e-12);
        assert_eq!(m.mean_noise, 1.);
        assert_eq!(m.median_noise, 1.);

        assert_eq!(m.max_negative_snr, -1.);
        assert_eq!(m.max_negative_snr_channel, 0);
        assert_eq!(m.max_negative_snr_frequency, 1.4e9);
        assert_eq!(m.max_positive_snr, 98.);
        assert_eq!(m.max_positive_snr_channel, 3);
        assert_eq!(m.max_positive_snr_frequency, 1.4e9 + 3e5);
        assert!(m.snr_problem.is_none());
    }

    #[test]
    fn rms_normalization() {
        let mut flux = vec![0.; 100];
        flux[50] = -1.;
        let s = series(&flux, &[0.; 100]);

        // The noise column is all zero, which disables the ratio in both modes.
        let m = analyse_spectrum(&s, BaselineMode::Median, true);
        assert_eq!(m.snr_problem, Some(SnrProblem::ZeroNoise));

        let s = series(&flux, &[0.5; 100]);
        let m = analyse_spectrum(&s, BaselineMode::Median, true);
        let expected_rms = (0.01f64 - 0.0001).sqrt();
        assert!((m.rms - expected_rms).abs() < 1e-12);
        assert!((m.max_negative_snr + 1. / expected_rms).abs() < 1e-9);
        assert_eq!(m.max_negative_snr_channel, 50);
        assert_eq!(m.max_positive_snr, 0.);
        assert_eq!(m.max_positive_snr_channel, 0);
        assert!(m.is_candidate(-5., 5.));
    }

    #[test]
    fn null_noise_guard() {
        let s = series(&[0.1, -0.5, 0.2, 0.0], &[0.; 4]);

        for &use_rms in &[false, true] {
            let m = analyse_spectrum(&s, BaselineMode::Median, use_rms);
            assert_eq!(m.snr_problem, Some(SnrProblem::ZeroNoise));
            assert_eq!(m.max_negative_snr, 0.);
            assert_eq!(m.max_positive_snr, 0.);
            assert_eq!(m.max_negative_snr_channel, 0);
            assert_eq!(m.max_positive_snr_channel, 0);
            assert_eq!(m.max_negative_snr_frequency, 0.);
            assert!(!m.is_candidate(-5., 5.));
        }

        // A flat spectrum has zero rms.
        let s = series(&[0.2; 4], &[0.1; 4]);
        let m = analyse_spectrum(&s, BaselineMode::Median, true);
        assert_eq!(m.snr_problem, Some(SnrProblem::BadRms));
    }

    #[test]
    fn zero_noise_channels_are_blanked() {
        let s = series(&[0., -1., 0., 0.5], &[0.1, 0., 0.1, 0.1]);
        let m = analyse_spectrum(&s, BaselineMode::None, false);
        assert!(m.snr_problem.is_none());
        assert_eq!(m.max_negative_snr, 0.);
        assert_eq!(m.max_positive_snr, 5.);
        assert_eq!(m.max_positive_snr_channel, 3);

        let s = series(&[f64::NAN; 3], &[0.1; 3]);
        let m = analyse_spectrum(&s, BaselineMode::Median, false);
        assert_eq!(m.snr_problem, Some(SnrProblem::NoValidChannels));
    }

    #[test]
    fn dual_threshold() {
        let m = |neg, pos| SpectrumMetrics {
            max_negative_snr: neg,
            max_positive_snr: pos,
            ..SpectrumMetrics::default()
        };

        assert!(m(-6., 3.).is_candidate(-5., 5.));
        assert!(!m(-6., 7.).is_candidate(-5., 5.));
        assert!(!m(-4., 0.).is_candidate(-5., 5.));
        assert!(!m(-4., 7.).is_candidate(-5., 5.));
        assert!(m(-5., 5.).is_candidate(-5., 5.));
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        cube_dir: PathBuf,
        master: PathBuf,
        candidates: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let cube_dir = dir.path().join("190915041").join("cube_1");
            let master = dir.path().join("master.csv");
            let candidates = dir.path().join("candidates.csv");

            let catalog = CubeLayout::new(&cube_dir)
                .catalog_path(Beam::new(0).unwrap(), FALLBACK_CATALOG_NAME);
            fs::create_dir_all(catalog.parent().unwrap()).unwrap();
            fs::write(
                &catalog,
                "ID,J2000,ra,dec,FFLAG\n\
                 1,100000+200000,10:00:00,+20:00:00,0\n\
                 2,100100+200100,10:01:00,+20:01:00,0\n\
                 3,100200+200200,10:02:00,+20:02:00,0\n\
                 4,100300+200300,10:03:00,+20:03:00,\n",
            )
            .unwrap();

            let mut nbe = BufferingNotificationBackend::new();
            aggregate(&AggregateOptions::new(&master, &cube_dir), &mut nbe).unwrap();

            let fx = Fixture {
                _dir: dir,
                cube_dir,
                master,
                candidates,
            };

            // An absorption dip; a dip next to a strong spike; nothing for
            // source 3; and a spectrum without noise information.
            fx.spectrum(1, "100000+200000", &[0., 0., -0.8, 0., 0.], 0.1);
            fx.spectrum(2, "100100+200100", &[0., 0.9, -0.8, 0., 0.], 0.1);
            fx.spectrum(4, "100300+200300", &[0., 0., -0.8, 0., 0.], 0.);
            fx
        }

        fn spectrum(&self, index: i64, label: &str, flux: &[f64], noise: f64) {
            let path = CubeLayout::new(&self.cube_dir).spectrum_path(
                Beam::new(0).unwrap(),
                index,
                label,
            );
            fs::create_dir_all(path.parent().unwrap()).unwrap();

            let mut text = "\"Frequency [Hz]\" \"Flux [Jy]\" \"Noise [Jy]\"\n".to_owned();
            for (i, f) in flux.iter().enumerate() {
                text.push_str(&format!("{} {} {}\n", 1.4e9 + 1e5 * i as f64, f, noise));
            }
            fs::write(path, text).unwrap();
        }

        fn opts(&self) -> ScoreOptions {
            let mut opts = ScoreOptions::new(&self.master, &self.candidates, &self.cube_dir);
            opts.use_rms_normalization = false;
            opts
        }
    }

    #[test]
    fn scoring_pipeline() {
        let fx = Fixture::new();
        let mut nbe = BufferingNotificationBackend::new();
        let found = score(&fx.opts(), &mut nbe).unwrap();

        assert_eq!(found, vec!["190915041_C1_B00_1_J100000+200000"]);

        // Missing spectrum, zero noise, and the skip summary.
        assert_eq!(nbe.count(NotificationKind::Warning), 3);

        let t = Table::read_csv(&fx.master).unwrap();
        assert_eq!(t.n_rows(), 4);
        let flags: Vec<i64> = (0..4)
            .map(|r| t.int_value(r, columns::CANDIDATE_SNR).unwrap())
            .collect();
        assert_eq!(flags, vec![1, 0, 0, 0]);

        assert!((t.float_value(0, columns::MAX_NEGATIVE_SNR).unwrap() + 8.).abs() < 1e-9);
        assert_eq!(t.int_value(0, columns::MAX_NEGATIVE_SNR_CHANNEL).unwrap(), 2);
        assert!((t.float_value(1, columns::MAX_POSITIVE_SNR).unwrap() - 9.).abs() < 1e-9);
        assert_eq!(t.float_value(2, columns::MAX_NEGATIVE_SNR).unwrap(), 0.);
        assert_eq!(t.float_value(3, columns::MAX_NEGATIVE_SNR).unwrap(), 0.);
        assert_eq!(t.int_value(3, columns::MAX_NEGATIVE_SNR_CHANNEL).unwrap(), 0);

        let names = t.column_names();
        assert_eq!(
            &names[names.len() - columns::ANALYSIS_COLUMNS.len()..],
            columns::ANALYSIS_COLUMNS
        );

        let c = Table::read_csv(&fx.candidates).unwrap();
        assert_eq!(c.n_rows(), 1);
        assert_eq!(c.int_value(0, columns::BEAM_SOURCE_ID).unwrap(), 1);
    }

    #[test]
    fn unreadable_spectrum_is_skipped() {
        let fx = Fixture::new();
        let path = CubeLayout::new(&fx.cube_dir).spectrum_path(
            Beam::new(0).unwrap(),
            3,
            "100200+200200",
        );
        fs::write(&path, "Frequency [Hz] Flux [Jy] Noise [Jy]\n1.4e9 x 0.1\n").unwrap();

        let mut nbe = BufferingNotificationBackend::new();
        let found = score(&fx.opts(), &mut nbe).unwrap();
        assert_eq!(found, vec!["190915041_C1_B00_1_J100000+200000"]);

        let expected = "190915041_C1_B00_3_J100200+200200: cannot read the spectrum; skipping";
        assert!(nbe
            .messages(NotificationKind::Warning)
            .any(|m| m == expected));

        let causes: Vec<_> = nbe.causes(NotificationKind::Warning).collect();
        assert_eq!(causes.len(), 1);
        assert!(causes[0].contains("cannot parse \"x\""), "{}", causes[0]);
        assert!(causes[0].contains("line 2"), "{}", causes[0]);

        let t = Table::read_csv(&fx.master).unwrap();
        for &col in columns::ANALYSIS_COLUMNS {
            assert_eq!(t.float_value(2, col).unwrap(), 0., "column {col}");
        }
    }

    #[test]
    fn rescoring_is_byte_identical() {
        let fx = Fixture::new();
        let mut nbe = BufferingNotificationBackend::new();

        score(&fx.opts(), &mut nbe).unwrap();
        let master1 = fs::read(&fx.master).unwrap();
        let cands1 = fs::read(&fx.candidates).unwrap();

        score(&fx.opts(), &mut nbe).unwrap();
        assert_eq!(fs::read(&fx.master).unwrap(), master1);
        assert_eq!(fs::read(&fx.candidates).unwrap(), cands1);

        let backups = fs::read_dir(fx.candidates.with_file_name("candidates_backup"))
            .unwrap()
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn thresholds_and_offsets_are_honored() {
        let fx = Fixture::new();
        let mut nbe = BufferingNotificationBackend::new();

        let mut opts = fx.opts();
        opts.positive_snr_threshold = 10.;
        let found = score(&opts, &mut nbe).unwrap();
        assert_eq!(found.len(), 2);

        // With the wrong index offset no spectrum is found at all.
        let mut opts = fx.opts();
        opts.spectrum_index_offset = 10;
        let found = score(&opts, &mut nbe).unwrap();
        assert!(found.is_empty());
        assert!(nbe
            .messages(NotificationKind::Note)
            .any(|m| m == "no absorption candidates found"));
    }

    #[test]
    fn missing_master_table() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScoreOptions::new(
            dir.path().join("master.csv"),
            dir.path().join("candidates.csv"),
            dir.path(),
        );
        let mut nbe = BufferingNotificationBackend::new();

        match score(&opts, &mut nbe) {
            Err(Error::MissingInput(p)) => assert_eq!(p, opts.master_path),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
