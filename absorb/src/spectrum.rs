// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Reading the per-source spectra written by the extraction tool.

A spectrum file is a whitespace-delimited ASCII table with one row per
channel and (at least) the columns `Frequency [Hz]`, `Flux [Jy]` and
`Noise [Jy]`. Different versions of the extraction tool have written the
header in different ways, all of which are accepted here:

```text
"Frequency [Hz]" "Flux [Jy]" "Noise [Jy]"
Frequency [Hz] Flux [Jy] Noise [Jy]
# Frequency [Hz] Flux [Jy] Noise [Jy]
| Frequency [Hz] | Flux [Jy] | Noise [Jy] |
```

The last form is a fixed-width table whose data rows are also delimited by
`|`. Blanked channels may be written as `nan` or `--`, and read as NaN.

 */

use ndarray::Array1;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const FREQUENCY_COLUMN: &str = "Frequency [Hz]";
pub const FLUX_COLUMN: &str = "Flux [Jy]";
pub const NOISE_COLUMN: &str = "Noise [Jy]";

/// The spectrum of one source: parallel per-channel series.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumSeries {
    /// Channel frequencies, in Hz.
    pub frequency: Array1<f64>,

    /// Flux density, in Jy.
    pub flux: Array1<f64>,

    /// Noise estimate, in Jy.
    pub noise: Array1<f64>,
}

impl SpectrumSeries {
    /// Build a spectrum from its three series, which must have equal lengths.
    pub fn new(frequency: Array1<f64>, flux: Array1<f64>, noise: Array1<f64>) -> Result<Self> {
        let n = frequency.len();

        if flux.len() != n || noise.len() != n {
            return Err(Error::Core(apersharp_core::Error::LengthMismatch {
                expected: n,
                actual: if flux.len() != n { flux.len() } else { noise.len() },
            }));
        }

        Ok(SpectrumSeries {
            frequency,
            flux,
            noise,
        })
    }

    pub fn n_channels(&self) -> usize {
        self.frequency.len()
    }

    /// Read a spectrum file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_text(&text, path)
    }

    /// Parse the text of a spectrum file; *origin* is used in error messages.
    pub fn from_text<P: AsRef<Path>>(text: &str, origin: P) -> Result<Self> {
        let bad = |reason: String| Error::BadSpectrum {
            path: PathBuf::from(origin.as_ref()),
            reason,
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        // The header is the first non-blank line. Other comment lines are
        // skipped wherever they appear.
        let (header_lineno, header) = lines
            .next()
            .ok_or_else(|| bad("the file is empty".to_owned()))?;
        let header = header.trim_start_matches('#').trim();
        let fixed_width = header.starts_with('|');

        let names = if fixed_width {
            split_fixed_width(header)
                .into_iter()
                .map(|s| s.to_owned())
                .collect()
        } else {
            split_header(header)
        };

        let find = |wanted: &str| {
            names.iter().position(|n| n == wanted).ok_or_else(|| {
                bad(format!(
                    "no column \"{wanted}\" in header on line {header_lineno}"
                ))
            })
        };

        let i_freq = find(FREQUENCY_COLUMN)?;
        let i_flux = find(FLUX_COLUMN)?;
        let i_noise = find(NOISE_COLUMN)?;

        let mut frequency = Vec::new();
        let mut flux = Vec::new();
        let mut noise = Vec::new();

        for (lineno, line) in lines {
            if line.starts_with('#') {
                continue;
            }

            // Fixed-width tables may carry a separator rule under the header.
            if fixed_width && line.chars().all(|c| c == '|' || c == '-' || c == ' ') {
                continue;
            }

            let cells: Vec<&str> = if fixed_width {
                split_fixed_width(line)
            } else {
                line.split_whitespace().collect()
            };

            if cells.len() != names.len() {
                return Err(bad(format!(
                    "expected {} columns on line {} but found {}",
                    names.len(),
                    lineno,
                    cells.len()
                )));
            }

            let value = |i: usize| {
                parse_cell(cells[i]).ok_or_else(|| {
                    bad(format!(
                        "cannot parse \"{}\" as a number on line {}",
                        cells[i], lineno
                    ))
                })
            };

            frequency.push(value(i_freq)?);
            flux.push(value(i_flux)?);
            noise.push(value(i_noise)?);
        }

        Self::new(
            Array1::from(frequency),
            Array1::from(flux),
            Array1::from(noise),
        )
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    match cell {
        "" | "--" => Some(f64::NAN),
        _ => cell.parse().ok(),
    }
}

/// Split a `|`-delimited row, dropping the empty fields outside the outer
/// delimiters.
fn split_fixed_width(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim).collect()
}

/// Split a whitespace-delimited header into column names.
///
/// Quoted names are taken verbatim. A bare bracketed unit (`[Hz]`) is glued
/// onto the name before it, so `Frequency [Hz]` is one column.
fn split_header(header: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut chars = header.chars().peekable();
    let mut in_unit = false;

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let name: String = chars.by_ref().take_while(|&c| c != '"').collect();
            names.push(name);
            continue;
        }

        let mut token = String::new();

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() && !in_unit {
                break;
            }

            match c {
                '[' => in_unit = true,
                ']' => in_unit = false,
                _ => {}
            }

            token.push(c);
            chars.next();
        }

        match names.last_mut() {
            Some(prev) if token.starts_with('[') => {
                prev.push(' ');
                prev.push_str(&token);
            }
            _ => names.push(token),
        }
    }

    names
}
