// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Globally unique source identifiers.

A source is identified across the whole survey by the observation (task ID),
the frequency cube, the beam, its index within that beam's catalog, and its
J2000 position label, written as

```text
{taskid}_C{cube}_B{beam:02}_{index}_J{label}
```

for example `190915041_C2_B07_12_J102312+301245`. The beam is always zero
padded to two digits; the other numbers are not padded. Since per-beam
indices are unique within a beam catalog, the full identifier is unique
within a survey.

 */

use std::fmt;
use std::str::FromStr;

use crate::beams::Beam;
use crate::{Error, Result};

/// The parts of a source identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SourceId {
    pub taskid: String,
    pub cube: u32,
    pub beam: Beam,
    pub index: i64,
    pub label: String,
}

impl SourceId {
    pub fn new<T: Into<String>, L: Into<String>>(
        taskid: T,
        cube: u32,
        beam: Beam,
        index: i64,
        label: L,
    ) -> Self {
        SourceId {
            taskid: taskid.into(),
            cube,
            beam,
            index,
            label: label.into(),
        }
    }

    /// Try to parse everything after the task ID: `C{cube}_B{beam}_{index}_J{label}`.
    fn parse_tail(taskid: &str, tail: &str) -> Option<Self> {
        let mut pieces = tail.splitn(4, '_');
        let cube = pieces.next()?.strip_prefix('C')?.parse().ok()?;

        let beam_text = pieces.next()?.strip_prefix('B')?;
        if beam_text.len() != 2 {
            return None;
        }
        let beam = beam_text.parse().ok()?;

        let index = pieces.next()?.parse().ok()?;
        let label = pieces.next()?.strip_prefix('J')?;

        if label.is_empty() {
            return None;
        }

        Some(SourceId::new(taskid, cube, beam, index, label))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}_C{}_B{}_{}_J{}",
            self.taskid, self.cube, self.beam, self.index, self.label
        )
    }
}

impl FromStr for SourceId {
    type Err = Error;

    /// Parse an identifier back into its parts.
    ///
    /// The task ID is the shortest non-empty prefix after which the rest of
    /// the text has the expected shape, so task IDs may contain underscores.
    fn from_str(s: &str) -> Result<Self> {
        s.match_indices('_')
            .filter(|&(i, _)| i > 0)
            .find_map(|(i, _)| SourceId::parse_tail(&s[..i], &s[i + 1..]))
            .ok_or_else(|| Error::BadSourceId(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beam(n: i64) -> Beam {
        Beam::new(n).unwrap()
    }

    #[test]
    fn formatting() {
        let id = SourceId::new("190915041", 2, beam(7), 12, "102312+301245");
        assert_eq!(id.to_string(), "190915041_C2_B07_12_J102312+301245");

        let id = SourceId::new("200101001", 0, beam(31), 0, "000001-000001");
        assert_eq!(id.to_string(), "200101001_C0_B31_0_J000001-000001");
    }

    #[test]
    fn parse_round_trip() {
        let id = SourceId::new("190915041", 2, beam(7), 12, "102312+301245");
        let back: SourceId = id.to_string().parse().unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn taskid_with_underscores() {
        let id = SourceId::new("test_run_3", 1, beam(0), 4, "120000+450000");
        let text = id.to_string();
        assert_eq!(text, "test_run_3_C1_B00_4_J120000+450000");
        assert_eq!(text.parse::<SourceId>().unwrap(), id);
    }

    #[test]
    fn rejects_malformed() {
        for bad in &[
            "",
            "190915041",
            "_C2_B07_12_J1",
            "190915041_C2_B7_12_J1",
            "190915041_C2_B40_12_J1",
            "190915041_Cx_B07_12_J1",
            "190915041_C2_B07_twelve_J1",
            "190915041_C2_B07_12_J",
            "190915041_C2_B07_12_1",
        ] {
            assert!(bad.parse::<SourceId>().is_err(), "accepted {bad:?}");
        }
    }
}
