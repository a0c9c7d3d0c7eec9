// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Where the per-cube pipeline products live on disk.

Each frequency cube of an observation gets its own directory, `cube_<n>`,
under the pipeline's base directory. Inside it every compound beam has a
two-digit subdirectory holding the output of the spectral-extraction tool:

```text
<basedir>/cube_2/
    07/sharpOut/abs/radio_sdss_src_match.csv
    07/sharpOut/abs/mir_src_sharp.csv
    07/sharpOut/spec/12_J102312+301245.txt
    ...
```

 */

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use apersharp_core::{an_note, notify::NotificationBackend};

use crate::beams::Beam;
use crate::Result;

/// The paths of one cube's pipeline products.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CubeLayout {
    cube_dir: PathBuf,
}

impl CubeLayout {
    pub fn new<P: Into<PathBuf>>(cube_dir: P) -> Self {
        CubeLayout {
            cube_dir: cube_dir.into(),
        }
    }

    /// The layout of cube number *cube* under the pipeline base directory.
    pub fn for_cube<P: AsRef<Path>>(basedir: P, cube: u32) -> Self {
        Self::new(basedir.as_ref().join(format!("cube_{cube}")))
    }

    pub fn cube_dir(&self) -> &Path {
        &self.cube_dir
    }

    pub fn beam_dir(&self, beam: Beam) -> PathBuf {
        self.cube_dir.join(beam.to_string())
    }

    /// The path of a per-beam source catalog named *name*.
    pub fn catalog_path(&self, beam: Beam, name: &str) -> PathBuf {
        self.beam_dir(beam).join("sharpOut").join("abs").join(name)
    }

    fn spectrum_dir(&self, beam: Beam) -> PathBuf {
        self.beam_dir(beam).join("sharpOut").join("spec")
    }

    /// The path of the spectrum of source number *index* with position label
    /// *label* (the catalog's J2000 name, without the leading `J`).
    pub fn spectrum_path(&self, beam: Beam, index: i64, label: &str) -> PathBuf {
        self.spectrum_dir(beam).join(format!("{index}_J{label}.txt"))
    }

    /// The beams that have a directory in this cube, in order.
    ///
    /// Only directories whose names are exactly two digits naming a valid
    /// beam are considered. A missing cube directory yields an empty list.
    pub fn list_beams(&self) -> Result<Vec<Beam>> {
        let entries = match fs::read_dir(&self.cube_dir) {
            Ok(e) => e,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut beams = Vec::new();

        for entry in entries {
            let entry = entry?;

            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };

            if name.len() != 2 || !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            if let Ok(beam) = name.parse::<Beam>() {
                beams.push(beam);
            }
        }

        beams.sort();
        Ok(beams)
    }

    /// Create the cube directory and the directories of *beams*.
    ///
    /// Existing directories are left alone. Returns the directories that were
    /// actually created.
    pub fn prepare(
        &self,
        beams: &[Beam],
        nbe: &mut dyn NotificationBackend,
    ) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();

        if !self.cube_dir.is_dir() {
            fs::create_dir_all(&self.cube_dir)?;
            an_note!(nbe, "created cube directory `{}`", self.cube_dir.display());
            created.push(self.cube_dir.clone());
        }

        for &beam in beams {
            let dir = self.beam_dir(beam);

            if !dir.is_dir() {
                fs::create_dir(&dir)?;
                an_note!(nbe, "created directory for beam {}", beam);
                created.push(dir);
            }
        }

        Ok(created)
    }

    /// The spectrum files of one beam, sorted by name.
    pub fn list_spectra(&self, beam: Beam) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(self.spectrum_dir(beam)) {
            Ok(e) => e,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();

        for entry in entries {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |e| e == "txt") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apersharp_core::notify::{BufferingNotificationBackend, NotificationKind};

    fn b(n: i64) -> Beam {
        Beam::new(n).unwrap()
    }

    #[test]
    fn paths() {
        let layout = CubeLayout::for_cube("/data/190915041", 2);
        assert_eq!(layout.cube_dir(), Path::new("/data/190915041/cube_2"));
        assert_eq!(
            layout.catalog_path(b(7), "mir_src_sharp.csv"),
            Path::new("/data/190915041/cube_2/07/sharpOut/abs/mir_src_sharp.csv")
        );
        assert_eq!(
            layout.spectrum_path(b(17), 3, "100000+200000"),
            Path::new("/data/190915041/cube_2/17/sharpOut/spec/3_J100000+200000.txt")
        );
    }

    #[test]
    fn prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CubeLayout::for_cube(dir.path(), 0);
        let mut nbe = BufferingNotificationBackend::new();

        let created = layout.prepare(&[b(0), b(17)], &mut nbe).unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(nbe.count(NotificationKind::Note), 3);

        let created = layout.prepare(&[b(0), b(17), b(18)], &mut nbe).unwrap();
        assert_eq!(created, vec![layout.beam_dir(b(18))]);

        assert_eq!(layout.list_beams().unwrap(), vec![b(0), b(17), b(18)]);
    }

    #[test]
    fn list_beams_ignores_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CubeLayout::new(dir.path());

        for name in &["05", "12", "5", "123", "ab", "45"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("07"), b"not a directory").unwrap();

        assert_eq!(layout.list_beams().unwrap(), vec![b(5), b(12)]);

        let missing = CubeLayout::new(dir.path().join("nope"));
        assert!(missing.list_beams().unwrap().is_empty());
    }

    #[test]
    fn spectra_are_listed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CubeLayout::new(dir.path());
        assert!(layout.list_spectra(b(3)).unwrap().is_empty());

        let spec = dir.path().join("03").join("sharpOut").join("spec");
        fs::create_dir_all(&spec).unwrap();
        fs::write(spec.join("2_J000000+000000.txt"), b"").unwrap();
        fs::write(spec.join("1_J000000+000000.txt"), b"").unwrap();
        fs::write(spec.join("notes.log"), b"").unwrap();

        let names: Vec<_> = layout
            .list_spectra(b(3))
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["1_J000000+000000.txt", "2_J000000+000000.txt"]);
    }
}
