// Copyright 2017-2024 Peter Williams
// Licensed under the MIT License.

/*!

Basic I/O helpers.

The pipeline stages follow a "read the whole file, transform in memory,
overwrite the whole file" discipline. The only durability safeguard is a
timestamped copy of the old file taken before it is overwritten, which is
what [`backup_file`] provides.

 */

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// The `strftime` format of the timestamps in backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Copy *path* into its sibling backup directory, stamped with the current
/// local time.
///
/// A file `dir/master.csv` is copied to
/// `dir/master_backup/master_20190915_120000.csv`. The backup directory is
/// created if needed. Returns the path of the copy.
pub fn backup_file<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let stamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
    backup_file_with_stamp(path, &stamp)
}

/// Like [`backup_file`], but with an explicit timestamp string.
///
/// If a backup with the same stamp already exists (two backups within the
/// same second), a counter is appended rather than overwriting it.
pub fn backup_file_with_stamp<P: AsRef<Path>>(path: P, stamp: &str) -> Result<PathBuf> {
    let path = path.as_ref();

    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s,
        None => return Err(Error::BadBackupSource(path.to_owned())),
    };

    if !path.is_file() {
        return Err(Error::BadBackupSource(path.to_owned()));
    }

    let ext = path.extension().and_then(|s| s.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let backup_dir = parent.join(format!("{stem}_backup"));
    fs::create_dir_all(&backup_dir)?;

    let make_name = |suffix: &str| match ext {
        Some(e) => format!("{stem}_{stamp}{suffix}.{e}"),
        None => format!("{stem}_{stamp}{suffix}"),
    };

    let mut dest = backup_dir.join(make_name(""));
    let mut n = 1;

    while dest.exists() {
        dest = backup_dir.join(make_name(&format!("_{n}")));
        n += 1;
    }

    fs::copy(path, &dest)?;
    Ok(dest)
}

/// Open a file for reading, mapping "not found" to `Ok(None)`.
pub fn open_if_exists<P: AsRef<Path>>(path: P) -> io::Result<Option<fs::File>> {
    match fs::File::open(path) {
        Ok(f) => Ok(Some(f)),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
