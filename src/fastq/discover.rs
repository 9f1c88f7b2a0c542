use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// Glob for read files below `fastq_dir`
///
/// An absolute pattern replaces the directory, like joining paths usually does. Matches are
/// returned sorted and only regular files are kept.
pub fn discover(fastq_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = fastq_dir.join(pattern);
    let full_pattern = full_pattern.to_string_lossy();
    info!("Searching for read files matching {}", full_pattern);

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(Error::NoFilesFound(full_pattern.into_owned()));
    }

    files.sort();
    info!("Found {} read files", files.len());
    Ok(files)
}
