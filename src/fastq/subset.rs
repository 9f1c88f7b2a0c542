use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

use crate::error::Result;

pub const DEFAULT_TEST_SIZE: usize = 10000;

/// Copy the first `n_lines` lines of each gzipped read file into `out_dir`
///
/// Output files are named `<stem>_test.fastq.gz`, where the stem is the file name before its
/// first `.`. Returns the written paths in input order.
pub fn create_test_set(files: &[PathBuf], out_dir: &Path, n_lines: usize) -> Result<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::new();
    for file in files {
        let stem = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = stem.split('.').next().unwrap_or_default();
        let out_path = out_dir.join(format!("{stem}_test.fastq.gz"));
        info!("Writing {} lines of {} to {}", n_lines, file.display(), out_path.display());

        let reader = BufReader::new(MultiGzDecoder::new(File::open(file)?));
        let mut writer = GzEncoder::new(File::create(&out_path)?, Compression::default());
        for line in reader.lines().take(n_lines) {
            writeln!(writer, "{}", line?)?;
        }
        writer.finish()?;

        written.push(out_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn write_gz(path: &Path, content: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn read_gz(path: &Path) -> String {
        let mut out = String::new();
        GzDecoder::new(File::open(path).unwrap()).read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn truncates_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a_T1_1_R1.fastq.gz");
        write_gz(&input, "@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nIIII\n");
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let written = create_test_set(&[input], &out_dir, 4).unwrap();

        assert_eq!(written, vec![out_dir.join("a_T1_1_R1_test.fastq.gz")]);
        assert_eq!(read_gz(&written[0]), "@r1\nACGT\n+\nIIII\n");
    }

    #[test]
    fn short_files_are_copied_whole() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a_T1_1_R2.fastq.gz");
        write_gz(&input, "@r1\nACGT\n+\nIIII\n");

        let written = create_test_set(&[input], dir.path(), DEFAULT_TEST_SIZE).unwrap();

        assert_eq!(read_gz(&written[0]), "@r1\nACGT\n+\nIIII\n");
    }
}
