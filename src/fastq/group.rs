use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::fastq::read::ReadDirection;

/// Positions of metadata tokens in a read file name
///
/// A file called `MDA_D12_2_R1.fastq.gz` splits into `MDA`, `D12`, `2`, `R1` with the default
/// layout. Only the part of the file name before the first `.` is split.
#[derive(Clone, Debug)]
pub struct FilenameLayout {
    pub delimiter: String,
    pub job_index: usize,
    pub timepoint_index: usize,
    pub replicate_index: usize,
    pub read_index: usize,
}

impl Default for FilenameLayout {
    fn default() -> Self {
        FilenameLayout {
            delimiter: "_".to_string(),
            job_index: 0,
            timepoint_index: 1,
            replicate_index: 2,
            read_index: 3,
        }
    }
}

/// Grouping key: one `ctg count` job is run per key
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub timepoint: String,
    pub replicate: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.timepoint, self.replicate)
    }
}

/// Forward and reverse read files of one group, sorted so that `r1[i]` pairs with `r2[i]`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadPairs {
    pub r1: Vec<PathBuf>,
    pub r2: Vec<PathBuf>,
}

/// Metadata tokens pulled out of a single file name
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedName {
    pub job: String,
    pub key: GroupKey,
    pub direction: ReadDirection,
}

impl ParsedName {
    pub fn parse(path: &Path, layout: &FilenameLayout) -> Result<ParsedName> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name.split('.').next().unwrap_or_default();
        let tokens: Vec<&str> = stem.split(layout.delimiter.as_str()).collect();

        let token = |index: usize| -> Result<String> {
            tokens
                .get(index)
                .map(|t| t.to_string())
                .ok_or_else(|| Error::InvalidFilename {
                    name: file_name.clone(),
                    index,
                    delimiter: layout.delimiter.clone(),
                })
        };

        let key = GroupKey {
            timepoint: token(layout.timepoint_index)?,
            replicate: token(layout.replicate_index)?,
        };
        let direction: ReadDirection = token(layout.read_index)?.parse()?;
        let job = token(layout.job_index)?;

        Ok(ParsedName { job, key, direction })
    }
}

/// Read files of a single experiment, partitioned by timepoint and replicate
#[derive(Clone, Debug, PartialEq)]
pub struct FileGroups {
    pub job: String,
    pub groups: BTreeMap<GroupKey, ReadPairs>,
}

/// Partition read files into groups and validate the pairing of every group
///
/// Fails if any file name can't be parsed, if more than one job token is present, or if the
/// sorted R1 and R2 lists of a group don't line up one to one.
pub fn group_files(files: &[PathBuf], layout: &FilenameLayout) -> Result<FileGroups> {
    let mut groups: BTreeMap<GroupKey, ReadPairs> = BTreeMap::new();
    let mut jobs: BTreeSet<String> = BTreeSet::new();

    for file in files {
        let parsed = ParsedName::parse(file, layout)?;
        debug!("{} -> {} {} {}", file.display(), parsed.job, parsed.key, parsed.direction);
        let pairs = groups.entry(parsed.key).or_default();
        match parsed.direction {
            ReadDirection::R1 => pairs.r1.push(file.clone()),
            ReadDirection::R2 => pairs.r2.push(file.clone()),
        }
        jobs.insert(parsed.job);
    }

    for (key, pairs) in groups.iter_mut() {
        pairs.r1.sort();
        pairs.r2.sort();
        check_pairing(key, pairs)?;
    }

    if jobs.len() != 1 {
        return Err(Error::AmbiguousJob(jobs.into_iter().collect()));
    }
    let job = jobs.into_iter().next().unwrap_or_default();

    info!("Grouped {} files of job {} into {} groups", files.len(), job, groups.len());
    Ok(FileGroups { job, groups })
}

fn check_pairing(key: &GroupKey, pairs: &ReadPairs) -> Result<()> {
    let n = pairs.r1.len().max(pairs.r2.len());
    for i in 0..n {
        let r1 = pairs.r1.get(i);
        let r2 = pairs.r2.get(i);
        let paired = match (r1, r2) {
            (Some(a), Some(b)) => mismatch_distance(&a.to_string_lossy(), &b.to_string_lossy()) == 1,
            _ => false,
        };
        if !paired {
            return Err(Error::UnpairedReads { group: key.clone(), r1: r1.cloned(), r2: r2.cloned() });
        }
    }
    Ok(())
}

/// Number of positions at which two strings differ
///
/// The shorter string is padded, so every extra character of the longer one is a mismatch.
pub fn mismatch_distance(a: &str, b: &str) -> usize {
    let mut a = a.chars();
    let mut b = b.chars();
    let mut distance = 0;
    loop {
        match (a.next(), b.next()) {
            (None, None) => return distance,
            (Some(x), Some(y)) if x == y => {}
            _ => distance += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &str, names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| Path::new(dir).join(n)).collect()
    }

    fn key(timepoint: &str, replicate: &str) -> GroupKey {
        GroupKey { timepoint: timepoint.to_string(), replicate: replicate.to_string() }
    }

    #[test]
    fn groups_by_timepoint_and_replicate() {
        let files = paths("/data", &[
            "test_T6_1_R2.fastq.gz",
            "test_T3_2_R1.fastq.gz",
            "test_T3_1_R1.fastq.gz",
            "test_T6_1_R1.fastq.gz",
            "test_T3_1_R2.fastq.gz",
            "test_T3_2_R2.fastq.gz",
        ]);

        let grouped = group_files(&files, &FilenameLayout::default()).unwrap();

        assert_eq!(grouped.job, "test");
        let keys: Vec<&GroupKey> = grouped.groups.keys().collect();
        assert_eq!(keys, vec![&key("T3", "1"), &key("T3", "2"), &key("T6", "1")]);
        assert_eq!(
            grouped.groups[&key("T3", "2")],
            ReadPairs {
                r1: paths("/data", &["test_T3_2_R1.fastq.gz"]),
                r2: paths("/data", &["test_T3_2_R2.fastq.gz"]),
            }
        );
    }

    #[test]
    fn multiple_lanes_pair_after_sorting() {
        let files = paths("/data", &[
            "MDA_D12_R1_S41_L002_R2_001.fastq.gz",
            "MDA_D12_R1_S41_L001_R1_001.fastq.gz",
            "MDA_D12_R1_S41_L002_R1_001.fastq.gz",
            "MDA_D12_R1_S41_L001_R2_001.fastq.gz",
        ]);
        let layout = FilenameLayout { read_index: 5, ..FilenameLayout::default() };

        let grouped = group_files(&files, &layout).unwrap();

        let pairs = &grouped.groups[&key("D12", "R1")];
        assert_eq!(pairs.r1, paths("/data", &["MDA_D12_R1_S41_L001_R1_001.fastq.gz", "MDA_D12_R1_S41_L002_R1_001.fastq.gz"]));
        assert_eq!(pairs.r2, paths("/data", &["MDA_D12_R1_S41_L001_R2_001.fastq.gz", "MDA_D12_R1_S41_L002_R2_001.fastq.gz"]));
    }

    #[test]
    fn custom_delimiter() {
        let files = paths("/data", &["exp-T1-a-R1.fq.gz", "exp-T1-a-R2.fq.gz"]);
        let layout = FilenameLayout { delimiter: "-".to_string(), ..FilenameLayout::default() };

        let grouped = group_files(&files, &layout).unwrap();

        assert_eq!(grouped.job, "exp");
        assert!(grouped.groups.contains_key(&key("T1", "a")));
    }

    #[test]
    fn more_than_one_job_is_rejected() {
        let files = paths("/data", &["a_T1_1_R1.fastq.gz", "a_T1_1_R2.fastq.gz", "b_T2_1_R1.fastq.gz", "b_T2_1_R2.fastq.gz"]);
        let err = group_files(&files, &FilenameLayout::default()).unwrap_err();
        assert!(matches!(err, Error::AmbiguousJob(jobs) if jobs == vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn missing_mate_is_rejected() {
        let files = paths("/data", &["a_T1_1_R1.fastq.gz", "a_T1_1_R2.fastq.gz", "a_T1_2_R1.fastq.gz"]);
        let err = group_files(&files, &FilenameLayout::default()).unwrap_err();
        assert!(matches!(err, Error::UnpairedReads { group, r2: None, .. } if group == key("T1", "2")));
    }

    #[test]
    fn mismatched_identifiers_are_rejected() {
        let files = paths("/data", &["a_T1_1_R1_L001.fastq.gz", "a_T1_1_R2_L002.fastq.gz"]);
        let err = group_files(&files, &FilenameLayout::default()).unwrap_err();
        assert!(matches!(err, Error::UnpairedReads { .. }));
    }

    #[test]
    fn invalid_read_identifier_is_rejected() {
        let files = paths("/data", &["a_T1_1_R3.fastq.gz"]);
        let err = group_files(&files, &FilenameLayout::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidReadIdentifier(t) if t == "R3"));
    }

    #[test]
    fn short_file_name_is_rejected() {
        let files = paths("/data", &["a_T1.fastq.gz"]);
        let err = group_files(&files, &FilenameLayout::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidFilename { index: 2, .. }));
    }

    #[test]
    fn stem_ignores_dots_in_directories() {
        let parsed = ParsedName::parse(Path::new("/runs/v1.2/a_T1_1_R1.fastq.gz"), &FilenameLayout::default()).unwrap();
        assert_eq!(parsed.key, key("T1", "1"));
        assert_eq!(parsed.direction, ReadDirection::R1);
    }

    #[test]
    fn mismatch_distance_counts_padding() {
        assert_eq!(mismatch_distance("abc", "abc"), 0);
        assert_eq!(mismatch_distance("a_R1", "a_R2"), 1);
        assert_eq!(mismatch_distance("abc", "abcde"), 2);
        assert_eq!(mismatch_distance("", "xy"), 2);
    }
}
