use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::fastq::group::GroupKey;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no files match {0}")]
    NoFilesFound(String),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("can't read directory entry: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("file name {name} has no token at index {index} (delimiter {delimiter:?})")]
    InvalidFilename { name: String, index: usize, delimiter: String },

    #[error("encountered invalid read identifier ({0})")]
    InvalidReadIdentifier(String),

    #[error("expected exactly one job token, found {0:?}")]
    AmbiguousJob(Vec<String>),

    #[error("sorting did not yield perfect pairing of files in group {group}: {r1:?} / {r2:?}")]
    UnpairedReads { group: GroupKey, r1: Option<PathBuf>, r2: Option<PathBuf> },

    #[error("{0} not found")]
    MissingPath(PathBuf),

    #[error("{0} already exists")]
    DirectoryExists(PathBuf),

    #[error("no job script has been written for {0}")]
    NotWritten(String),

    #[error("job {0} has not been submitted yet")]
    NotSubmitted(String),

    #[error("submission error encountered: {0}")]
    Submission(String),

    #[error("can't parse {program} output: {output:?}")]
    SchedulerOutput { program: String, output: String },

    #[error("counts file {path} is malformed: {reason}")]
    Counts { path: PathBuf, reason: String },

    #[error("template error: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error("counts table error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
