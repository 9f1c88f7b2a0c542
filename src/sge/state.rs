use std::fmt;

use serde::{Deserialize, Serialize};

/// A simple way to keep track of job state.
///
/// Jobs that were never submitted have no status at all (`Option::None`). After submission the
/// status is refreshed from `qstat`, which reports a short state code (`qw`, `r`, `Eqw`, ...).
/// A job missing from `qstat` output has left the queue and is reported as finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Submitted,
    Killed,
    Finished,
    Scheduler(String),
}

impl JobStatus {
    /// Killed jobs are never polled again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Killed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Killed => write!(f, "killed"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Scheduler(code) => write!(f, "{code}"),
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "submitted" => JobStatus::Submitted,
            "killed" => JobStatus::Killed,
            "finished" => JobStatus::Finished,
            _ => JobStatus::Scheduler(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_a_plain_string() {
        let json = serde_json::to_string(&Some(JobStatus::Scheduler("qw".to_string()))).unwrap();
        assert_eq!(json, "\"qw\"");
        let status: Option<JobStatus> = serde_json::from_str("\"killed\"").unwrap();
        assert_eq!(status, Some(JobStatus::Killed));
        let status: Option<JobStatus> = serde_json::from_str("null").unwrap();
        assert_eq!(status, None);
    }
}
