use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::Utc;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::sge::script::SgeJob;
use crate::sge::state::JobStatus;

/// Locations of the SGE command line tools
#[derive(Clone, Debug)]
pub struct Scheduler {
    pub qsub: PathBuf,
    pub qstat: PathBuf,
    pub qdel: PathBuf,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            qsub: PathBuf::from("qsub"),
            qstat: PathBuf::from("qstat"),
            qdel: PathBuf::from("qdel"),
        }
    }
}

impl Scheduler {
    fn run(&self, program: &Path, arguments: &[String]) -> Result<Output> {
        let mut process = Command::new(program);
        let cmd = process.args(arguments);
        info!("Running {:?}", &cmd);
        Ok(cmd.output()?)
    }
}

impl SgeJob {
    /// Submit the written job script with qsub and record the job id
    pub fn submit(&mut self, scheduler: &Scheduler) -> Result<u64> {
        let script_path = self
            .script_path
            .clone()
            .ok_or_else(|| Error::NotWritten(self.job_name.clone()))?;

        let arguments = vec![script_path.display().to_string()];
        let output = scheduler.run(&scheduler.qsub, &arguments)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(Error::Submission(stderr.trim().to_string()));
        }

        let job_id = parse_job_id(&String::from_utf8_lossy(&output.stdout))?;
        info!("SGE job id: {job_id}");
        self.job_id = Some(job_id);
        self.status = Some(JobStatus::Submitted);
        self.submitted_at = Some(Utc::now());
        Ok(job_id)
    }

    /// Refresh the job status from qstat
    ///
    /// Unsubmitted and killed jobs aren't polled and keep their cached status.
    pub fn status(&mut self, scheduler: &Scheduler) -> Result<Option<JobStatus>> {
        match &self.status {
            None => return Ok(None),
            Some(status) if status.is_terminal() => return Ok(self.status.clone()),
            Some(_) => {}
        }
        let job_id = self.job_id.ok_or_else(|| Error::NotSubmitted(self.job_name.clone()))?;

        let output = scheduler.run(&scheduler.qstat, &[])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("qstat failed, keeping status of job {job_id}");
            return Err(Error::SchedulerOutput { program: scheduler.qstat.display().to_string(), output: stderr });
        }
        let status = parse_qstat(&String::from_utf8_lossy(&output.stdout), job_id)?;
        info!("Job {job_id} status: {status}");
        self.status = Some(status);
        Ok(self.status.clone())
    }

    /// Delete the job from the queue with qdel
    pub fn kill(&mut self, scheduler: &Scheduler) -> Result<()> {
        let job_id = self.job_id.ok_or_else(|| Error::NotSubmitted(self.job_name.clone()))?;

        let output = scheduler.run(&scheduler.qdel, &[job_id.to_string()])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("qdel failed for job {job_id}");
            return Err(Error::SchedulerOutput { program: scheduler.qdel.display().to_string(), output: stderr });
        }

        self.status = Some(JobStatus::Killed);
        Ok(())
    }
}

/// Job id from qsub output, e.g. `Your job 4242 ("ctg") has been submitted`
///
/// Array jobs report `Your job-array 4242.1-4:1 ("ctg") has been submitted`; the task range is
/// dropped since qstat and qdel address the whole array by its id.
pub fn parse_job_id(stdout: &str) -> Result<u64> {
    stdout
        .split_whitespace()
        .nth(2)
        .and_then(|token| token.split('.').next())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::SchedulerOutput { program: "qsub".to_string(), output: stdout.to_string() })
}

/// State code of a job from the qstat table, or finished if the job isn't listed
///
/// ```text
/// job-ID  prior   name  user   state submit/start at     queue  slots ja-task-ID
/// ----------------------------------------------------------------------------
///    4242 0.50500 ctg   samson r     03/12/2019 10:21:01 all.q@n1  16
/// ```
pub fn parse_qstat(stdout: &str, job_id: u64) -> Result<JobStatus> {
    let id = job_id.to_string();
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&id.as_str()) {
            continue;
        }
        return match fields.get(4) {
            Some(state) => Ok(JobStatus::Scheduler(state.to_string())),
            None => Err(Error::SchedulerOutput { program: "qstat".to_string(), output: line.to_string() }),
        };
    }
    Ok(JobStatus::Finished)
}
