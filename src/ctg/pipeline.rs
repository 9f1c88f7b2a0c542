use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::ctg::counts;
use crate::ctg::runner::{CtgRunner, RunnerOptions};
use crate::error::{Error, Result};
use crate::fastq::discover::discover;
use crate::fastq::group::{group_files, FilenameLayout, GroupKey, ReadPairs};
use crate::fastq::subset;
use crate::sge::job::Scheduler;
use crate::sge::script::SgeOptions;

/// Settings shared by every runner a pipeline creates
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub config_file: PathBuf,
    pub convert_to_realpaths: bool,
    pub submit: bool,
    /// Replace job directories left over from an earlier run
    pub overwrite: bool,
    pub memory: u32,
    pub ncpus: u32,
    /// Commands run before `ctg count`
    pub setup_commands: Vec<String>,
    pub verbose: bool,
}

impl RunnerConfig {
    pub fn new(config_file: PathBuf) -> RunnerConfig {
        RunnerConfig {
            config_file,
            convert_to_realpaths: true,
            submit: false,
            overwrite: false,
            memory: 2,
            ncpus: 16,
            setup_commands: vec!["conda activate ctg-dev".to_string()],
            verbose: true,
        }
    }
}

/// Automates running `ctg count` over every timepoint / replicate of an experiment
#[derive(Debug)]
pub struct CtgPipeline {
    pub fastq_directory: PathBuf,
    pub working_directory: PathBuf,
    pub job: String,
    pub timepoint_prefix: String,
    pub files: Vec<PathBuf>,
    pub groups: BTreeMap<GroupKey, ReadPairs>,
    pub runners: BTreeMap<GroupKey, CtgRunner>,
}

/// Serialised pipeline summary
#[derive(Serialize)]
struct PipelineState<'a> {
    job: &'a str,
    timepoint_prefix: &'a str,
    timepoints: Vec<&'a str>,
    replicates: Vec<&'a str>,
    files: &'a [PathBuf],
    groups: Vec<GroupState<'a>>,
}

#[derive(Serialize)]
struct GroupState<'a> {
    name: String,
    timepoint: &'a str,
    replicate: &'a str,
    r1: &'a [PathBuf],
    r2: &'a [PathBuf],
    job_id: Option<u64>,
}

impl CtgPipeline {
    /// Both directories default to the current directory
    pub fn new(fastq_directory: Option<PathBuf>, working_directory: Option<PathBuf>) -> Result<CtgPipeline> {
        let cwd = std::env::current_dir()?;
        Ok(CtgPipeline {
            fastq_directory: fastq_directory.unwrap_or_else(|| cwd.clone()),
            working_directory: working_directory.unwrap_or(cwd),
            job: String::new(),
            timepoint_prefix: String::new(),
            files: Vec::new(),
            groups: BTreeMap::new(),
            runners: BTreeMap::new(),
        })
    }

    /// Discover read files matching `pattern` and group them by timepoint and replicate
    pub fn parse_files(&mut self, pattern: &str, timepoint_prefix: &str, layout: &FilenameLayout) -> Result<&mut Self> {
        let files = discover(&self.fastq_directory, pattern)?;
        let grouped = group_files(&files, layout)?;

        self.job = grouped.job;
        self.groups = grouped.groups;
        self.files = files;
        self.timepoint_prefix = timepoint_prefix.to_string();
        self.runners.clear();
        Ok(self)
    }

    /// Job name of a group, e.g. `MDA_D12_1` for job `MDA`, prefix `D`, timepoint `12`
    pub fn group_name(&self, key: &GroupKey) -> String {
        format!("{}_{}{}_{}", self.job, self.timepoint_prefix, key.timepoint, key.replicate)
    }

    /// Create a job directory, `ctg count` runner and SGE script for every group
    ///
    /// Each job directory holds `job.sh` and a `job.json` state record. With `config.submit` the
    /// scripts are submitted as they are created and the record includes the job id.
    pub fn construct_runners(&mut self, config: &RunnerConfig, scheduler: &Scheduler) -> Result<&mut Self> {
        let mut runners: BTreeMap<GroupKey, CtgRunner> = BTreeMap::new();

        for (key, pairs) in &self.groups {
            let name = self.group_name(key);
            let job_dir = self.working_directory.join(&name);
            create_job_dir(&job_dir, config.overwrite)?;

            let mut runner = CtgRunner::new(RunnerOptions {
                name: name.clone(),
                config_file: config.config_file.clone(),
                fastq_dir: None,
                fastq1: pairs.r1.clone(),
                fastq2: pairs.r2.clone(),
                output_directory: Some(job_dir.clone()),
                convert_to_realpaths: config.convert_to_realpaths,
            })?;

            let sge = runner.create_sge_script(&job_dir.join("job.sh"), SgeOptions {
                job_name: name.clone(),
                working_dir_path: Some(job_dir.clone()),
                memory: config.memory,
                ncpus: config.ncpus,
                commands: config.setup_commands.clone(),
                verbose: config.verbose,
                ..SgeOptions::default()
            })?;

            if config.submit {
                sge.submit(scheduler)?;
                info!("Submitted {name}");
            }
            sge.write_json(&job_dir.join("job.json"))?;

            runners.insert(key.clone(), runner);
        }

        self.runners = runners;
        Ok(self)
    }

    /// Scheduler ids of submitted runners, in group order
    pub fn job_ids(&self) -> Vec<u64> {
        self.runners
            .values()
            .filter_map(|runner| runner.sge.as_ref().and_then(|sge| sge.job_id))
            .collect()
    }

    /// Merge the counts of every group into `<job>_aggregated_counts.txt`
    ///
    /// Counts are read from each group's job directory, so runners from an earlier invocation
    /// don't need to be constructed again. Written to `output_directory`, or the working
    /// directory if unset.
    pub fn aggregate_counts(&self, output_directory: Option<&Path>) -> Result<PathBuf> {
        let samples: Vec<(String, PathBuf)> = self
            .groups
            .keys()
            .map(|key| {
                let name = self.group_name(key);
                let counts_path = self.working_directory.join(&name).join(format!("{name}_counts.txt"));
                (name, counts_path)
            })
            .collect();
        let out_dir = output_directory.unwrap_or(self.working_directory.as_path());
        let out_path = out_dir.join(format!("{}_aggregated_counts.txt", self.job));
        counts::aggregate_counts(&samples, &out_path)?;
        Ok(out_path)
    }

    /// Write gzipped subsets of every discovered read file into `test_dir`
    pub fn create_test_set(&self, test_dir: &Path, test_size: usize) -> Result<Vec<PathBuf>> {
        subset::create_test_set(&self.files, test_dir, test_size)
    }

    pub fn to_json(&self) -> Result<String> {
        let timepoints: BTreeSet<&str> = self.groups.keys().map(|k| k.timepoint.as_str()).collect();
        let replicates: BTreeSet<&str> = self.groups.keys().map(|k| k.replicate.as_str()).collect();
        let groups = self
            .groups
            .iter()
            .map(|(key, pairs)| GroupState {
                name: self.group_name(key),
                timepoint: &key.timepoint,
                replicate: &key.replicate,
                r1: &pairs.r1,
                r2: &pairs.r2,
                job_id: self.runners.get(key).and_then(|r| r.sge.as_ref()).and_then(|sge| sge.job_id),
            })
            .collect();

        let state = PipelineState {
            job: &self.job,
            timepoint_prefix: &self.timepoint_prefix,
            timepoints: timepoints.into_iter().collect(),
            replicates: replicates.into_iter().collect(),
            files: &self.files,
            groups,
        };
        Ok(serde_json::to_string_pretty(&state)?)
    }
}

fn create_job_dir(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            return Err(Error::DirectoryExists(path.to_path_buf()));
        }
        warn!("Job directory {} already exists, files will be overwritten", path.display());
        fs::remove_dir_all(path)?;
    }
    info!("Creating job directory {}", path.display());
    fs::create_dir(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::sge::script::SgeJob;

    struct Fixture {
        _tmp: tempfile::TempDir,
        fastq: PathBuf,
        work: PathBuf,
        config: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let fastq = root.join("fastq");
        let work = root.join("work");
        fs::create_dir(&fastq).unwrap();
        fs::create_dir(&work).unwrap();
        for (tpt, rep) in [(3, 1), (3, 2), (6, 1)] {
            for read in ["R1", "R2"] {
                fs::write(fastq.join(format!("test_T{tpt}_{rep}_{read}.fastq.gz")), "").unwrap();
            }
        }
        let config = root.join("config.txt");
        fs::write(&config, "").unwrap();
        Fixture { _tmp: tmp, fastq, work, config }
    }

    fn key(timepoint: &str, replicate: &str) -> GroupKey {
        GroupKey { timepoint: timepoint.to_string(), replicate: replicate.to_string() }
    }

    #[test]
    fn parse_files_groups_the_experiment() {
        let f = fixture();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();

        pipeline.parse_files("test_*", "T", &FilenameLayout::default()).unwrap();

        assert_eq!(pipeline.job, "test");
        assert_eq!(pipeline.files.len(), 6);
        assert_eq!(pipeline.groups.len(), 3);
        assert_eq!(pipeline.groups[&key("T6", "1")], ReadPairs {
            r1: vec![f.fastq.join("test_T6_1_R1.fastq.gz")],
            r2: vec![f.fastq.join("test_T6_1_R2.fastq.gz")],
        });
        assert_eq!(pipeline.group_name(&key("T6", "1")), "test_TT6_1");
    }

    #[test]
    fn construct_runners_writes_job_directories() {
        let f = fixture();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();
        pipeline.parse_files("test_*", "", &FilenameLayout::default()).unwrap();

        pipeline
            .construct_runners(&RunnerConfig::new(f.config.clone()), &Scheduler::default())
            .unwrap();

        assert_eq!(pipeline.runners.len(), 3);
        let job_dir = f.work.join("test_T3_2");
        let script = fs::read_to_string(job_dir.join("job.sh")).unwrap();
        assert!(script.contains("#$ -N test_T3_2\n"));
        assert!(script.contains("#$ -pe smp 16\n"));
        assert!(script.contains("#$ -l h_vmem=2G\n"));
        assert!(script.contains("conda activate ctg-dev\nctg \\\n"));
        assert!(script.contains(&format!("--fastq1 {}", f.fastq.join("test_T3_2_R1.fastq.gz").display())));

        let record = SgeJob::from_json_path(&job_dir.join("job.json")).unwrap();
        assert_eq!(record.job_name, "test_T3_2");
        assert_eq!(record.status, None);
        assert_eq!(record.script_path, Some(job_dir.join("job.sh")));
        assert!(pipeline.job_ids().is_empty());
    }

    #[test]
    fn existing_job_directory_needs_overwrite() {
        let f = fixture();
        fs::create_dir(f.work.join("test_T3_1")).unwrap();
        fs::write(f.work.join("test_T3_1/stale.txt"), "").unwrap();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();
        pipeline.parse_files("test_*", "", &FilenameLayout::default()).unwrap();
        let mut config = RunnerConfig::new(f.config.clone());

        let err = pipeline.construct_runners(&config, &Scheduler::default()).unwrap_err();
        assert!(matches!(err, Error::DirectoryExists(_)));

        config.overwrite = true;
        pipeline.construct_runners(&config, &Scheduler::default()).unwrap();
        assert!(!f.work.join("test_T3_1/stale.txt").exists());
    }

    #[test]
    fn missing_config_file_is_rejected() {
        let f = fixture();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();
        pipeline.parse_files("test_*", "", &FilenameLayout::default()).unwrap();

        let err = pipeline
            .construct_runners(&RunnerConfig::new(f.work.join("missing.txt")), &Scheduler::default())
            .unwrap_err();

        assert!(matches!(err, Error::MissingPath(_)));
    }

    #[test]
    fn summary_lists_timepoints_and_replicates() {
        let f = fixture();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();
        pipeline.parse_files("test_*", "D", &FilenameLayout::default()).unwrap();

        let value: Value = serde_json::from_str(&pipeline.to_json().unwrap()).unwrap();

        assert_eq!(value["job"], "test");
        assert_eq!(value["timepoint_prefix"], "D");
        assert_eq!(value["timepoints"], serde_json::json!(["T3", "T6"]));
        assert_eq!(value["replicates"], serde_json::json!(["1", "2"]));
        assert_eq!(value["files"].as_array().unwrap().len(), 6);
        assert_eq!(value["groups"][0]["name"], "test_DT3_1");
        assert_eq!(value["groups"][0]["job_id"], Value::Null);
    }

    #[test]
    fn aggregate_uses_runner_names() {
        let f = fixture();
        let mut pipeline = CtgPipeline::new(Some(f.fastq.clone()), Some(f.work.clone())).unwrap();
        pipeline.parse_files("test_T3_*", "", &FilenameLayout::default()).unwrap();
        pipeline
            .construct_runners(&RunnerConfig::new(f.config.clone()), &Scheduler::default())
            .unwrap();
        for runner in pipeline.runners.values() {
            fs::write(runner.counts_path(), "id\tcounts\ng1\t5\n").unwrap();
        }

        let out = pipeline.aggregate_counts(None).unwrap();

        assert_eq!(out, f.work.join("test_aggregated_counts.txt"));
        assert_eq!(fs::read_to_string(out).unwrap(), "id\tcounts\ttest_T3_1\ttest_T3_2\ng1\t5\t5\t5\n");
    }
}
