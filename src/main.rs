use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use crate::ctg::pipeline::{CtgPipeline, RunnerConfig};
use crate::fastq::group::FilenameLayout;
use crate::fastq::subset::DEFAULT_TEST_SIZE;
use crate::sge::job::Scheduler;
use crate::sge::script::{SgeJob, SgeOptions};

mod ctg;
mod error;
mod fastq;
mod sge;

#[derive(Parser, Debug)]
#[command(name = "ctg-pipeliner", author, version, about = "Submit ctg count jobs to an SGE cluster")]
struct Cli {
    #[command(flatten)]
    scheduler: SchedulerArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group read files and print the plan as JSON without writing anything
    Plan {
        #[command(flatten)]
        files: FileArgs,
    },
    /// Create a job directory and SGE script per group, optionally submitting them
    Stage {
        #[command(flatten)]
        files: FileArgs,
        #[command(flatten)]
        runner: RunnerArgs,
    },
    /// Render a standalone SGE script from a file of shell commands
    Script {
        /// Shell commands, one per line
        commands: PathBuf,
        /// Where to write the job script
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short = 'N', long, default_value = "job")]
        name: String,
        #[arg(long)]
        work_dir: Option<PathBuf>,
        #[arg(long)]
        stdout: Option<PathBuf>,
        #[arg(long)]
        stderr: Option<PathBuf>,
        #[arg(long, default_value_t = 2)]
        memory: u32,
        #[arg(long, default_value_t = 1)]
        ncpus: u32,
        /// Run as an array job with tasks 1..=N
        #[arg(long)]
        array: Option<u32>,
        #[arg(long)]
        quiet: bool,
        /// Also write the job state record
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Submit the script of one or more job state records
    Submit {
        #[arg(required = true)]
        records: Vec<PathBuf>,
    },
    /// Poll the scheduler and update job state records
    Status {
        #[arg(required = true)]
        records: Vec<PathBuf>,
    },
    /// Delete jobs from the queue
    Kill {
        #[arg(required = true)]
        records: Vec<PathBuf>,
    },
    /// Merge the counts of every group into one table
    Aggregate {
        #[command(flatten)]
        files: FileArgs,
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Defaults to the working directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Write truncated copies of every read file for quick test runs
    Subset {
        #[command(flatten)]
        files: FileArgs,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
        lines: usize,
    },
}

#[derive(Args, Debug)]
struct SchedulerArgs {
    #[arg(long, global = true, env = "CTG_QSUB", default_value = "qsub")]
    qsub: PathBuf,
    #[arg(long, global = true, env = "CTG_QSTAT", default_value = "qstat")]
    qstat: PathBuf,
    #[arg(long, global = true, env = "CTG_QDEL", default_value = "qdel")]
    qdel: PathBuf,
}

/// Where read files live and how their names are laid out
#[derive(Args, Debug)]
struct FileArgs {
    /// Directory searched for read files (default: current directory)
    #[arg(long)]
    fastq_dir: Option<PathBuf>,
    /// Glob pattern relative to the FASTQ directory
    #[arg(short, long)]
    pattern: String,
    /// Prepended to the timepoint token in job names
    #[arg(long, default_value = "")]
    timepoint_prefix: String,
    #[arg(long, default_value = "_")]
    delimiter: String,
    #[arg(long, default_value_t = 0)]
    job_index: usize,
    #[arg(long, default_value_t = 1)]
    timepoint_index: usize,
    #[arg(long, default_value_t = 2)]
    replicate_index: usize,
    #[arg(long, default_value_t = 3)]
    read_index: usize,
}

impl FileArgs {
    fn layout(&self) -> FilenameLayout {
        FilenameLayout {
            delimiter: self.delimiter.clone(),
            job_index: self.job_index,
            timepoint_index: self.timepoint_index,
            replicate_index: self.replicate_index,
            read_index: self.read_index,
        }
    }
}

#[derive(Args, Debug)]
struct RunnerArgs {
    /// ctg configuration file
    #[arg(short, long)]
    config: PathBuf,
    /// Job directories are created here (default: current directory)
    #[arg(long)]
    work_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 2)]
    memory: u32,
    #[arg(long, default_value_t = 16)]
    ncpus: u32,
    /// Command run before ctg, may be repeated
    #[arg(long = "setup", default_values_t = vec!["conda activate ctg-dev".to_string()])]
    setup_commands: Vec<String>,
    /// Don't echo host and timing information from the job
    #[arg(long)]
    quiet: bool,
    /// Keep paths as given instead of resolving them
    #[arg(long)]
    no_realpaths: bool,
    /// Replace existing job directories
    #[arg(long)]
    overwrite: bool,
    /// Submit each script with qsub
    #[arg(long)]
    submit: bool,
}

/// Directory that holds one subdirectory per job
struct WorkingDirectory {
    path: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    info!("ctg-pipeliner starting up");

    let cli = Cli::parse();
    let scheduler = Scheduler {
        qsub: cli.scheduler.qsub,
        qstat: cli.scheduler.qstat,
        qdel: cli.scheduler.qdel,
    };

    match cli.command {
        Commands::Plan { files } => {
            let pipeline = parse_pipeline(&files, None)?;
            println!("{}", pipeline.to_json()?);
        }
        Commands::Stage { files, runner } => {
            let wd = working_directory(runner.work_dir.clone())?;
            let mut pipeline = parse_pipeline(&files, Some(&wd))?;
            let config = RunnerConfig {
                convert_to_realpaths: !runner.no_realpaths,
                submit: runner.submit,
                overwrite: runner.overwrite,
                memory: runner.memory,
                ncpus: runner.ncpus,
                setup_commands: runner.setup_commands,
                verbose: !runner.quiet,
                ..RunnerConfig::new(runner.config)
            };
            pipeline
                .construct_runners(&config, &scheduler)
                .context("Can't create job directories")?;
            if config.submit {
                info!("Submitted jobs: {:?}", pipeline.job_ids());
            }
            println!("{}", pipeline.to_json()?);
        }
        Commands::Script { commands, out, name, work_dir, stdout, stderr, memory, ncpus, array, quiet, record } => {
            let mut job = SgeJob::new(SgeOptions {
                job_name: name,
                stdout_path: stdout,
                stderr_path: stderr,
                working_dir_path: work_dir,
                memory,
                ncpus,
                n_array_jobs: array,
                verbose: !quiet,
                ..SgeOptions::default()
            })?;
            job.read_commands(&commands, false)?;
            job.write_script(&out)?;
            if let Some(record) = record {
                job.write_json(&record)?;
            }
        }
        Commands::Submit { records } => {
            for record in records {
                let mut job = read_record(&record)?;
                let job_id = job.submit(&scheduler).with_context(|| format!("Can't submit {}", job.job_name))?;
                job.write_json(&record)?;
                println!("{}\t{}", job.job_name, job_id);
            }
        }
        Commands::Status { records } => {
            for record in records {
                let mut job = read_record(&record)?;
                let status = job.status(&scheduler)?;
                job.write_json(&record)?;
                let status = status.map(|s| s.to_string()).unwrap_or_else(|| "unsubmitted".to_string());
                println!("{}\t{}", job.job_name, status);
            }
        }
        Commands::Kill { records } => {
            for record in records {
                let mut job = read_record(&record)?;
                job.kill(&scheduler).with_context(|| format!("Can't kill {}", job.job_name))?;
                job.write_json(&record)?;
                println!("{}\tkilled", job.job_name);
            }
        }
        Commands::Aggregate { files, work_dir, out_dir } => {
            let wd = working_directory(work_dir)?;
            let pipeline = parse_pipeline(&files, Some(&wd))?;
            let out = pipeline.aggregate_counts(out_dir.as_deref())?;
            println!("{}", out.display());
        }
        Commands::Subset { files, out_dir, lines } => {
            let pipeline = parse_pipeline(&files, None)?;
            for path in pipeline.create_test_set(&out_dir, lines)? {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

fn working_directory(path: Option<PathBuf>) -> Result<WorkingDirectory> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    Ok(WorkingDirectory { path })
}

fn parse_pipeline(files: &FileArgs, wd: Option<&WorkingDirectory>) -> Result<CtgPipeline> {
    let mut pipeline = CtgPipeline::new(files.fastq_dir.clone(), wd.map(|wd| wd.path.clone()))?;
    pipeline
        .parse_files(&files.pattern, &files.timepoint_prefix, &files.layout())
        .context("Can't group read files")?;
    Ok(pipeline)
}

fn read_record(path: &Path) -> Result<SgeJob> {
    SgeJob::from_json_path(path).with_context(|| format!("Can't read job record {}", path.display()))
}
