use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tinytemplate::TinyTemplate;

use crate::error::{Error, Result};
use crate::sge::state::JobStatus;

/// Options used to build an [`SgeJob`]
///
/// Unset paths are derived from the working directory and job name: `<wd>/<name>.o` for stdout
/// and `<wd>/<name>.e` for stderr. A stdout or stderr path pointing at an existing directory
/// gets the same file name appended.
#[derive(Clone, Debug)]
pub struct SgeOptions {
    pub job_name: String,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub working_dir_path: Option<PathBuf>,
    /// GB of memory per slot, used for `h_vmem`
    pub memory: u32,
    pub ncpus: u32,
    pub n_array_jobs: Option<u32>,
    pub commands: Vec<String>,
    pub verbose: bool,
    pub validate_paths: bool,
    pub convert_to_realpaths: bool,
}

impl Default for SgeOptions {
    fn default() -> Self {
        SgeOptions {
            job_name: "job".to_string(),
            stdout_path: None,
            stderr_path: None,
            working_dir_path: None,
            memory: 2,
            ncpus: 1,
            n_array_jobs: None,
            commands: Vec::new(),
            verbose: true,
            validate_paths: true,
            convert_to_realpaths: true,
        }
    }
}

/// An SGE job: everything needed to render its script, plus scheduler state once submitted
///
/// The rendered script has a fixed layout:
/// - shebang and `#$` directives (shell, environment export, name, log paths, working
///   directory, parallel environment slots, memory)
/// - an optional array job range
/// - optional `echo` lines reporting host, job id and timings
/// - the job commands
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SgeJob {
    pub job_name: String,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub working_dir_path: PathBuf,
    pub memory: u32,
    pub ncpus: u32,
    pub n_array_jobs: Option<u32>,
    pub commands: Vec<String>,
    pub verbose: bool,
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub script_path: Option<PathBuf>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Rendering context for the directive header
#[derive(Serialize)]
struct HeaderContext {
    job_name: String,
    stdout_path: String,
    stderr_path: String,
    working_dir_path: String,
    ncpus: u32,
    memory: u32,
}

/// Rendering context for the array job range
#[derive(Serialize)]
struct ArrayContext {
    n_array_jobs: u32,
}

/// included directive header template
static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));
static ARRAY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/array.txt"));
/// static echo lines, everything is evaluated by the job shell
static VERBOSE_START: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/verbose_start.txt"));
static VERBOSE_END: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/verbose_end.txt"));

impl SgeJob {
    pub fn new(options: SgeOptions) -> Result<SgeJob> {
        let working_dir_path = match options.working_dir_path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let stdout_path = log_path(options.stdout_path, &working_dir_path, &options.job_name, "o");
        let stderr_path = log_path(options.stderr_path, &working_dir_path, &options.job_name, "e");

        if options.validate_paths {
            for path in [&stdout_path, &stderr_path] {
                let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
                if !parent.exists() {
                    return Err(Error::MissingPath(parent.to_path_buf()));
                }
            }
            if !working_dir_path.exists() {
                return Err(Error::MissingPath(working_dir_path));
            }
        }

        let (stdout_path, stderr_path, working_dir_path) = match options.convert_to_realpaths {
            true => (realpath(&stdout_path)?, realpath(&stderr_path)?, realpath(&working_dir_path)?),
            false => (stdout_path, stderr_path, working_dir_path),
        };

        Ok(SgeJob {
            job_name: options.job_name,
            stdout_path,
            stderr_path,
            working_dir_path,
            memory: options.memory,
            ncpus: options.ncpus,
            n_array_jobs: options.n_array_jobs,
            commands: options.commands,
            verbose: options.verbose,
            status: None,
            job_id: None,
            script_path: None,
            submitted_at: None,
        })
    }

    /// Render the complete job script
    pub fn render(&self) -> Result<String> {
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template("header", HEADER)?;
        tt.add_template("array", ARRAY)?;

        let context = HeaderContext {
            job_name: self.job_name.clone(),
            stdout_path: self.stdout_path.display().to_string(),
            stderr_path: self.stderr_path.display().to_string(),
            working_dir_path: self.working_dir_path.display().to_string(),
            ncpus: self.ncpus,
            memory: self.memory,
        };

        let mut lines: Vec<String> = tt.render("header", &context)?.lines().map(String::from).collect();
        lines.push(String::new());

        if let Some(n_array_jobs) = self.n_array_jobs {
            let range = tt.render("array", &ArrayContext { n_array_jobs })?;
            lines.extend(range.lines().map(String::from));
            lines.push(String::new());
        }

        if self.verbose {
            lines.extend(VERBOSE_START.lines().map(String::from));
        }
        lines.extend(self.commands.iter().cloned());
        if self.verbose {
            lines.extend(VERBOSE_END.lines().map(String::from));
        }

        Ok(lines.join("\n"))
    }

    /// Add the lines of a command file to the job, replacing existing commands with `overwrite`
    pub fn read_commands(&mut self, path: &Path, overwrite: bool) -> Result<()> {
        info!("Reading commands from {}", path.display());
        let content = fs::read_to_string(path)?;
        let new_commands = content.lines().map(String::from);
        if overwrite {
            self.commands = new_commands.collect();
        } else {
            self.commands.extend(new_commands);
        }
        Ok(())
    }

    /// Write the rendered script to disk and remember where it is for submission
    pub fn write_script(&mut self, out_path: &Path) -> Result<()> {
        info!("Writing job script {}", out_path.display());
        fs::write(out_path, self.render()?)?;
        self.script_path = Some(out_path.to_path_buf());
        Ok(())
    }
}

impl fmt::Display for SgeJob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let script = self.render().map_err(|_| fmt::Error)?;
        write!(f, "{script}")
    }
}

fn log_path(path: Option<PathBuf>, working_dir: &Path, job_name: &str, extension: &str) -> PathBuf {
    let file_name = format!("{job_name}.{extension}");
    match path {
        None => working_dir.join(file_name),
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path,
    }
}

/// Absolute, symlink-free version of a path whose file doesn't need to exist yet
pub(crate) fn realpath(path: &Path) -> Result<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Ok(resolved);
    }
    let absolute = match path.is_absolute() {
        true => path.to_path_buf(),
        false => std::env::current_dir()?.join(path),
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}
