use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};
use crate::sge::script::{SgeJob, SgeOptions};

static TAB: &str = "    ";

/// Inputs for a single `ctg count` invocation
#[derive(Clone, Debug)]
pub struct RunnerOptions {
    pub name: String,
    pub config_file: PathBuf,
    /// Prefix joined onto every relative FASTQ path
    pub fastq_dir: Option<PathBuf>,
    pub fastq1: Vec<PathBuf>,
    pub fastq2: Vec<PathBuf>,
    /// Defaults to the current directory
    pub output_directory: Option<PathBuf>,
    /// Check every path exists and resolve it to an absolute, symlink-free path
    pub convert_to_realpaths: bool,
}

/// A `ctg count` command and, once rendered, the SGE job that runs it
#[derive(Clone, Debug)]
pub struct CtgRunner {
    pub name: String,
    pub config_file: PathBuf,
    pub fastq1: Vec<PathBuf>,
    pub fastq2: Vec<PathBuf>,
    pub output_directory: PathBuf,
    pub sge: Option<SgeJob>,
}

impl CtgRunner {
    pub fn new(options: RunnerOptions) -> Result<CtgRunner> {
        let output_directory = match options.output_directory {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let prefix = options.fastq_dir.unwrap_or_default();
        let mut fastq1: Vec<PathBuf> = options.fastq1.iter().map(|f| prefix.join(f)).collect();
        let mut fastq2: Vec<PathBuf> = options.fastq2.iter().map(|f| prefix.join(f)).collect();
        let mut config_file = options.config_file;
        let mut output_directory = output_directory;

        if options.convert_to_realpaths {
            config_file = existing_realpath(&config_file)?;
            output_directory = existing_realpath(&output_directory)?;
            fastq1 = fastq1.iter().map(|f| existing_realpath(f)).collect::<Result<_>>()?;
            fastq2 = fastq2.iter().map(|f| existing_realpath(f)).collect::<Result<_>>()?;
        }

        Ok(CtgRunner {
            name: options.name,
            config_file,
            fastq1,
            fastq2,
            output_directory,
            sge: None,
        })
    }

    pub fn counts_path(&self) -> PathBuf {
        self.output_directory.join(format!("{}_counts.txt", self.name))
    }

    pub fn bam_path(&self) -> PathBuf {
        self.output_directory.join(format!("{}_alignments.bam", self.name))
    }

    /// The `ctg count` argument vector, multiple FASTQ files are joined by commas
    pub fn command(&self) -> Vec<String> {
        vec![
            "ctg".to_string(),
            "count".to_string(),
            "--config".to_string(),
            self.config_file.display().to_string(),
            "--fastq1".to_string(),
            join_paths(&self.fastq1),
            "--fastq2".to_string(),
            join_paths(&self.fastq2),
            "--output_counts".to_string(),
            self.counts_path().display().to_string(),
            "--output_bam".to_string(),
            self.bam_path().display().to_string(),
        ]
    }

    /// Render the SGE script for this runner and write it to `script_out_path`
    ///
    /// `options.commands` run before `ctg count`, e.g. to activate an environment.
    pub fn create_sge_script(&mut self, script_out_path: &Path, options: SgeOptions) -> Result<&mut SgeJob> {
        info!("Creating SGE script for {}", self.name);
        let mut commands = options.commands.clone();
        commands.push(self.to_string());

        let mut sge = SgeJob::new(SgeOptions { commands, ..options })?;
        sge.write_script(script_out_path)?;
        Ok(self.sge.insert(sge))
    }
}

/// Pretty print the command, one flag per line
impl fmt::Display for CtgRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let command = self.command();
        let mut lines: Vec<String> = vec![command[0].clone(), format!("{TAB}{}", command[1])];
        for pair in command[2..].chunks(2) {
            lines.push(format!("{TAB}{TAB}{}", pair.join(" ")));
        }
        write!(f, "{}", lines.join(" \\\n"))
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<String>>().join(",")
}

fn existing_realpath(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|_| Error::MissingPath(path.to_path_buf()))
}
