use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub fastq: PathBuf,
    pub work: PathBuf,
    pub config: PathBuf,
    pub bin: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().canonicalize().expect("canonical temp dir");
        let fastq = root.join("fastq");
        let work = root.join("work");
        let bin = root.join("bin");
        for dir in [&fastq, &work, &bin] {
            fs::create_dir(dir).expect("create fixture dir");
        }
        let config = root.join("config.txt");
        fs::write(&config, "").expect("write config");

        let env = Self { _tmp: tmp, fastq, work, config, bin };
        env.fake_scheduler(
            "echo 'Your job 4242 (\"job\") has been submitted'",
            "echo 'job-ID  prior   name  user  state submit/start at  queue  slots'\necho '-----'\necho '  4242 0.50500 MDA  samson  r  03/12/2019 10:21:01  all.q@n1  16'",
            "echo \"samson has registered the job $1 for deletion\"",
        );
        env
    }

    pub fn reads(&self, names: &[&str]) {
        for name in names {
            fs::write(self.fastq.join(name), "").expect("write read file");
        }
    }

    /// Replace the qsub, qstat and qdel stand-ins with scripts running the given bodies
    pub fn fake_scheduler(&self, qsub: &str, qstat: &str, qdel: &str) {
        write_script(&self.bin.join("qsub"), qsub);
        write_script(&self.bin.join("qstat"), qstat);
        write_script(&self.bin.join("qdel"), qdel);
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ctg-pipeliner").expect("binary built");
        cmd.env("CTG_QSUB", self.bin.join("qsub"))
            .env("CTG_QSTAT", self.bin.join("qstat"))
            .env("CTG_QDEL", self.bin.join("qdel"));
        cmd
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write fake scheduler");
    let mut perms = fs::metadata(path).expect("stat").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}
