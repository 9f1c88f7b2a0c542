//! Build `ctg count` jobs from grouped read files
//!
//! A [`pipeline::CtgPipeline`] discovers and groups read files, then creates one
//! [`runner::CtgRunner`] per timepoint / replicate group. Every runner owns a job directory
//! holding the SGE script (`job.sh`) and the job state record (`job.json`).

pub mod runner;
pub mod pipeline;
/// Merge per-group count tables into a single table
pub mod counts;
