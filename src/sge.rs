//! Render SGE job scripts and drive them through qsub, qstat and qdel

/// Build the `#$` directive header and command body of a job script
pub mod script;
/// Submit, poll and kill jobs with the scheduler CLI
pub mod job;
pub mod state;
/// Persist job state as JSON so later invocations can poll or kill
pub mod record;
