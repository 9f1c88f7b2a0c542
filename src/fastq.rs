//! Find paired-end FASTQ files and sort them into timepoint / replicate groups

/// Glob for read files in the FASTQ directory
pub mod discover;
pub mod read;
/// Partition file names into groups and check R1 / R2 pairing
pub mod group;
/// Write small gzipped subsets of read files for test runs
pub mod subset;
