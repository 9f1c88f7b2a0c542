use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// Number of leading columns (including the feature id) kept from the first table
const ANNOTATION_COLUMNS: usize = 5;

/// A tab separated `ctg count` table
struct CountsTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_counts(path: &Path) -> Result<CountsTable> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::MissingPath(path.to_path_buf()),
        _ => Error::Io(err),
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_reader(file);

    let header: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if header.is_empty() {
        return Err(Error::Counts { path: path.to_path_buf(), reason: "no header".to_string() });
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(String::from).collect());
    }
    Ok(CountsTable { header, rows })
}

/// Merge the last column of every sample's counts table into one table
///
/// `samples` are (column name, counts file) pairs. The first table also contributes its leading
/// annotation columns. Rows are matched on the first column; ids missing from a table get an
/// empty cell.
pub fn aggregate_counts(samples: &[(String, PathBuf)], out_path: &Path) -> Result<()> {
    let mut ids: Vec<String> = Vec::new();
    let mut annotation_header: Vec<String> = Vec::new();
    let mut annotations: HashMap<String, Vec<String>> = HashMap::new();
    let mut counts: Vec<HashMap<String, String>> = Vec::new();

    for (i, (name, path)) in samples.iter().enumerate() {
        info!("Reading counts for {} from {}", name, path.display());
        let table = read_counts(path)?;
        let n_annotation = table.header.len().min(ANNOTATION_COLUMNS);
        if i == 0 {
            annotation_header = table.header[..n_annotation].to_vec();
        }

        let mut sample: HashMap<String, String> = HashMap::new();
        for row in table.rows {
            let id = row[0].clone();
            if !annotations.contains_key(&id) {
                ids.push(id.clone());
                let values = match i {
                    0 => row[1..n_annotation].to_vec(),
                    _ => vec![String::new(); annotation_header.len().saturating_sub(1)],
                };
                annotations.insert(id.clone(), values);
            }
            sample.insert(id, row[row.len() - 1].clone());
        }
        counts.push(sample);
    }

    info!("Writing aggregated counts to {}", out_path.display());
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(out_path)?;
    let header = annotation_header.iter().cloned().chain(samples.iter().map(|(name, _)| name.clone()));
    writer.write_record(header)?;
    for id in &ids {
        let mut row: Vec<String> = vec![id.clone()];
        row.extend(annotations[id].iter().cloned());
        row.extend(counts.iter().map(|sample| sample.get(id).cloned().unwrap_or_default()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
