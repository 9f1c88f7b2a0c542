use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::Result;
use crate::sge::script::SgeJob;

impl SgeJob {
    /// Serialise job state as a four-space indented JSON document
    pub fn to_json(&self) -> Result<String> {
        let mut buf: Vec<u8> = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_json(&self, out_path: &Path) -> Result<()> {
        info!("Writing job state to {}", out_path.display());
        fs::write(out_path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<SgeJob> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: &Path) -> Result<SgeJob> {
        info!("Reading job state from {}", path.display());
        let json = fs::read_to_string(path)?;
        SgeJob::from_json_str(&json)
    }
}
