use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::Result;

pub const SCALARS_FILE: &str = "scalars.jsonl";

/// A single point of a scalar time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub tag: String,
    pub value: f32,
    pub step: u64,
    /// Seconds since the unix epoch.
    pub wall_time: f64,
}

/// Appends scalars as JSON lines to `{dir}/scalars.jsonl`.
#[derive(Debug)]
pub struct ScalarWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ScalarWriter {
    /// Opens (or creates) the scalar log of `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(SCALARS_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_scalar(&mut self, tag: &str, value: f32, step: u64) -> Result<()> {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0., |d| d.as_secs_f64());

        let scalar = Scalar {
            tag: tag.to_string(),
            value,
            step,
            wall_time,
        };

        serde_json::to_writer(&mut self.out, &scalar)?;
        writeln!(self.out)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Reads back every scalar written to `dir`.
pub fn read_scalars(dir: &Path) -> Result<Vec<Scalar>> {
    let file = File::open(dir.join(SCALARS_FILE))?;
    let mut scalars = Vec::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            scalars.push(serde_json::from_str(&line)?);
        }
    }

    Ok(scalars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log/train");

        let mut writer = ScalarWriter::create(&log).unwrap();
        writer.add_scalar("Loss", 0.5, 64).unwrap();
        writer.add_scalar("Accuracy", 0.75, 64).unwrap();
        writer.flush().unwrap();

        let scalars = read_scalars(&log).unwrap();
        assert_eq!(scalars.len(), 2);
        assert_eq!(
            (scalars[0].tag.as_str(), scalars[0].value, scalars[0].step),
            ("Loss", 0.5, 64)
        );
        assert_eq!(scalars[1].tag, "Accuracy");
        assert!(scalars[1].wall_time > 0.);
    }
}
