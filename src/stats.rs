/*! Filtering statistics

Statistics documents are plain serializable structs, saved as pretty JSON next to the dataset they describe:
`path/to/corpus.en.zst` gets its statistics in `path/to/corpus.en.stats.json`.
!*/
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::error::Error;

/// Counts of a single filtering step.
///
/// Only two of the three values need to be kept up to date, the last one is derived
/// when calling [Statistics::update_derived_data].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilteringStep {
    pub description: String,
    pub filtered: u64,
    pub kept: u64,
    pub visited: u64,
}

impl FilteringStep {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }
}

/// A single counted value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountingStep {
    pub description: String,
    pub value: u64,
}

impl CountingStep {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            value: 0,
        }
    }
}

/// Path of the statistics file of a dataset: `<parent>/<stem>.stats.json`.
pub fn stats_path(dataset_path: &Path) -> PathBuf {
    let stem = dataset_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = dataset_path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}.stats.json", stem))
}

pub trait Statistics: Serialize {
    /// Update any derived data before serialization.
    fn update_derived_data(&mut self) {}

    /// Saves the statistics to `<parent>/<stem>.stats.json` and returns that path.
    fn save_json(&mut self, dataset_path: &Path) -> Result<PathBuf, Error> {
        self.update_derived_data();
        let path = stats_path(dataset_path);
        debug!("saving statistics to {:?}", path);

        let mut w = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut w, &*self)?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(path)
    }
}

impl Statistics for FilteringStep {
    fn update_derived_data(&mut self) {
        if self.visited == 0 {
            self.visited = self.filtered + self.kept;
        } else if self.filtered != 0 && self.kept == 0 {
            self.kept = self.visited - self.filtered;
        } else if self.kept != 0 && self.filtered == 0 {
            self.filtered = self.visited - self.kept;
        }
    }
}

impl Statistics for CountingStep {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_visited() {
        let mut step = FilteringStep::new("step");
        step.filtered = 2;
        step.kept = 5;
        step.update_derived_data();
        assert_eq!(step.visited, 7);
    }

    #[test]
    fn derive_filtered() {
        let mut step = FilteringStep::new("step");
        step.visited = 17;
        step.kept = 10;
        step.update_derived_data();
        assert_eq!(step.filtered, 7);

        let mut step = FilteringStep::new("step");
        step.visited = 17;
        step.filtered = 7;
        step.update_derived_data();
        assert_eq!(step.kept, 10);
    }

    #[test]
    fn paths() {
        assert_eq!(
            stats_path(Path::new("artifacts/mono.ca.zst")),
            PathBuf::from("artifacts/mono.ca.stats.json")
        );
        assert_eq!(
            stats_path(Path::new("artifacts/corpus")),
            PathBuf::from("artifacts/corpus.stats.json")
        );
    }

    #[test]
    fn save() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = FilteringStep::new("The step");
        step.kept = 3;
        let path = step.save_json(&dir.path().join("data.en.zst")).unwrap();

        assert_eq!(path, dir.path().join("data.en.stats.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"description": "The step", "filtered": 0, "kept": 3, "visited": 3})
        );
    }
}
