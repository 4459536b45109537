//! Recorded job history reader.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::job::JobRecord;

/// Loads job records from a JSON file or from a directory of `.json` files.
pub struct HistoryReader {
    path: PathBuf,
}

impl HistoryReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn read(&self) -> Result<Vec<JobRecord>> {
        if self.path.is_dir() {
            self.read_dir()
        } else {
            Self::read_file(&self.path)
        }
    }

    fn read_dir(&self) -> Result<Vec<JobRecord>> {
        let pattern = format!("{}/*.json", self.path.display());
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            records.extend(Self::read_file(&path)?);
        }

        Ok(records)
    }

    fn read_file(path: &Path) -> Result<Vec<JobRecord>> {
        let contents = std::fs::read_to_string(path)?;

        parse_history(&contents)
    }
}

/// Parses a history document: either one JSON array of records, or one
/// record per line. In line mode, anything outside the outermost braces of
/// a line (array brackets, separating commas) is ignored.
pub fn parse_history(contents: &str) -> Result<Vec<JobRecord>> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(records) = serde_json::from_str::<Vec<JobRecord>>(trimmed) {
        return Ok(records);
    }

    let mut records = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() || line == "[" || line == "]" {
            continue;
        }

        let start = line
            .find('{')
            .ok_or_else(|| anyhow!("Record start ('{{') not found in line: {}", line))?;
        let end = line
            .rfind('}')
            .ok_or_else(|| anyhow!("Record end ('}}') not found in line: {}", line))?
            + 1;

        let record: JobRecord = serde_json::from_str(&line[start..end])?;
        records.push(record);
    }

    Ok(records)
}
