//! Iteration journal: JSONL append-only record of every trading cycle.
//!
//! Each line is one [`IterationReport`]. The journal is written for humans
//! and tooling; the bot never replays it.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tradebot_core::engine::IterationReport;

pub struct IterationJournal {
    path: PathBuf,
}

impl IterationJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one report, creating the file and its parent directory.
    pub fn append(&self, report: &IterationReport) -> io::Result<()> {
        let json = serde_json::to_string(report)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Every readable report, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<IterationReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut reports = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IterationReport>(&line) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(line = i + 1, error = %e, "skipping malformed journal line"),
            }
        }
        Ok(reports)
    }

    /// The last `n` reports.
    pub fn tail(&self, n: usize) -> io::Result<Vec<IterationReport>> {
        let mut all = self.read_all()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
