//! Records that could not be delivered yet.
//!
//! The backlog lives in memory while the session runs and is appended to a
//! JSON-lines file on shutdown. The next session loads and removes that file.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::models::Log;

#[derive(Debug)]
pub(crate) struct Backlog {
    entries: VecDeque<Log>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl Backlog {
    pub fn new(capacity: usize, path: Option<PathBuf>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            path,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append records, oldest first. Returns how many had to be discarded
    /// because the backlog is full; the oldest records go first.
    pub fn push(&mut self, logs: Vec<Log>) -> usize {
        self.entries.extend(logs);
        let overflow = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..overflow);
        overflow
    }

    /// Put records back at the front after a failed retry.
    pub fn requeue(&mut self, logs: Vec<Log>) -> usize {
        for log in logs.into_iter().rev() {
            self.entries.push_front(log);
        }
        let overflow = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..overflow);
        overflow
    }

    /// Remove up to `max` of the oldest records.
    pub fn take(&mut self, max: usize) -> Vec<Log> {
        let count = max.min(self.entries.len());
        self.entries.drain(..count).collect()
    }

    /// Load records persisted by an earlier session and delete the file.
    ///
    /// Unparseable lines are skipped. Returns the number of records loaded.
    pub fn load(&mut self) -> std::io::Result<usize> {
        let Some(path) = self.path.clone() else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }

        let file = std::fs::File::open(&path)?;
        let mut loaded = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Log>(&line) {
                Ok(log) => loaded.push(log),
                Err(e) => tracing::debug!(error = %e, "Skipping unreadable backlog line"),
            }
        }
        std::fs::remove_file(&path)?;

        let count = loaded.len();
        self.requeue(loaded);
        Ok(count)
    }

    /// Append every remaining record to the backlog file and clear the backlog.
    ///
    /// Without a configured path the records stay in memory and `Ok(0)` is returned.
    pub fn persist(&mut self) -> std::io::Result<usize> {
        let Some(path) = self.path.clone() else {
            return Ok(0);
        };
        if self.entries.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut written = 0;
        for log in &self.entries {
            let line = serde_json::to_string(log).map_err(std::io::Error::other)?;
            writeln!(file, "{line}")?;
            written += 1;
        }
        file.flush()?;
        self.entries.clear();
        Ok(written)
    }
}
