//! Buffers accepted records and persists them as numbered CSV shards.
//!
//! Shards are named `{prefix}_shard{N}_{unix_seconds}.csv`. Each one is
//! written to a hidden `.partial` file first and renamed into place once
//! complete, so the identity loader never sees a half-written shard.

use std::path::{Path, PathBuf};

use moodcrawl_common::{MoodcrawlError, PostRecord};
use tracing::{info, warn};

pub struct ShardWriter {
    dir: PathBuf,
    prefix: String,
    threshold: usize,
    buffer: Vec<PostRecord>,
    next_index: u64,
    shards_written: usize,
}

impl ShardWriter {
    /// Open a writer over `dir`, continuing the shard numbering found there.
    pub fn resume(dir: &Path, prefix: &str, threshold: usize) -> Result<Self, MoodcrawlError> {
        if threshold == 0 {
            return Err(MoodcrawlError::Config("shard threshold must be positive".into()));
        }
        std::fs::create_dir_all(dir)?;

        let last = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|n| shard_index(n, prefix)))
            .max()
            .unwrap_or(0);

        if last > 0 {
            info!(dir = %dir.display(), last_shard = last, "Resuming shard numbering");
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            threshold,
            buffer: Vec::with_capacity(threshold),
            next_index: last + 1,
            shards_written: 0,
        })
    }

    /// Buffer a record. Persists and clears the buffer once it reaches the
    /// threshold, returning the new shard's path.
    pub fn append(&mut self, record: PostRecord) -> Result<Option<PathBuf>, MoodcrawlError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            return self.write_shard().map(Some);
        }
        Ok(None)
    }

    /// Persist whatever is buffered. No-op on an empty buffer.
    pub fn flush(&mut self) -> Result<Option<PathBuf>, MoodcrawlError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.write_shard().map(Some)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn shards_written(&self) -> usize {
        self.shards_written
    }

    fn write_shard(&mut self) -> Result<PathBuf, MoodcrawlError> {
        let name = format!(
            "{}_shard{}_{}.csv",
            self.prefix,
            self.next_index,
            chrono::Utc::now().timestamp()
        );
        let final_path = self.dir.join(&name);
        let partial_path = self.dir.join(format!(".{name}.partial"));

        if let Err(e) = self.write_rows(&partial_path) {
            if let Err(cleanup) = std::fs::remove_file(&partial_path) {
                warn!(file = %partial_path.display(), error = %cleanup, "Failed to remove partial shard");
            }
            return Err(MoodcrawlError::Persistence(format!(
                "writing {}: {e}",
                final_path.display()
            )));
        }
        std::fs::rename(&partial_path, &final_path)?;

        info!(
            shard = self.next_index,
            rows = self.buffer.len(),
            file = %final_path.display(),
            "Saved shard"
        );
        self.buffer.clear();
        self.next_index += 1;
        self.shards_written += 1;
        Ok(final_path)
    }

    fn write_rows(&self, path: &Path) -> Result<(), MoodcrawlError> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.buffer {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// `N` from `{prefix}_shard{N}_...csv`.
fn shard_index(file_name: &str, prefix: &str) -> Option<u64> {
    let rest = file_name
        .strip_prefix(prefix)?
        .strip_prefix("_shard")?;
    if !file_name.ends_with(".csv") {
        return None;
    }
    let digits: &str = rest.split('_').next()?;
    digits.parse().ok()
}
