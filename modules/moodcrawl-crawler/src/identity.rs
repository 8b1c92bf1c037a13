//! Set of post identities already persisted, seeded from existing shards.
//!
//! Membership is keyed by post `id`. A secondary index of post codes lets the
//! frontier walker skip links it already holds without loading the page.

use std::collections::HashSet;
use std::path::Path;

use moodcrawl_common::MoodcrawlError;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct IdentityCache {
    ids: HashSet<String>,
    codes: HashSet<String>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load identities from every `{prefix}*.csv` file in `dir`.
    ///
    /// A missing directory yields an empty cache. A file without an `id`
    /// column, or one that fails to parse, is skipped whole with a warning.
    pub fn load(dir: &Path, prefix: &str) -> Result<Self, MoodcrawlError> {
        let mut cache = Self::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "No output directory yet, starting with empty identity cache");
                return Ok(cache);
            }
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".csv"))
            })
            .collect();
        files.sort();

        let mut loaded_files = 0usize;
        for path in &files {
            match read_identities(path) {
                Ok((ids, codes)) => {
                    cache.ids.extend(ids);
                    cache.codes.extend(codes);
                    loaded_files += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unreadable shard");
                }
            }
        }

        info!(
            files = loaded_files,
            skipped = files.len() - loaded_files,
            ids = cache.ids.len(),
            "Identity cache loaded"
        );
        Ok(cache)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an accepted post. Returns false if the id was already known.
    pub fn add(&mut self, id: &str, code: &str) -> bool {
        if !code.is_empty() {
            self.codes.insert(code.to_string());
        }
        self.ids.insert(id.to_string())
    }

    /// Whether a post with this code has been persisted before.
    pub fn knows_code(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn read_identities(path: &Path) -> Result<(Vec<String>, Vec<String>), MoodcrawlError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_col = headers
        .iter()
        .position(|h| h.trim() == "id")
        .ok_or_else(|| MoodcrawlError::Persistence("no `id` column".to_string()))?;
    let code_col = headers.iter().position(|h| h.trim() == "code");

    let mut ids = Vec::new();
    let mut codes = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(id) = row.get(id_col).map(str::trim).filter(|s| !s.is_empty()) {
            ids.push(id.to_string());
        }
        if let Some(code) = code_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            codes.push(code.to_string());
        }
    }
    Ok((ids, codes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = IdentityCache::load(&tmp.path().join("nope"), "threads_").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn loads_ids_and_codes_from_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "threads_a.csv", "id,text,code\n1,hi,C1\n2,yo,C2\n");
        write(tmp.path(), "threads_b.csv", "code,id\nC3,3\n");
        write(tmp.path(), "other.csv", "id\n99\n");
        write(tmp.path(), "threads_c.txt", "id\n98\n");

        let cache = IdentityCache::load(tmp.path(), "threads_").unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("1") && cache.contains("3"));
        assert!(!cache.contains("99"));
        assert!(cache.knows_code("C2"));
    }

    #[test]
    fn file_without_id_column_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "threads_bad.csv", "name,text\nx,y\n");
        write(tmp.path(), "threads_good.csv", "id\n7\n");

        let cache = IdentityCache::load(tmp.path(), "threads_").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("7"));
    }

    #[test]
    fn malformed_rows_skip_the_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "threads_ragged.csv", "id,text\n1,a\n2,b,extra\n");

        let cache = IdentityCache::load(tmp.path(), "threads_").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn reloading_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "threads_a.csv", "id\n1\n2\n2\n");

        let first = IdentityCache::load(tmp.path(), "threads_").unwrap();
        let second = IdentityCache::load(tmp.path(), "threads_").unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn add_reports_novelty() {
        let mut cache = IdentityCache::new();
        assert!(cache.add("1", "C1"));
        assert!(!cache.add("1", "C1"));
        assert!(cache.knows_code("C1"));
        assert_eq!(cache.len(), 1);
    }
}
