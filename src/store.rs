use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;

/// Gmail message IDs that already produced a spreadsheet row.
///
/// Written as a sorted JSON array so the file diffs cleanly between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedIds {
    ids: BTreeSet<String>,
}

/// Accepted on-disk layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIds {
    List(Vec<String>),
    /// `{"processed_ids": [...]}` as written by earlier versions of the tool
    Legacy { processed_ids: Vec<String> },
}

impl ProcessedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the set from `path`.
    ///
    /// A missing, empty or unreadable file yields an empty set: the worst
    /// outcome is re-appending rows for mail that is still unread.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No processed-IDs file at {:?}, starting with an empty set", path);
                return Self::new();
            }
            Err(e) => {
                warn!("⚠️  Unable to read {:?} ({}), starting with an empty set", path, e);
                return Self::new();
            }
        };

        if content.trim().is_empty() {
            debug!("{:?} is empty", path);
            return Self::new();
        }

        match serde_json::from_str::<StoredIds>(&content) {
            Ok(StoredIds::List(ids)) | Ok(StoredIds::Legacy { processed_ids: ids }) => {
                let set: Self = ids.into_iter().collect();
                debug!("Loaded {} processed ID(s) from {:?}", set.len(), path);
                set
            }
            Err(e) => {
                warn!("⚠️  {:?} is not a valid processed-IDs file ({}), starting with an empty set", path, e);
                Self::new()
            }
        }
    }

    /// Rewrite `path` with the whole set.
    ///
    /// The content goes to a sibling temp file first and is renamed over the
    /// target, so an interrupted save never leaves a truncated file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Unable to create directory {:?}", dir))?;

        let ids: Vec<&String> = self.ids.iter().collect();
        let json = serde_json::to_string_pretty(&ids).context("Unable to serialize processed IDs")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Unable to create temporary file in {:?}", dir))?;
        writeln!(tmp, "{}", json).context("Unable to write processed IDs")?;
        tmp.as_file().sync_all().context("Unable to flush processed IDs")?;
        tmp.persist(path)
            .with_context(|| format!("Unable to replace {:?}", path))?;

        debug!("Saved {} processed ID(s) to {:?}", self.ids.len(), path);
        Ok(())
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.ids.contains(message_id)
    }

    /// Returns false when the ID was already present.
    pub fn insert(&mut self, message_id: impl Into<String>) -> bool {
        self.ids.insert(message_id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessedIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ProcessedIds {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
