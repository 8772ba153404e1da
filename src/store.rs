//! Document store: one JSON record per document, atomic replace on save.
//!
//! ## Why whole-document atomic writes?
//!
//! The pipeline is resumable: a run may be interrupted at any point and
//! re-invoked until zero documents need rewriting. That only works if the
//! persisted state is always a fully-formed, previously-valid record —
//! write-to-temp-then-rename guarantees a reader (or the next run) never
//! observes a torn file, even across crashes mid-save.
//!
//! Records are pretty-printed with a fixed field order so re-saved corpora
//! produce reviewable diffs; the representation is not otherwise
//! load-bearing.

use crate::document::Document;
use crate::error::{DocError, ProbnormError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The pipeline's view of document persistence.
///
/// Load/save errors are [`DocError`]s: one unreadable record must not abort
/// the batch. Only listing failures are fatal — without the id set there is
/// no batch at all.
pub trait DocumentStore: Send + Sync {
    /// All document identifiers, sorted and deduplicated.
    fn list_ids(&self) -> Result<Vec<String>, ProbnormError>;

    fn load(&self, id: &str) -> Result<Document, DocError>;

    /// Persist with atomic-replace semantics.
    fn save(&self, id: &str, doc: &Document) -> Result<(), DocError>;
}

/// A directory of `<id>.json` records.
#[derive(Debug)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open an existing corpus directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProbnormError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProbnormError::StoreRootNotFound { path: root });
        }
        Ok(Self { root })
    }

    /// Create the directory if needed and open it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, ProbnormError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| ProbnormError::StoreListFailed {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl DocumentStore for JsonDirStore {
    fn list_ids(&self) -> Result<Vec<String>, ProbnormError> {
        let entries = fs::read_dir(&self.root).map_err(|source| ProbnormError::StoreListFailed {
            path: self.root.clone(),
            source,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();

        // Sorted + deduplicated: the outcome-set contract holds even if the
        // directory somehow yields a name twice.
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<Document, DocError> {
        let path = self.path_for(id);
        let raw = fs::read_to_string(&path).map_err(|e| DocError::LoadFailed {
            id: id.to_string(),
            detail: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| DocError::LoadFailed {
            id: id.to_string(),
            detail: format!("malformed record: {e}"),
        })
    }

    fn save(&self, id: &str, doc: &Document) -> Result<(), DocError> {
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(doc).map_err(|e| DocError::SaveFailed {
            id: id.to_string(),
            detail: format!("serialize: {e}"),
        })?;

        // Atomic replace: write to temp, then rename.
        fs::write(&tmp, json).map_err(|e| DocError::SaveFailed {
            id: id.to_string(),
            detail: format!("{}: {e}", tmp.display()),
        })?;
        fs::rename(&tmp, &path).map_err(|e| DocError::SaveFailed {
            id: id.to_string(),
            detail: format!("rename to {}: {e}", path.display()),
        })?;

        debug!("saved document {} to {}", id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.into(),
            title: format!("Problem {id}"),
            slug: None,
            difficulty: None,
            tags: vec![],
            description: None,
            snippets: vec![],
            solution_body: Some("<pre>class Solution {}</pre>".into()),
        }
    }

    #[test]
    fn open_rejects_missing_dir() {
        let err = JsonDirStore::open("/definitely/not/a/real/dir").unwrap_err();
        assert!(matches!(err, ProbnormError::StoreRootNotFound { .. }));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();

        store.save("0001", &doc("0001")).unwrap();
        let loaded = store.load("0001").unwrap();
        assert_eq!(loaded.title, "Problem 0001");
        // No temp file left behind.
        assert!(!dir.path().join("0001.json.tmp").exists());
    }

    #[test]
    fn list_ids_sorted_and_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        store.save("0002", &doc("0002")).unwrap();
        store.save("0001", &doc("0001")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        assert_eq!(store.list_ids().unwrap(), vec!["0001", "0002"]);
    }

    #[test]
    fn load_reports_malformed_record_as_doc_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let err = store.load("bad").unwrap_err();
        assert!(matches!(err, DocError::LoadFailed { .. }));
    }

    #[test]
    fn save_replaces_existing_record_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        store.save("1", &doc("1")).unwrap();

        let mut updated = doc("1");
        updated.solution_body = Some("<pre>public class Main {}</pre>".into());
        store.save("1", &updated).unwrap();

        let loaded = store.load("1").unwrap();
        assert_eq!(
            loaded.solution_body.as_deref(),
            Some("<pre>public class Main {}</pre>")
        );
    }
}
