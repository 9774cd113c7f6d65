//! Cross-project registry of managed workflows.
//!
//! One JSON document (`{"workflows": [...]}`) loaded, mutated and saved as a
//! whole. Entries are identified by `(slug, projectPath)`. The registry is a
//! convenience index that can be rebuilt from manifests, so a corrupt file
//! is treated as an empty registry rather than an error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::timestamp;

/// A pointer from the registry to one project's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub slug: String,
    pub project_path: String,
    pub manifest_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Stamped on every upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    pub fn new(
        slug: impl Into<String>,
        project_path: impl Into<String>,
        manifest_path: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            project_path: project_path.into(),
            manifest_path: manifest_path.into(),
            workflow_id: None,
            last_synced_at: None,
        }
    }

    pub fn with_workflow_id(mut self, id: impl Into<String>) -> Self {
        self.workflow_id = Some(id.into());
        self
    }

    fn matches(&self, slug: &str, project_path: &str) -> bool {
        self.slug == slug && self.project_path == project_path
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    workflows: Vec<RegistryEntry>,
}

/// Registry backed by a JSON file.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries. A missing or corrupt file yields an empty list.
    pub async fn list(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.load().await?.workflows)
    }

    /// Insert or replace the entry with the same `(slug, projectPath)`.
    pub async fn upsert(&self, mut entry: RegistryEntry) -> Result<RegistryEntry> {
        let mut doc = self.load().await?;
        entry.last_synced_at = Some(timestamp::now());

        match doc
            .workflows
            .iter_mut()
            .find(|e| e.matches(&entry.slug, &entry.project_path))
        {
            Some(existing) => *existing = entry.clone(),
            None => doc.workflows.push(entry.clone()),
        }

        self.save(&doc).await?;
        debug!(
            "Registry upsert '{}' ({})",
            entry.slug, entry.project_path
        );
        Ok(entry)
    }

    /// Remove an entry. Returns false when nothing matched.
    pub async fn remove(&self, slug: &str, project_path: &str) -> Result<bool> {
        let mut doc = self.load().await?;
        let before = doc.workflows.len();
        doc.workflows.retain(|e| !e.matches(slug, project_path));

        if doc.workflows.len() == before {
            return Ok(false);
        }

        self.save(&doc).await?;
        info!("Removed registry entry '{}' ({})", slug, project_path);
        Ok(true)
    }

    /// Set the remote id of an existing entry.
    ///
    /// Unlike [`upsert`](Self::upsert) this never creates an entry: when no
    /// entry matches, nothing is written and `false` is returned.
    pub async fn update_workflow_id(
        &self,
        slug: &str,
        project_path: &str,
        workflow_id: &str,
    ) -> Result<bool> {
        let mut doc = self.load().await?;
        let Some(entry) = doc
            .workflows
            .iter_mut()
            .find(|e| e.matches(slug, project_path))
        else {
            return Ok(false);
        };

        entry.workflow_id = Some(workflow_id.to_string());
        self.save(&doc).await?;
        Ok(true)
    }

    pub async fn get(&self, slug: &str, project_path: &str) -> Result<Option<RegistryEntry>> {
        Ok(self
            .load()
            .await?
            .workflows
            .into_iter()
            .find(|e| e.matches(slug, project_path)))
    }

    pub async fn list_by_project(&self, project_path: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .load()
            .await?
            .workflows
            .into_iter()
            .filter(|e| e.project_path == project_path)
            .collect())
    }

    /// First entry pointing at a remote workflow id.
    pub async fn find_by_workflow_id(&self, workflow_id: &str) -> Result<Option<RegistryEntry>> {
        Ok(self
            .load()
            .await?
            .workflows
            .into_iter()
            .find(|e| e.workflow_id.as_deref() == Some(workflow_id)))
    }

    async fn load(&self) -> Result<RegistryDocument> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RegistryDocument::default())
            }
            Err(e) => {
                return Err(Error::file(format!(
                    "Failed to read registry {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str(&content) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(
                    "Registry {} is corrupt, starting fresh: {}",
                    self.path.display(),
                    e
                );
                Ok(RegistryDocument::default())
            }
        }
    }

    async fn save(&self, doc: &RegistryDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::file(format!("Failed to create directory: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&self.path, content).await.map_err(|e| {
            Error::file(format!(
                "Failed to write registry {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> RegistryStore {
        RegistryStore::new(dir.path().join("registry.json"))
    }

    fn entry(slug: &str, project: &str) -> RegistryEntry {
        RegistryEntry::new(
            slug,
            project,
            format!("{}/workflows/{}.cron8n.json", project, slug),
        )
    }

    #[tokio::test]
    async fn test_upsert_stamps_last_synced_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert(entry("daily-backup", "/proj")).await.unwrap();

        let found = store.get("daily-backup", "/proj").await.unwrap().unwrap();
        assert!(found.last_synced_at.is_some());
        assert!(found.workflow_id.is_none());
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert(entry("daily-backup", "/proj")).await.unwrap();
        store
            .upsert(entry("daily-backup", "/proj").with_workflow_id("wf-2"))
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].workflow_id.as_deref(), Some("wf-2"));
    }

    #[tokio::test]
    async fn test_same_slug_in_other_project_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert(entry("report", "/a")).await.unwrap();
        store.upsert(entry("report", "/b")).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.list_by_project("/a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.upsert(entry("one", "/p")).await.unwrap();
        store.upsert(entry("two", "/p")).await.unwrap();

        assert!(!store.remove("missing", "/p").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 2);

        assert!(store.remove("one", "/p").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.get("one", "/p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_workflow_id_does_not_create_entries() {
        // Known asymmetry: upsert creates, update_workflow_id does not
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(!store
            .update_workflow_id("ghost", "/p", "wf-1")
            .await
            .unwrap());
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.path().exists());

        store.upsert(entry("real", "/p")).await.unwrap();
        assert!(store.update_workflow_id("real", "/p", "wf-9").await.unwrap());
        assert_eq!(
            store.get("real", "/p").await.unwrap().unwrap().workflow_id.as_deref(),
            Some("wf-9")
        );
    }

    #[tokio::test]
    async fn test_find_by_workflow_id_returns_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .upsert(entry("a", "/p1").with_workflow_id("dup"))
            .await
            .unwrap();
        store
            .upsert(entry("b", "/p2").with_workflow_id("dup"))
            .await
            .unwrap();

        let found = store.find_by_workflow_id("dup").await.unwrap().unwrap();
        assert_eq!(found.slug, "a");
        assert!(store.find_by_workflow_id("none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "[[[").unwrap();

        assert!(store.list().await.unwrap().is_empty());

        // The next write starts a fresh document
        store.upsert(entry("fresh", "/p")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
