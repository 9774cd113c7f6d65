//! Per-workflow manifests and workflow definition files.
//!
//! Every managed workflow lives in `<project>/workflows/` as a pair:
//! `<slug>.json` (the n8n document) and `<slug>.cron8n.json` (the manifest).
//! Archived pairs move to `workflows/archived/` under a timestamped name.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::slug::is_valid_slug;
use crate::timestamp;
use crate::workflow::{management_tags, parse_workflow_file, Workflow};

pub const WORKFLOWS_DIR: &str = "workflows";
pub const ARCHIVE_DIR: &str = "archived";
pub const MANIFEST_SUFFIX: &str = ".cron8n.json";

/// Local record of one managed workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Template the workflow was generated from, `imported` for imports
    pub template: String,
    pub cron_expression: String,
    pub timezone: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deployed_workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deployed_at: Option<DateTime<Utc>>,
}

impl Manifest {
    pub fn is_deployed(&self) -> bool {
        self.last_deployed_workflow_id.is_some()
    }

    /// Structural checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_slug(&self.slug) {
            return Err(Error::validation(format!("Invalid slug '{}'", self.slug)));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("Manifest name is empty"));
        }
        if self.cron_expression.trim().is_empty() {
            return Err(Error::validation("Manifest cron expression is empty"));
        }
        if self.timezone.trim().is_empty() {
            return Err(Error::validation("Manifest timezone is empty"));
        }
        if self.tags != management_tags(&self.slug) {
            return Err(Error::validation(format!(
                "Manifest tags must be {:?}",
                management_tags(&self.slug)
            )));
        }
        Ok(())
    }
}

/// A manifest moved to the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedManifest {
    #[serde(flatten)]
    pub manifest: Manifest,
    pub archived_at: DateTime<Utc>,
    /// Manifest path before archiving
    pub archived_from: String,
}

/// Where an archived pair ended up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedPaths {
    pub manifest: PathBuf,
    pub workflow: Option<PathBuf>,
}

/// Manifest and workflow files for one project directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    project_root: PathBuf,
}

impl ManifestStore {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.project_root.join(WORKFLOWS_DIR)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.workflows_dir().join(ARCHIVE_DIR)
    }

    pub fn manifest_path(&self, slug: &str) -> PathBuf {
        self.workflows_dir().join(format!("{}{}", slug, MANIFEST_SUFFIX))
    }

    pub fn workflow_path(&self, slug: &str) -> PathBuf {
        self.workflows_dir().join(format!("{}.json", slug))
    }

    /// A fresh, undeployed manifest. Nothing is written.
    pub fn create(
        &self,
        slug: &str,
        name: &str,
        template: &str,
        cron_expression: &str,
        timezone: &str,
    ) -> Manifest {
        let now = timestamp::now();
        Manifest {
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            template: template.to_string(),
            cron_expression: cron_expression.to_string(),
            timezone: timezone.to_string(),
            tags: management_tags(slug),
            last_deployed_workflow_id: None,
            last_deployed_at: None,
        }
    }

    /// Load and validate one manifest. Missing or invalid files are errors.
    pub async fn load(&self, slug: &str) -> Result<Manifest> {
        let path = self.manifest_path(slug);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file(format!("Manifest not found for '{}'", slug))
                    .with_hint("Run 'cron8n list' to see local workflows")
            } else {
                Error::file(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;

        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            Error::file(format!("Invalid manifest {}: {}", path.display(), e))
        })?;
        manifest.validate().map_err(|e| {
            Error::file(format!("Invalid manifest {}: {}", path.display(), e))
        })?;
        if manifest.slug != slug {
            return Err(Error::file(format!(
                "Manifest {} declares slug '{}'",
                path.display(),
                manifest.slug
            ))
            .with_hint(format!("Rename the file or set \"slug\" to \"{}\"", slug)));
        }
        Ok(manifest)
    }

    /// Overwrite the manifest file.
    pub async fn save(&self, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path(&manifest.slug);
        write_json(&path, manifest).await?;
        debug!("Saved manifest {}", path.display());
        Ok(())
    }

    pub async fn exists(&self, slug: &str) -> bool {
        tokio::fs::try_exists(self.manifest_path(slug))
            .await
            .unwrap_or(false)
    }

    /// Record a successful deploy.
    pub async fn update_deployment(&self, slug: &str, workflow_id: &str) -> Result<Manifest> {
        let mut manifest = self.load(slug).await?;
        let now = timestamp::now();
        manifest.last_deployed_workflow_id = Some(workflow_id.to_string());
        manifest.last_deployed_at = Some(now);
        manifest.updated_at = now;
        self.save(&manifest).await?;
        info!("Recorded deployment of '{}' as workflow {}", slug, workflow_id);
        Ok(manifest)
    }

    /// Slugs of all manifests in the workflows directory, sorted.
    pub async fn list_slugs(&self) -> Result<Vec<String>> {
        let dir = self.workflows_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::file(format!(
                    "Failed to read {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut slugs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(slug) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(MANIFEST_SUFFIX))
            {
                slugs.push(slug.to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    /// Every loadable manifest. Corrupt ones are skipped.
    pub async fn list_all(&self) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for slug in self.list_slugs().await? {
            match self.load(&slug).await {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!("Skipping manifest '{}': {}", slug, e),
            }
        }
        Ok(manifests)
    }

    pub async fn load_workflow(&self, slug: &str) -> Result<Workflow> {
        parse_workflow_file(&self.workflow_path(slug)).await
    }

    pub async fn save_workflow(&self, slug: &str, workflow: &Workflow) -> Result<()> {
        let path = self.workflow_path(slug);
        write_json(&path, workflow).await?;
        debug!("Saved workflow {}", path.display());
        Ok(())
    }

    /// Move a workflow pair into the archive.
    ///
    /// The archive copies are written before the originals are removed; an
    /// interruption in between leaves both in place.
    pub async fn archive(&self, slug: &str) -> Result<ArchivedPaths> {
        let manifest = self.load(slug).await?;
        let archived_at = timestamp::now();
        let stamp = timestamp::file_stamp(archived_at);
        let archive_dir = self.archive_dir();

        let manifest_path = self.manifest_path(slug);
        let workflow_path = self.workflow_path(slug);

        let archived_workflow = match tokio::fs::read_to_string(&workflow_path).await {
            Ok(content) => {
                let target = archive_dir.join(format!("{}.{}.json", slug, stamp));
                write_file(&target, &content).await?;
                Some(target)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No workflow file for '{}', archiving manifest only", slug);
                None
            }
            Err(e) => {
                return Err(Error::file(format!(
                    "Failed to read {}: {}",
                    workflow_path.display(),
                    e
                )))
            }
        };

        let archived = ArchivedManifest {
            manifest,
            archived_at,
            archived_from: manifest_path.display().to_string(),
        };
        let archived_manifest = archive_dir.join(format!("{}.{}{}", slug, stamp, MANIFEST_SUFFIX));
        write_json(&archived_manifest, &archived).await?;

        if archived_workflow.is_some() {
            tokio::fs::remove_file(&workflow_path).await?;
        }
        tokio::fs::remove_file(&manifest_path).await?;

        info!("Archived '{}' to {}", slug, archive_dir.display());
        Ok(ArchivedPaths {
            manifest: archived_manifest,
            workflow: archived_workflow,
        })
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_file(path, &content).await
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::file(format!("Failed to create {}: {}", parent.display(), e)))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::file(format!("Failed to write {}: {}", path.display(), e)))
}
