//! Command layer shared by the CLI and the web UI.
//!
//! A [`Workspace`] ties together the stores of one project directory, the
//! cross-project registry and the auth store. Multi-step operations run
//! strictly in sequence; a failure part-way leaves earlier steps in place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{mask_secret, AuthCredentials, AuthMode, AuthStore};
use crate::client::{ListWorkflowsOptions, N8nClient};
use crate::cron::{parse_cron, validate_cron, validate_timezone, CronCheck};
use crate::error::{Error, Result};
use crate::manifest::{ArchivedPaths, Manifest, ManifestStore};
use crate::registry::{RegistryEntry, RegistryStore};
use crate::slug::{create_slug, create_unique_slug, is_valid_slug};
use crate::templates::{build_workflow, TemplateInput, TemplateKind};
use crate::timestamp;
use crate::workflow::{analyze_workflow, group_workflows, set_schedule, GroupedWorkflows, WorkflowAnalysis};

/// Template name recorded for imported workflows.
pub const IMPORTED_TEMPLATE: &str = "imported";

/// Input for [`Workspace::create`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRequest {
    pub name: String,
    pub template: TemplateKind,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub code: Option<String>,
    /// Append a random suffix to the slug
    pub unique: bool,
}

/// Input for [`Workspace::edit`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditRequest {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub timezone: Option<String>,
}

impl EditRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.cron_expression.is_none() && self.timezone.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub manifest: Manifest,
    pub workflow_id: String,
    /// False when an existing remote workflow was updated
    pub created: bool,
    pub activated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    pub paths: ArchivedPaths,
    pub deactivated: bool,
    pub registry_removed: bool,
}

/// Local and remote view of one workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub manifest: Manifest,
    pub schedule: CronCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<WorkflowAnalysis>,
    /// Why the remote side could not be shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    /// Masked secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    pub project_path: String,
    pub default_timezone: String,
}

/// Stores for one project directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    project_root: PathBuf,
    manifests: ManifestStore,
    registry: RegistryStore,
    auth: AuthStore,
    default_timezone: String,
}

impl Workspace {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: RegistryStore,
        auth: AuthStore,
        default_timezone: impl Into<String>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            manifests: ManifestStore::new(&project_root),
            project_root,
            registry,
            auth,
            default_timezone: default_timezone.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn default_timezone(&self) -> &str {
        &self.default_timezone
    }

    fn project_key(&self) -> String {
        self.project_root.display().to_string()
    }

    fn registry_entry(&self, slug: &str) -> RegistryEntry {
        RegistryEntry::new(
            slug,
            self.project_key(),
            self.manifests.manifest_path(slug).display().to_string(),
        )
    }

    /// Client for the stored credentials; an auth error when logged out.
    pub async fn client(&self) -> Result<N8nClient> {
        let credentials = self.auth.require().await?;
        N8nClient::new(&credentials)
    }

    // -- auth -------------------------------------------------------------

    /// Store credentials, verifying them against the server first unless
    /// `skip_verify` is set.
    pub async fn login(
        &self,
        base_url: &str,
        mode: AuthMode,
        secret: &str,
        skip_verify: bool,
    ) -> Result<AuthCredentials> {
        let credentials = AuthCredentials::new(base_url, mode, secret)?;
        if !skip_verify {
            let client = N8nClient::new(&credentials)?;
            if !client.test_connection().await {
                return Err(Error::auth(format!(
                    "Could not authenticate against {}",
                    credentials.base_url
                ))
                .with_hint("Check the URL and secret, or pass --skip-verify"));
            }
        }
        self.auth.save(&credentials).await?;
        info!("Logged in to {}", credentials.base_url);
        Ok(credentials)
    }

    pub async fn logout(&self) -> Result<bool> {
        self.auth.clear().await
    }

    pub async fn status(&self, check_connection: bool) -> Result<AuthStatus> {
        let credentials = self.auth.credentials().await?;
        let connected = match (&credentials, check_connection) {
            (Some(creds), true) => Some(N8nClient::new(creds)?.test_connection().await),
            _ => None,
        };

        Ok(AuthStatus {
            authenticated: credentials.is_some(),
            base_url: credentials.as_ref().map(|c| c.base_url.clone()),
            auth_mode: credentials.as_ref().map(|c| c.auth_mode),
            secret: credentials.as_ref().map(|c| mask_secret(&c.secret)),
            connected,
            project_path: self.project_key(),
            default_timezone: self.default_timezone.clone(),
        })
    }

    // -- local lifecycle ---------------------------------------------------

    /// Generate a workflow from a template and record it locally.
    pub async fn create(&self, request: &CreateRequest) -> Result<Manifest> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Workflow name is required").with_hint("Pass --name"));
        }

        let timezone = self.resolve_timezone(request.timezone.as_deref())?;
        validate_cron(&request.cron_expression, Some(&timezone))?;
        let slug = self.choose_slug(request)?;

        if self.manifests.exists(&slug).await {
            return Err(Error::validation(format!("Workflow '{}' already exists", slug))
                .with_hint("Choose another --slug or pass --unique"));
        }

        let input = TemplateInput {
            name: name.to_string(),
            cron_expression: request.cron_expression.trim().to_string(),
            timezone: timezone.clone(),
            url: request.url.clone(),
            code: request.code.clone(),
        };
        let workflow = build_workflow(request.template, &input)?;

        let manifest = self.manifests.create(
            &slug,
            name,
            request.template.name(),
            &input.cron_expression,
            &timezone,
        );
        self.manifests.save_workflow(&slug, &workflow).await?;
        self.manifests.save(&manifest).await?;
        self.registry.upsert(self.registry_entry(&slug)).await?;

        info!("Created workflow '{}' from template {}", slug, request.template);
        Ok(manifest)
    }

    fn choose_slug(&self, request: &CreateRequest) -> Result<String> {
        let base = match request.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => {
                if !is_valid_slug(explicit) {
                    return Err(Error::validation(format!("Invalid slug '{}'", explicit))
                        .with_hint("Use lowercase letters, digits and single hyphens"));
                }
                explicit.to_string()
            }
            None => create_slug(&request.name),
        };

        if base.is_empty() {
            return Err(Error::validation(format!(
                "Could not derive a slug from '{}'",
                request.name
            ))
            .with_hint("Pass --slug"));
        }

        Ok(if request.unique {
            create_unique_slug(&base)
        } else {
            base
        })
    }

    fn resolve_timezone(&self, requested: Option<&str>) -> Result<String> {
        let timezone = requested
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(&self.default_timezone);
        validate_timezone(timezone)?;
        Ok(timezone.to_string())
    }

    /// Change name and/or schedule of a local workflow.
    pub async fn edit(&self, slug: &str, changes: &EditRequest) -> Result<Manifest> {
        if changes.is_empty() {
            return Err(Error::validation("Nothing to change")
                .with_hint("Pass --name, --cron or --timezone"));
        }

        let mut manifest = self.manifests.load(slug).await?;
        let mut workflow = self.manifests.load_workflow(slug).await?;

        if let Some(name) = &changes.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::validation("Workflow name must not be empty"));
            }
            manifest.name = name.to_string();
            workflow.name = name.to_string();
        }

        if changes.cron_expression.is_some() || changes.timezone.is_some() {
            let timezone = match &changes.timezone {
                Some(tz) => self.resolve_timezone(Some(tz))?,
                None => manifest.timezone.clone(),
            };
            let cron = changes
                .cron_expression
                .as_deref()
                .map(str::trim)
                .unwrap_or(&manifest.cron_expression)
                .to_string();
            validate_cron(&cron, Some(&timezone))?;

            set_schedule(&mut workflow, &cron, &timezone)?;
            manifest.cron_expression = cron;
            manifest.timezone = timezone;
        }

        manifest.updated_at = timestamp::now();
        self.manifests.save_workflow(slug, &workflow).await?;
        self.manifests.save(&manifest).await?;
        info!("Updated workflow '{}'", slug);
        Ok(manifest)
    }

    // -- remote sync -----------------------------------------------------

    /// Push a local workflow to the server.
    ///
    /// Updates the known remote workflow, or creates one when there is none
    /// (or it was deleted remotely), then tags it, optionally activates it,
    /// and records the deployment locally.
    pub async fn deploy(&self, slug: &str, activate: bool) -> Result<DeployOutcome> {
        let manifest = self.manifests.load(slug).await?;
        let workflow = self.manifests.load_workflow(slug).await?;
        let client = self.client().await?;

        let (remote, created) = match &manifest.last_deployed_workflow_id {
            Some(id) => match client.update_workflow(id, &workflow).await {
                Ok(remote) => (remote, false),
                Err(e) if e.is_not_found() => {
                    warn!("Workflow {} no longer exists remotely, creating a new one", id);
                    (client.create_workflow(&workflow).await?, true)
                }
                Err(e) => return Err(e),
            },
            None => (client.create_workflow(&workflow).await?, true),
        };

        let workflow_id = remote.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            Error::validation(format!(
                "n8n accepted '{}' but returned no workflow id",
                slug
            ))
            .with_hint("Check the workflow in the n8n editor before deploying again")
        })?;

        client
            .add_tags_to_workflow(&workflow_id, &manifest.tags)
            .await?;

        if activate {
            client.activate_workflow(&workflow_id).await?;
        }

        let manifest = self
            .manifests
            .update_deployment(slug, &workflow_id)
            .await?;
        self.registry
            .upsert(self.registry_entry(slug).with_workflow_id(&workflow_id))
            .await?;

        info!("Deployed '{}' as workflow {}", slug, workflow_id);
        Ok(DeployOutcome {
            manifest,
            workflow_id,
            created,
            activated: activate,
        })
    }

    /// Bring a remote cron workflow under management.
    pub async fn import(&self, workflow_id: &str, slug: Option<&str>) -> Result<Manifest> {
        check_workflow_id(workflow_id)?;
        let client = self.client().await?;
        let remote = client.get_workflow(workflow_id).await?;
        let analysis = analyze_workflow(&remote);

        if !analysis.has_cron() {
            return Err(Error::validation(format!(
                "Workflow '{}' has no schedule trigger",
                remote.name
            )));
        }
        let (cron, timezone) = analysis.primary_schedule().ok_or_else(|| {
            Error::validation(format!(
                "Could not read a cron expression from '{}'",
                remote.name
            ))
            .with_hint("Switch the trigger to a custom cron expression in n8n first")
        })?;
        let cron = cron.to_string();
        let timezone = timezone
            .map(str::to_string)
            .unwrap_or_else(|| self.default_timezone.clone());

        let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => analysis
                .managed_slug
                .clone()
                .unwrap_or_else(|| analysis.suggested_slug.clone()),
        };
        if !is_valid_slug(&slug) {
            return Err(
                Error::validation(format!("Invalid slug '{}'", slug)).with_hint("Pass --slug")
            );
        }
        if self.manifests.exists(&slug).await {
            return Err(Error::validation(format!("Workflow '{}' already exists", slug))
                .with_hint("Pass --slug to import under another name"));
        }

        let now = timestamp::now();
        let mut manifest =
            self.manifests
                .create(&slug, &remote.name, IMPORTED_TEMPLATE, &cron, &timezone);
        manifest.last_deployed_workflow_id = Some(workflow_id.to_string());
        manifest.last_deployed_at = Some(now);

        self.manifests.save_workflow(&slug, &remote.to_local()).await?;
        self.manifests.save(&manifest).await?;
        client
            .add_tags_to_workflow(workflow_id, &manifest.tags)
            .await?;
        self.registry
            .upsert(self.registry_entry(&slug).with_workflow_id(workflow_id))
            .await?;

        info!("Imported workflow {} as '{}'", workflow_id, slug);
        Ok(manifest)
    }

    /// Activate or deactivate the deployed workflow.
    pub async fn set_active(&self, slug: &str, active: bool) -> Result<WorkflowAnalysis> {
        let manifest = self.manifests.load(slug).await?;
        let id = deployed_id(&manifest)?;
        let client = self.client().await?;

        let remote = if active {
            client.activate_workflow(id).await?
        } else {
            client.deactivate_workflow(id).await?
        };
        info!(
            "{} workflow '{}'",
            if active { "Activated" } else { "Deactivated" },
            slug
        );
        Ok(analyze_workflow(&remote))
    }

    /// Move a workflow into the archive and drop it from the registry.
    pub async fn archive(&self, slug: &str, deactivate_remote: bool) -> Result<ArchiveOutcome> {
        let manifest = self.manifests.load(slug).await?;

        let mut deactivated = false;
        if deactivate_remote {
            if let Some(id) = &manifest.last_deployed_workflow_id {
                let client = self.client().await?;
                match client.deactivate_workflow(id).await {
                    Ok(_) => deactivated = true,
                    Err(e) if e.is_not_found() => {
                        warn!("Workflow {} is already gone remotely", id)
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let paths = self.manifests.archive(slug).await?;
        let registry_removed = self.registry.remove(slug, &self.project_key()).await?;

        Ok(ArchiveOutcome {
            paths,
            deactivated,
            registry_removed,
        })
    }

    // -- views -------------------------------------------------------------

    /// Manifest, upcoming runs and, when possible, the remote state.
    pub async fn inspect(&self, slug: &str) -> Result<Inspection> {
        let manifest = self.manifests.load(slug).await?;
        let schedule = parse_cron(&manifest.cron_expression, Some(&manifest.timezone), None);

        let (remote, remote_error) = match &manifest.last_deployed_workflow_id {
            None => (None, None),
            Some(id) => match self.fetch_remote(id).await {
                Ok(analysis) => (Some(analysis), None),
                Err(e) => {
                    warn!("Could not fetch remote workflow {}: {}", id, e);
                    (None, Some(e.to_string()))
                }
            },
        };

        Ok(Inspection {
            manifest,
            schedule,
            remote,
            remote_error,
        })
    }

    async fn fetch_remote(&self, id: &str) -> Result<WorkflowAnalysis> {
        let client = self.client().await?;
        let remote = client.get_workflow(id).await?;
        Ok(analyze_workflow(&remote))
    }

    pub async fn list_local(&self) -> Result<Vec<Manifest>> {
        self.manifests.list_all().await
    }

    /// Cron workflows on the server, split into managed and unmanaged.
    pub async fn list_remote(&self) -> Result<GroupedWorkflows> {
        let client = self.client().await?;
        let workflows = client
            .list_workflows(&ListWorkflowsOptions::default())
            .await?;
        Ok(group_workflows(&workflows))
    }
}

/// Remote ids are interpolated into API paths, so only plain tokens pass.
pub fn check_workflow_id(id: &str) -> Result<()> {
    let plain = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        Ok(())
    } else {
        Err(Error::validation(format!("Invalid workflow id '{}'", id))
            .with_hint("Use the id shown by 'cron8n list --remote'"))
    }
}

fn deployed_id(manifest: &Manifest) -> Result<&str> {
    manifest
        .last_deployed_workflow_id
        .as_deref()
        .ok_or_else(|| {
            Error::validation(format!("Workflow '{}' has not been deployed", manifest.slug))
                .with_hint(format!("Run 'cron8n deploy {}' first", manifest.slug))
        })
}
