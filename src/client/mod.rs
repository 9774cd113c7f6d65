//! n8n REST API client.
//!
//! Thin typed wrapper over `/api/v1`: workflow CRUD, activation and tag
//! management. Every non-success status becomes [`Error::Api`].

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::{AuthCredentials, AuthMode};
use crate::error::{Error, Result};
use crate::workflow::{Tag, Workflow};

pub const API_PREFIX: &str = "/api/v1";
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

const TAG_PAGE_SIZE: u32 = 100;

/// Filters for [`N8nClient::list_workflows`].
#[derive(Debug, Clone, Default)]
pub struct ListWorkflowsOptions {
    /// Return only the first page, of at most this many workflows
    pub limit: Option<u32>,
    pub active: Option<bool>,
    /// Tag names, sent comma-joined
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Serialize)]
struct TagRef<'a> {
    id: &'a str,
}

/// Client for one n8n instance.
#[derive(Debug, Clone)]
pub struct N8nClient {
    http: reqwest::Client,
    base_url: String,
}

impl N8nClient {
    pub fn new(credentials: &AuthCredentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let (name, raw) = match credentials.auth_mode {
            AuthMode::ApiKey => (
                HeaderName::from_static("x-n8n-api-key"),
                credentials.secret.clone(),
            ),
            AuthMode::Bearer => (AUTHORIZATION, format!("Bearer {}", credentials.secret)),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            Error::auth("Stored secret contains characters not allowed in a header")
                .with_hint("Run 'cron8n auth login' again")
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("cron8n/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
        debug!("Request failed with {}: {}", status, body);
        Err(Error::api(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }

    /// List workflows, following the cursor unless a limit is given.
    pub async fn list_workflows(&self, options: &ListWorkflowsOptions) -> Result<Vec<Workflow>> {
        let mut workflows = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(limit) = options.limit {
                query.push(("limit", limit.to_string()));
            }
            if let Some(active) = options.active {
                query.push(("active", active.to_string()));
            }
            if !options.tags.is_empty() {
                query.push(("tags", options.tags.join(",")));
            }
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: Page<Workflow> = self
                .send_json(self.request(Method::GET, "/workflows").query(&query))
                .await?;
            workflows.extend(page.data);

            if options.limit.is_some() {
                break;
            }
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(workflows)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        self.send_json(self.request(Method::GET, &format!("/workflows/{}", id)))
            .await
    }

    pub async fn create_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        let created: Workflow = self
            .send_json(
                self.request(Method::POST, "/workflows")
                    .json(&workflow.to_payload()),
            )
            .await?;
        info!("Created workflow {:?} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn update_workflow(&self, id: &str, workflow: &Workflow) -> Result<Workflow> {
        self.send_json(
            self.request(Method::PUT, &format!("/workflows/{}", id))
                .json(&workflow.to_payload()),
        )
        .await
    }

    pub async fn delete_workflow(&self, id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/workflows/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn activate_workflow(&self, id: &str) -> Result<Workflow> {
        self.send_json(self.request(Method::POST, &format!("/workflows/{}/activate", id)))
            .await
    }

    pub async fn deactivate_workflow(&self, id: &str) -> Result<Workflow> {
        self.send_json(self.request(Method::POST, &format!("/workflows/{}/deactivate", id)))
            .await
    }

    /// Every tag on the server.
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("limit", TAG_PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: Page<Tag> = self
                .send_json(self.request(Method::GET, "/tags").query(&query))
                .await?;
            tags.extend(page.data);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tags)
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        self.send_json(self.request(Method::POST, "/tags").json(&json!({ "name": name })))
            .await
    }

    pub async fn get_workflow_tags(&self, workflow_id: &str) -> Result<Vec<Tag>> {
        self.send_json(self.request(Method::GET, &format!("/workflows/{}/tags", workflow_id)))
            .await
    }

    /// Replace the workflow's tag set.
    pub async fn set_workflow_tags(&self, workflow_id: &str, tag_ids: &[String]) -> Result<Vec<Tag>> {
        let body: Vec<TagRef<'_>> = tag_ids.iter().map(|id| TagRef { id }).collect();
        self.send_json(
            self.request(Method::PUT, &format!("/workflows/{}/tags", workflow_id))
                .json(&body),
        )
        .await
    }

    /// Ensure the named tags exist and are attached, keeping current tags.
    ///
    /// Lists server tags once, creates the missing ones, then writes back the
    /// union of current and desired ids.
    pub async fn add_tags_to_workflow(&self, workflow_id: &str, names: &[String]) -> Result<Vec<Tag>> {
        let existing = self.list_tags().await?;

        let mut desired_ids = Vec::with_capacity(names.len());
        for name in names {
            let id = match existing.iter().find(|t| &t.name == name) {
                Some(tag) => tag.id.clone(),
                None => {
                    debug!("Creating tag '{}'", name);
                    self.create_tag(name).await?.id
                }
            };
            desired_ids.push(id);
        }

        let current = self.get_workflow_tags(workflow_id).await?;
        let mut ids: Vec<String> = current.into_iter().map(|t| t.id).collect();
        for id in desired_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        self.set_workflow_tags(workflow_id, &ids).await
    }

    /// Whether the server accepts our credentials. Never fails.
    pub async fn test_connection(&self) -> bool {
        let options = ListWorkflowsOptions {
            limit: Some(1),
            ..Default::default()
        };
        match self.list_workflows(&options).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Connection test failed: {}", e);
                false
            }
        }
    }
}
