//! cron8n - scheduled n8n workflows as local files
//!
//! cron8n keeps cron-triggered n8n workflows in a project directory and
//! syncs them with an n8n instance over its REST API.
//!
//! ## Layout
//!
//! ```text
//! <project>/workflows/
//!   daily-backup.json           # n8n workflow document
//!   daily-backup.cron8n.json    # manifest: schedule, template, deploy state
//!   archived/
//! ~/.cron8n/
//!   config.json                 # n8n URL, auth mode and secret
//!   registry.json               # managed workflows across projects
//!   settings.toml               # optional settings
//! ```
//!
//! Remote workflows are linked back to their manifest only through two
//! tags: `managed-by:cron8n` and `cron8n:<slug>`.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> cron8n::Result<()> {
//! use cron8n::auth::AuthStore;
//! use cron8n::registry::RegistryStore;
//! use cron8n::workspace::{CreateRequest, Workspace};
//!
//! let workspace = Workspace::new(
//!     "/srv/jobs",
//!     RegistryStore::new("/home/me/.cron8n/registry.json"),
//!     AuthStore::new("/home/me/.cron8n/config.json"),
//!     "UTC",
//! );
//! let manifest = workspace
//!     .create(&CreateRequest {
//!         name: "Daily backup".into(),
//!         cron_expression: "0 0 * * *".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! workspace.deploy(&manifest.slug, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod cron;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod slug;
pub mod templates;
pub mod timestamp;
pub mod ui;
pub mod workflow;
pub mod workspace;

pub use error::{Error, Result};
