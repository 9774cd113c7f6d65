use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cron8n::auth::{AuthMode, AuthStore};
use cron8n::config::Config;
use cron8n::cron::{find_preset, parse_cron, CRON_PRESETS};
use cron8n::registry::RegistryStore;
use cron8n::templates::{list_templates, TemplateKind};
use cron8n::ui::{self, AppState};
use cron8n::workflow::WorkflowAnalysis;
use cron8n::workspace::{CreateRequest, EditRequest, Workspace};

#[derive(Parser)]
#[command(name = "cron8n")]
#[command(about = "Manage scheduled n8n workflows as local JSON files", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory holding `workflows/` (defaults to the current directory)
    #[arg(long, global = true, env = "CRON8N_PROJECT")]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage n8n credentials
    Auth {
        #[command(subcommand)]
        action: AuthActions,
    },
    /// Create a workflow from a template
    New {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// blank | http-request | webhook | code
        #[arg(short, long, default_value = "blank")]
        template: TemplateKind,
        /// Cron expression or preset name
        #[arg(short, long)]
        cron: String,
        /// IANA timezone (defaults to the configured timezone)
        #[arg(long)]
        timezone: Option<String>,
        /// Explicit slug (derived from the name otherwise)
        #[arg(long)]
        slug: Option<String>,
        /// Target URL for http-request and webhook templates
        #[arg(long)]
        url: Option<String>,
        /// JavaScript for the code template
        #[arg(long)]
        code: Option<String>,
        /// Append a random suffix to the slug
        #[arg(long)]
        unique: bool,
    },
    /// Change name or schedule of a local workflow
    Edit {
        slug: String,
        #[arg(long)]
        name: Option<String>,
        /// Cron expression or preset name
        #[arg(long)]
        cron: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Push a workflow to n8n
    Deploy {
        slug: String,
        /// Activate after deploying
        #[arg(long)]
        activate: bool,
    },
    /// List local workflows
    List {
        /// List cron workflows on the n8n server instead
        #[arg(long)]
        remote: bool,
    },
    /// Show manifest, next runs and remote state
    Inspect { slug: String },
    /// Bring an existing n8n cron workflow under management
    Import {
        /// Remote workflow id
        workflow_id: String,
        #[arg(long)]
        slug: Option<String>,
    },
    /// Activate a deployed workflow
    Activate { slug: String },
    /// Deactivate a deployed workflow
    Deactivate { slug: String },
    /// Move a workflow to workflows/archived/
    Archive {
        slug: String,
        /// Deactivate the remote workflow first
        #[arg(long)]
        deactivate: bool,
    },
    /// Check a cron expression and preview upcoming runs
    Validate {
        /// Cron expression or preset name
        expression: String,
        #[arg(long)]
        timezone: Option<String>,
        /// Number of upcoming runs to show
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u16).range(1..=1000))]
        count: u16,
    },
    /// List cron presets
    Presets,
    /// List workflow templates
    Templates,
    /// Start the local web UI
    Ui {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum AuthActions {
    /// Store credentials for an n8n instance
    Login {
        /// Base URL, e.g. https://n8n.example.com
        #[arg(long)]
        url: String,
        /// apiKey | bearer
        #[arg(long, default_value = "apiKey")]
        mode: AuthMode,
        #[arg(long, env = "CRON8N_SECRET", hide_env_values = true)]
        secret: String,
        /// Save without testing the connection
        #[arg(long)]
        skip_verify: bool,
    },
    /// Show stored credentials and test the connection
    Status,
    /// Remove stored credentials
    Logout,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Ui { .. } => "cron8n=info",
        _ => "cron8n=warn",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.downcast_ref::<cron8n::Error>().and_then(|e| e.hint()) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let workspace = open_workspace(&config, cli.project.as_deref())?;

    match cli.command {
        Commands::Auth { action } => match action {
            AuthActions::Login {
                url,
                mode,
                secret,
                skip_verify,
            } => cmd_auth_login(&workspace, &url, mode, &secret, skip_verify).await?,
            AuthActions::Status => cmd_auth_status(&workspace).await?,
            AuthActions::Logout => cmd_auth_logout(&workspace).await?,
        },
        Commands::New {
            name,
            template,
            cron,
            timezone,
            slug,
            url,
            code,
            unique,
        } => {
            let request = CreateRequest {
                name,
                template,
                cron_expression: resolve_cron(&cron),
                timezone,
                slug,
                url,
                code,
                unique,
            };
            cmd_new(&workspace, &request).await?
        }
        Commands::Edit {
            slug,
            name,
            cron,
            timezone,
        } => {
            let changes = EditRequest {
                name,
                cron_expression: cron.as_deref().map(resolve_cron),
                timezone,
            };
            cmd_edit(&workspace, &slug, &changes).await?
        }
        Commands::Deploy { slug, activate } => cmd_deploy(&workspace, &slug, activate).await?,
        Commands::List { remote } => {
            if remote {
                cmd_list_remote(&workspace).await?
            } else {
                cmd_list_local(&workspace).await?
            }
        }
        Commands::Inspect { slug } => cmd_inspect(&workspace, &slug).await?,
        Commands::Import { workflow_id, slug } => {
            cmd_import(&workspace, &workflow_id, slug.as_deref()).await?
        }
        Commands::Activate { slug } => cmd_set_active(&workspace, &slug, true).await?,
        Commands::Deactivate { slug } => cmd_set_active(&workspace, &slug, false).await?,
        Commands::Archive { slug, deactivate } => {
            cmd_archive(&workspace, &slug, deactivate).await?
        }
        Commands::Validate {
            expression,
            timezone,
            count,
        } => cmd_validate(&workspace, &expression, timezone.as_deref(), count)?,
        Commands::Presets => cmd_presets(),
        Commands::Templates => cmd_templates(),
        Commands::Ui { port } => cmd_ui(&config, workspace, port).await?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

fn open_workspace(config: &Config, project: Option<&Path>) -> anyhow::Result<Workspace> {
    let root = match project {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    let root = std::fs::canonicalize(&root).unwrap_or(root);

    Ok(Workspace::new(
        root,
        RegistryStore::new(config.registry_path()),
        AuthStore::new(config.auth_path()),
        config.default_timezone.clone(),
    ))
}

/// Preset names expand to their expression.
fn resolve_cron(raw: &str) -> String {
    find_preset(raw.trim())
        .map(|p| p.expression.to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Shell completion variants
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

fn cmd_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}

// ============================================================================
// Auth Commands
// ============================================================================

async fn cmd_auth_login(
    workspace: &Workspace,
    url: &str,
    mode: AuthMode,
    secret: &str,
    skip_verify: bool,
) -> anyhow::Result<()> {
    let credentials = workspace.login(url, mode, secret, skip_verify).await?;

    println!("✓ Logged in to {}", credentials.base_url);
    if skip_verify {
        println!("  Connection not verified");
    }
    println!("  Credentials saved to {}", workspace.auth().path().display());
    Ok(())
}

async fn cmd_auth_status(workspace: &Workspace) -> anyhow::Result<()> {
    let status = workspace.status(true).await?;

    if !status.authenticated {
        println!("Not logged in.");
        println!();
        println!("Log in with: cron8n auth login --url <url> --secret <key>");
        return Ok(());
    }

    println!("URL:        {}", status.base_url.unwrap_or_default());
    if let Some(mode) = status.auth_mode {
        println!("Auth mode:  {}", mode);
    }
    println!("Secret:     {}", status.secret.unwrap_or_default());
    match status.connected {
        Some(true) => println!("Connection: ✓ ok"),
        _ => println!("Connection: ✗ failed"),
    }
    Ok(())
}

async fn cmd_auth_logout(workspace: &Workspace) -> anyhow::Result<()> {
    if workspace.logout().await? {
        println!("✓ Credentials removed");
    } else {
        println!("No stored credentials.");
    }
    Ok(())
}

// ============================================================================
// Workflow Commands
// ============================================================================

async fn cmd_new(workspace: &Workspace, request: &CreateRequest) -> anyhow::Result<()> {
    let manifest = workspace.create(request).await?;

    println!("✓ Workflow '{}' created", manifest.slug);
    println!();
    println!("  Name:     {}", manifest.name);
    println!("  Template: {}", manifest.template);
    println!("  Schedule: {} ({})", manifest.cron_expression, manifest.timezone);
    println!(
        "  Files:    {}",
        workspace.manifests().workflow_path(&manifest.slug).display()
    );
    println!();
    println!("Deploy with: cron8n deploy {}", manifest.slug);
    Ok(())
}

async fn cmd_edit(workspace: &Workspace, slug: &str, changes: &EditRequest) -> anyhow::Result<()> {
    let manifest = workspace.edit(slug, changes).await?;

    println!("✓ Workflow '{}' updated", slug);
    println!("  Name:     {}", manifest.name);
    println!("  Schedule: {} ({})", manifest.cron_expression, manifest.timezone);
    if manifest.is_deployed() {
        println!();
        println!("Push the change with: cron8n deploy {}", slug);
    }
    Ok(())
}

async fn cmd_deploy(workspace: &Workspace, slug: &str, activate: bool) -> anyhow::Result<()> {
    let outcome = workspace.deploy(slug, activate).await?;

    println!(
        "✓ Workflow '{}' {} as {}",
        slug,
        if outcome.created { "created" } else { "updated" },
        outcome.workflow_id
    );
    if outcome.activated {
        println!("  Activated");
    }
    Ok(())
}

async fn cmd_list_local(workspace: &Workspace) -> anyhow::Result<()> {
    let manifests = workspace.list_local().await?;

    if manifests.is_empty() {
        println!("No workflows found in {}.", workspace.project_root().display());
        println!();
        println!("Create one with: cron8n new --name <name> --cron <expr>");
        return Ok(());
    }

    println!(
        "{:<28} {:<28} {:<16} {:<18} {:<12}",
        "SLUG", "NAME", "CRON", "TIMEZONE", "DEPLOYED"
    );
    println!("{}", "-".repeat(104));
    for m in manifests {
        println!(
            "{:<28} {:<28} {:<16} {:<18} {:<12}",
            m.slug,
            truncate(&m.name, 28),
            m.cron_expression,
            m.timezone,
            m.last_deployed_workflow_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_list_remote(workspace: &Workspace) -> anyhow::Result<()> {
    let grouped = workspace.list_remote().await?;

    println!("Managed ({})", grouped.managed.len());
    print_remote(&grouped.managed, |a| a.managed_slug.clone().unwrap_or_else(|| "?".into()));
    println!();
    println!("Unmanaged ({})", grouped.unmanaged.len());
    print_remote(&grouped.unmanaged, |a| format!("→ {}", a.suggested_slug));
    if !grouped.unmanaged.is_empty() {
        println!();
        println!("Import with: cron8n import <id> [--slug <slug>]");
    }
    Ok(())
}

fn print_remote(list: &[WorkflowAnalysis], slug: impl Fn(&WorkflowAnalysis) -> String) {
    if list.is_empty() {
        println!("  (none)");
        return;
    }
    for a in list {
        let cron = a
            .primary_schedule()
            .map(|(expr, _)| expr.to_string())
            .unwrap_or_else(|| "?".into());
        println!(
            "  {:<20} {:<28} {:<16} {:<8} {}",
            a.id.as_deref().unwrap_or("-"),
            truncate(&a.name, 28),
            cron,
            if a.active { "active" } else { "inactive" },
            slug(a)
        );
    }
}

async fn cmd_inspect(workspace: &Workspace, slug: &str) -> anyhow::Result<()> {
    let inspection = workspace.inspect(slug).await?;
    let m = &inspection.manifest;

    println!("Workflow: {}", m.slug);
    println!("  Name:     {}", m.name);
    println!("  Template: {}", m.template);
    println!("  Schedule: {} ({})", m.cron_expression, m.timezone);
    println!("  Created:  {}", m.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:  {}", m.updated_at.format("%Y-%m-%d %H:%M:%S"));
    match (&m.last_deployed_workflow_id, m.last_deployed_at) {
        (Some(id), Some(at)) => println!("  Deployed: {} at {}", id, at.format("%Y-%m-%d %H:%M:%S")),
        (Some(id), None) => println!("  Deployed: {}", id),
        _ => println!("  Deployed: no"),
    }

    println!();
    print_schedule(&inspection.schedule);

    if let Some(remote) = &inspection.remote {
        println!();
        println!("Remote:");
        println!("  State:    {}", if remote.active { "active" } else { "inactive" });
        println!("  Managed:  {}", if remote.is_managed { "yes" } else { "no" });
        if let Some((expr, tz)) = remote.primary_schedule() {
            println!("  Schedule: {} ({})", expr, tz.unwrap_or("-"));
            if expr != m.cron_expression {
                println!("  ! Remote schedule differs from local; run 'cron8n deploy {}'", slug);
            }
        }
    } else if let Some(err) = &inspection.remote_error {
        println!();
        println!("Remote: unavailable ({})", err);
    }
    Ok(())
}

fn print_schedule(check: &cron8n::cron::CronCheck) {
    if check.is_valid {
        println!("Next runs:");
        for run in &check.next_runs {
            println!("  {}", run.format("%Y-%m-%d %H:%M %:z (%a)"));
        }
    } else {
        println!(
            "✗ Invalid schedule: {}",
            check.error.as_deref().unwrap_or("unknown error")
        );
    }
}

async fn cmd_import(workspace: &Workspace, workflow_id: &str, slug: Option<&str>) -> anyhow::Result<()> {
    let manifest = workspace.import(workflow_id, slug).await?;

    println!("✓ Imported workflow {} as '{}'", workflow_id, manifest.slug);
    println!("  Schedule: {} ({})", manifest.cron_expression, manifest.timezone);
    println!(
        "  Files:    {}",
        workspace.manifests().workflow_path(&manifest.slug).display()
    );
    Ok(())
}

async fn cmd_set_active(workspace: &Workspace, slug: &str, active: bool) -> anyhow::Result<()> {
    let remote = workspace.set_active(slug, active).await?;
    println!(
        "✓ Workflow '{}' is now {}",
        slug,
        if remote.active { "active" } else { "inactive" }
    );
    Ok(())
}

async fn cmd_archive(workspace: &Workspace, slug: &str, deactivate: bool) -> anyhow::Result<()> {
    let outcome = workspace.archive(slug, deactivate).await?;

    println!("✓ Workflow '{}' archived", slug);
    println!("  Manifest: {}", outcome.paths.manifest.display());
    if let Some(path) = &outcome.paths.workflow {
        println!("  Workflow: {}", path.display());
    }
    if outcome.deactivated {
        println!("  Remote workflow deactivated");
    }
    Ok(())
}

// ============================================================================
// Cron Commands
// ============================================================================

fn cmd_validate(
    workspace: &Workspace,
    expression: &str,
    timezone: Option<&str>,
    count: u16,
) -> anyhow::Result<()> {
    let expression = resolve_cron(expression);
    let timezone = timezone.unwrap_or(workspace.default_timezone());
    let check = parse_cron(&expression, Some(timezone), Some(usize::from(count)));

    if !check.is_valid {
        let reason = check.error.unwrap_or_else(|| "invalid expression".into());
        return Err(cron8n::Error::validation(format!("Invalid cron expression '{}': {}", expression, reason))
            .with_hint("Run 'cron8n presets' for common schedules")
            .into());
    }

    println!("✓ '{}' is valid ({})", expression, timezone);
    println!();
    print_schedule(&check);
    Ok(())
}

fn cmd_presets() {
    println!("{:<14} {:<12} {}", "NAME", "EXPRESSION", "DESCRIPTION");
    println!("{}", "-".repeat(64));
    for p in CRON_PRESETS {
        println!("{:<14} {:<12} {}", p.name, p.expression, p.description);
    }
}

fn cmd_templates() {
    println!("{:<14} {}", "NAME", "DESCRIPTION");
    println!("{}", "-".repeat(64));
    for t in list_templates() {
        let note = if t.requires_url { " (needs --url)" } else { "" };
        println!("{:<14} {}{}", t.name, t.description, note);
    }
}

// ============================================================================
// Web UI
// ============================================================================

async fn cmd_ui(config: &Config, workspace: Workspace, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.ui.port);
    let addr: SocketAddr = format!("{}:{}", config.ui.host, port)
        .parse()
        .with_context(|| format!("Invalid UI address {}:{}", config.ui.host, port))?;

    println!("cron8n UI running on http://{}", addr);
    println!("  Project: {}", workspace.project_root().display());
    println!();
    println!("Press Ctrl+C to stop");

    ui::serve(AppState::new(workspace), addr).await?;

    println!("Server stopped.");
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
