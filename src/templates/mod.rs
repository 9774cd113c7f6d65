//! Workflow templates.
//!
//! Each template is a two-node graph: a `Schedule Trigger` wired to one
//! action node. The trigger always uses the rule/interval parameter shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

use crate::auth::normalize_base_url;
use crate::error::{Error, Result};
use crate::workflow::{schedule_trigger_node, Node, Workflow, SCHEDULE_TRIGGER_NAME};

const DEFAULT_CODE: &str = "// Runs on every scheduled trigger\nreturn [{ json: { ranAt: new Date().toISOString() } }];";

/// Built-in workflow archetypes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    #[default]
    Blank,
    HttpRequest,
    Webhook,
    Code,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::Blank,
        TemplateKind::HttpRequest,
        TemplateKind::Webhook,
        TemplateKind::Code,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TemplateKind::Blank => "blank",
            TemplateKind::HttpRequest => "http-request",
            TemplateKind::Webhook => "webhook",
            TemplateKind::Code => "code",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TemplateKind::Blank => "Schedule trigger with a no-op placeholder node",
            TemplateKind::HttpRequest => "Call a URL with a GET request on schedule",
            TemplateKind::Webhook => "POST a JSON payload to a webhook on schedule",
            TemplateKind::Code => "Run a JavaScript Code node on schedule",
        }
    }

    /// Whether `build_workflow` needs `TemplateInput::url`.
    pub fn requires_url(self) -> bool {
        matches!(self, TemplateKind::HttpRequest | TemplateKind::Webhook)
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TemplateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                Error::validation(format!("Unknown template '{}'", s)).with_hint(format!(
                    "Available templates: {}",
                    TemplateKind::ALL.map(|k| k.name()).join(", ")
                ))
            })
    }
}

/// Listing entry for a template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub requires_url: bool,
}

pub fn list_templates() -> Vec<TemplateInfo> {
    TemplateKind::ALL
        .into_iter()
        .map(|kind| TemplateInfo {
            name: kind.name(),
            description: kind.description(),
            requires_url: kind.requires_url(),
        })
        .collect()
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateInput {
    pub name: String,
    pub cron_expression: String,
    pub timezone: String,
    pub url: Option<String>,
    pub code: Option<String>,
}

/// Build the workflow document for `kind`.
pub fn build_workflow(kind: TemplateKind, input: &TemplateInput) -> Result<Workflow> {
    let action = match kind {
        TemplateKind::Blank => Node::new(
            "No Operation",
            "n8n-nodes-base.noOp",
            Number::from(1),
            [470, 300],
            json!({}),
        ),
        TemplateKind::HttpRequest => Node::new(
            "HTTP Request",
            "n8n-nodes-base.httpRequest",
            version(4.2),
            [470, 300],
            json!({
                "method": "GET",
                "url": required_url(kind, input)?,
                "options": {}
            }),
        ),
        TemplateKind::Webhook => Node::new(
            "Call Webhook",
            "n8n-nodes-base.httpRequest",
            version(4.2),
            [470, 300],
            json!({
                "method": "POST",
                "url": required_url(kind, input)?,
                "sendBody": true,
                "specifyBody": "json",
                "jsonBody": "={{ JSON.stringify({ workflow: $workflow.name, triggeredAt: $now.toISO() }) }}",
                "options": {}
            }),
        ),
        TemplateKind::Code => Node::new(
            "Code",
            "n8n-nodes-base.code",
            Number::from(2),
            [470, 300],
            json!({
                "jsCode": input
                    .code
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or(DEFAULT_CODE)
            }),
        ),
    };

    let mut workflow = Workflow::new(input.name.clone());
    let action_name = action.name.clone();
    workflow
        .nodes
        .push(schedule_trigger_node(&input.cron_expression, &input.timezone));
    workflow.nodes.push(action);
    workflow.connect(SCHEDULE_TRIGGER_NAME, &action_name);
    workflow
        .settings
        .insert("executionOrder".to_string(), Value::from("v1"));
    workflow
        .settings
        .insert("timezone".to_string(), Value::from(input.timezone.clone()));
    Ok(workflow)
}

fn version(v: f64) -> Number {
    Number::from_f64(v).unwrap_or_else(|| Number::from(1))
}

fn required_url(kind: TemplateKind, input: &TemplateInput) -> Result<String> {
    let raw = input
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            Error::validation(format!("Template '{}' requires a URL", kind))
                .with_hint("Pass --url https://...")
        })?;
    normalize_base_url(raw)?;
    Ok(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::analyze_workflow;

    fn input(url: Option<&str>) -> TemplateInput {
        TemplateInput {
            name: "Nightly".to_string(),
            cron_expression: "0 2 * * *".to_string(),
            timezone: "Europe/Berlin".to_string(),
            url: url.map(str::to_string),
            code: None,
        }
    }

    #[test]
    fn test_every_template_is_a_cron_workflow() {
        for kind in TemplateKind::ALL {
            let wf = build_workflow(kind, &input(Some("https://example.com/hook"))).unwrap();
            assert_eq!(wf.nodes.len(), 2, "{}", kind);

            let analysis = analyze_workflow(&wf);
            assert_eq!(analysis.cron_nodes.len(), 1);
            assert_eq!(
                analysis.primary_schedule(),
                Some(("0 2 * * *", Some("Europe/Berlin")))
            );

            let target = &wf.connections[SCHEDULE_TRIGGER_NAME]["main"][0][0]["node"];
            assert_eq!(target, &Value::from(wf.nodes[1].name.clone()));
        }
    }

    #[test]
    fn test_url_required() {
        let err = build_workflow(TemplateKind::HttpRequest, &input(None)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = build_workflow(TemplateKind::Webhook, &input(Some("ftp://x"))).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        assert!(build_workflow(TemplateKind::Blank, &input(None)).is_ok());
    }

    #[test]
    fn test_webhook_posts() {
        let wf = build_workflow(TemplateKind::Webhook, &input(Some("https://hooks.example.com/x")))
            .unwrap();
        assert_eq!(wf.nodes[1].parameters["method"], "POST");
        assert_eq!(wf.nodes[1].parameters["url"], "https://hooks.example.com/x");
    }

    #[test]
    fn test_custom_code() {
        let mut i = input(None);
        i.code = Some("return [];".to_string());
        let wf = build_workflow(TemplateKind::Code, &i).unwrap();
        assert_eq!(wf.nodes[1].parameters["jsCode"], "return [];");
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("HTTP-Request".parse::<TemplateKind>().unwrap(), TemplateKind::HttpRequest);
        let err = "email".parse::<TemplateKind>().unwrap_err();
        assert!(err.hint().unwrap().contains("webhook"));
        assert_eq!(list_templates().len(), 4);
    }
}
