//! Classification of remote workflows.
//!
//! A workflow is *cron-triggered* when at least one node's type matches a
//! known schedule identifier, and *managed* when it carries the sentinel
//! tag. The per-workflow slug tag (`cron8n:<slug>`) is the only link from
//! a remote workflow back to a local manifest.

use serde::Serialize;
use serde_json::Value;

use super::types::{Node, Workflow};
use crate::slug::create_slug;

/// Tag carried by every workflow cron8n manages.
pub const MANAGED_TAG: &str = "managed-by:cron8n";

/// Prefix of the per-workflow slug tag.
pub const SLUG_TAG_PREFIX: &str = "cron8n:";

/// Node type identifiers that mark a schedule trigger.
pub const CRON_NODE_TYPES: &[&str] = &[
    "n8n-nodes-base.scheduleTrigger",
    "n8n-nodes-base.cron",
    "schedule",
];

/// The two management tags for a slug, sentinel first.
pub fn management_tags(slug: &str) -> Vec<String> {
    vec![MANAGED_TAG.to_string(), slug_tag(slug)]
}

pub fn slug_tag(slug: &str) -> String {
    format!("{}{}", SLUG_TAG_PREFIX, slug)
}

/// Case-insensitive containment in either direction, so versioned or
/// namespaced type strings still match.
pub fn is_cron_node(node: &Node) -> bool {
    let node_type = node.node_type.to_lowercase();
    if node_type.is_empty() {
        return false;
    }
    CRON_NODE_TYPES.iter().any(|known| {
        let known = known.to_lowercase();
        node_type.contains(&known) || known.contains(&node_type)
    })
}

/// Where a trigger node keeps its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterShape {
    /// `rule.interval[]` with an item `{field: "cronExpression", expression}`
    Rule,
    /// `cronExpression` / `timezone` at the top of the parameters
    Flat,
    /// Legacy `triggerTimes.item[]` list
    TriggerTimes,
}

struct ShapeReader {
    shape: ParameterShape,
    cron: fn(&Value) -> Option<String>,
    timezone: fn(&Value) -> Option<String>,
}

/// Readers in priority order.
const SHAPE_READERS: &[ShapeReader] = &[
    ShapeReader {
        shape: ParameterShape::Rule,
        cron: rule_cron,
        timezone: rule_timezone,
    },
    ShapeReader {
        shape: ParameterShape::Flat,
        cron: flat_cron,
        timezone: flat_timezone,
    },
    ShapeReader {
        shape: ParameterShape::TriggerTimes,
        cron: trigger_times_cron,
        timezone: trigger_times_timezone,
    },
];

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn rule_cron(params: &Value) -> Option<String> {
    params
        .pointer("/rule/interval")?
        .as_array()?
        .iter()
        .filter(|item| item.get("field").and_then(Value::as_str) == Some("cronExpression"))
        .find_map(|item| non_empty_str(item.get("expression")))
}

fn rule_timezone(params: &Value) -> Option<String> {
    non_empty_str(params.pointer("/rule/timezone"))
}

fn flat_cron(params: &Value) -> Option<String> {
    non_empty_str(params.get("cronExpression"))
}

fn flat_timezone(params: &Value) -> Option<String> {
    non_empty_str(params.get("timezone"))
}

fn trigger_times_items(params: &Value) -> Option<&Vec<Value>> {
    params.pointer("/triggerTimes/item")?.as_array()
}

fn trigger_times_cron(params: &Value) -> Option<String> {
    trigger_times_items(params)?
        .iter()
        .find_map(|item| non_empty_str(item.get("cronExpression")))
}

fn trigger_times_timezone(params: &Value) -> Option<String> {
    trigger_times_items(params)
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| non_empty_str(item.get("timezone")))
        })
        .or_else(|| non_empty_str(params.pointer("/triggerTimes/timezone")))
}

/// First shape that yields a cron expression.
pub fn detect_shape(node: &Node) -> Option<ParameterShape> {
    SHAPE_READERS
        .iter()
        .find(|r| (r.cron)(&node.parameters).is_some())
        .map(|r| r.shape)
}

/// Cron expression from the first matching shape.
pub fn extract_cron_expression(node: &Node) -> Option<String> {
    SHAPE_READERS
        .iter()
        .find_map(|r| (r.cron)(&node.parameters))
}

/// Timezone from the first matching shape.
pub fn extract_timezone(node: &Node) -> Option<String> {
    SHAPE_READERS
        .iter()
        .find_map(|r| (r.timezone)(&node.parameters))
}

pub fn is_managed(workflow: &Workflow) -> bool {
    workflow.tag_names().any(|name| name == MANAGED_TAG)
}

/// Slug from the `cron8n:<slug>` tag, if any.
pub fn get_managed_slug(workflow: &Workflow) -> Option<String> {
    workflow
        .tag_names()
        .filter_map(|name| name.strip_prefix(SLUG_TAG_PREFIX))
        .find(|slug| !slug.is_empty())
        .map(str::to_string)
}

/// Slug proposed when importing a workflow.
pub fn suggest_slug(workflow: &Workflow) -> String {
    create_slug(&workflow.name)
}

/// Schedule details of one trigger node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronNodeInfo {
    pub name: String,
    pub node_type: String,
    pub cron_expression: Option<String>,
    pub timezone: Option<String>,
    pub shape: Option<ParameterShape>,
}

/// Everything discovery knows about one workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAnalysis {
    pub id: Option<String>,
    pub name: String,
    pub active: bool,
    pub is_managed: bool,
    pub managed_slug: Option<String>,
    pub suggested_slug: String,
    pub cron_nodes: Vec<CronNodeInfo>,
}

impl WorkflowAnalysis {
    pub fn has_cron(&self) -> bool {
        !self.cron_nodes.is_empty()
    }

    /// The first trigger's schedule.
    pub fn primary_schedule(&self) -> Option<(&str, Option<&str>)> {
        self.cron_nodes.iter().find_map(|n| {
            n.cron_expression
                .as_deref()
                .map(|expr| (expr, n.timezone.as_deref()))
        })
    }
}

pub fn analyze_workflow(workflow: &Workflow) -> WorkflowAnalysis {
    let settings_tz = workflow.settings_timezone().map(str::to_string);
    let cron_nodes = workflow
        .nodes
        .iter()
        .filter(|n| is_cron_node(n))
        .map(|n| CronNodeInfo {
            name: n.name.clone(),
            node_type: n.node_type.clone(),
            cron_expression: extract_cron_expression(n),
            timezone: extract_timezone(n).or_else(|| settings_tz.clone()),
            shape: detect_shape(n),
        })
        .collect();

    WorkflowAnalysis {
        id: workflow.id.clone(),
        name: workflow.name.clone(),
        active: workflow.active,
        is_managed: is_managed(workflow),
        managed_slug: get_managed_slug(workflow),
        suggested_slug: suggest_slug(workflow),
        cron_nodes,
    }
}

/// Cron-triggered workflows split by management state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedWorkflows {
    pub managed: Vec<WorkflowAnalysis>,
    pub unmanaged: Vec<WorkflowAnalysis>,
}

/// Keep workflows with at least one cron node, partitioned by `is_managed`.
pub fn group_workflows(workflows: &[Workflow]) -> GroupedWorkflows {
    let (managed, unmanaged): (Vec<_>, Vec<_>) = workflows
        .iter()
        .map(analyze_workflow)
        .filter(WorkflowAnalysis::has_cron)
        .partition(|a| a.is_managed);

    GroupedWorkflows { managed, unmanaged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Tag;
    use serde_json::json;

    fn node(node_type: &str, parameters: Value) -> Node {
        serde_json::from_value(json!({
            "name": "Trigger",
            "type": node_type,
            "parameters": parameters,
        }))
        .unwrap()
    }

    fn workflow(name: &str, nodes: Vec<Node>, tags: &[&str]) -> Workflow {
        let mut wf = Workflow::new(name);
        wf.id = Some(format!("id-{}", name));
        wf.nodes = nodes;
        wf.tags = tags
            .iter()
            .enumerate()
            .map(|(i, t)| Tag {
                id: i.to_string(),
                name: t.to_string(),
            })
            .collect();
        wf
    }

    #[test]
    fn test_is_cron_node() {
        let params = json!({});
        assert!(is_cron_node(&node("n8n-nodes-base.scheduleTrigger", params.clone())));
        assert!(is_cron_node(&node("N8N-NODES-BASE.CRON", params.clone())));
        assert!(is_cron_node(&node("@acme/n8n-nodes-base.scheduleTrigger.v2", params.clone())));
        // reverse containment: the type is a substring of a known identifier
        assert!(is_cron_node(&node("scheduleTrigger", params.clone())));
        assert!(is_cron_node(&node("Schedule", params.clone())));
        assert!(!is_cron_node(&node("n8n-nodes-base.httpRequest", params.clone())));
        assert!(!is_cron_node(&node("", params)));
    }

    #[test]
    fn test_extract_rule_shape() {
        let n = node(
            "n8n-nodes-base.scheduleTrigger",
            json!({
                "rule": {
                    "interval": [
                        { "field": "hours", "hoursInterval": 2 },
                        { "field": "cronExpression", "expression": "0 6 * * *" }
                    ],
                    "timezone": "Europe/Paris"
                }
            }),
        );
        assert_eq!(extract_cron_expression(&n).as_deref(), Some("0 6 * * *"));
        assert_eq!(extract_timezone(&n).as_deref(), Some("Europe/Paris"));
        assert_eq!(detect_shape(&n), Some(ParameterShape::Rule));
    }

    #[test]
    fn test_extract_flat_shape() {
        let n = node(
            "schedule",
            json!({ "cronExpression": "*/5 * * * *", "timezone": "UTC" }),
        );
        assert_eq!(extract_cron_expression(&n).as_deref(), Some("*/5 * * * *"));
        assert_eq!(extract_timezone(&n).as_deref(), Some("UTC"));
        assert_eq!(detect_shape(&n), Some(ParameterShape::Flat));
    }

    #[test]
    fn test_extract_trigger_times_shape() {
        let n = node(
            "n8n-nodes-base.cron",
            json!({
                "triggerTimes": {
                    "item": [
                        { "mode": "everyDay", "hour": 3 },
                        { "mode": "custom", "cronExpression": "0 3 * * 1" }
                    ]
                }
            }),
        );
        assert_eq!(extract_cron_expression(&n).as_deref(), Some("0 3 * * 1"));
        assert_eq!(extract_timezone(&n), None);
        assert_eq!(detect_shape(&n), Some(ParameterShape::TriggerTimes));
    }

    #[test]
    fn test_rule_shape_wins_over_flat() {
        let n = node(
            "n8n-nodes-base.scheduleTrigger",
            json!({
                "cronExpression": "1 1 * * *",
                "rule": { "interval": [{ "field": "cronExpression", "expression": "2 2 * * *" }] }
            }),
        );
        assert_eq!(extract_cron_expression(&n).as_deref(), Some("2 2 * * *"));
    }

    #[test]
    fn test_unknown_shape_yields_none() {
        let n = node(
            "n8n-nodes-base.scheduleTrigger",
            json!({ "rule": { "interval": [{ "field": "minutes" }] }, "cronExpression": 5 }),
        );
        assert_eq!(extract_cron_expression(&n), None);
        assert_eq!(extract_timezone(&n), None);
        assert_eq!(detect_shape(&n), None);

        let bare = node("schedule", Value::Null);
        assert_eq!(extract_cron_expression(&bare), None);
    }

    #[test]
    fn test_analyze_managed_workflow() {
        let wf = workflow(
            "My Workflow",
            vec![node(
                "n8n-nodes-base.scheduleTrigger",
                json!({ "rule": { "interval": [{ "field": "cronExpression", "expression": "0 0 * * *" }] } }),
            )],
            &["managed-by:cron8n", "cron8n:my-workflow"],
        );

        let analysis = analyze_workflow(&wf);
        assert!(analysis.is_managed);
        assert_eq!(analysis.managed_slug.as_deref(), Some("my-workflow"));
        assert_eq!(analysis.cron_nodes.len(), 1);
        assert_eq!(analysis.primary_schedule(), Some(("0 0 * * *", None)));
    }

    #[test]
    fn test_settings_timezone_is_fallback() {
        let mut wf = workflow(
            "tz",
            vec![node("schedule", json!({ "cronExpression": "0 0 * * *" }))],
            &[],
        );
        wf.settings.insert("timezone".to_string(), json!("Asia/Tokyo"));

        let analysis = analyze_workflow(&wf);
        assert_eq!(
            analysis.primary_schedule(),
            Some(("0 0 * * *", Some("Asia/Tokyo")))
        );
    }

    #[test]
    fn test_managed_without_slug_tag() {
        let wf = workflow("Edited", vec![], &["managed-by:cron8n", "cron8n:"]);
        assert!(is_managed(&wf));
        assert_eq!(get_managed_slug(&wf), None);
    }

    #[test]
    fn test_suggest_slug_uses_plain_generator() {
        let wf = workflow("Nightly Report (EU)", vec![], &[]);
        assert_eq!(suggest_slug(&wf), "nightly-report-eu");
    }

    #[test]
    fn test_group_workflows() {
        let cron = || node("n8n-nodes-base.scheduleTrigger", json!({}));
        let http = || node("n8n-nodes-base.httpRequest", json!({}));

        let list = vec![
            workflow("a", vec![cron()], &["managed-by:cron8n", "cron8n:a"]),
            workflow("b", vec![cron(), http()], &[]),
            workflow("c", vec![http()], &["managed-by:cron8n"]),
            workflow("d", vec![], &[]),
        ];

        let grouped = group_workflows(&list);
        assert_eq!(grouped.managed.len(), 1);
        assert_eq!(grouped.managed[0].name, "a");
        assert_eq!(grouped.unmanaged.len(), 1);
        assert_eq!(grouped.unmanaged[0].name, "b");
    }

    #[test]
    fn test_management_tags() {
        assert_eq!(
            management_tags("daily-backup"),
            vec!["managed-by:cron8n", "cron8n:daily-backup"]
        );
    }
}
