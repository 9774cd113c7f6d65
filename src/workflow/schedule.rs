//! Writing schedules into workflow documents.
//!
//! Readers accept three parameter shapes (see `discovery`); writers only
//! ever produce the rule/interval shape on a `scheduleTrigger` node.

use serde_json::{json, Number, Value};

use super::discovery::is_cron_node;
use super::types::{Node, Workflow};
use crate::error::{Error, Result};

pub const SCHEDULE_TRIGGER_TYPE: &str = "n8n-nodes-base.scheduleTrigger";
pub const SCHEDULE_TRIGGER_NAME: &str = "Schedule Trigger";

fn schedule_trigger_version() -> Number {
    Number::from_f64(1.2).unwrap_or_else(|| Number::from(1))
}

/// Trigger parameters in the rule/interval shape.
pub fn schedule_parameters(cron_expression: &str, timezone: &str) -> Value {
    json!({
        "rule": {
            "interval": [
                { "field": "cronExpression", "expression": cron_expression }
            ],
            "timezone": timezone
        }
    })
}

/// A fresh schedule trigger node.
pub fn schedule_trigger_node(cron_expression: &str, timezone: &str) -> Node {
    Node::new(
        SCHEDULE_TRIGGER_NAME,
        SCHEDULE_TRIGGER_TYPE,
        schedule_trigger_version(),
        [250, 300],
        schedule_parameters(cron_expression, timezone),
    )
}

/// Rewrite the workflow's trigger node with a new schedule.
///
/// The first cron node is converted to a current `scheduleTrigger` if it
/// used a legacy type, its legacy schedule keys are dropped, and
/// `settings.timezone` is updated to match.
pub fn set_schedule(workflow: &mut Workflow, cron_expression: &str, timezone: &str) -> Result<()> {
    let node = workflow
        .nodes
        .iter_mut()
        .find(|n| is_cron_node(n))
        .ok_or_else(|| {
            Error::validation(format!(
                "Workflow '{}' has no schedule trigger node",
                workflow_name_hint(&workflow.name)
            ))
        })?;

    if node.node_type != SCHEDULE_TRIGGER_TYPE {
        node.node_type = SCHEDULE_TRIGGER_TYPE.to_string();
        node.type_version = Some(schedule_trigger_version());
    }

    let mut params = match std::mem::take(&mut node.parameters) {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for legacy in ["cronExpression", "timezone", "triggerTimes"] {
        params.remove(legacy);
    }
    if let Value::Object(rule) = schedule_parameters(cron_expression, timezone) {
        params.extend(rule);
    }
    node.parameters = Value::Object(params);

    workflow
        .settings
        .insert("timezone".to_string(), json!(timezone));
    Ok(())
}

fn workflow_name_hint(name: &str) -> &str {
    if name.is_empty() {
        "<unnamed>"
    } else {
        name
    }
}
