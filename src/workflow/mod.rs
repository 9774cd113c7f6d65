//! n8n workflow documents, schedule handling and discovery.
//!
//! - Types: the workflow/node/tag document model
//! - Parser: reading workflow JSON from strings and files
//! - Schedule: writing cron triggers into documents
//! - Discovery: classifying remote workflows as cron/managed

mod discovery;
mod parser;
mod schedule;
mod types;

pub use discovery::{
    analyze_workflow, detect_shape, extract_cron_expression, extract_timezone, get_managed_slug,
    group_workflows, is_cron_node, is_managed, management_tags, slug_tag, suggest_slug,
    CronNodeInfo, GroupedWorkflows, ParameterShape, WorkflowAnalysis, CRON_NODE_TYPES,
    MANAGED_TAG, SLUG_TAG_PREFIX,
};
pub use parser::{parse_workflow, parse_workflow_file};
pub use schedule::{
    schedule_parameters, schedule_trigger_node, set_schedule, SCHEDULE_TRIGGER_NAME,
    SCHEDULE_TRIGGER_TYPE,
};
pub use types::*;
