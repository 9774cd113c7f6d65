//! Workflow JSON parser.

use std::path::Path;

use super::types::Workflow;
use crate::error::{Error, Result};

/// Parse a workflow from a JSON string.
pub fn parse_workflow(json: &str) -> Result<Workflow> {
    if json.trim().is_empty() {
        return Err(Error::file("Empty workflow definition"));
    }

    serde_json::from_str(json).map_err(|e| {
        let msg = e.to_string();
        if let Some(field) = extract_missing_field(&msg) {
            Error::file(format!("Missing required field: {}", field))
        } else {
            Error::file(format!("Invalid workflow JSON: {}", msg))
        }
    })
}

/// Parse a workflow from a file path.
pub async fn parse_workflow_file(path: &Path) -> Result<Workflow> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::file(format!("Workflow file not found: {}", path.display()))
        } else {
            Error::file(format!("Failed to read {}: {}", path.display(), e))
        }
    })?;
    parse_workflow(&content).map_err(|e| match e {
        Error::File { message, hint } => Error::File {
            message: format!("{} ({})", message, path.display()),
            hint,
        },
        other => other,
    })
}

fn extract_missing_field(error_message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = error_message.find(marker)? + marker.len();
    let rest = &error_message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}
