//! n8n workflow document types.
//!
//! Only the fields cron8n reads are typed; everything else is kept in
//! `extra` so a remote document survives a load/save round trip.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Number, Value};

/// A workflow as stored by n8n (and in `workflows/<slug>.json`).
///
/// # Example
///
/// ```json
/// {
///   "name": "Daily backup",
///   "active": false,
///   "nodes": [
///     { "name": "Schedule Trigger", "type": "n8n-nodes-base.scheduleTrigger", ... },
///     { "name": "HTTP Request", "type": "n8n-nodes-base.httpRequest", ... }
///   ],
///   "connections": { "Schedule Trigger": { "main": [[{ "node": "HTTP Request", "type": "main", "index": 0 }]] } },
///   "settings": { "timezone": "UTC" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Remote identifier, absent for local-only documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub active: bool,

    /// Ordered node list
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,

    /// Connection graph keyed by source node name
    #[serde(default, deserialize_with = "null_as_default")]
    pub connections: Map<String, Value>,

    /// Older n8n versions return `null` here
    #[serde(default, deserialize_with = "null_as_default")]
    pub settings: Map<String, Value>,

    /// Tags as returned by the server
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            active: false,
            nodes: Vec::new(),
            connections: Map::new(),
            settings: Map::new(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Names of the tags attached to this workflow.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.name.as_str())
    }

    /// Workflow-level timezone setting.
    pub fn settings_timezone(&self) -> Option<&str> {
        self.settings
            .get("timezone")
            .and_then(Value::as_str)
            .filter(|tz| !tz.is_empty())
    }

    /// Body accepted by the REST API on create and update.
    ///
    /// The API rejects read-only fields such as `id`, `active` and `tags`.
    pub fn to_payload(&self) -> Value {
        json!({
            "name": self.name,
            "nodes": self.nodes,
            "connections": self.connections,
            "settings": self.settings,
        })
    }

    /// Local copy of a remote document: server-owned fields are dropped.
    pub fn to_local(&self) -> Self {
        let mut local = Self::new(self.name.clone());
        local.nodes = self.nodes.clone();
        local.connections = self.connections.clone();
        local.settings = self.settings.clone();
        local
    }

    /// Connect `from`'s main output to `to`'s main input.
    pub fn connect(&mut self, from: &str, to: &str) {
        self.connections.insert(
            from.to_string(),
            json!({ "main": [[{ "node": to, "type": "main", "index": 0 }]] }),
        );
    }
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Node type string, e.g. `n8n-nodes-base.scheduleTrigger`
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<Number>,

    #[serde(default = "default_position")]
    pub position: Value,

    /// Free-form parameter bag
    #[serde(default = "default_parameters")]
    pub parameters: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_position() -> Value {
    json!([0, 0])
}

fn default_parameters() -> Value {
    Value::Object(Map::new())
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        node_type: impl Into<String>,
        type_version: Number,
        position: [i64; 2],
        parameters: Value,
    ) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            name: name.into(),
            node_type: node_type.into(),
            type_version: Some(type_version),
            position: json!(position),
            parameters,
            extra: Map::new(),
        }
    }
}

/// A tag resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let raw = json!({
            "id": "abc",
            "name": "Remote",
            "active": true,
            "nodes": [{
                "id": "n1",
                "name": "Trigger",
                "type": "n8n-nodes-base.scheduleTrigger",
                "typeVersion": 1.2,
                "position": [250, 300],
                "parameters": {},
                "notesInFlow": true
            }],
            "connections": {},
            "settings": { "executionOrder": "v1" },
            "tags": [{ "id": "1", "name": "managed-by:cron8n" }],
            "versionId": "v-123",
            "createdAt": "2026-01-01T00:00:00.000Z"
        });

        let wf: Workflow = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(wf.extra["versionId"], "v-123");
        assert_eq!(wf.nodes[0].extra["notesInFlow"], true);
        assert_eq!(serde_json::to_value(&wf).unwrap(), raw);
    }

    #[test]
    fn test_null_collections_are_empty() {
        let wf: Workflow = serde_json::from_value(json!({
            "id": "1",
            "name": "Old",
            "nodes": null,
            "connections": null,
            "settings": null,
            "tags": null
        }))
        .unwrap();

        assert!(wf.nodes.is_empty());
        assert!(wf.connections.is_empty());
        assert!(wf.settings.is_empty());
        assert!(wf.tags.is_empty());
        assert_eq!(wf.settings_timezone(), None);
    }

    #[test]
    fn test_payload_strips_read_only_fields() {
        let mut wf = Workflow::new("Payload");
        wf.id = Some("abc".to_string());
        wf.active = true;
        wf.tags.push(Tag {
            id: "1".to_string(),
            name: "x".to_string(),
        });

        let payload = wf.to_payload();
        let keys: Vec<_> = payload.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert!(payload.get("id").is_none());
        assert!(payload.get("active").is_none());
        assert!(payload.get("tags").is_none());
    }

    #[test]
    fn test_to_local() {
        let mut wf = Workflow::new("Remote");
        wf.id = Some("abc".to_string());
        wf.active = true;
        wf.extra.insert("versionId".to_string(), json!("v1"));

        let local = wf.to_local();
        assert!(local.id.is_none());
        assert!(!local.active);
        assert!(local.extra.is_empty());
        assert_eq!(local.name, "Remote");
    }

    #[test]
    fn test_new_nodes_get_unique_ids() {
        let a = Node::new("A", "t", Number::from(1), [0, 0], json!({}));
        let b = Node::new("B", "t", Number::from(1), [0, 0], json!({}));
        assert!(uuid::Uuid::parse_str(a.id.as_deref().unwrap()).is_ok());
        assert_ne!(a.id, b.id);
    }
}
