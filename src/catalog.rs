//! The declarative catalog of policy-server read operations advertised to
//! the model. Built once at startup; read-only thereafter.

use serde_json::json;

use crate::types::tool::ToolDescriptor;

/// All tools the model may invoke. Read-only administrative queries — the
/// chat surface deliberately exposes nothing that mutates the policy store.
pub fn default_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "list_agents",
            "List all policy server agents",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "get_agent",
            "Get details of a specific agent by name or object id",
            json!({
                "type": "object",
                "properties": {
                    "agent_id": {
                        "type": "string",
                        "description": "Agent object id (e.g. CA.SM::Agent@01-xxx) or plain name",
                    },
                },
                "required": ["agent_id"],
            }),
        ),
        ToolDescriptor::new(
            "list_domains",
            "List all policy server domains",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "get_domain",
            "Get details of a specific domain by object id",
            json!({
                "type": "object",
                "properties": {
                    "domain_id": {
                        "type": "string",
                        "description": "Domain object id (e.g. CA.SM::Domain@03-xxx)",
                    },
                },
                "required": ["domain_id"],
            }),
        ),
        ToolDescriptor::new(
            "list_realms",
            "List all policy server realms",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "list_policies",
            "List all policy server policies",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "list_user_directories",
            "List all policy server user directories",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "list_auth_schemes",
            "List all policy server authentication schemes",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "list_policy_servers",
            "List all registered policy servers",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolDescriptor::new(
            "get_object",
            "Get any policy store object by its id with full details",
            json!({
                "type": "object",
                "properties": {
                    "object_id": {
                        "type": "string",
                        "description": "Object id (e.g. CA.SM::Agent@01-xxx)",
                    },
                },
                "required": ["object_id"],
            }),
        ),
    ]
}
