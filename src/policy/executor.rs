//! Maps catalog tool names onto policy-server REST calls and shapes the
//! responses for the model.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Error;
use crate::orchestrator::ToolExecutor;
use crate::policy::client::PolicyClient;
use crate::Result;

const POLICY_V1: &str = "/ca/api/sso/services/policy/v1";
const SOURCE_NOTE: &str = "data retrieved from the policy server REST API";

pub struct PolicyToolExecutor {
    client: PolicyClient,
}

impl PolicyToolExecutor {
    pub fn new(client: PolicyClient) -> Self {
        Self { client }
    }

    /// Fetch a collection endpoint and wrap it in a counted summary.
    async fn list(&self, collection: &str, label: &str, field: &str) -> Result<Value> {
        let data = self
            .client
            .get(&format!("{POLICY_V1}/{collection}"))
            .await?;
        let items = data.get("data").cloned().unwrap_or(Value::Null);
        let count = items.as_array().map_or(0, Vec::len);
        Ok(json!({
            "message": format!("Found {count} {label}"),
            "count": count,
            field: items,
            "note": SOURCE_NOTE,
        }))
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Value> {
        // Object ids resolve through the generic objects endpoint; plain
        // names go through the agents collection.
        let path = if agent_id.starts_with("CA.SM::") {
            format!("{POLICY_V1}/objects/{agent_id}")
        } else {
            format!("{POLICY_V1}/SmAgents/{agent_id}")
        };
        let data = self.client.get(&path).await?;
        Ok(json!({
            "message": format!("Agent details for {agent_id}"),
            "agent": data.get("data").cloned().unwrap_or(Value::Null),
            "note": SOURCE_NOTE,
        }))
    }

    async fn get_domain(&self, domain_id: &str) -> Result<Value> {
        let data = self
            .client
            .get(&format!("{POLICY_V1}/objects/{domain_id}"))
            .await?;
        Ok(json!({
            "message": format!("Domain details for {domain_id}"),
            "domain": data.get("data").cloned().unwrap_or(Value::Null),
            "note": SOURCE_NOTE,
        }))
    }

    async fn get_object(&self, object_id: &str) -> Result<Value> {
        let data = self
            .client
            .get(&format!("{POLICY_V1}/objects/{object_id}"))
            .await?;
        Ok(json!({
            "message": format!("Object details for {object_id}"),
            "object": data.get("data").cloned().unwrap_or(Value::Null),
            "links": data.get("links").cloned().unwrap_or(Value::Null),
            "note": SOURCE_NOTE,
        }))
    }
}

#[async_trait]
impl ToolExecutor for PolicyToolExecutor {
    async fn execute(&self, name: &str, input: &Value) -> Result<String> {
        debug!(tool = name, "dispatching policy tool");
        let result = match name {
            "list_agents" => self.list("SmAgents", "agents", "agents").await?,
            "get_agent" => {
                let id = required_str(name, input, "agent_id")?;
                self.get_agent(&id).await?
            }
            "list_domains" => self.list("SmDomains", "domains", "domains").await?,
            "get_domain" => {
                let id = required_str(name, input, "domain_id")?;
                self.get_domain(&id).await?
            }
            "list_realms" => self.list("SmRealms", "realms", "realms").await?,
            "list_policies" => self.list("SmPolicies", "policies", "policies").await?,
            "list_user_directories" => {
                self.list("SmUserDirs", "user directories", "directories")
                    .await?
            }
            "list_auth_schemes" => {
                self.list("SmAuthSchemes", "authentication schemes", "schemes")
                    .await?
            }
            "list_policy_servers" => {
                self.list("SmPolicyServers", "policy servers", "servers")
                    .await?
            }
            "get_object" => {
                let id = required_str(name, input, "object_id")?;
                self.get_object(&id).await?
            }
            other => return Err(Error::UnknownTool(other.to_string())),
        };
        Ok(serde_json::to_string_pretty(&result)?)
    }
}

fn required_str(tool: &str, input: &Value, key: &str) -> Result<String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::tool_execution(tool, format!("missing required argument '{key}'")))
}
