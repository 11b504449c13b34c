use serde::Serialize;

use super::client::HttpGateway;
use crate::error::FetchError;

/// Request body for `POST /deploy`. When `subnet_id` is omitted the
/// backend picks the VPC's first subnet.
#[derive(Debug, Clone, Serialize)]
pub struct DeployRequest {
    pub region: String,
    pub vpc_id: String,
    pub ami_id: String,
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

/// Launch a monitoring node into the selected VPC. Returns the new
/// instance id.
pub async fn deploy_node(gateway: &HttpGateway, request: &DeployRequest) -> Result<String, FetchError> {
    let body = serde_json::to_value(request).map_err(FetchError::decode)?;
    let payload = gateway.post("/deploy", &body).await?;
    payload
        .get("instance_id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| FetchError::Decode("deploy response is missing instance_id".into()))
}
