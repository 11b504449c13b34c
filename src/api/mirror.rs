use serde_json::Value;

use super::client::HttpGateway;
use crate::error::FetchError;
use crate::model::{MirrorFilterView, MirrorRequest, MirrorSessionCreated};

fn required_str(obj: &serde_json::Map<String, Value>, name: &str) -> Result<String, FetchError> {
    obj.get(name)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| FetchError::Decode(format!("mirror response is missing {}", name)))
}

/// Create a traffic-mirror session from a source to a target instance.
/// The backend resolves both primary ENIs, builds the filter and its
/// rules, reuses an existing target when one points at the same ENI,
/// and picks the next free session number.
pub async fn create_mirror_session(
    gateway: &HttpGateway,
    request: &MirrorRequest,
) -> Result<MirrorSessionCreated, FetchError> {
    let body = serde_json::to_value(request).map_err(FetchError::decode)?;
    let payload = gateway.post("/mirror", &body).await?;
    let Value::Object(obj) = payload else {
        return Err(FetchError::Decode("mirror response is not an object".into()));
    };
    Ok(MirrorSessionCreated {
        source_eni: required_str(&obj, "source_eni")?,
        target_eni: required_str(&obj, "target_eni")?,
        filter_id: required_str(&obj, "filter_id")?,
        target_id: required_str(&obj, "target_id")?,
        session_number: obj
            .get("session_number")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| FetchError::Decode("mirror response is missing session_number".into()))?,
    })
}

/// List every traffic-mirror filter in a region, with its rules and
/// active sessions.
pub async fn list_mirror_filters(
    gateway: &HttpGateway,
    region: &str,
) -> Result<Vec<MirrorFilterView>, FetchError> {
    let payload = gateway.get("/filters", &[("region", region)]).await?;
    let Value::Array(items) = payload else {
        return Err(FetchError::Decode("filters response is not an array".into()));
    };
    Ok(items.iter().filter_map(MirrorFilterView::from_value).collect())
}

/// Delete a mirror session; the backend also removes the session's
/// target and filter once nothing else references them. Returns the
/// backend's confirmation message.
pub async fn delete_mirror_session(
    gateway: &HttpGateway,
    region: &str,
    session_id: &str,
) -> Result<String, FetchError> {
    let payload = gateway
        .delete(&format!("/filters/{}", session_id), &[("region", region)])
        .await?;
    Ok(payload
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("Session deleted")
        .to_string())
}
