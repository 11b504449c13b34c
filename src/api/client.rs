use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use yansi::Paint;

use crate::cache::FetchGateway;
use crate::config;
use crate::error::FetchError;
use crate::model::{RawRecord, ResourceKey, ResourceLevel};

static SILENT: AtomicBool = AtomicBool::new(false);

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

fn log_request(method: &str, url: &str) {
    if !SILENT.load(Ordering::Relaxed) {
        eprintln!(
            "{} {}",
            Paint::new(method).fg(yansi::Color::Yellow).bold(),
            Paint::new(url).fg(yansi::Color::Cyan)
        );
    }
}

/// HTTP client for the topology backend. Performs the network calls
/// and normalizes payload shapes and errors; it caches nothing.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("dno/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config::DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        HttpGateway {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_env() -> Self {
        HttpGateway::new(config::get_api_base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        log_request(method, &url);

        let mut req = match method {
            "POST" => self.client.post(&url),
            "DELETE" => self.client.delete(&url),
            _ => self.client.get(&url),
        };
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await.map_err(FetchError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(%status, %url, "backend request failed");
            return Err(FetchError::Transport(format!("HTTP {}: {}", status, text)));
        }
        response.json().await.map_err(FetchError::decode)
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        self.request("GET", path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, FetchError> {
        self.request("POST", path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        self.request("DELETE", path, query, None).await
    }
}

fn as_array(payload: Value) -> Result<Vec<Value>, FetchError> {
    match payload {
        Value::Array(arr) => Ok(arr),
        other => Err(FetchError::Decode(format!(
            "expected a JSON array, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build records from an array of objects, taking `id_field` as the
/// provider id and everything else as opaque attributes.
fn records_from_objects(items: Vec<Value>, id_field: &str) -> Result<Vec<RawRecord>, FetchError> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(mut obj) = item else {
            return Err(FetchError::Decode(format!(
                "expected an object with {}",
                id_field
            )));
        };
        let id = obj
            .get(id_field)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| FetchError::Decode(format!("record is missing {}", id_field)))?;
        obj.remove(id_field);
        records.push(RawRecord { id, attributes: obj });
    }
    Ok(records)
}

impl FetchGateway for HttpGateway {
    async fn fetch_children(
        &self,
        level: ResourceLevel,
        parent: Option<&ResourceKey>,
    ) -> Result<Vec<RawRecord>, FetchError> {
        match (level, parent) {
            (ResourceLevel::Region, _) => {
                let items = as_array(self.get("/regions", &[]).await?)?;
                items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(id) => Ok(RawRecord::new(id)),
                        other => Err(FetchError::Decode(format!(
                            "expected a region name, got {}",
                            type_name(&other)
                        ))),
                    })
                    .collect()
            }
            (ResourceLevel::Vpc, Some(region)) => {
                let items = as_array(self.get("/vpcs", &[("region", region.id())]).await?)?;
                records_from_objects(items, "VpcId")
            }
            (ResourceLevel::Subnet, Some(vpc)) => {
                let items = as_array(
                    self.get("/subnets", &[("region", vpc.region_id()), ("vpc_id", vpc.id())])
                        .await?,
                )?;
                records_from_objects(items, "SubnetId")
            }
            (ResourceLevel::Instance, Some(subnet)) => {
                let items = as_array(
                    self.get(
                        "/instances_in_subnet",
                        &[("region", subnet.region_id()), ("subnet_id", subnet.id())],
                    )
                    .await?,
                )?;
                records_from_objects(items, "InstanceId")
            }
            (level, None) => Err(FetchError::Decode(format!(
                "a {} listing needs a parent key",
                level
            ))),
        }
    }

    async fn fetch_details(&self, key: &ResourceKey) -> Result<RawRecord, FetchError> {
        if key.level() != ResourceLevel::Instance {
            return Err(FetchError::Decode(format!(
                "the backend has no detail endpoint for {} resources",
                key.level()
            )));
        }
        let payload = self
            .get(
                "/instance_details",
                &[("region", key.region_id()), ("instance_id", key.id())],
            )
            .await?;
        let Value::Object(mut attributes) = payload else {
            return Err(FetchError::Decode("instance details is not an object".into()));
        };
        // The backend sometimes returns State as the provider's nested
        // {Code, Name} object; flatten it to the name string.
        if let Some(name) = attributes
            .get("State")
            .and_then(|v| v.as_object())
            .and_then(|s| s.get("Name"))
            .and_then(|v| v.as_str())
            .map(String::from)
        {
            attributes.insert("State".to_string(), Value::String(name));
        }
        let id = attributes
            .get("InstanceId")
            .and_then(|v| v.as_str())
            .unwrap_or(key.id())
            .to_string();
        Ok(RawRecord { id, attributes })
    }
}
