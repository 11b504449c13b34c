use serde::Serialize;
use serde_json::Value;

/// Request body for `POST /mirror`.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorRequest {
    pub region: String,
    pub source_instance_id: String,
    pub target_instance_id: String,
    pub protocol: i64,
    pub directions: Vec<String>,
}

impl MirrorRequest {
    pub fn new(
        region: impl Into<String>,
        source_instance_id: impl Into<String>,
        target_instance_id: impl Into<String>,
    ) -> Self {
        MirrorRequest {
            region: region.into(),
            source_instance_id: source_instance_id.into(),
            target_instance_id: target_instance_id.into(),
            // Backend defaults: ICMP, both directions
            protocol: 1,
            directions: vec!["ingress".into(), "egress".into()],
        }
    }
}

/// Result of creating a mirror session.
#[derive(Debug, Clone)]
pub struct MirrorSessionCreated {
    pub source_eni: String,
    pub target_eni: String,
    pub filter_id: String,
    pub target_id: String,
    pub session_number: i64,
}

/// One rule of a traffic-mirror filter as returned by `GET /filters`.
#[derive(Debug, Clone)]
pub struct MirrorRuleView {
    pub rule_id: String,
    pub direction: String,
    pub source_cidr: String,
    pub destination_cidr: String,
    pub action: String,
}

/// One active session attached to a filter.
#[derive(Debug, Clone)]
pub struct MirrorSessionView {
    pub session_id: String,
    pub source_instance_id: String,
    pub target_id: String,
    pub session_number: i64,
}

/// One traffic-mirror filter with its rules and sessions.
#[derive(Debug, Clone)]
pub struct MirrorFilterView {
    pub filter_id: String,
    pub description: Option<String>,
    pub rules: Vec<MirrorRuleView>,
    pub sessions: Vec<MirrorSessionView>,
}

fn str_field(obj: &serde_json::Map<String, Value>, name: &str) -> String {
    obj.get(name).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

impl MirrorFilterView {
    /// Build a view from one element of the `/filters` payload.
    /// Unknown or missing fields default to empty rather than failing:
    /// the list view degrades, it does not disappear.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let filter_id = str_field(obj, "FilterId");
        if filter_id.is_empty() {
            return None;
        }

        let rules = obj
            .get("Rules")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| r.as_object())
                    .map(|r| MirrorRuleView {
                        rule_id: str_field(r, "RuleId"),
                        direction: str_field(r, "Direction"),
                        source_cidr: str_field(r, "SourceCidr"),
                        destination_cidr: str_field(r, "DestinationCidr"),
                        action: str_field(r, "Action"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let sessions = obj
            .get("Sessions")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_object())
                    .map(|s| MirrorSessionView {
                        session_id: str_field(s, "SessionId"),
                        source_instance_id: str_field(s, "SourceInstanceId"),
                        target_id: str_field(s, "TargetId"),
                        session_number: s.get("SessionNumber").and_then(|v| v.as_i64()).unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(MirrorFilterView {
            filter_id,
            description: obj.get("Description").and_then(|v| v.as_str()).map(String::from),
            rules,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_view_from_payload() {
        let payload = json!({
            "FilterId": "tmf-001",
            "Description": null,
            "Rules": [
                {"RuleId": "tmfr-1", "Direction": "ingress", "SourceCidr": "0.0.0.0/0",
                 "DestinationCidr": "10.0.1.10/32", "Action": "accept", "RuleNumber": 100}
            ],
            "Sessions": [
                {"SessionId": "tms-001", "SourceInstanceId": "i-001",
                 "TargetId": "tmt-001", "SessionNumber": 1}
            ]
        });
        let view = MirrorFilterView::from_value(&payload).unwrap();
        assert_eq!(view.filter_id, "tmf-001");
        assert_eq!(view.rules.len(), 1);
        assert_eq!(view.rules[0].direction, "ingress");
        assert_eq!(view.sessions[0].session_id, "tms-001");
        assert_eq!(view.sessions[0].session_number, 1);
    }

    #[test]
    fn test_filter_view_requires_id() {
        assert!(MirrorFilterView::from_value(&json!({"Rules": []})).is_none());
    }
}
