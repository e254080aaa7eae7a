use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::middleware::AppError;
use crate::models::WarehouseSettings;

/// Per-call overrides sent along with a query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "grafana-http-headers", default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,
}

/// Parse the raw connection arguments attached to a query, if any.
pub fn parse_connection_args(query_args: Option<&serde_json::Value>) -> Result<Option<ConnectionArgs>, AppError> {
    match query_args {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|e| AppError::Validation(format!("error reading query params: {}", e))),
    }
}

/// Effective project/location/dataset/table of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub project: String,
    pub location: String,
    pub dataset: String,
    pub table: String,
}

impl ConnectionSettings {
    /// Non-empty per-call values win over the instance defaults.
    pub fn resolve(settings: &WarehouseSettings, args: Option<&ConnectionArgs>) -> Self {
        fn pick(arg: Option<&String>, default: &str) -> String {
            match arg {
                Some(value) if !value.is_empty() => value.clone(),
                _ => default.to_string(),
            }
        }

        Self {
            project: pick(args.and_then(|a| a.project.as_ref()), &settings.default_project),
            location: pick(args.and_then(|a| a.location.as_ref()), &settings.processing_location),
            dataset: pick(args.and_then(|a| a.dataset.as_ref()), &settings.dataset),
            table: pick(args.and_then(|a| a.table.as_ref()), &settings.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{load_settings, DatasourceInstanceSettings};
    use serde_json::json;

    fn settings() -> WarehouseSettings {
        load_settings(&DatasourceInstanceSettings {
            id: 1,
            json_data: json!({
                "defaultProject": "default-proj",
                "processingLocation": "US",
                "dataset": "sales"
            }),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_no_args_uses_defaults() {
        let resolved = ConnectionSettings::resolve(&settings(), None);
        assert_eq!(resolved.project, "default-proj");
        assert_eq!(resolved.location, "US");
        assert_eq!(resolved.dataset, "sales");
        assert_eq!(resolved.table, "");
    }

    #[test]
    fn test_args_override_defaults() {
        let args = parse_connection_args(Some(&json!({
            "project": "other",
            "location": "EU",
            "dataset": "",
            "grafana-http-headers": { "Authorization": ["Bearer abc"] }
        })))
        .unwrap()
        .unwrap();

        let resolved = ConnectionSettings::resolve(&settings(), Some(&args));
        assert_eq!(resolved.project, "other");
        assert_eq!(resolved.location, "EU");
        // empty override falls back
        assert_eq!(resolved.dataset, "sales");
        assert_eq!(args.headers["Authorization"], vec!["Bearer abc".to_string()]);
    }

    #[test]
    fn test_malformed_args() {
        let err = parse_connection_args(Some(&json!({ "location": 5 }))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(parse_connection_args(Some(&serde_json::Value::Null)).unwrap().is_none());
    }
}
