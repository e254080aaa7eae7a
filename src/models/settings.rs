use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::middleware::AppError;

pub const DEFAULT_SERVICE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2/";

/// Host-provided description of one configured datasource instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceInstanceSettings {
    pub id: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub json_data: serde_json::Value,
    #[serde(default, skip_serializing)]
    pub decrypted_secure_json_data: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationType {
    /// Callers' own OAuth identity is forwarded on every request
    #[default]
    ForwardOAuthIdentity,
    /// A stored access token is sent as the bearer credential
    AccessToken,
}

/// Decoded per-instance warehouse settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSettings {
    #[serde(default = "default_service_url")]
    pub url: String,
    #[serde(default)]
    pub default_project: String,
    #[serde(default)]
    pub processing_location: String,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub authentication_type: AuthenticationType,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(skip)]
    pub access_token: Option<String>,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

impl WarehouseSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Decode the warehouse settings of a datasource instance.
///
/// The service URL is normalised to end with `/` so that REST paths can be
/// appended to it directly.
pub fn load_settings(instance: &DatasourceInstanceSettings) -> Result<WarehouseSettings, AppError> {
    let json_data = if instance.json_data.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        instance.json_data.clone()
    };

    let mut settings: WarehouseSettings = serde_json::from_value(json_data).map_err(|e| {
        AppError::Settings(format!("couldn't load connection settings: {}", e))
    })?;

    if settings.url.trim().is_empty() {
        settings.url = default_service_url();
    }
    url::Url::parse(&settings.url).map_err(|e| {
        AppError::Settings(format!("invalid service URL '{}': {}", settings.url, e))
    })?;
    if !settings.url.ends_with('/') {
        settings.url.push('/');
    }

    settings.access_token = instance
        .decrypted_secure_json_data
        .get("accessToken")
        .filter(|token| !token.is_empty())
        .cloned();

    if settings.authentication_type == AuthenticationType::AccessToken && settings.access_token.is_none() {
        return Err(AppError::Settings(
            "access token authentication selected but no access token is configured".to_string(),
        ));
    }

    Ok(settings)
}
