use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::models::DatasourceInstanceSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub datasource: DatasourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

/// The datasource instance this process serves
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceConfig {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub default_project: String,
    pub processing_location: String,
    pub authentication_type: String,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl DatasourceConfig {
    /// Shape the configured datasource the way the host hands instances over
    pub fn instance_settings(&self) -> DatasourceInstanceSettings {
        let mut secure = HashMap::new();
        if let Some(token) = &self.access_token {
            secure.insert("accessToken".to_string(), token.clone());
        }

        DatasourceInstanceSettings {
            id: self.id,
            uid: format!("ds-{}", self.id),
            name: self.name.clone(),
            json_data: serde_json::json!({
                "url": self.url,
                "defaultProject": self.default_project,
                "processingLocation": self.processing_location,
                "authenticationType": self.authentication_type,
                "timeoutSecs": self.timeout_secs,
            }),
            decrypted_secure_json_data: secure,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?
            .set_default("datasource.id", 1)?
            .set_default("datasource.name", "warehouse")?
            .set_default("datasource.url", crate::models::DEFAULT_SERVICE_URL)?
            .set_default("datasource.default_project", "")?
            .set_default("datasource.processing_location", "")?
            .set_default("datasource.authentication_type", "forwardOAuthIdentity")?;

        if let Ok(path) = env::var("CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(url) = env::var("WAREHOUSE_URL") {
            builder = builder.set_override("datasource.url", url)?;
        }

        if let Ok(project) = env::var("WAREHOUSE_DEFAULT_PROJECT") {
            builder = builder.set_override("datasource.default_project", project)?;
        }

        if let Ok(location) = env::var("WAREHOUSE_LOCATION") {
            builder = builder.set_override("datasource.processing_location", location)?;
        }

        if let Ok(token) = env::var("WAREHOUSE_ACCESS_TOKEN") {
            builder = builder
                .set_override("datasource.access_token", Some(token))?
                .set_override("datasource.authentication_type", "accessToken")?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
