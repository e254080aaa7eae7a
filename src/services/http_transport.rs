use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::middleware::AppError;
use crate::models::{AuthenticationType, ConnectionArgs, WarehouseSettings};

/// Inbound request headers that carry the caller's identity
const IDENTITY_HEADERS: [&str; 2] = ["authorization", "x-id-token"];

/// Instance-level options for building a warehouse HTTP client
#[derive(Debug, Clone, Default)]
pub struct HttpClientOptions {
    pub timeout: Option<Duration>,
    /// Stored service credential; a forwarded `Authorization` still wins per request
    pub bearer_token: Option<String>,
}

impl HttpClientOptions {
    pub fn from_settings(settings: &WarehouseSettings) -> Self {
        let bearer_token = match settings.authentication_type {
            AuthenticationType::AccessToken => settings.access_token.clone(),
            AuthenticationType::ForwardOAuthIdentity => None,
        };
        Self {
            timeout: settings.timeout(),
            bearer_token,
        }
    }
}

/// Caller headers attached to each outgoing request.
///
/// Clients are shared across callers and cached with their sessions, so the
/// caller's identity never goes into a client; it travels with every call.
#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders {
    headers: HeaderMap,
}

impl ForwardedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers from a `grafana-http-headers` map
    pub fn from_map(map: &HashMap<String, Vec<String>>) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        for (name, values) in map {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::Validation(format!("Invalid forwarded header name '{}': {}", name, e)))?;
            for value in values {
                let mut header_value = HeaderValue::from_str(value)
                    .map_err(|e| AppError::Validation(format!("Invalid value for header '{}': {}", name, e)))?;
                header_value.set_sensitive(true);
                headers.append(header_name.clone(), header_value);
            }
        }
        Ok(Self { headers })
    }

    pub fn from_connection_args(args: Option<&ConnectionArgs>) -> Result<Self, AppError> {
        match args {
            Some(args) => Self::from_map(&args.headers),
            None => Ok(Self::new()),
        }
    }

    /// The identity headers of an inbound request
    pub fn from_request(inbound: &HeaderMap) -> Self {
        let mut headers = HeaderMap::new();
        for name in IDENTITY_HEADERS {
            for value in inbound.get_all(name) {
                headers.append(HeaderName::from_static(name), value.clone());
            }
        }
        Self { headers }
    }

    /// Fill in headers this set lacks from `fallback`
    pub fn or_else(mut self, fallback: ForwardedHeaders) -> Self {
        let mut current = None;
        for (name, value) in fallback.headers {
            if let Some(name) = name {
                current = (!self.headers.contains_key(&name)).then_some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Set these headers on `request`, replacing the client's defaults of the same name
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        if self.headers.is_empty() {
            return request;
        }
        request.headers(self.headers.clone())
    }
}

/// Build a client that asks for uncompressed responses. Only instance-level
/// settings go into it.
pub fn build_http_client(options: &HttpClientOptions) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();

    if let Some(token) = &options.bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| AppError::Connection(format!("Invalid access token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let mut builder = Client::builder()
        .default_headers(headers)
        .no_gzip()
        .no_brotli()
        .no_deflate();
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| AppError::Connection(format!("Failed to create HTTP client: {}", e)))
}

/// Shared transport of one datasource instance
#[derive(Debug, Clone)]
pub struct HttpTransportEntry {
    pub client: Client,
    /// Service URL the instance was configured with, ending in `/`
    pub base_url: String,
}

/// One HTTP client per datasource instance, kept for the life of the process.
///
/// Separate from the two session caches: those are keyed by connection key,
/// this one only by instance id.
#[derive(Debug, Default)]
pub struct HttpTransportRegistry {
    entries: DashMap<i64, HttpTransportEntry>,
}

impl HttpTransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance_id: i64) -> Option<HttpTransportEntry> {
        self.entries.get(&instance_id).map(|entry| entry.value().clone())
    }

    /// Return the instance's entry, building it on first use
    pub fn get_or_create(
        &self,
        instance_id: i64,
        settings: &WarehouseSettings,
        options: &HttpClientOptions,
    ) -> Result<HttpTransportEntry, AppError> {
        if let Some(entry) = self.get(instance_id) {
            return Ok(entry);
        }

        let client = build_http_client(options)?;
        Ok(self.insert_if_absent(
            instance_id,
            HttpTransportEntry {
                client,
                base_url: settings.url.clone(),
            },
        ))
    }

    /// Store `entry` unless the instance already has one; the first writer wins.
    pub fn insert_if_absent(&self, instance_id: i64, entry: HttpTransportEntry) -> HttpTransportEntry {
        let stored = self.entries.entry(instance_id).or_insert_with(|| {
            tracing::debug!("Registered HTTP transport for datasource {}", instance_id);
            entry
        });
        stored.value().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
