use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{
    load_settings, parse_connection_args, ColumnsArgs, ConnectionSettings, DatasetsArgs, DatasourceInstanceSettings,
    ProjectsArgs, TableMetadataResponse, TableSchemaArgs, TablesArgs, ValidateQueryArgs, ValidateQueryResponse,
};
use crate::services::catalog_cache::CatalogClientCache;
use crate::services::catalog_client::CatalogClient;
use crate::services::connection_cache::{CachedConnection, ConnectionCache};
use crate::services::connection_key::ConnectionKey;
use crate::services::driver::{self, WarehouseDb};
use crate::services::http_transport::{
    build_http_client, ForwardedHeaders, HttpClientOptions, HttpTransportEntry, HttpTransportRegistry,
};
use crate::services::macros::{MacroInterpolator, StandardMacros};
use crate::services::warehouse::{SessionFactory, WarehouseSession};

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    id: String,
}

/// Entry point for query connections and catalog browsing.
///
/// Holds two session caches keyed by [`ConnectionKey`] plus one HTTP
/// transport per datasource instance. A query connection may borrow the
/// session of an existing catalog client for the same key; catalog clients
/// never borrow from query connections.
pub struct WarehouseDatasource {
    connections: ConnectionCache,
    catalog_clients: CatalogClientCache,
    transports: HttpTransportRegistry,
    factory: Arc<dyn SessionFactory>,
    macros: Arc<dyn MacroInterpolator>,
}

impl WarehouseDatasource {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            connections: ConnectionCache::new(),
            catalog_clients: CatalogClientCache::new(),
            transports: HttpTransportRegistry::new(),
            factory,
            macros: Arc::new(StandardMacros),
        }
    }

    pub fn with_macros(mut self, macros: Arc<dyn MacroInterpolator>) -> Self {
        self.macros = macros;
        self
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    pub fn catalog_clients(&self) -> &CatalogClientCache {
        &self.catalog_clients
    }

    pub fn transports(&self) -> &HttpTransportRegistry {
        &self.transports
    }

    /// Register the instance's shared transport up front so project listing
    /// works before any connection has been made.
    pub fn init_instance(&self, instance: &DatasourceInstanceSettings) -> Result<(), AppError> {
        let settings = load_settings(instance)?;
        let options = HttpClientOptions::from_settings(&settings);
        self.transports
            .get_or_create(instance.id, &settings, &options)
            .map_err(|e| e.context("Failed to create http client"))?;
        tracing::info!("Initialized datasource {} ({})", instance.id, settings.url);
        Ok(())
    }

    /// Return an open query connection for the instance and per-call arguments.
    ///
    /// The handle is shared by every caller on the same key; the caller's
    /// forwarded headers go with each [`WarehouseDb::query`] instead.
    pub async fn connect(
        &self,
        instance: &DatasourceInstanceSettings,
        query_args: Option<&serde_json::Value>,
    ) -> Result<Arc<WarehouseDb>, AppError> {
        tracing::debug!("Connecting to warehouse");

        let settings = load_settings(instance)?;
        let args = parse_connection_args(query_args)?;
        let connection_settings = ConnectionSettings::resolve(&settings, args.as_ref());
        let key = ConnectionKey::new(instance.id, &connection_settings.location, &connection_settings.project);

        if let Some(db) = self.connections.get_open(&key) {
            tracing::debug!("Reusing existing connection {}", key);
            return Ok(db);
        }
        tracing::debug!("Creating new connection {}", key);

        let options = HttpClientOptions::from_settings(&settings);

        if let Some(catalog) = self.catalog_clients.get(&key) {
            tracing::debug!("Reusing catalog API session for connection {}", key);
            let db = self.open_connection(key, connection_settings, catalog.session().clone())?;
            self.transports
                .get_or_create(instance.id, &settings, &options)
                .map_err(|e| e.context("Failed to create http client"))?;
            return Ok(db);
        }

        let client = build_http_client(&options).map_err(|e| e.context("Failed to create http client"))?;
        let session = self
            .factory
            .create_session(&connection_settings.project, client.clone(), &settings.url)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to create warehouse session: {}", e.message())))?;

        let db = self.open_connection(key, connection_settings, session)?;
        self.transports.insert_if_absent(
            instance.id,
            HttpTransportEntry {
                client,
                base_url: settings.url.clone(),
            },
        );
        Ok(db)
    }

    fn open_connection(
        &self,
        key: ConnectionKey,
        settings: ConnectionSettings,
        session: Arc<dyn WarehouseSession>,
    ) -> Result<Arc<WarehouseDb>, AppError> {
        let (driver, db) = driver::open(settings, session).map_err(|e| e.context("Failed to connect to database"))?;
        tracing::info!("Opened warehouse connection {}", key);
        self.connections.store(key, CachedConnection { db: db.clone(), driver });
        Ok(db)
    }

    async fn catalog_client(
        &self,
        instance: &DatasourceInstanceSettings,
        project: &str,
        location: &str,
    ) -> Result<Arc<CatalogClient>, AppError> {
        let key = ConnectionKey::new(instance.id, location, project);
        if let Some(client) = self.catalog_clients.get(&key) {
            tracing::debug!("Reusing existing catalog API client {}", key);
            return Ok(client);
        }

        let settings = load_settings(instance)?;
        let options = HttpClientOptions::from_settings(&settings);
        let transport = self
            .transports
            .get_or_create(instance.id, &settings, &options)
            .map_err(|e| e.context("Failed to create http client"))?;

        let session = self
            .factory
            .create_session(project, transport.client, &settings.url)
            .await
            .map_err(|e| e.context("Failed to initialize warehouse session"))?;

        let mut client = CatalogClient::new(session);
        client.set_location(location);
        let client = Arc::new(client);
        self.catalog_clients.store(key.clone(), client.clone());
        tracing::info!("Created catalog API client {}", key);

        Ok(client)
    }

    async fn catalog_client_for(
        &self,
        instance: &DatasourceInstanceSettings,
        project: &str,
        location: &str,
    ) -> Result<Arc<CatalogClient>, AppError> {
        self.catalog_client(instance, project, location)
            .await
            .map_err(|e| e.context("Failed to retrieve catalog API client"))
    }

    pub async fn list_datasets(
        &self,
        instance: &DatasourceInstanceSettings,
        args: &DatasetsArgs,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        let client = self.catalog_client_for(instance, &args.project, &args.location).await?;
        client.list_datasets(headers).await
    }

    pub async fn list_tables(
        &self,
        instance: &DatasourceInstanceSettings,
        args: &TablesArgs,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        if args.project.is_empty() || args.dataset.is_empty() {
            return Err(AppError::Validation("project and dataset must be specified".to_string()));
        }

        let client = self.catalog_client_for(instance, &args.project, &args.location).await?;
        client.list_tables(&args.dataset, headers).await
    }

    pub async fn list_columns(
        &self,
        instance: &DatasourceInstanceSettings,
        args: &ColumnsArgs,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        if args.project.is_empty() || args.dataset.is_empty() || args.table.is_empty() {
            return Err(AppError::Validation("missing required arguments".to_string()));
        }
        let is_orderable = parse_bool(&args.is_orderable)
            .ok_or_else(|| AppError::Parse(format!("Failed to parse isOrderable: invalid value '{}'", args.is_orderable)))?;

        let client = self.catalog_client_for(instance, &args.project, &args.location).await?;
        client.list_columns(&args.dataset, &args.table, is_orderable, headers).await
    }

    pub async fn get_table_schema(
        &self,
        instance: &DatasourceInstanceSettings,
        args: &TableSchemaArgs,
        headers: &ForwardedHeaders,
    ) -> Result<TableMetadataResponse, AppError> {
        let client = self.catalog_client_for(instance, &args.project, &args.location).await?;
        client.get_table_schema(&args.dataset, &args.table, headers).await
    }

    /// Macro failures are the caller's to fix, so they come back as an
    /// invalid result rather than an error.
    pub async fn validate_query(
        &self,
        instance: &DatasourceInstanceSettings,
        args: &ValidateQueryArgs,
        headers: &ForwardedHeaders,
    ) -> Result<ValidateQueryResponse, AppError> {
        let client = self.catalog_client_for(instance, &args.project, &args.location).await?;

        let sql = match self.macros.interpolate(&args.query, &args.time_range) {
            Ok(sql) => sql,
            Err(e) => {
                return Ok(ValidateQueryResponse::invalid(format!(
                    "Could not apply macros: {}",
                    e.message()
                )))
            }
        };

        Ok(client.validate_query(&sql, headers).await)
    }

    /// List the projects visible to the caller, authenticating with the
    /// caller's own `Authorization` header. Without one an empty header is
    /// sent, so the client's stored credential never applies.
    pub async fn list_projects(&self, authorization: Option<&str>, args: &ProjectsArgs) -> Result<Vec<String>, AppError> {
        let instance_id: i64 = args
            .datasource_id
            .parse()
            .map_err(|_| AppError::Validation(format!("invalid datasource id '{}'", args.datasource_id)))?;
        let transport = self
            .transports
            .get(instance_id)
            .ok_or_else(|| AppError::NotFound(format!("no HTTP client registered for datasource {}", instance_id)))?;

        let response = transport
            .client
            .get(format!("{}projects", transport.base_url))
            .header(AUTHORIZATION, authorization.unwrap_or_default())
            .send()
            .await
            .map_err(|e| AppError::Request(format!("client error: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Request(format!("project listing failed ({}): {}", status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Request(format!("could not read body: {}", e)))?;
        let project_list: ProjectList = serde_json::from_slice(&body)
            .map_err(|e| AppError::Request(format!("could not unmarshal body: {}", e)))?;

        let projects: Vec<String> = project_list.projects.into_iter().map(|p| p.id).collect();
        tracing::debug!("Listed {} projects for datasource {}", projects.len(), instance_id);
        Ok(projects)
    }
}

/// Accepts the usual spellings: 1/0, t/f, true/false in lower, upper or title case
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
