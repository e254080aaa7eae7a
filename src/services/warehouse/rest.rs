// Warehouse session over the v2 REST API
use crate::api::middleware::AppError;
use crate::models::{QueryStatistics, TableField, TableMetadataResponse};
use crate::services::http_transport::ForwardedHeaders;
use crate::services::warehouse::session::{DatasetInfo, QueryResult, SessionFactory, WarehouseSession};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

const QUERY_TIMEOUT_MS: u64 = 60_000;

/// Production session factory. Construction is local; the first REST call
/// is what actually authenticates.
#[derive(Debug, Default, Clone)]
pub struct RestSessionFactory;

#[async_trait::async_trait]
impl SessionFactory for RestSessionFactory {
    async fn create_session(
        &self,
        project: &str,
        transport: Client,
        endpoint: &str,
    ) -> Result<Arc<dyn WarehouseSession>, AppError> {
        let session = RestSession::new(project, transport, endpoint)?;
        tracing::info!("Created warehouse session for project '{}' at {}", project, endpoint);
        Ok(Arc::new(session))
    }
}

#[derive(Debug, Clone)]
pub struct RestSession {
    project: String,
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetEntry {
    dataset_reference: DatasetReference,
    #[serde(default)]
    location: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    project_id: String,
    dataset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableEntry {
    table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct TableSchemaResource {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    schema: Option<TableSchemaResource>,
    description: Option<String>,
    // int64 values are encoded as strings
    num_rows: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_dataset: Option<DatasetReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    total_bytes_processed: Option<String>,
    job_complete: Option<bool>,
    schema: Option<TableSchemaResource>,
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    f: Vec<QueryCell>,
}

#[derive(Debug, Deserialize)]
struct QueryCell {
    #[serde(default)]
    v: Value,
}

impl RestSession {
    pub fn new(project: &str, client: Client, endpoint: &str) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::Connection(format!("Invalid warehouse endpoint '{}': {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(AppError::Connection(format!(
                "Invalid warehouse endpoint '{}': cannot be used as a base URL",
                endpoint
            )));
        }

        Ok(Self {
            project: project.to_string(),
            client,
            endpoint,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Connection(format!("Invalid warehouse endpoint '{}'", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, step: &str) -> Result<T, AppError> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Request(format!("{} failed: {}", step, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Request(format!(
                "{} failed ({}): {}",
                step,
                status,
                remote_error_message(&body)
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Request(format!("Failed to parse {} response: {}", step, e)))
    }

    async fn query(
        &self,
        request: &QueryRequest<'_>,
        headers: &ForwardedHeaders,
        step: &str,
    ) -> Result<QueryResponse, AppError> {
        let url = self.url(&["projects", &self.project, "queries"])?;
        self.send_json(headers.apply(self.client.post(url).json(request)), step).await
    }
}

/// Pull `error.message` out of a warehouse error body, falling back to the raw text
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn parse_i64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[async_trait::async_trait]
impl WarehouseSession for RestSession {
    fn project(&self) -> &str {
        &self.project
    }

    async fn list_datasets(&self, headers: &ForwardedHeaders) -> Result<Vec<DatasetInfo>, AppError> {
        let url = self.url(&["projects", &self.project, "datasets"])?;
        let mut datasets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = headers.apply(self.client.get(url.clone()));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: DatasetList = self.send_json(request, "List datasets").await?;
            datasets.extend(page.datasets.into_iter().map(|d| DatasetInfo {
                id: d.dataset_reference.dataset_id,
                location: d.location,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(datasets)
    }

    async fn list_tables(&self, dataset: &str, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        let url = self.url(&["projects", &self.project, "datasets", dataset, "tables"])?;
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = headers.apply(self.client.get(url.clone()));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: TableList = self.send_json(request, "List tables").await?;
            tables.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(tables)
    }

    async fn get_table(
        &self,
        dataset: &str,
        table: &str,
        headers: &ForwardedHeaders,
    ) -> Result<TableMetadataResponse, AppError> {
        let url = self.url(&["projects", &self.project, "datasets", dataset, "tables", table])?;
        let resource: TableResource = self.send_json(headers.apply(self.client.get(url)), "Get table").await?;

        Ok(TableMetadataResponse {
            schema: resource.schema.unwrap_or_default().fields,
            description: resource.description,
            num_rows: resource.num_rows.and_then(|n| n.parse().ok()),
        })
    }

    async fn dry_run(
        &self,
        sql: &str,
        location: &str,
        headers: &ForwardedHeaders,
    ) -> Result<QueryStatistics, AppError> {
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            dry_run: true,
            location: (!location.is_empty()).then_some(location),
            default_dataset: None,
            request_id: None,
            timeout_ms: None,
        };
        let response = self.query(&request, headers, "Dry run").await?;

        Ok(QueryStatistics {
            total_bytes_processed: parse_i64(response.total_bytes_processed.as_deref()),
        })
    }

    async fn run_query(
        &self,
        sql: &str,
        location: &str,
        default_dataset: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<QueryResult, AppError> {
        let start = Instant::now();
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            dry_run: false,
            location: (!location.is_empty()).then_some(location),
            default_dataset: default_dataset.filter(|d| !d.is_empty()).map(|d| DatasetReference {
                project_id: self.project.clone(),
                dataset_id: d.to_string(),
            }),
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            timeout_ms: Some(QUERY_TIMEOUT_MS),
        };
        let response = self.query(&request, headers, "Run query").await?;

        if response.job_complete == Some(false) {
            return Err(AppError::Request(format!(
                "Query did not complete within {} ms",
                QUERY_TIMEOUT_MS
            )));
        }

        let fields = response.schema.unwrap_or_default().fields;
        let rows: Vec<Value> = response
            .rows
            .into_iter()
            .map(|row| {
                let object = fields
                    .iter()
                    .zip(row.f)
                    .map(|(field, cell)| (field.name.clone(), cell.v))
                    .collect::<serde_json::Map<_, _>>();
                Value::Object(object)
            })
            .collect();

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
