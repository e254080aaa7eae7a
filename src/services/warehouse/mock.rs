// In-memory session factory for tests
use crate::api::middleware::AppError;
use crate::models::{QueryStatistics, TableField, TableMetadataResponse};
use crate::services::http_transport::ForwardedHeaders;
use crate::services::warehouse::session::{DatasetInfo, QueryResult, SessionFactory, WarehouseSession};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts every session it builds and every remote call those sessions make.
#[derive(Debug, Default)]
pub struct MockSessionFactory {
    created: AtomicUsize,
    remote_calls: Arc<AtomicUsize>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sleep inside `create_session` so concurrent misses overlap
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create_session(
        &self,
        project: &str,
        _transport: reqwest::Client,
        endpoint: &str,
    ) -> Result<Arc<dyn WarehouseSession>, AppError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Connection(format!("handshake with {} rejected", endpoint)));
        }
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MockSession {
            serial,
            project: project.to_string(),
            remote_calls: self.remote_calls.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct MockSession {
    /// 1-based creation order, lets tests tell sessions apart
    pub serial: usize,
    project: String,
    remote_calls: Arc<AtomicUsize>,
}

impl MockSession {
    fn touch(&self) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl WarehouseSession for MockSession {
    fn project(&self) -> &str {
        &self.project
    }

    async fn list_datasets(&self, _headers: &ForwardedHeaders) -> Result<Vec<DatasetInfo>, AppError> {
        self.touch();
        Ok(vec![
            DatasetInfo { id: "us_sales".to_string(), location: "US".to_string() },
            DatasetInfo { id: "eu_sales".to_string(), location: "eu".to_string() },
        ])
    }

    async fn list_tables(&self, dataset: &str, _headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        self.touch();
        Ok(vec![format!("{}_orders", dataset), format!("{}_customers", dataset)])
    }

    async fn get_table(
        &self,
        _dataset: &str,
        _table: &str,
        _headers: &ForwardedHeaders,
    ) -> Result<TableMetadataResponse, AppError> {
        self.touch();
        let field = |name: &str, field_type: &str, mode: Option<&str>, fields: Vec<TableField>| TableField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: mode.map(str::to_string),
            description: None,
            fields,
        };
        Ok(TableMetadataResponse {
            schema: vec![
                field("id", "INTEGER", Some("REQUIRED"), vec![]),
                field("tags", "STRING", Some("REPEATED"), vec![]),
                field(
                    "customer",
                    "RECORD",
                    Some("NULLABLE"),
                    vec![field("name", "STRING", None, vec![]), field("area", "GEOGRAPHY", None, vec![])],
                ),
            ],
            description: None,
            num_rows: Some(3),
        })
    }

    async fn dry_run(
        &self,
        sql: &str,
        _location: &str,
        _headers: &ForwardedHeaders,
    ) -> Result<QueryStatistics, AppError> {
        self.touch();
        if sql.contains("SELEC ") {
            return Err(AppError::Request("Syntax error: Unexpected identifier \"SELEC\"".to_string()));
        }
        Ok(QueryStatistics { total_bytes_processed: 42 })
    }

    async fn run_query(
        &self,
        sql: &str,
        location: &str,
        default_dataset: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<QueryResult, AppError> {
        self.touch();
        Ok(QueryResult {
            rows: vec![json!({
                "sql": sql,
                "location": location,
                "dataset": default_dataset,
                "session": self.serial,
                "authorization": headers.authorization(),
            })],
            row_count: 1,
            execution_time_ms: 0,
        })
    }
}
