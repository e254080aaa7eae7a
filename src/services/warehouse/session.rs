// Warehouse session abstraction
use crate::api::middleware::AppError;
use crate::models::{QueryStatistics, TableMetadataResponse};
use crate::services::http_transport::ForwardedHeaders;
use serde_json::Value;
use std::sync::Arc;

/// A dataset as listed by the warehouse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub id: String,
    pub location: String,
}

/// Query execution result
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

/// Authenticated handle to the remote warehouse service.
///
/// Sessions are stateless and cheap to share; both the query path and the
/// catalog path hold them behind an `Arc`. Each call carries the headers of
/// the caller it is made for.
#[async_trait::async_trait]
pub trait WarehouseSession: Send + Sync + std::fmt::Debug {
    /// Project the session was created for
    fn project(&self) -> &str;

    async fn list_datasets(&self, headers: &ForwardedHeaders) -> Result<Vec<DatasetInfo>, AppError>;

    async fn list_tables(&self, dataset: &str, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError>;

    async fn get_table(
        &self,
        dataset: &str,
        table: &str,
        headers: &ForwardedHeaders,
    ) -> Result<TableMetadataResponse, AppError>;

    /// Plan the query without running it
    async fn dry_run(&self, sql: &str, location: &str, headers: &ForwardedHeaders) -> Result<QueryStatistics, AppError>;

    async fn run_query(
        &self,
        sql: &str,
        location: &str,
        default_dataset: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<QueryResult, AppError>;
}

/// Builds sessions. Swapped out in tests so nothing touches the network.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(
        &self,
        project: &str,
        transport: reqwest::Client,
        endpoint: &str,
    ) -> Result<Arc<dyn WarehouseSession>, AppError>;
}
