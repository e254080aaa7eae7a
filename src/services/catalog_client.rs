use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{TableField, TableMetadataResponse, ValidateQueryResponse};
use crate::services::http_transport::ForwardedHeaders;
use crate::services::warehouse::WarehouseSession;

/// Metadata-browsing client: a session pinned to one processing location
#[derive(Debug)]
pub struct CatalogClient {
    session: Arc<dyn WarehouseSession>,
    location: String,
}

impl CatalogClient {
    pub fn new(session: Arc<dyn WarehouseSession>) -> Self {
        Self {
            session,
            location: String::new(),
        }
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn session(&self) -> &Arc<dyn WarehouseSession> {
        &self.session
    }

    /// Dataset ids, restricted to the client's location when one is set
    pub async fn list_datasets(&self, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        let datasets = self.session.list_datasets(headers).await?;
        Ok(datasets
            .into_iter()
            .filter(|d| self.location.is_empty() || d.location.eq_ignore_ascii_case(&self.location))
            .map(|d| d.id)
            .collect())
    }

    pub async fn list_tables(&self, dataset: &str, headers: &ForwardedHeaders) -> Result<Vec<String>, AppError> {
        self.session.list_tables(dataset, headers).await
    }

    /// Column names with nested record fields flattened as `parent.child`
    pub async fn list_columns(
        &self,
        dataset: &str,
        table: &str,
        orderable_only: bool,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        let table = self.session.get_table(dataset, table, headers).await?;
        let mut columns = Vec::new();
        collect_columns(&table.schema, "", orderable_only, &mut columns);
        Ok(columns)
    }

    pub async fn get_table_schema(
        &self,
        dataset: &str,
        table: &str,
        headers: &ForwardedHeaders,
    ) -> Result<TableMetadataResponse, AppError> {
        self.session.get_table(dataset, table, headers).await
    }

    /// Dry-run `sql`. A rejected query is reported in the response, not as an error.
    pub async fn validate_query(&self, sql: &str, headers: &ForwardedHeaders) -> ValidateQueryResponse {
        match self.session.dry_run(sql, &self.location, headers).await {
            Ok(statistics) => ValidateQueryResponse::valid(statistics),
            Err(e) => {
                tracing::debug!("Query validation failed: {}", e);
                ValidateQueryResponse::invalid(e.message())
            }
        }
    }
}

fn collect_columns(fields: &[TableField], prefix: &str, orderable_only: bool, out: &mut Vec<String>) {
    for field in fields {
        let name = format!("{}{}", prefix, field.name);
        if !orderable_only || field.is_orderable() {
            out.push(name.clone());
        }
        // fields of repeated records are only reachable through UNNEST
        if field.is_record() && !field.is_repeated() {
            collect_columns(&field.fields, &format!("{}.", name), orderable_only, out);
        }
    }
}
