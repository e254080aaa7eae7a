use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{parse_connection_args, ValidateQueryArgs, ValidateQueryResponse};
use crate::services::ForwardedHeaders;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub sql: String,
    /// Raw per-call connection arguments (project, dataset, location, headers)
    #[serde(default)]
    pub connection_args: Option<serde_json::Value>,
}

/// Execute SQL through a cached warehouse connection.
///
/// Forwarded headers from the connection arguments win over the identity
/// headers of the HTTP request itself.
pub async fn execute_query(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Executing SQL query for datasource: {}", id);

    let sql = payload.sql.trim();
    if sql.is_empty() {
        return Err(AppError::Validation("SQL query cannot be empty".to_string()));
    }

    let instance = state.instance(id)?;
    let args = parse_connection_args(payload.connection_args.as_ref())?;
    let forwarded =
        ForwardedHeaders::from_connection_args(args.as_ref())?.or_else(ForwardedHeaders::from_request(&headers));

    let db = state
        .datasource
        .connect(instance, payload.connection_args.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect datasource {}: {}", id, e);
            e
        })?;
    let result = db.query(sql, &forwarded).await?;

    Ok(Json(serde_json::json!({
        "rows": result.rows,
        "rowCount": result.row_count,
        "executionTimeMs": result.execution_time_ms,
    })))
}

/// Validate a query without running it
pub async fn validate_query(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(args): Json<ValidateQueryArgs>,
) -> Result<Json<ValidateQueryResponse>, AppError> {
    let instance = state.instance(id)?;
    let forwarded = ForwardedHeaders::from_request(&headers);
    Ok(Json(state.datasource.validate_query(instance, &args, &forwarded).await?))
}
