use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{ColumnsArgs, DatasetsArgs, ProjectsArgs, TableMetadataResponse, TableSchemaArgs, TablesArgs};
use crate::services::ForwardedHeaders;

/// List datasets of a project
pub async fn list_datasets(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(args): Json<DatasetsArgs>,
) -> Result<Json<Vec<String>>, AppError> {
    tracing::info!("Listing datasets for datasource {} project '{}'", id, args.project);
    let instance = state.instance(id)?;
    let forwarded = ForwardedHeaders::from_request(&headers);
    Ok(Json(state.datasource.list_datasets(instance, &args, &forwarded).await?))
}

/// List tables of a dataset
pub async fn list_tables(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(args): Json<TablesArgs>,
) -> Result<Json<Vec<String>>, AppError> {
    let instance = state.instance(id)?;
    let forwarded = ForwardedHeaders::from_request(&headers);
    Ok(Json(state.datasource.list_tables(instance, &args, &forwarded).await?))
}

/// List columns of a table
pub async fn list_columns(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(args): Json<ColumnsArgs>,
) -> Result<Json<Vec<String>>, AppError> {
    let instance = state.instance(id)?;
    let forwarded = ForwardedHeaders::from_request(&headers);
    Ok(Json(state.datasource.list_columns(instance, &args, &forwarded).await?))
}

pub async fn table_schema(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(args): Json<TableSchemaArgs>,
) -> Result<Json<TableMetadataResponse>, AppError> {
    let instance = state.instance(id)?;
    let forwarded = ForwardedHeaders::from_request(&headers);
    Ok(Json(state.datasource.get_table_schema(instance, &args, &forwarded).await?))
}

/// List projects visible to the caller's own credentials
pub async fn list_projects(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(mut args): Json<ProjectsArgs>,
) -> Result<Json<Vec<String>>, AppError> {
    if args.datasource_id.is_empty() {
        args.datasource_id = id.to_string();
    }
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let projects = state.datasource.list_projects(authorization, &args).await.map_err(|e| {
        tracing::error!("Failed to list projects for datasource {}: {}", id, e);
        e
    })?;
    Ok(Json(projects))
}
