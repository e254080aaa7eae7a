use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::connection::AppState;
use crate::api::handlers::{connection, metadata, query};
use crate::models::DatasourceInstanceSettings;
use crate::services::WarehouseDatasource;

/// Create router with application state
pub fn create_router_with_state(
    datasource: Arc<WarehouseDatasource>,
    instances: Vec<DatasourceInstanceSettings>,
) -> Router {
    let state = AppState::new(datasource, instances);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/datasources", get(connection::list_datasources))
        .route("/api/datasources/{id}/datasets", post(metadata::list_datasets))
        .route("/api/datasources/{id}/tables", post(metadata::list_tables))
        .route("/api/datasources/{id}/columns", post(metadata::list_columns))
        .route("/api/datasources/{id}/table-schema", post(metadata::table_schema))
        .route("/api/datasources/{id}/projects", post(metadata::list_projects))
        .route("/api/datasources/{id}/validate-query", post(query::validate_query))
        .route("/api/datasources/{id}/query", post(query::execute_query))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
