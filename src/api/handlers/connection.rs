use axum::{extract::State, Json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::DatasourceInstanceSettings;
use crate::services::WarehouseDatasource;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub datasource: Arc<WarehouseDatasource>,
    pub instances: Arc<HashMap<i64, DatasourceInstanceSettings>>,
}

impl AppState {
    pub fn new(datasource: Arc<WarehouseDatasource>, instances: Vec<DatasourceInstanceSettings>) -> Self {
        Self {
            datasource,
            instances: Arc::new(instances.into_iter().map(|i| (i.id, i)).collect()),
        }
    }

    /// Look up a configured datasource instance
    pub fn instance(&self, id: i64) -> Result<&DatasourceInstanceSettings, AppError> {
        self.instances
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Datasource {} not found", id)))
    }
}

/// List configured datasource instances
pub async fn list_datasources(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let mut datasources: Vec<_> = state
        .instances
        .values()
        .map(|i| serde_json::json!({ "id": i.id, "uid": i.uid, "name": i.name }))
        .collect();
    datasources.sort_by_key(|d| d["id"].as_i64());

    Ok(Json(serde_json::json!({
        "datasources": datasources
    })))
}
