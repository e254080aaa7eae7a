// Query-execution handle built on top of a warehouse session
use crate::api::middleware::AppError;
use crate::models::ConnectionSettings;
use crate::services::http_transport::ForwardedHeaders;
use crate::services::warehouse::{QueryResult, WarehouseSession};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Open/closed state shared between a connection handle and its cache entry
#[derive(Debug, Default)]
pub struct Driver {
    closed: AtomicBool,
}

impl Driver {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Database-style handle callers run queries through
#[derive(Debug)]
pub struct WarehouseDb {
    settings: ConnectionSettings,
    session: Arc<dyn WarehouseSession>,
    driver: Arc<Driver>,
}

impl WarehouseDb {
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<dyn WarehouseSession> {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_closed()
    }

    /// Close the handle; the cache replaces it on the next connect.
    pub fn close(&self) {
        self.driver.close();
    }

    /// Run `sql` on behalf of the caller whose `headers` are given. The handle
    /// is shared by every caller on the same connection key.
    pub async fn query(&self, sql: &str, headers: &ForwardedHeaders) -> Result<QueryResult, AppError> {
        if self.is_closed() {
            return Err(AppError::Connection("connection is closed".to_string()));
        }
        let dataset = (!self.settings.dataset.is_empty()).then_some(self.settings.dataset.as_str());
        self.session.run_query(sql, &self.settings.location, dataset, headers).await
    }
}

/// Wrap `session` in a fresh driver and handle.
pub fn open(
    settings: ConnectionSettings,
    session: Arc<dyn WarehouseSession>,
) -> Result<(Arc<Driver>, Arc<WarehouseDb>), AppError> {
    if settings.project.is_empty() {
        return Err(AppError::Connection("no project configured for connection".to_string()));
    }

    let driver = Arc::new(Driver::default());
    let db = Arc::new(WarehouseDb {
        settings,
        session,
        driver: driver.clone(),
    });
    Ok((driver, db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::mock::MockSessionFactory;
    use crate::services::warehouse::SessionFactory;

    fn settings(project: &str) -> ConnectionSettings {
        ConnectionSettings {
            project: project.to_string(),
            location: "US".to_string(),
            dataset: "sales".to_string(),
            table: String::new(),
        }
    }

    #[tokio::test]
    async fn test_query_through_open_handle() {
        let session = MockSessionFactory::new()
            .create_session("p", reqwest::Client::new(), "http://localhost/")
            .await
            .unwrap();
        let (driver, db) = open(settings("p"), session).unwrap();
        assert!(!driver.is_closed());

        let result = db.query("SELECT 1", &ForwardedHeaders::new()).await.unwrap();
        assert_eq!(result.rows[0]["location"], "US");
        assert_eq!(result.rows[0]["dataset"], "sales");
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_queries() {
        let session = MockSessionFactory::new()
            .create_session("p", reqwest::Client::new(), "http://localhost/")
            .await
            .unwrap();
        let (driver, db) = open(settings("p"), session).unwrap();
        db.close();
        assert!(driver.is_closed());
        assert!(matches!(db.query("SELECT 1", &ForwardedHeaders::new()).await, Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_open_requires_project() {
        let session = MockSessionFactory::new()
            .create_session("", reqwest::Client::new(), "http://localhost/")
            .await
            .unwrap();
        assert!(open(settings(""), session).is_err());
    }

    #[tokio::test]
    async fn test_query_carries_caller_headers() {
        let session = MockSessionFactory::new()
            .create_session("p", reqwest::Client::new(), "http://localhost/")
            .await
            .unwrap();
        let (_driver, db) = open(settings("p"), session).unwrap();

        let mut map = std::collections::HashMap::new();
        map.insert("Authorization".to_string(), vec!["Bearer caller".to_string()]);
        let headers = ForwardedHeaders::from_map(&map).unwrap();
        let result = db.query("SELECT 1", &headers).await.unwrap();
        assert_eq!(result.rows[0]["authorization"], "Bearer caller");

        let result = db.query("SELECT 1", &ForwardedHeaders::new()).await.unwrap();
        assert!(result.rows[0]["authorization"].is_null());
    }
}
