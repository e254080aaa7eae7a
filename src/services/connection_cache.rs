use dashmap::DashMap;
use std::sync::Arc;

use crate::services::connection_key::ConnectionKey;
use crate::services::driver::{Driver, WarehouseDb};

/// A query-execution connection and the driver state that says whether it is still usable
#[derive(Debug, Clone)]
pub struct CachedConnection {
    pub db: Arc<WarehouseDb>,
    pub driver: Arc<Driver>,
}

impl CachedConnection {
    pub fn is_open(&self) -> bool {
        !self.driver.is_closed()
    }
}

/// Query-execution connections by connection key.
///
/// Lookups and stores are individually atomic; a miss followed by a store is
/// not, so two callers missing together both build a connection and the later
/// store wins.
#[derive(Debug, Default)]
pub struct ConnectionCache {
    connections: DashMap<ConnectionKey, CachedConnection>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached handle, only while its driver is open
    pub fn get_open(&self, key: &ConnectionKey) -> Option<Arc<WarehouseDb>> {
        self.connections
            .get(key)
            .filter(|entry| entry.is_open())
            .map(|entry| entry.db.clone())
    }

    /// Replace whatever is stored under `key`
    pub fn store(&self, key: ConnectionKey, connection: CachedConnection) {
        self.connections.insert(key, connection);
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.connections.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionSettings;
    use crate::services::driver::open;
    use crate::services::warehouse::mock::MockSessionFactory;
    use crate::services::warehouse::SessionFactory;

    async fn connection() -> CachedConnection {
        let session = MockSessionFactory::new()
            .create_session("p", reqwest::Client::new(), "http://localhost/")
            .await
            .unwrap();
        let settings = ConnectionSettings {
            project: "p".to_string(),
            location: "US".to_string(),
            dataset: String::new(),
            table: String::new(),
        };
        let (driver, db) = open(settings, session).unwrap();
        CachedConnection { db, driver }
    }

    #[tokio::test]
    async fn test_closed_entry_is_not_returned() {
        let cache = ConnectionCache::new();
        let key = ConnectionKey::new(1, "US", "p");
        let conn = connection().await;
        cache.store(key.clone(), conn.clone());

        assert!(Arc::ptr_eq(&cache.get_open(&key).unwrap(), &conn.db));

        conn.db.close();
        assert!(cache.get_open(&key).is_none());
        // still stored until replaced
        assert!(cache.contains(&key));
    }

    #[tokio::test]
    async fn test_store_replaces() {
        let cache = ConnectionCache::new();
        let key = ConnectionKey::new(1, "US", "p");
        let first = connection().await;
        let second = connection().await;
        cache.store(key.clone(), first);
        cache.store(key.clone(), second.clone());

        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get_open(&key).unwrap(), &second.db));
    }
}
