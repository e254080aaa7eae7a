use dashmap::DashMap;
use std::sync::Arc;

use crate::services::catalog_client::CatalogClient;
use crate::services::connection_key::ConnectionKey;

/// Catalog clients by connection key. Entries never go stale.
#[derive(Debug, Default)]
pub struct CatalogClientCache {
    clients: DashMap<ConnectionKey, Arc<CatalogClient>>,
}

impl CatalogClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<CatalogClient>> {
        self.clients.get(key).map(|entry| entry.value().clone())
    }

    pub fn store(&self, key: ConnectionKey, client: Arc<CatalogClient>) {
        self.clients.insert(key, client);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::mock::MockSessionFactory;
    use crate::services::warehouse::SessionFactory;

    #[test]
    fn test_store_and_get() {
        let session = tokio_test::block_on(MockSessionFactory::new().create_session(
            "p",
            reqwest::Client::new(),
            "http://localhost/",
        ))
        .unwrap();
        let cache = CatalogClientCache::new();
        let key = ConnectionKey::new(1, "EU", "p");
        assert!(cache.get(&key).is_none());

        let mut client = CatalogClient::new(session);
        client.set_location("EU");
        let client = Arc::new(client);
        cache.store(key.clone(), client.clone());

        let hit = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&hit, &client));
        assert_eq!(hit.location(), "EU");
        assert!(cache.get(&ConnectionKey::new(1, "US", "p")).is_none());
        assert_eq!(cache.len(), 1);
    }
}
