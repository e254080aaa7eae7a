pub mod catalog_cache;
pub mod catalog_client;
pub mod connection_cache;
pub mod connection_key;
pub mod datasource;
pub mod driver;
pub mod http_transport;
pub mod macros; // Query macro interpolation
pub mod warehouse; // Warehouse sessions and their factory

pub use catalog_cache::*;
pub use catalog_client::*;
pub use connection_cache::*;
pub use connection_key::*;
pub use datasource::*;
pub use driver::{Driver, WarehouseDb};
pub use http_transport::*;
pub use macros::*;
pub use warehouse::{RestSessionFactory, SessionFactory, WarehouseSession};
