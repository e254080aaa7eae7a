// Warehouse service sessions
pub mod rest;
pub mod session;

#[cfg(test)]
pub mod mock;

pub use rest::{RestSession, RestSessionFactory};
pub use session::{DatasetInfo, QueryResult, SessionFactory, WarehouseSession};
