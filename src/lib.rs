pub mod api;
pub mod config;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use api::middleware::AppError;
pub use models::*;
pub use services::*;
