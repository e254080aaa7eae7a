pub mod catalog;
pub mod connection;
pub mod settings;

pub use catalog::*;
pub use connection::*;
pub use settings::*;
