pub mod config;
pub mod connection;
pub mod error;
pub mod greeting;
pub mod initializer;
pub mod pipeline;
pub mod reservation;
pub mod server;
pub mod store;

pub use error::Error;
