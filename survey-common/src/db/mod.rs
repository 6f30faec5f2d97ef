//! Database initialization and entity records

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
