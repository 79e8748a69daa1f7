pub mod aggregate;
pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod extract;
pub mod jwt;
pub mod models;
pub mod notify;
pub mod routes;
pub mod storage;
pub mod utils;
pub mod workflow;

// Re-export commonly used items for tests
pub use app::{create_app, create_app_with};
