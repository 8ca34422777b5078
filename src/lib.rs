pub mod api;
pub mod config;
pub mod geo;
pub mod metrics;
pub mod models;
pub mod resolver;
pub mod storage;
