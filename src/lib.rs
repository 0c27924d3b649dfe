pub mod bridge;
pub mod config;
pub mod connection;
pub mod core;
pub mod engine;
pub mod observability;
pub mod smoothing;
