pub mod ai;
pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod server;
