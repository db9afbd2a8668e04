pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod render;
pub mod services;
