pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod payment;
pub mod realtime;
pub mod state;
pub mod store;
