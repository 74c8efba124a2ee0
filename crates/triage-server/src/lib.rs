//! Triage server library
//!
//! HTTP API, persistence, and bootstrap for the ticket triage service.

pub mod cli;
pub mod config;
pub mod routes;
pub mod service;
pub mod store;

pub use cli::Cli;
pub use config::ServerConfig;
pub use service::AppState;
pub use store::{TicketRecord, TicketStats, TicketStore};
