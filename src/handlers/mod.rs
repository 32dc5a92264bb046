//! handlers/mod.rs
//! Endpoints HTTP: campañas (autenticadas) y tracking (público).

pub mod campaign_handler;
pub mod session;
pub mod tracking_handler;
