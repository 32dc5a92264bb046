//! services/mod.rs
//! Capas de negocio del motor de campañas.

pub mod campaign_service;
pub mod contact_service;
pub mod dispatch_service;
pub mod instrumentation_service;
pub mod interaction_service;
pub mod personalization_service;
pub mod recipient_service;
pub mod scheduler_service;
pub mod tracking_service;
pub mod transport_service;
