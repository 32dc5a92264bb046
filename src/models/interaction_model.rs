use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InteractionType {
    Open,
    Click,
    Unsubscribe,
    Bounce,
}

/// Metadatos de la petición entrante (tracking público).
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Entrada del log de interacciones (append-only).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InteractionEvent {
    pub id: i64,
    pub campaign_id: i64,
    pub contact_id: i64,
    pub interaction_type: InteractionType,
    pub payload: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

/// Confirmación de entrega que llega del relay o de un webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum DeliveryReport {
    Delivered,
    Bounced { reason: String },
}
