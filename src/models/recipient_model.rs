use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CampaignError;

/// Estado de un destinatario dentro de una campaña.
///
/// Toda mutación (despacho, tracking, confirmaciones de entrega) pasa por
/// `can_transition_to`; en SQL se traduce a `WHERE status IN (predecessors)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Failed,
    Unsubscribed,
}

impl RecipientStatus {
    pub const ALL: [RecipientStatus; 7] = [
        RecipientStatus::Pending,
        RecipientStatus::Sent,
        RecipientStatus::Delivered,
        RecipientStatus::Opened,
        RecipientStatus::Clicked,
        RecipientStatus::Failed,
        RecipientStatus::Unsubscribed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Delivered => "delivered",
            RecipientStatus::Opened => "opened",
            RecipientStatus::Clicked => "clicked",
            RecipientStatus::Failed => "failed",
            RecipientStatus::Unsubscribed => "unsubscribed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecipientStatus::Failed | RecipientStatus::Unsubscribed)
    }

    pub fn can_transition_to(self, next: RecipientStatus) -> bool {
        use RecipientStatus::*;
        match (self, next) {
            (Pending, Sent) | (Pending, Failed) => true,
            (Sent, Delivered) | (Sent, Opened) | (Sent, Clicked) | (Sent, Failed) => true,
            (Delivered, Opened) | (Delivered, Clicked) => true,
            (Opened, Clicked) => true,
            (from, Unsubscribed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn predecessors(target: RecipientStatus) -> Vec<RecipientStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }

    /// Columna de timestamp que se marca al entrar en este estado.
    pub fn timestamp_column(&self) -> Option<&'static str> {
        match self {
            RecipientStatus::Sent => Some("sent_at"),
            RecipientStatus::Delivered => Some("delivered_at"),
            RecipientStatus::Opened => Some("opened_at"),
            RecipientStatus::Clicked => Some("clicked_at"),
            RecipientStatus::Unsubscribed => Some("unsubscribed_at"),
            RecipientStatus::Pending | RecipientStatus::Failed => None,
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientRecord {
    pub id: i64,
    pub campaign_id: i64,
    pub contact_id: i64,
    pub status: RecipientStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// Destinatario pendiente con los datos de contacto necesarios para el envío.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingRecipient {
    pub contact_id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
}

/// Filtro sobre atributos de contacto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCriteria {
    pub contact_type: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// POST /api/campaigns/{id}/recipients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddRecipientsRequest {
    pub criteria: Option<RecipientCriteria>,
    pub contact_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSelector {
    Contacts(Vec<i64>),
    Criteria(RecipientCriteria),
}

impl TryFrom<AddRecipientsRequest> for RecipientSelector {
    type Error = CampaignError;

    fn try_from(req: AddRecipientsRequest) -> Result<Self, Self::Error> {
        match (req.contact_ids, req.criteria) {
            (Some(ids), _) if !ids.is_empty() => Ok(RecipientSelector::Contacts(ids)),
            (_, Some(criteria)) => Ok(RecipientSelector::Criteria(criteria)),
            _ => Err(CampaignError::InvalidSelector),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddRecipientsResponse {
    pub success: bool,
    pub added_count: u64,
    pub recipient_count: i64,
}
