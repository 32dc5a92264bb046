use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{email_model::EmailTemplate, recipient_model::RecipientCriteria};

/// Ciclo de vida de una campaña.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sent,
    Canceled,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::Draft,
        CampaignStatus::Scheduled,
        CampaignStatus::Sent,
        CampaignStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Canceled => "canceled",
        }
    }

    /// `sent` es terminal. El rollback de un despacho fallido (sent -> draft)
    /// es una compensación y no pasa por aquí.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Sent)
                | (Scheduled, Scheduled)
                | (Scheduled, Sent)
                | (Scheduled, Canceled)
                | (Scheduled, Draft)
                | (Canceled, Scheduled)
                | (Canceled, Sent)
                | (Canceled, Draft)
        )
    }

    /// Estados desde los que se puede llegar a `target`.
    pub fn predecessors(target: CampaignStatus) -> Vec<CampaignStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contadores agregados: caché recalculable desde campaign_recipients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCounters {
    pub recipient_count: i64,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub opened_count: i64,
    pub clicked_count: i64,
    pub unsubscribed_count: i64,
    pub bounced_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: CampaignCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn template(&self) -> EmailTemplate {
        EmailTemplate {
            subject: self.subject.clone(),
            html: self.html_content.clone(),
            text: self.text_content.clone(),
        }
    }
}

/// POST /api/campaigns
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub recipient_criteria: Option<RecipientCriteria>,
}

/// PUT /api/campaigns/{id}
///
/// `scheduled_at` distingue "ausente" (None) de "null" (Some(None)):
/// null borra la programación.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateCampaignRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.subject.is_none()
            && self.html_content.is_none()
            && self.text_content.is_none()
            && self.sender_name.is_none()
            && self.sender_email.is_none()
            && self.scheduled_at.is_none()
    }
}

fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// POST /api/campaigns/{id}/send
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendCampaignRequest {
    #[serde(default, alias = "send_immediately")]
    pub immediate: bool,
}

/// POST /api/campaigns/{id}/duplicate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuplicateCampaignRequest {
    pub new_name: Option<String>,
}

/// POST /api/campaigns/{id}/test
#[derive(Debug, Clone, Deserialize)]
pub struct TestEmailRequest {
    pub email: String,
}

/// Resultado de un despacho completo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Resultado de `send`: despachada en el momento o programada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Dispatched(DispatchReport),
    Scheduled(DateTime<Utc>),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusBreakdown {
    pub status: String,
    pub count: i64,
}

/// GET /api/campaigns/{id}
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub detailed_stats: Vec<StatusBreakdown>,
}
