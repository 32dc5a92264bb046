//! error.rs
//! Errores de dominio del motor de campañas y su traducción a HTTP.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::models::campaign_model::CampaignStatus;

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("{0}")]
    Validation(String),

    #[error("either contact_ids or criteria is required")]
    InvalidSelector,

    #[error("missing target url")]
    MissingTarget,

    #[error("campaign {0} needs a scheduled_at date or an immediate send")]
    SchedulingRequired(i64),

    #[error("campaign {0} has no recipients")]
    NoRecipients(i64),

    #[error("authentication required")]
    Unauthorized,

    #[error("campaign {0} not found")]
    NotFound(i64),

    #[error("campaign {0} has already been sent")]
    AlreadySent(i64),

    #[error("campaign {0} has been sent; its content and recipients can no longer change")]
    CampaignLocked(i64),

    #[error("only scheduled campaigns can be canceled (campaign {id} is {status})")]
    NotScheduled { id: i64, status: CampaignStatus },

    #[error("mail transport is shut down")]
    TransportClosed,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Código estable para clientes (taxonomía de errores).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_)
            | Self::InvalidSelector
            | Self::MissingTarget
            | Self::SchedulingRequired(_)
            | Self::NoRecipients(_) => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadySent(_) | Self::CampaignLocked(_) | Self::NotScheduled { .. } => {
                "STATE_CONFLICT"
            }
            Self::TransportClosed => "TRANSPORT_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for CampaignError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidSelector
            | Self::MissingTarget
            | Self::SchedulingRequired(_)
            | Self::NoRecipients(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadySent(_) | Self::CampaignLocked(_) | Self::NotScheduled { .. } => {
                StatusCode::CONFLICT
            }
            Self::TransportClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Internal(e) = self {
            log::error!("Internal error: {:?}", e);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string()
        }))
    }
}
