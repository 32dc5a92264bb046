//! handlers/campaign_handler.rs
//! Rutas autenticadas de campañas: alta, edición, destinatarios, envío.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::CampaignError,
    handlers::session::AuthenticatedSession,
    models::{
        campaign_model::{
            CampaignDetail, CampaignStatus, CreateCampaignRequest, DuplicateCampaignRequest,
            SendCampaignRequest, SendOutcome, TestEmailRequest, UpdateCampaignRequest,
        },
        email_model::TransportStatus,
        recipient_model::{AddRecipientsRequest, AddRecipientsResponse, RecipientSelector},
    },
    services::{
        campaign_service::CampaignService, dispatch_service::Dispatcher,
        interaction_service::InteractionService, recipient_service::RecipientService,
        transport_service::TransportPool,
    },
};

fn require_text(field: &str, value: &str) -> Result<(), CampaignError> {
    if value.trim().is_empty() {
        return Err(CampaignError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_sender_email(value: Option<&str>) -> Result<(), CampaignError> {
    match value {
        Some(email) if email.trim().parse::<lettre::Address>().is_err() => Err(
            CampaignError::Validation(format!("invalid sender_email '{email}'")),
        ),
        _ => Ok(()),
    }
}

/// POST /api/campaigns
pub async fn create_campaign_endpoint(
    _session: AuthenticatedSession,
    campaigns: web::Data<CampaignService>,
    recipients: web::Data<RecipientService>,
    body: web::Json<CreateCampaignRequest>,
) -> Result<HttpResponse, CampaignError> {
    let req = body.into_inner();
    require_text("name", &req.name)?;
    require_text("subject", &req.subject)?;
    require_text("html_content", &req.html_content)?;
    validate_sender_email(req.sender_email.as_deref())?;

    let id = campaigns.create_campaign(&req).await?;
    log::info!("(create_campaign) campaign={} '{}' created", id, req.name);

    if let Some(criteria) = req.recipient_criteria {
        recipients
            .resolve(id, &RecipientSelector::Criteria(criteria))
            .await?;
    }

    let campaign = campaigns
        .get_campaign(id)
        .await?
        .ok_or(CampaignError::NotFound(id))?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "campaign": campaign
    })))
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    _session: AuthenticatedSession,
    campaigns: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let campaign = campaigns
        .get_campaign(id)
        .await?
        .ok_or(CampaignError::NotFound(id))?;
    let detailed_stats = campaigns.status_breakdown(id).await?;

    Ok(HttpResponse::Ok().json(CampaignDetail {
        campaign,
        detailed_stats,
    }))
}

/// PUT /api/campaigns/{id}
pub async fn update_campaign_endpoint(
    _session: AuthenticatedSession,
    campaigns: web::Data<CampaignService>,
    path: web::Path<i64>,
    body: web::Json<UpdateCampaignRequest>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let patch = body.into_inner();

    if patch.is_empty() {
        return Err(CampaignError::Validation("nothing to update".to_string()));
    }
    for (field, value) in [
        ("name", &patch.name),
        ("subject", &patch.subject),
        ("html_content", &patch.html_content),
    ] {
        if let Some(v) = value {
            require_text(field, v)?;
        }
    }
    validate_sender_email(patch.sender_email.as_deref())?;

    let current = campaigns
        .get_campaign(id)
        .await?
        .ok_or(CampaignError::NotFound(id))?;
    if current.status == CampaignStatus::Sent {
        return Err(CampaignError::CampaignLocked(id));
    }
    if !campaigns.update_campaign(id, current.status, &patch).await? {
        return Err(CampaignError::CampaignLocked(id));
    }

    let campaign = campaigns
        .get_campaign(id)
        .await?
        .ok_or(CampaignError::NotFound(id))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "campaign": campaign
    })))
}

/// POST /api/campaigns/{id}/duplicate
pub async fn duplicate_campaign_endpoint(
    _session: AuthenticatedSession,
    campaigns: web::Data<CampaignService>,
    path: web::Path<i64>,
    body: Option<web::Json<DuplicateCampaignRequest>>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let req = body.map(|b| b.into_inner()).unwrap_or_default();

    let source = campaigns
        .get_campaign(id)
        .await?
        .ok_or(CampaignError::NotFound(id))?;
    let name = req
        .new_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("{} (Copy)", source.name));

    let new_id = campaigns.duplicate_campaign(&source, &name).await?;
    let campaign = campaigns
        .get_campaign(new_id)
        .await?
        .ok_or(CampaignError::NotFound(new_id))?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "campaign": campaign
    })))
}

/// POST /api/campaigns/{id}/recipients
pub async fn add_recipients_endpoint(
    _session: AuthenticatedSession,
    campaigns: web::Data<CampaignService>,
    recipients: web::Data<RecipientService>,
    path: web::Path<i64>,
    body: web::Json<AddRecipientsRequest>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let selector = RecipientSelector::try_from(body.into_inner())?;

    let added_count = recipients.resolve(id, &selector).await?;
    let recipient_count = campaigns
        .get_campaign(id)
        .await?
        .map(|c| c.counters.recipient_count)
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(AddRecipientsResponse {
        success: true,
        added_count,
        recipient_count,
    }))
}

/// GET /api/campaigns/{id}/recipients/{contact_id}
pub async fn get_recipient_endpoint(
    _session: AuthenticatedSession,
    recipients: web::Data<RecipientService>,
    interactions: web::Data<InteractionService>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, CampaignError> {
    let (campaign_id, contact_id) = path.into_inner();
    let recipient = recipients
        .get_recipient(campaign_id, contact_id)
        .await?
        .ok_or_else(|| {
            CampaignError::Validation(format!(
                "contact {contact_id} is not a recipient of campaign {campaign_id}"
            ))
        })?;
    let events = interactions
        .list_for_recipient(campaign_id, contact_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "recipient": recipient,
        "interactions": events
    })))
}

/// POST /api/campaigns/{id}/send
pub async fn send_campaign_endpoint(
    _session: AuthenticatedSession,
    dispatcher: web::Data<Dispatcher>,
    path: web::Path<i64>,
    body: Option<web::Json<SendCampaignRequest>>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let immediate = body.map(|b| b.immediate).unwrap_or(false);

    match dispatcher.send(id, immediate).await? {
        SendOutcome::Dispatched(report) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Campaign sent",
            "sent_at": Utc::now(),
            "report": report
        }))),
        SendOutcome::Scheduled(at) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Campaign scheduled",
            "scheduled_at": at
        }))),
    }
}

/// POST /api/campaigns/{id}/cancel
pub async fn cancel_campaign_endpoint(
    _session: AuthenticatedSession,
    dispatcher: web::Data<Dispatcher>,
    path: web::Path<i64>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    dispatcher.cancel(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Campaign canceled"
    })))
}

/// POST /api/campaigns/{id}/test
pub async fn send_test_email_endpoint(
    _session: AuthenticatedSession,
    dispatcher: web::Data<Dispatcher>,
    path: web::Path<i64>,
    body: web::Json<TestEmailRequest>,
) -> Result<HttpResponse, CampaignError> {
    let id = path.into_inner();
    let email = body.into_inner().email;
    if email.trim().parse::<lettre::Address>().is_err() {
        return Err(CampaignError::Validation(format!("invalid email '{email}'")));
    }

    let message_id = dispatcher.send_test(id, email.trim()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message_id": message_id
    })))
}

/// GET /api/email/status
pub async fn transport_status_endpoint(
    _session: AuthenticatedSession,
    pool: web::Data<TransportPool>,
) -> HttpResponse {
    let status = if pool.is_closed() {
        TransportStatus {
            status: "error".to_string(),
            message: "transport pool is shut down".to_string(),
        }
    } else {
        match pool.verify().await {
            Ok(()) => TransportStatus {
                status: "operational".to_string(),
                message: "SMTP relay operational".to_string(),
            },
            Err(e) => TransportStatus {
                status: "error".to_string(),
                message: e.to_string(),
            },
        }
    };
    HttpResponse::Ok().json(status)
}
