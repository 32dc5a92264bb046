//! handlers/tracking_handler.rs
//! Tracking público. Open y click nunca muestran un error al cliente de correo
//! (open siempre sirve el pixel); unsubscribe sí puede mostrar una página de error.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::CampaignError,
    handlers::session::AuthenticatedSession,
    models::interaction_model::{DeliveryReport, RequestMeta},
    services::{instrumentation_service::tracking_pixel, tracking_service::TrackingService},
};

#[derive(Deserialize)]
pub struct ClickQuery {
    url: Option<String>,
}

fn request_meta(req: &HttpRequest) -> RequestMeta {
    RequestMeta {
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
    }
}

/// GET /api/tracking/open/{campaign_id}/{contact_id}
pub async fn track_open_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<(i64, i64)>,
    req: HttpRequest,
) -> HttpResponse {
    let (campaign_id, contact_id) = path.into_inner();

    if let Err(e) = tracking
        .record_open(campaign_id, contact_id, &request_meta(&req))
        .await
    {
        log::warn!(
            "(track_open) campaign={} contact={} not recorded: {:?}",
            campaign_id,
            contact_id,
            e
        );
    }

    HttpResponse::Ok()
        .content_type("image/png")
        .append_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .append_header(("Pragma", "no-cache"))
        .append_header(("Expires", "0"))
        .body(tracking_pixel())
}

/// GET /api/tracking/click/{campaign_id}/{contact_id}?url=...
pub async fn track_click_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<(i64, i64)>,
    query: web::Query<ClickQuery>,
    req: HttpRequest,
) -> HttpResponse {
    let (campaign_id, contact_id) = path.into_inner();
    let target = query.into_inner().url.unwrap_or_default();

    match tracking
        .record_click(campaign_id, contact_id, &target, &request_meta(&req))
        .await
    {
        Ok(()) => HttpResponse::Found()
            .append_header((header::LOCATION, target))
            .finish(),
        Err(CampaignError::MissingTarget) => HttpResponse::BadRequest().json(json!({
            "success": false,
            "code": CampaignError::MissingTarget.code(),
            "error": CampaignError::MissingTarget.to_string()
        })),
        Err(e) => {
            log::error!(
                "(track_click) campaign={} contact={} failed: {}",
                campaign_id,
                contact_id,
                e
            );
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "tracking error"
            }))
        }
    }
}

const UNSUBSCRIBE_OK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="fr">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Désabonnement confirmé</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 600px; margin: 100px auto; padding: 20px; text-align: center; }
    .container { background: #f8f9fa; padding: 40px; border-radius: 8px; }
    h1 { color: #28a745; }
  </style>
</head>
<body>
  <div class="container">
    <h1>Désabonnement confirmé</h1>
    <p>Vous avez été désabonné avec succès de notre liste de diffusion.</p>
    <p>Vous ne recevrez plus d'emails de notre part.</p>
  </div>
</body>
</html>"#;

const UNSUBSCRIBE_ERROR_PAGE: &str = r#"<!DOCTYPE html>
<html lang="fr">
<head>
  <meta charset="UTF-8">
  <title>Erreur</title>
</head>
<body>
  <h1>Erreur</h1>
  <p>Une erreur s'est produite lors du désabonnement.</p>
</body>
</html>"#;

/// GET /api/tracking/unsubscribe/{campaign_id}/{contact_id}
pub async fn track_unsubscribe_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<(i64, i64)>,
    req: HttpRequest,
) -> HttpResponse {
    let (campaign_id, contact_id) = path.into_inner();

    match tracking
        .unsubscribe(campaign_id, contact_id, &request_meta(&req))
        .await
    {
        Ok(()) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(UNSUBSCRIBE_OK_PAGE),
        Err(e) => {
            log::error!(
                "(track_unsubscribe) campaign={} contact={} failed: {:?}",
                campaign_id,
                contact_id,
                e
            );
            HttpResponse::InternalServerError()
                .content_type("text/html; charset=utf-8")
                .body(UNSUBSCRIBE_ERROR_PAGE)
        }
    }
}

/// POST /api/tracking/delivery/{campaign_id}/{contact_id}
pub async fn delivery_report_endpoint(
    _session: AuthenticatedSession,
    tracking: web::Data<TrackingService>,
    path: web::Path<(i64, i64)>,
    body: web::Json<DeliveryReport>,
) -> Result<HttpResponse, CampaignError> {
    let (campaign_id, contact_id) = path.into_inner();
    let report = body.into_inner();

    let changed = tracking
        .record_delivery(campaign_id, contact_id, &report)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "changed": changed
    })))
}
