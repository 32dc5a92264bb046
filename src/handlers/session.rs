//! handlers/session.rs
//! Sesión autenticada para las rutas de campañas (token bearer del entorno).

use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};

use crate::{config::app_config::AppConfig, error::CampaignError};

/// Presente en la firma de un handler = la ruta exige sesión.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedSession;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

impl FromRequest for AuthenticatedSession {
    type Error = CampaignError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let expected = req
            .app_data::<web::Data<AppConfig>>()
            .and_then(|cfg| cfg.api_token.clone());

        let result = match (expected, bearer_token(req)) {
            (Some(expected), Some(given)) if expected == given => Ok(AuthenticatedSession),
            _ => Err(CampaignError::Unauthorized),
        };
        ready(result)
    }
}
