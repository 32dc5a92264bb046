//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod campaign_model;
pub mod contact_model;
pub mod email_model;
pub mod interaction_model;
pub mod recipient_model;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formato único de timestamps en DB: RFC 3339 UTC con milisegundos,
/// así la comparación de strings en SQL equivale a la cronológica.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

pub fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

pub fn parse_opt_ts(raw: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}
