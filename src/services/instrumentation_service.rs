//! services/instrumentation_service.rs
//! URLs de tracking por destinatario y pixel de apertura.
//!
//! Las URLs no van firmadas: cualquiera que conozca el par (campaña, contacto)
//! puede generarlas. Los enlaces de la plantilla no se reescriben; el autor
//! debe envolverlos con la URL de click.

use crate::models::email_model::TrackingUrls;

/// PNG transparente de 1x1.
pub const TRACKING_PIXEL_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn tracking_pixel() -> Vec<u8> {
    // Constante válida: decode no puede fallar.
    base64::decode(TRACKING_PIXEL_B64).unwrap_or_default()
}

pub fn tracking_urls(base_url: &str, campaign_id: i64, contact_id: i64) -> TrackingUrls {
    let base = base_url.trim_end_matches('/');
    TrackingUrls {
        open_url: format!("{base}/api/tracking/open/{campaign_id}/{contact_id}"),
        click_url: format!("{base}/api/tracking/click/{campaign_id}/{contact_id}"),
        unsubscribe_url: format!("{base}/api/tracking/unsubscribe/{campaign_id}/{contact_id}"),
    }
}

/// Inserta el pixel justo antes del primer `</body>`, o al final si no hay.
pub fn embed_open_beacon(html: &str, open_url: &str) -> String {
    let pixel = format!(
        r#"<img src="{open_url}" width="1" height="1" style="display:none;" alt=""/>"#
    );
    match html.find("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + pixel.len());
            out.push_str(&html[..pos]);
            out.push_str(&pixel);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{pixel}"),
    }
}
