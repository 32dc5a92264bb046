//! app.rs
use crate::handlers::{campaign_handler, tracking_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns")
                    .route(
                        "",
                        web::post().to(campaign_handler::create_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(campaign_handler::get_campaign_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::put().to(campaign_handler::update_campaign_endpoint),
                    )
                    .route(
                        "/{id}/duplicate",
                        web::post().to(campaign_handler::duplicate_campaign_endpoint),
                    )
                    .route(
                        "/{id}/recipients",
                        web::post().to(campaign_handler::add_recipients_endpoint),
                    )
                    .route(
                        "/{id}/recipients/{contact_id}",
                        web::get().to(campaign_handler::get_recipient_endpoint),
                    )
                    .route(
                        "/{id}/send",
                        web::post().to(campaign_handler::send_campaign_endpoint),
                    )
                    .route(
                        "/{id}/cancel",
                        web::post().to(campaign_handler::cancel_campaign_endpoint),
                    )
                    .route(
                        "/{id}/test",
                        web::post().to(campaign_handler::send_test_email_endpoint),
                    ),
            )
            .service(
                web::scope("/tracking")
                    .route(
                        "/open/{campaign_id}/{contact_id}",
                        web::get().to(tracking_handler::track_open_endpoint),
                    )
                    .route(
                        "/click/{campaign_id}/{contact_id}",
                        web::get().to(tracking_handler::track_click_endpoint),
                    )
                    .route(
                        "/unsubscribe/{campaign_id}/{contact_id}",
                        web::get().to(tracking_handler::track_unsubscribe_endpoint),
                    )
                    .route(
                        "/delivery/{campaign_id}/{contact_id}",
                        web::post().to(tracking_handler::delivery_report_endpoint),
                    ),
            )
            .service(
                web::scope("/email").route(
                    "/status",
                    web::get().to(campaign_handler::transport_status_endpoint),
                ),
            ),
    );
}
