use std::{path::Path, str::FromStr, sync::Arc};

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tokio::sync::watch;

use crate::config::app_config::{log_level_from_env, AppConfig};
use crate::logger::init_logger;
use crate::services::{
    campaign_service::CampaignService,
    dispatch_service::Dispatcher,
    interaction_service::InteractionService,
    recipient_service::RecipientService,
    scheduler_service::CampaignScheduler,
    tracking_service::TrackingService,
    transport_service::{SmtpMailTransport, TransportPool},
};

mod app;
mod config;
mod error;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

/// Crea la carpeta de la base de datos si hace falta y aplica las migraciones.
async fn setup_database(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    let file = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if !file.starts_with(":memory:") {
        if let Some(dir) = Path::new(file).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("could not create directory {}", dir.display()))?;
        }
    }

    log::info!("Conectando a SQLite en {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("could not connect to SQLite")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("migrations failed")?;

    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // El logger va primero: `from_env` avisa de variables inválidas.
    init_logger(&log_level_from_env());
    let config = AppConfig::from_env();

    if config.api_token.is_none() {
        log::warn!("API_TOKEN is not set: every campaign route will answer 401");
    }

    let db_pool = setup_database(&config.database_url).await?;

    let campaign_service = CampaignService::new(db_pool.clone());
    let interaction_service = InteractionService::new(db_pool.clone());
    let recipient_service = RecipientService::new(db_pool.clone(), campaign_service.clone());

    let smtp = SmtpMailTransport::new(&config.transport)?;
    let transport_pool = TransportPool::new(Arc::new(smtp), &config.transport);
    transport_pool.start().await;

    let dispatcher = Dispatcher::new(
        campaign_service.clone(),
        recipient_service.clone(),
        transport_pool.clone(),
        config.dispatch.clone(),
    );
    let tracking_service = TrackingService::new(db_pool.clone(), recipient_service.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = CampaignScheduler::new(
        dispatcher.clone(),
        campaign_service.clone(),
        config.scheduler_interval,
    )
    .spawn(shutdown_rx);

    let bind = (config.bind_addr.clone(), config.port);
    let workers = config.http_workers.max(1);
    let app_config = web::Data::new(config);
    let pool_handle = transport_pool.clone();

    log::info!("Levantando servidor en {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(app_config.clone())
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(recipient_service.clone()))
            .app_data(web::Data::new(interaction_service.clone()))
            .app_data(web::Data::new(tracking_service.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .app_data(web::Data::new(transport_pool.clone()))
            .configure(app::init_app)
    })
    .workers(workers)
    .bind(bind)?
    .run()
    .await?;

    log::info!("Servidor detenido; cerrando scheduler y transporte");
    shutdown_tx.send(true).ok();
    if let Err(e) = scheduler.await {
        log::error!("(scheduler) task ended abnormally: {:?}", e);
    }
    pool_handle.shutdown();
    Ok(())
}
