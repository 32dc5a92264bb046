//! tests/support.rs
//! Base de datos en memoria, transporte que graba y servicios ya cableados.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{
    config::app_config::{AppConfig, DispatchConfig, TransportConfig},
    models::{
        campaign_model::CreateCampaignRequest, email_model::OutboundMessage, now_ts,
        recipient_model::RecipientStatus,
    },
    services::{
        campaign_service::CampaignService,
        dispatch_service::Dispatcher,
        interaction_service::InteractionService,
        recipient_service::RecipientService,
        tracking_service::TrackingService,
        transport_service::{MailTransport, TransportPool},
    },
};

pub const TEST_TOKEN: &str = "test-token";
pub const TRACKING_BASE: &str = "https://crm.example.com";

/// Una sola conexión: cada conexión nueva a `:memory:` sería otra base vacía.
pub async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// Transporte falso: guarda cada mensaje y falla para las direcciones indicadas.
/// Con `delay` cada envío tarda ese tiempo; se anotan la ventana (inicio, fin)
/// de cada envío y el máximo de envíos simultáneos.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub failing: Vec<String>,
    pub unreachable: bool,
    pub delay: Duration,
    pub windows: Mutex<Vec<(Instant, Instant)>>,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn failing_for(addresses: &[&str]) -> Self {
        RecordingTransport {
            failing: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        RecordingTransport {
            delay,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Ventanas de envío ordenadas por inicio.
    pub fn windows(&self) -> Vec<(Instant, Instant)> {
        let mut windows = self.windows.lock().unwrap().clone();
        windows.sort_by_key(|(start, _)| *start);
        windows
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        let started = Instant::now();
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push((started, Instant::now()));

        if self.failing.iter().any(|a| a == &message.to) {
            bail!("550 mailbox unavailable: {}", message.to);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("<test-{}@localhost>", sent.len()))
    }

    async fn verify(&self) -> Result<()> {
        if self.unreachable {
            bail!("relay unreachable");
        }
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        api_token: Some(TEST_TOKEN.to_string()),
        scheduler_interval: Duration::from_millis(50),
        transport: TransportConfig {
            max_connections: 2,
            rate_per_second: 0,
            ..TransportConfig::default()
        },
        dispatch: DispatchConfig {
            batch_size: 2,
            batch_pause: Duration::ZERO,
            tracking_base_url: format!("{TRACKING_BASE}/"),
            default_sender_name: "Club de Golf".to_string(),
            default_sender_email: "news@club.example.com".to_string(),
        },
        ..AppConfig::default()
    }
}

#[derive(Default)]
pub struct NewContact<'a> {
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub company: Option<&'a str>,
    pub contact_type: Option<&'a str>,
    pub tags: &'a [&'a str],
    pub status: Option<&'a str>,
    pub subscription_status: Option<&'a str>,
}

/// Servicios cableados sobre la misma base en memoria.
pub struct Harness {
    pub db_pool: Pool<Sqlite>,
    pub config: AppConfig,
    pub campaigns: CampaignService,
    pub recipients: RecipientService,
    pub interactions: InteractionService,
    pub tracking: TrackingService,
    pub transport: Arc<RecordingTransport>,
    pub mail_pool: TransportPool,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_transport(RecordingTransport::default()).await
    }

    pub async fn with_transport(transport: RecordingTransport) -> Self {
        Self::with_config(transport, test_config()).await
    }

    pub async fn with_config(transport: RecordingTransport, config: AppConfig) -> Self {
        let db_pool = test_pool().await;

        let campaigns = CampaignService::new(db_pool.clone());
        let interactions = InteractionService::new(db_pool.clone());
        let recipients = RecipientService::new(db_pool.clone(), campaigns.clone());
        let tracking = TrackingService::new(db_pool.clone(), recipients.clone());

        let transport = Arc::new(transport);
        let mail_pool = TransportPool::new(transport.clone(), &config.transport);
        let dispatcher = Dispatcher::new(
            campaigns.clone(),
            recipients.clone(),
            mail_pool.clone(),
            config.dispatch.clone(),
        );

        Harness {
            db_pool,
            config,
            campaigns,
            recipients,
            interactions,
            tracking,
            transport,
            mail_pool,
            dispatcher,
        }
    }

    pub async fn contact(&self, new: NewContact<'_>) -> i64 {
        let now = now_ts();
        sqlx::query(
            r#"
            INSERT INTO contacts (
                email, first_name, last_name, company, contact_type, status,
                subscription_status, tags, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(new.email)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.company)
        .bind(new.contact_type.unwrap_or("visitor"))
        .bind(new.status.unwrap_or("active"))
        .bind(new.subscription_status.unwrap_or("subscribed"))
        .bind(serde_json::to_string(new.tags).unwrap())
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    /// Contacto activo y suscrito con sólo el email.
    pub async fn simple_contact(&self, email: &str) -> i64 {
        self.contact(NewContact {
            email,
            first_name: Some("Ana"),
            ..Default::default()
        })
        .await
    }

    pub async fn campaign(&self, name: &str, scheduled_at: Option<DateTime<Utc>>) -> i64 {
        self.campaigns
            .create_campaign(&CreateCampaignRequest {
                name: name.to_string(),
                subject: "Hola {first_name}".to_string(),
                html_content: "<html><body><p>Bonjour {first_name}</p></body></html>"
                    .to_string(),
                text_content: Some("Bonjour {first_name}".to_string()),
                sender_name: None,
                sender_email: None,
                scheduled_at,
                recipient_criteria: None,
            })
            .await
            .unwrap()
    }

    pub async fn recipient_status(&self, campaign_id: i64, contact_id: i64) -> RecipientStatus {
        self.recipients
            .get_recipient(campaign_id, contact_id)
            .await
            .unwrap()
            .expect("recipient row")
            .status
    }

    pub async fn interaction_count(&self, campaign_id: i64, kind: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM email_interactions WHERE campaign_id = ?1 AND interaction_type = ?2",
        )
        .bind(campaign_id)
        .bind(kind)
        .fetch_one(&self.db_pool)
        .await
        .unwrap()
    }
}
