//! services/transport_service.rs
//! Transporte de salida compartido por todo el proceso.
//!
//! `TransportPool` limita las conexiones simultáneas y los emails/segundo;
//! el despachador pide capacidad aquí en vez de abrir conexiones por lote.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{
        header::{HeaderName, HeaderValue},
        Mailbox, MultiPart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        PoolConfig,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::{config::app_config::TransportConfig, error::CampaignError, models::email_model::OutboundMessage};

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Envía el mensaje y devuelve el identificador de entrega.
    async fn send(&self, message: &OutboundMessage) -> Result<String>;

    /// Comprueba que el relay responde.
    async fn verify(&self) -> Result<()>;
}

// ========================================================================
// SMTP (lettre)
// ========================================================================

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let tls_params = TlsParameters::new(config.smtp_host.clone())?;
        let tls = if config.smtp_port == 465 {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Opportunistic(tls_params)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .tls(tls)
            .timeout(Some(config.timeout))
            .pool_config(PoolConfig::new().max_size(config.max_connections.max(1) as u32));

        if !config.smtp_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }

    fn build_message(message: &OutboundMessage) -> Result<(Message, String)> {
        let from = Mailbox::new(
            Some(message.from_name.clone()),
            message.from_email.parse().context("Invalid from address")?,
        );
        let to: Mailbox = message.to.parse().context("Invalid recipient address")?;

        let domain = message
            .from_email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("localhost");
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), domain);

        let mut email = Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))?;

        for (name, value) in &message.headers {
            let header_name = HeaderName::new_from_ascii(name.clone())
                .map_err(|e| anyhow!("Invalid header name '{}': {}", name, e))?;
            email
                .headers_mut()
                .insert_raw(HeaderValue::new(header_name, value.clone()));
        }

        Ok((email, message_id))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        let (email, message_id) = Self::build_message(message)?;
        self.mailer
            .send(email)
            .await
            .with_context(|| format!("SMTP send to {} failed", message.to))?;
        Ok(message_id)
    }

    async fn verify(&self) -> Result<()> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(anyhow!("SMTP relay refused the connection test")),
            Err(e) => Err(anyhow!("SMTP relay unreachable: {e}")),
        }
    }
}

// ========================================================================
// Pool con límite de conexiones y de ritmo
// ========================================================================

/// Reparte "slots" de envío separados por `interval`.
#[derive(Debug)]
struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    fn per_second(rate: u32) -> Self {
        let interval = if rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / rate
        };
        RateLimiter {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[derive(Clone)]
pub struct TransportPool {
    transport: Arc<dyn MailTransport>,
    connections: Arc<Semaphore>,
    limiter: Arc<RateLimiter>,
    max_connections: usize,
}

/// Capacidad prestada por el pool; se devuelve al soltarla.
pub struct TransportLease {
    transport: Arc<dyn MailTransport>,
    _permit: OwnedSemaphorePermit,
}

impl TransportLease {
    pub async fn send(&self, message: &OutboundMessage) -> Result<String> {
        self.transport.send(message).await
    }
}

impl TransportPool {
    pub fn new(transport: Arc<dyn MailTransport>, config: &TransportConfig) -> Self {
        let max_connections = config.max_connections.max(1);
        TransportPool {
            transport,
            connections: Arc::new(Semaphore::new(max_connections)),
            limiter: Arc::new(RateLimiter::per_second(config.rate_per_second)),
            max_connections,
        }
    }

    /// Verifica el relay al arrancar. Un fallo se registra pero no impide levantar
    /// el servicio: cada envío fallido queda en su destinatario.
    pub async fn start(&self) {
        match self.transport.verify().await {
            Ok(()) => log::info!(
                "(transport) SMTP relay operational (max_connections={})",
                self.max_connections
            ),
            Err(e) => log::error!("(transport) SMTP relay check failed: {:?}", e),
        }
    }

    pub async fn acquire(&self) -> Result<TransportLease, CampaignError> {
        let permit = self
            .connections
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CampaignError::TransportClosed)?;
        self.limiter.wait().await;
        Ok(TransportLease {
            transport: self.transport.clone(),
            _permit: permit,
        })
    }

    pub fn release(&self, lease: TransportLease) {
        drop(lease);
    }

    /// No se conceden más préstamos; los envíos en curso terminan.
    pub fn shutdown(&self) {
        self.connections.close();
        log::info!("(transport) pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.connections.is_closed()
    }

    pub async fn verify(&self) -> Result<()> {
        self.transport.verify().await
    }
}
