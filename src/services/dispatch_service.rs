//! services/dispatch_service.rs
//! Envío de campañas: transición de estado, lotes concurrentes y contadores.

use chrono::Utc;
use futures_util::future::join_all;

use crate::{
    config::app_config::DispatchConfig,
    error::CampaignError,
    models::{
        campaign_model::{Campaign, CampaignStatus, DispatchReport, SendOutcome},
        email_model::{EmailTemplate, OutboundMessage},
        recipient_model::{PendingRecipient, RecipientStatus},
    },
    services::{
        campaign_service::CampaignService,
        instrumentation_service::{embed_open_beacon, tracking_urls},
        personalization_service::{personalize, TemplateVariables},
        recipient_service::RecipientService,
        transport_service::TransportPool,
    },
};

#[derive(Clone)]
pub struct Dispatcher {
    campaigns: CampaignService,
    recipients: RecipientService,
    pool: TransportPool,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        campaigns: CampaignService,
        recipients: RecipientService,
        pool: TransportPool,
        config: DispatchConfig,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            pool,
            config,
        }
    }

    // ======================================================
    // API pública
    // ======================================================

    /// Envía ya (inmediato o fecha vencida) o deja la campaña programada.
    /// El envío inmediato corre dentro de la llamada: puede tardar.
    pub async fn send(&self, campaign_id: i64, immediate: bool) -> Result<SendOutcome, CampaignError> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound(campaign_id))?;

        if campaign.status == CampaignStatus::Sent {
            return Err(CampaignError::AlreadySent(campaign_id));
        }
        if self.recipients.count_for_campaign(campaign_id).await? == 0 {
            return Err(CampaignError::NoRecipients(campaign_id));
        }

        let now = Utc::now();
        match campaign.scheduled_at {
            _ if immediate => Ok(SendOutcome::Dispatched(self.dispatch(campaign_id).await?)),
            Some(at) if at <= now => Ok(SendOutcome::Dispatched(self.dispatch(campaign_id).await?)),
            Some(at) => {
                if !self.campaigns.mark_scheduled(campaign_id).await? {
                    // Sólo falla si otro despacho la reclamó mientras tanto.
                    return Err(CampaignError::AlreadySent(campaign_id));
                }
                log::info!("(send) campaign={} scheduled for {}", campaign_id, at);
                Ok(SendOutcome::Scheduled(at))
            }
            None => Err(CampaignError::SchedulingRequired(campaign_id)),
        }
    }

    pub async fn cancel(&self, campaign_id: i64) -> Result<(), CampaignError> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound(campaign_id))?;

        if !campaign.status.can_transition_to(CampaignStatus::Canceled)
            || !self.campaigns.cancel(campaign_id).await?
        {
            return Err(CampaignError::NotScheduled {
                id: campaign_id,
                status: campaign.status,
            });
        }
        log::info!("(cancel) campaign={} canceled", campaign_id);
        Ok(())
    }

    /// Despacho completo. Lo usan tanto `send` como el scheduler.
    pub async fn dispatch(&self, campaign_id: i64) -> Result<DispatchReport, CampaignError> {
        // 1) Reclamar la campaña antes de transmitir nada (evita doble envío).
        if !self.campaigns.claim_for_dispatch(campaign_id).await? {
            return Err(match self.campaigns.get_campaign(campaign_id).await? {
                Some(_) => CampaignError::AlreadySent(campaign_id),
                None => CampaignError::NotFound(campaign_id),
            });
        }
        log::info!("(dispatch) campaign={} claimed, starting", campaign_id);

        // 2) Preparación: si falla, la campaña vuelve a draft.
        let (campaign, pending) = match self.prepare(campaign_id).await {
            Ok(ready) => ready,
            Err(e) => {
                log::error!(
                    "(dispatch) campaign={} setup failed, rolling back to draft: {}",
                    campaign_id,
                    e
                );
                if let Err(rollback) = self.campaigns.rollback_dispatch(campaign_id).await {
                    log::error!(
                        "(dispatch) campaign={} rollback failed: {:?}",
                        campaign_id,
                        rollback
                    );
                }
                return Err(e);
            }
        };

        // 3) Lotes: envíos concurrentes, se espera a todos, pausa entre lotes.
        let total = pending.len();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);
        let template = campaign.template();

        let mut sent = 0;
        let mut failed = 0;
        for (index, batch) in pending.chunks(batch_size).enumerate() {
            log::info!(
                "(dispatch) campaign={} batch {}/{} ({} recipients)",
                campaign_id,
                index + 1,
                batch_count,
                batch.len()
            );

            let results = join_all(
                batch
                    .iter()
                    .map(|recipient| self.deliver_one(&campaign, &template, recipient)),
            )
            .await;

            for (recipient, delivered) in batch.iter().zip(results) {
                if delivered {
                    sent += 1;
                } else {
                    failed += 1;
                    log::warn!(
                        "(dispatch) campaign={} recipient {} <{}> failed",
                        campaign_id,
                        recipient.contact_id,
                        recipient.email
                    );
                }
            }

            if index + 1 < batch_count && !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        // 4) Contadores desde la tabla de destinatarios.
        if let Err(e) = self.campaigns.recompute_counters(campaign_id).await {
            log::error!(
                "(dispatch) campaign={} counter recompute failed: {:?}",
                campaign_id,
                e
            );
        }

        let report = DispatchReport {
            total,
            sent,
            failed,
        };
        log::info!(
            "(dispatch) campaign={} done: {} sent, {} failed of {}",
            campaign_id,
            report.sent,
            report.failed,
            report.total
        );
        Ok(report)
    }

    /// Email de prueba: destinatario ficticio, sin tracking ni cambios de estado.
    pub async fn send_test(&self, campaign_id: i64, address: &str) -> Result<String, CampaignError> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound(campaign_id))?;

        let mock = PendingRecipient {
            contact_id: 0,
            email: address.to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            company: Some("Test Company".to_string()),
        };
        let template = campaign.template();
        let content = personalize(
            &template,
            &TemplateVariables::for_recipient(&mock, Utc::now().date_naive()),
        );
        let message = OutboundMessage {
            from_name: self.sender_name(&campaign),
            from_email: self.sender_email(&campaign),
            to: mock.email,
            subject: format!("[TEST] {}", content.subject),
            html: content.html,
            text: content.text,
            headers: vec![("X-Campaign-Test".to_string(), "true".to_string())],
        };

        let lease = self.pool.acquire().await?;
        let delivery_id = lease.send(&message).await?;
        self.pool.release(lease);

        log::info!(
            "(send_test) campaign={} test email sent to {} id={}",
            campaign_id,
            address,
            delivery_id
        );
        Ok(delivery_id)
    }

    // ======================================================
    // Internos
    // ======================================================

    async fn prepare(
        &self,
        campaign_id: i64,
    ) -> Result<(Campaign, Vec<PendingRecipient>), CampaignError> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound(campaign_id))?;
        let pending = self.recipients.pending_for_campaign(campaign_id).await?;
        Ok((campaign, pending))
    }

    /// Construye el mensaje final de un destinatario (personalizado + tracking).
    pub fn build_message(
        &self,
        campaign: &Campaign,
        template: &EmailTemplate,
        recipient: &PendingRecipient,
    ) -> OutboundMessage {
        let vars = TemplateVariables::for_recipient(recipient, Utc::now().date_naive());
        let content = personalize(template, &vars);
        let urls = tracking_urls(
            &self.config.tracking_base_url,
            campaign.id,
            recipient.contact_id,
        );

        OutboundMessage {
            from_name: self.sender_name(campaign),
            from_email: self.sender_email(campaign),
            to: recipient.email.clone(),
            subject: content.subject,
            html: embed_open_beacon(&content.html, &urls.open_url),
            text: content.text,
            headers: vec![
                (
                    "List-Unsubscribe".to_string(),
                    format!("<{}>", urls.unsubscribe_url),
                ),
                ("X-Campaign-ID".to_string(), campaign.id.to_string()),
            ],
        }
    }

    pub fn sender_name(&self, campaign: &Campaign) -> String {
        campaign
            .sender_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.config.default_sender_name.clone())
    }

    pub fn sender_email(&self, campaign: &Campaign) -> String {
        campaign
            .sender_email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| self.config.default_sender_email.clone())
    }

    /// Envía a un destinatario y registra el resultado. Nunca propaga el error:
    /// devuelve si el envío se hizo.
    async fn deliver_one(
        &self,
        campaign: &Campaign,
        template: &EmailTemplate,
        recipient: &PendingRecipient,
    ) -> bool {
        let message = self.build_message(campaign, template, recipient);

        let outcome = match self.pool.acquire().await {
            Ok(lease) => {
                let result = lease.send(&message).await;
                self.pool.release(lease);
                result
            }
            Err(e) => Err(anyhow::Error::new(e)),
        };

        let (target, reason) = match &outcome {
            Ok(delivery_id) => {
                log::info!(
                    "(dispatch) campaign={} sent to {} id={}",
                    campaign.id,
                    recipient.email,
                    delivery_id
                );
                (RecipientStatus::Sent, None)
            }
            Err(e) => (RecipientStatus::Failed, Some(format!("{e:#}"))),
        };

        if let Err(e) = self
            .recipients
            .advance(campaign.id, recipient.contact_id, target, reason.as_deref())
            .await
        {
            log::error!(
                "(dispatch) campaign={} could not record {} for contact {}: {:?}",
                campaign.id,
                target,
                recipient.contact_id,
                e
            );
        }

        outcome.is_ok()
    }
}
