//! services/tracking_service.rs
//! Registro de interacciones públicas (open/click/unsubscribe) y confirmaciones
//! de entrega. Cada operación escribe el evento, avanza el destinatario según
//! la tabla de transiciones y recalcula los contadores de la campaña, todo en
//! una misma transacción.

use anyhow::Result;
use serde_json::json;
use sqlx::{Pool, Sqlite};

use crate::{
    error::CampaignError,
    models::{
        contact_model::SubscriptionStatus,
        interaction_model::{DeliveryReport, InteractionType, RequestMeta},
        recipient_model::RecipientStatus,
    },
    services::{
        campaign_service::CampaignService, contact_service,
        interaction_service::InteractionService, recipient_service::RecipientService,
    },
};

#[derive(Clone, Debug)]
pub struct TrackingService {
    db_pool: Pool<Sqlite>,
    recipients: RecipientService,
}

impl TrackingService {
    pub fn new(db_pool: Pool<Sqlite>, recipients: RecipientService) -> Self {
        Self {
            db_pool,
            recipients,
        }
    }

    /// Apertura: un solo evento por (campaña, contacto); sólo avanza desde
    /// `sent`/`delivered`.
    pub async fn record_open(
        &self,
        campaign_id: i64,
        contact_id: i64,
        meta: &RequestMeta,
    ) -> Result<()> {
        let mut tx = self.db_pool.begin().await?;
        let first = InteractionService::record(
            &mut *tx,
            campaign_id,
            contact_id,
            InteractionType::Open,
            None,
            meta,
        )
        .await?;
        let advanced = RecipientService::advance_in(
            &mut *tx,
            campaign_id,
            contact_id,
            RecipientStatus::Opened,
            None,
        )
        .await?;
        CampaignService::recompute_counters_in(&mut *tx, campaign_id).await?;
        tx.commit().await?;

        log::debug!(
            "(record_open) campaign={} contact={} first_open={} advanced={}",
            campaign_id,
            contact_id,
            first,
            advanced
        );
        Ok(())
    }

    /// Click: siempre se registra el evento con la URL destino.
    pub async fn record_click(
        &self,
        campaign_id: i64,
        contact_id: i64,
        target_url: &str,
        meta: &RequestMeta,
    ) -> Result<(), CampaignError> {
        if target_url.trim().is_empty() {
            return Err(CampaignError::MissingTarget);
        }

        let mut tx = self.db_pool.begin().await.map_err(anyhow::Error::from)?;
        InteractionService::record(
            &mut *tx,
            campaign_id,
            contact_id,
            InteractionType::Click,
            Some(json!({ "url": target_url })),
            meta,
        )
        .await?;
        RecipientService::advance_in(
            &mut *tx,
            campaign_id,
            contact_id,
            RecipientStatus::Clicked,
            None,
        )
        .await?;
        CampaignService::recompute_counters_in(&mut *tx, campaign_id).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        log::debug!(
            "(record_click) campaign={} contact={} url={}",
            campaign_id,
            contact_id,
            target_url
        );
        Ok(())
    }

    /// Baja: suscripción, evento, destinatario y contadores se confirman juntos;
    /// si algo falla (p. ej. campaña inexistente) no queda ningún cambio.
    pub async fn unsubscribe(
        &self,
        campaign_id: i64,
        contact_id: i64,
        meta: &RequestMeta,
    ) -> Result<()> {
        let mut tx = self.db_pool.begin().await?;
        contact_service::set_subscription(&mut *tx, contact_id, SubscriptionStatus::Unsubscribed)
            .await?;
        InteractionService::record(
            &mut *tx,
            campaign_id,
            contact_id,
            InteractionType::Unsubscribe,
            None,
            meta,
        )
        .await?;
        RecipientService::advance_in(
            &mut *tx,
            campaign_id,
            contact_id,
            RecipientStatus::Unsubscribed,
            None,
        )
        .await?;
        CampaignService::recompute_counters_in(&mut *tx, campaign_id).await?;
        tx.commit().await?;

        log::info!(
            "(unsubscribe) contact={} unsubscribed via campaign={}",
            contact_id,
            campaign_id
        );
        Ok(())
    }

    /// Confirmación del relay: entregado (sent -> delivered) o rebote
    /// (evento `bounce`, sent -> failed con motivo).
    pub async fn record_delivery(
        &self,
        campaign_id: i64,
        contact_id: i64,
        report: &DeliveryReport,
    ) -> Result<bool, CampaignError> {
        if self
            .recipients
            .get_recipient(campaign_id, contact_id)
            .await?
            .is_none()
        {
            return Err(CampaignError::Validation(format!(
                "contact {contact_id} is not a recipient of campaign {campaign_id}"
            )));
        }

        let mut tx = self.db_pool.begin().await.map_err(anyhow::Error::from)?;
        let changed = match report {
            DeliveryReport::Delivered => {
                RecipientService::advance_in(
                    &mut *tx,
                    campaign_id,
                    contact_id,
                    RecipientStatus::Delivered,
                    None,
                )
                .await?
            }
            DeliveryReport::Bounced { reason } => {
                InteractionService::record(
                    &mut *tx,
                    campaign_id,
                    contact_id,
                    InteractionType::Bounce,
                    Some(json!({ "reason": reason })),
                    &RequestMeta::default(),
                )
                .await?;
                RecipientService::advance_in(
                    &mut *tx,
                    campaign_id,
                    contact_id,
                    RecipientStatus::Failed,
                    Some(reason.as_str()),
                )
                .await?
            }
        };
        CampaignService::recompute_counters_in(&mut *tx, campaign_id).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;
        Ok(changed)
    }
}
