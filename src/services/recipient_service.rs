//! services/recipient_service.rs
//! Destinatarios de campaña: resolución (alta idempotente) y transiciones de estado.

use anyhow::{Context, Result};
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    error::CampaignError,
    models::{
        campaign_model::CampaignStatus,
        now_ts, parse_opt_ts,
        recipient_model::{PendingRecipient, RecipientRecord, RecipientSelector, RecipientStatus},
    },
    services::{
        campaign_service::CampaignService,
        contact_service::{push_eligibility, EligibilityFilter, MAX_IDS_PER_QUERY},
    },
};

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: i64,
    campaign_id: i64,
    contact_id: i64,
    status: RecipientStatus,
    sent_at: Option<String>,
    delivered_at: Option<String>,
    opened_at: Option<String>,
    clicked_at: Option<String>,
    unsubscribed_at: Option<String>,
    failure_reason: Option<String>,
}

impl TryFrom<RecipientRow> for RecipientRecord {
    type Error = anyhow::Error;

    fn try_from(row: RecipientRow) -> Result<Self> {
        Ok(RecipientRecord {
            id: row.id,
            campaign_id: row.campaign_id,
            contact_id: row.contact_id,
            status: row.status,
            sent_at: parse_opt_ts(row.sent_at)?,
            delivered_at: parse_opt_ts(row.delivered_at)?,
            opened_at: parse_opt_ts(row.opened_at)?,
            clicked_at: parse_opt_ts(row.clicked_at)?,
            unsubscribed_at: parse_opt_ts(row.unsubscribed_at)?,
            failure_reason: row.failure_reason,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RecipientService {
    db_pool: Pool<Sqlite>,
    campaigns: CampaignService,
}

impl RecipientService {
    pub fn new(db_pool: Pool<Sqlite>, campaigns: CampaignService) -> Self {
        RecipientService { db_pool, campaigns }
    }

    // ======================================================
    // Resolución de destinatarios
    // ======================================================

    /// Registra los contactos elegibles del selector como destinatarios `pending`.
    /// Devuelve cuántas filas nuevas se crearon; los duplicados se absorben.
    /// La elegibilidad se evalúa dentro del propio INSERT: los criterios son una
    /// sola sentencia y las listas de ids van por tramos.
    pub async fn resolve(
        &self,
        campaign_id: i64,
        selector: &RecipientSelector,
    ) -> Result<u64, CampaignError> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound(campaign_id))?;
        if campaign.status == CampaignStatus::Sent {
            return Err(CampaignError::CampaignLocked(campaign_id));
        }

        let added = match selector {
            RecipientSelector::Criteria(criteria) => {
                self.insert_eligible(campaign_id, EligibilityFilter::Criteria(criteria))
                    .await?
            }
            RecipientSelector::Contacts(ids) => {
                let mut added = 0;
                for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
                    added += self
                        .insert_eligible(campaign_id, EligibilityFilter::Ids(chunk))
                        .await?;
                }
                added
            }
        };

        // Un despacho pudo reclamar la campaña entre la lectura y el insert.
        if added == 0 {
            let current = self.campaigns.get_campaign(campaign_id).await?;
            if current.map(|c| c.status) == Some(CampaignStatus::Sent) {
                return Err(CampaignError::CampaignLocked(campaign_id));
            }
        }

        self.campaigns.recompute_counters(campaign_id).await?;
        log::info!("(resolve) campaign={} added={}", campaign_id, added);
        Ok(added)
    }

    /// INSERT OR IGNORE ... SELECT desde `contacts`, condicionado a que la
    /// campaña no esté enviada.
    async fn insert_eligible(&self, campaign_id: i64, filter: EligibilityFilter<'_>) -> Result<u64> {
        let now = now_ts();
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO campaign_recipients (campaign_id, contact_id, status, created_at, updated_at) \
             SELECT c.id, k.id, 'pending', ",
        );
        qb.push_bind(now.clone())
            .push(", ")
            .push_bind(now)
            .push(" FROM campaigns c JOIN contacts k ON");
        push_eligibility(&mut qb, "k", filter);
        qb.push(" WHERE c.id = ")
            .push_bind(campaign_id)
            .push(" AND c.status <> ")
            .push_bind(CampaignStatus::Sent)
            .push(" ORDER BY k.id");

        let result = qb
            .build()
            .execute(&self.db_pool)
            .await
            .context("Failed to insert campaign recipients")?;
        Ok(result.rows_affected())
    }

    // ======================================================
    // Consultas
    // ======================================================

    pub async fn count_for_campaign(&self, campaign_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM campaign_recipients WHERE campaign_id = ?1",
        )
        .bind(campaign_id)
        .fetch_one(&self.db_pool)
        .await
        .context("Failed to count campaign recipients")
    }

    pub async fn pending_for_campaign(&self, campaign_id: i64) -> Result<Vec<PendingRecipient>> {
        sqlx::query_as::<_, PendingRecipient>(
            r#"
            SELECT r.contact_id, c.email, c.first_name, c.last_name, c.company
            FROM campaign_recipients r
            JOIN contacts c ON c.id = r.contact_id
            WHERE r.campaign_id = ?1 AND r.status = 'pending'
            ORDER BY r.id
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Failed to load pending recipients")
    }

    pub async fn get_recipient(
        &self,
        campaign_id: i64,
        contact_id: i64,
    ) -> Result<Option<RecipientRecord>> {
        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT id, campaign_id, contact_id, status, sent_at, delivered_at,
                   opened_at, clicked_at, unsubscribed_at, failure_reason
            FROM campaign_recipients
            WHERE campaign_id = ?1 AND contact_id = ?2
            "#,
        )
        .bind(campaign_id)
        .bind(contact_id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Failed to load recipient")?;

        row.map(RecipientRecord::try_from).transpose()
    }

    // ======================================================
    // Transiciones
    // ======================================================

    /// Avanza el destinatario a `target` sólo si su estado actual lo permite
    /// según `RecipientStatus::can_transition_to`. Devuelve si hubo cambio.
    pub async fn advance(
        &self,
        campaign_id: i64,
        contact_id: i64,
        target: RecipientStatus,
        failure_reason: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.db_pool.acquire().await?;
        Self::advance_in(&mut *conn, campaign_id, contact_id, target, failure_reason).await
    }

    /// Igual que `advance`, dentro de una conexión o transacción abierta.
    pub async fn advance_in(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        contact_id: i64,
        target: RecipientStatus,
        failure_reason: Option<&str>,
    ) -> Result<bool> {
        let allowed = RecipientStatus::predecessors(target);
        if allowed.is_empty() {
            return Ok(false);
        }

        let now = now_ts();
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE campaign_recipients SET status = ");
        qb.push_bind(target).push(", updated_at = ").push_bind(now.clone());
        if let Some(column) = target.timestamp_column() {
            qb.push(format!(", {column} = ")).push_bind(now);
        }
        if let Some(reason) = failure_reason {
            qb.push(", failure_reason = ").push_bind(reason.to_string());
        }
        qb.push(" WHERE campaign_id = ")
            .push_bind(campaign_id)
            .push(" AND contact_id = ")
            .push_bind(contact_id)
            .push(" AND status IN (");
        let mut list = qb.separated(", ");
        for status in allowed {
            list.push_bind(status);
        }
        list.push_unseparated(")");

        let result = qb
            .build()
            .execute(conn)
            .await
            .with_context(|| format!("Failed to move recipient {campaign_id}/{contact_id} to {target}"))?;

        Ok(result.rows_affected() == 1)
    }
}
