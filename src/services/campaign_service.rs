//! services/campaign_service.rs
//! Persistencia de campañas: CRUD, transiciones de estado y contadores agregados.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::models::{
    campaign_model::{
        Campaign, CampaignCounters, CampaignStatus, CreateCampaignRequest, StatusBreakdown,
        UpdateCampaignRequest,
    },
    format_ts, now_ts, parse_opt_ts, parse_ts,
    recipient_model::RecipientStatus,
};

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    name: String,
    subject: String,
    html_content: String,
    text_content: Option<String>,
    sender_name: Option<String>,
    sender_email: Option<String>,
    status: CampaignStatus,
    scheduled_at: Option<String>,
    sent_at: Option<String>,
    recipient_count: i64,
    sent_count: i64,
    delivered_count: i64,
    opened_count: i64,
    clicked_count: i64,
    unsubscribed_count: i64,
    bounced_count: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = anyhow::Error;

    fn try_from(row: CampaignRow) -> Result<Self> {
        Ok(Campaign {
            id: row.id,
            name: row.name,
            subject: row.subject,
            html_content: row.html_content,
            text_content: row.text_content,
            sender_name: row.sender_name,
            sender_email: row.sender_email,
            status: row.status,
            scheduled_at: parse_opt_ts(row.scheduled_at)?,
            sent_at: parse_opt_ts(row.sent_at)?,
            counters: CampaignCounters {
                recipient_count: row.recipient_count,
                sent_count: row.sent_count,
                delivered_count: row.delivered_count,
                opened_count: row.opened_count,
                clicked_count: row.clicked_count,
                unsubscribed_count: row.unsubscribed_count,
                bounced_count: row.bounced_count,
            },
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

const CAMPAIGN_COLUMNS: &str = r#"
    id, name, subject, html_content, text_content, sender_name, sender_email,
    status, scheduled_at, sent_at,
    recipient_count, sent_count, delivered_count, opened_count,
    clicked_count, unsubscribed_count, bounced_count,
    created_at, updated_at
"#;

/// Agrega `status IN (...)` con los estados dados (sin binds: son constantes del enum).
fn push_status_list<T: std::fmt::Display>(qb: &mut QueryBuilder<'_, Sqlite>, statuses: &[T]) {
    qb.push("(");
    for (i, s) in statuses.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("'{}'", s));
    }
    qb.push(")");
}

#[derive(Clone, Debug)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    pub async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Failed to load campaign")?;

        row.map(Campaign::try_from).transpose()
    }

    pub async fn create_campaign(&self, req: &CreateCampaignRequest) -> Result<i64> {
        let now = now_ts();
        let status = if req.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (
                name, subject, html_content, text_content, sender_name, sender_email,
                status, scheduled_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(req.name.trim())
        .bind(&req.subject)
        .bind(&req.html_content)
        .bind(&req.text_content)
        .bind(&req.sender_name)
        .bind(&req.sender_email)
        .bind(status)
        .bind(req.scheduled_at.map(format_ts))
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Failed to insert campaign")?;

        Ok(result.last_insert_rowid())
    }

    /// Aplica un patch parcial. El llamador ya verificó que no esté `sent`;
    /// el `WHERE status <> 'sent'` cubre la carrera con un despacho.
    pub async fn update_campaign(
        &self,
        id: i64,
        current: CampaignStatus,
        patch: &UpdateCampaignRequest,
    ) -> Result<bool> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE campaigns SET updated_at = ");
        qb.push_bind(now_ts());

        let text_fields = [
            ("name", &patch.name),
            ("subject", &patch.subject),
            ("html_content", &patch.html_content),
            ("text_content", &patch.text_content),
            ("sender_name", &patch.sender_name),
            ("sender_email", &patch.sender_email),
        ];
        for (column, value) in text_fields {
            if let Some(v) = value {
                qb.push(format!(", {column} = ")).push_bind(v.clone());
            }
        }

        if let Some(scheduled_at) = patch.scheduled_at {
            qb.push(", scheduled_at = ")
                .push_bind(scheduled_at.map(format_ts));
            match scheduled_at {
                Some(_) => {
                    qb.push(", status = ").push_bind(CampaignStatus::Scheduled);
                }
                None if current == CampaignStatus::Scheduled => {
                    qb.push(", status = ").push_bind(CampaignStatus::Draft);
                }
                None => {}
            }
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status <> ").push_bind(CampaignStatus::Sent);

        let result = qb
            .build()
            .execute(&self.db_pool)
            .await
            .context("Failed to update campaign")?;
        Ok(result.rows_affected() == 1)
    }

    /// Copia plantillas y remitente a un nuevo borrador (sin destinatarios).
    pub async fn duplicate_campaign(&self, source: &Campaign, new_name: &str) -> Result<i64> {
        let now = now_ts();
        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (
                name, subject, html_content, text_content, sender_name, sender_email,
                status, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'draft', ?7, ?7)
            "#,
        )
        .bind(new_name)
        .bind(&source.subject)
        .bind(&source.html_content)
        .bind(&source.text_content)
        .bind(&source.sender_name)
        .bind(&source.sender_email)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Failed to duplicate campaign")?;

        Ok(result.last_insert_rowid())
    }

    /// Marca la campaña `sent` y sella `sent_at` de forma atómica.
    /// Devuelve `false` si otro despacho ya la reclamó (o ya estaba enviada).
    pub async fn claim_for_dispatch(&self, id: i64) -> Result<bool> {
        let now = now_ts();
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE campaigns SET status = ");
        qb.push_bind(CampaignStatus::Sent)
            .push(", sent_at = ")
            .push_bind(now.clone())
            .push(", updated_at = ")
            .push_bind(now)
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND status IN ");
        push_status_list(&mut qb, &CampaignStatus::predecessors(CampaignStatus::Sent));

        let result = qb
            .build()
            .execute(&self.db_pool)
            .await
            .context("Failed to claim campaign for dispatch")?;
        Ok(result.rows_affected() == 1)
    }

    /// Compensación: el despacho falló antes de empezar a enviar.
    pub async fn rollback_dispatch(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'draft', sent_at = NULL, updated_at = ?2
            WHERE id = ?1 AND status = 'sent'
            "#,
        )
        .bind(id)
        .bind(now_ts())
        .execute(&self.db_pool)
        .await
        .context("Failed to roll back campaign status")?;
        Ok(())
    }

    pub async fn mark_scheduled(&self, id: i64) -> Result<bool> {
        self.transition(id, CampaignStatus::Scheduled, false).await
    }

    /// `scheduled -> canceled`, borrando `scheduled_at`.
    pub async fn cancel(&self, id: i64) -> Result<bool> {
        self.transition(id, CampaignStatus::Canceled, true).await
    }

    async fn transition(&self, id: i64, target: CampaignStatus, clear_schedule: bool) -> Result<bool> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE campaigns SET status = ");
        qb.push_bind(target)
            .push(", updated_at = ")
            .push_bind(now_ts());
        if clear_schedule {
            qb.push(", scheduled_at = NULL");
        }
        qb.push(" WHERE id = ").push_bind(id).push(" AND status IN ");
        push_status_list(&mut qb, &CampaignStatus::predecessors(target));

        let result = qb
            .build()
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("Failed to move campaign {id} to {target}"))?;
        Ok(result.rows_affected() == 1)
    }

    /// Campañas programadas cuya fecha ya pasó.
    pub async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM campaigns
            WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1
            ORDER BY scheduled_at
            "#,
        )
        .bind(format_ts(now))
        .fetch_all(&self.db_pool)
        .await
        .context("Failed to list due scheduled campaigns")?;
        Ok(ids)
    }

    /// Recalcula todos los contadores desde campaign_recipients en una sola
    /// sentencia, así dos recálculos concurrentes nunca dejan valores mezclados.
    pub async fn recompute_counters(&self, id: i64) -> Result<CampaignCounters> {
        let mut conn = self.db_pool.acquire().await?;
        Self::recompute_counters_in(&mut *conn, id).await
    }

    /// Igual que `recompute_counters`, dentro de una conexión o transacción abierta.
    pub async fn recompute_counters_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<CampaignCounters> {
        use RecipientStatus::*;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            UPDATE campaigns SET
                recipient_count = (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = campaigns.id),
                sent_count = (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = campaigns.id AND r.sent_at IS NOT NULL),
                delivered_count = (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = campaigns.id AND r.delivered_at IS NOT NULL),
            "#,
        );
        let by_status: [(&str, &[RecipientStatus]); 4] = [
            ("opened_count", &[Opened, Clicked]),
            ("clicked_count", &[Clicked]),
            ("unsubscribed_count", &[Unsubscribed]),
            ("bounced_count", &[Failed]),
        ];
        for (i, (column, statuses)) in by_status.iter().enumerate() {
            if i > 0 {
                qb.push(",");
            }
            qb.push(format!(
                " {column} = (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = campaigns.id AND r.status IN "
            ));
            push_status_list(&mut qb, statuses);
            qb.push(")");
        }
        qb.push(" WHERE id = ").push_bind(id);

        qb.build()
            .execute(&mut *conn)
            .await
            .context("Failed to recompute campaign counters")?;

        let counters = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
            r#"
            SELECT recipient_count, sent_count, delivered_count, opened_count,
                   clicked_count, unsubscribed_count, bounced_count
            FROM campaigns WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to read campaign counters")?
        .map(|(rc, sc, dc, oc, cc, uc, bc)| CampaignCounters {
            recipient_count: rc,
            sent_count: sc,
            delivered_count: dc,
            opened_count: oc,
            clicked_count: cc,
            unsubscribed_count: uc,
            bounced_count: bc,
        })
        .unwrap_or_default();

        Ok(counters)
    }

    pub async fn status_breakdown(&self, id: i64) -> Result<Vec<StatusBreakdown>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM campaign_recipients
            WHERE campaign_id = ?1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await
        .context("Failed to load recipient breakdown")?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusBreakdown { status, count })
            .collect())
    }
}
