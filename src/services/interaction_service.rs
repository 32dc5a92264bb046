//! services/interaction_service.rs
//! Log append-only de interacciones (open, click, unsubscribe, bounce).

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::{
    interaction_model::{InteractionEvent, InteractionType, RequestMeta},
    now_ts,
};

#[derive(Clone, Debug)]
pub struct InteractionService {
    db_pool: Pool<Sqlite>,
}

impl InteractionService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        InteractionService { db_pool }
    }

    /// Inserta el evento dentro de la conexión o transacción dada. Para `open`
    /// el índice único parcial lo vuelve "insertar si no existe"; devuelve si
    /// se escribió una fila nueva.
    pub async fn record(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        contact_id: i64,
        kind: InteractionType,
        payload: Option<serde_json::Value>,
        meta: &RequestMeta,
    ) -> Result<bool> {
        let verb = if kind == InteractionType::Open {
            "INSERT OR IGNORE"
        } else {
            "INSERT"
        };
        let sql = format!(
            r#"
            {verb} INTO email_interactions (
                campaign_id, contact_id, interaction_type, payload,
                user_agent, ip_address, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#
        );

        let result = sqlx::query(&sql)
            .bind(campaign_id)
            .bind(contact_id)
            .bind(kind)
            .bind(payload.map(|p| p.to_string()))
            .bind(&meta.user_agent)
            .bind(&meta.ip_address)
            .bind(now_ts())
            .execute(conn)
            .await
            .context("Failed to record email interaction")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_for_recipient(
        &self,
        campaign_id: i64,
        contact_id: i64,
    ) -> Result<Vec<InteractionEvent>> {
        sqlx::query_as::<_, InteractionEvent>(
            r#"
            SELECT id, campaign_id, contact_id, interaction_type, payload,
                   user_agent, ip_address, created_at
            FROM email_interactions
            WHERE campaign_id = ?1 AND contact_id = ?2
            ORDER BY id
            "#,
        )
        .bind(campaign_id)
        .bind(contact_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Failed to list interactions")
    }
}
