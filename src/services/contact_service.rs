//! services/contact_service.rs
//! Almacén de contactos visto desde el motor: el predicado de elegibilidad
//! (`active` + `subscribed` + filtro del selector) y la baja de suscripción.

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::models::{
    contact_model::{ContactStatus, SubscriptionStatus},
    now_ts,
    recipient_model::RecipientCriteria,
};

/// Máximo de ids enlazados por sentencia; SQLite limita las variables por consulta.
pub const MAX_IDS_PER_QUERY: usize = 500;

/// Filtro de elegibilidad ya partido a la medida de una sentencia.
#[derive(Debug, Clone, Copy)]
pub enum EligibilityFilter<'a> {
    Ids(&'a [i64]),
    Criteria(&'a RecipientCriteria),
}

/// Agrega las condiciones de elegibilidad sobre la tabla `contacts` con alias
/// `alias`. Con `Ids` enlaza tantas variables como ids reciba; el llamador
/// parte la lista con `MAX_IDS_PER_QUERY`.
pub fn push_eligibility(qb: &mut QueryBuilder<'_, Sqlite>, alias: &str, filter: EligibilityFilter<'_>) {
    qb.push(format!(" {alias}.status = "))
        .push_bind(ContactStatus::Active)
        .push(format!(" AND {alias}.subscription_status = "))
        .push_bind(SubscriptionStatus::Subscribed);

    match filter {
        EligibilityFilter::Ids(ids) => {
            qb.push(format!(" AND {alias}.id IN ("));
            let mut list = qb.separated(", ");
            for id in ids {
                list.push_bind(*id);
            }
            list.push_unseparated(")");
        }
        EligibilityFilter::Criteria(criteria) => {
            if let Some(contact_type) = &criteria.contact_type {
                qb.push(format!(" AND {alias}.contact_type = "))
                    .push_bind(contact_type.clone());
            }
            if let Some(tags) = criteria.tags.as_ref().filter(|t| !t.is_empty()) {
                qb.push(format!(
                    " AND EXISTS (SELECT 1 FROM json_each({alias}.tags) WHERE json_each.value IN ("
                ));
                let mut list = qb.separated(", ");
                for tag in tags {
                    list.push_bind(tag.clone());
                }
                list.push_unseparated("))");
            }
        }
    }
}

/// Cambia la suscripción del contacto dentro de la conexión o transacción dada.
pub async fn set_subscription(
    conn: &mut SqliteConnection,
    contact_id: i64,
    status: SubscriptionStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE contacts SET subscription_status = ?1, updated_at = ?2 WHERE id = ?3"#,
    )
    .bind(status)
    .bind(now_ts())
    .bind(contact_id)
    .execute(conn)
    .await
    .context("Failed to update contact subscription")?;

    Ok(result.rows_affected() == 1)
}
