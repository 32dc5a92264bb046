//! tests/resolver_tests.rs
//! Alta de destinatarios: elegibilidad, idempotencia y bloqueo post-envío.

use crate::error::CampaignError;
use crate::models::recipient_model::{AddRecipientsRequest, RecipientCriteria, RecipientSelector};
use crate::tests::support::{Harness, NewContact};

#[actix_rt::test]
async fn only_active_subscribed_contacts_are_added() {
    let h = Harness::new().await;
    let ok = h.simple_contact("ok@example.com").await;
    let unsubscribed = h
        .contact(NewContact {
            email: "gone@example.com",
            subscription_status: Some("unsubscribed"),
            ..Default::default()
        })
        .await;
    let inactive = h
        .contact(NewContact {
            email: "idle@example.com",
            status: Some("inactive"),
            ..Default::default()
        })
        .await;
    let campaign = h.campaign("Spring", None).await;

    let added = h
        .recipients
        .resolve(
            campaign,
            &RecipientSelector::Contacts(vec![ok, unsubscribed, inactive]),
        )
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(h.recipients.count_for_campaign(campaign).await.unwrap(), 1);
    assert!(h.recipients.get_recipient(campaign, unsubscribed).await.unwrap().is_none());
}

#[actix_rt::test]
async fn overlapping_resolves_do_not_duplicate() {
    let h = Harness::new().await;
    let a = h.simple_contact("a@example.com").await;
    let b = h.simple_contact("b@example.com").await;
    let c = h.simple_contact("c@example.com").await;
    let campaign = h.campaign("Overlap", None).await;

    let first = h
        .recipients
        .resolve(campaign, &RecipientSelector::Contacts(vec![a, b]))
        .await
        .unwrap();
    let second = h
        .recipients
        .resolve(campaign, &RecipientSelector::Contacts(vec![b, c]))
        .await
        .unwrap();
    let again = h
        .recipients
        .resolve(campaign, &RecipientSelector::Contacts(vec![a, b, c]))
        .await
        .unwrap();

    assert_eq!((first, second, again), (2, 1, 0));
    let stored = h.campaigns.get_campaign(campaign).await.unwrap().unwrap();
    assert_eq!(stored.counters.recipient_count, 3);
}

#[actix_rt::test]
async fn criteria_filters_by_type_and_tag() {
    let h = Harness::new().await;
    let member = h
        .contact(NewContact {
            email: "member@example.com",
            contact_type: Some("member"),
            tags: &["golf", "vip"],
            ..Default::default()
        })
        .await;
    h.contact(NewContact {
        email: "other-member@example.com",
        contact_type: Some("member"),
        tags: &["tennis"],
        ..Default::default()
    })
    .await;
    h.contact(NewContact {
        email: "visitor@example.com",
        tags: &["golf"],
        ..Default::default()
    })
    .await;
    let campaign = h.campaign("Members", None).await;

    let selector = RecipientSelector::Criteria(RecipientCriteria {
        contact_type: Some("member".to_string()),
        tags: Some(vec!["golf".to_string()]),
    });
    let added = h.recipients.resolve(campaign, &selector).await.unwrap();

    assert_eq!(added, 1);
    assert!(h.recipients.get_recipient(campaign, member).await.unwrap().is_some());
}

#[actix_rt::test]
async fn sent_campaign_rejects_new_recipients() {
    let h = Harness::new().await;
    let a = h.simple_contact("a@example.com").await;
    let b = h.simple_contact("b@example.com").await;
    let campaign = h.campaign("Locked", None).await;
    h.recipients
        .resolve(campaign, &RecipientSelector::Contacts(vec![a]))
        .await
        .unwrap();
    h.dispatcher.dispatch(campaign).await.unwrap();

    let err = h
        .recipients
        .resolve(campaign, &RecipientSelector::Contacts(vec![b]))
        .await
        .unwrap_err();

    assert!(matches!(err, CampaignError::CampaignLocked(id) if id == campaign));
    assert_eq!(h.recipients.count_for_campaign(campaign).await.unwrap(), 1);
}

#[actix_rt::test]
async fn unknown_campaign_is_not_found() {
    let h = Harness::new().await;
    let a = h.simple_contact("a@example.com").await;

    let err = h
        .recipients
        .resolve(999, &RecipientSelector::Contacts(vec![a]))
        .await
        .unwrap_err();

    assert!(matches!(err, CampaignError::NotFound(999)));
}

/// Más contactos que variables admite una sentencia SQLite (32766).
const BULK_CONTACTS: i64 = 33_000;

async fn bulk_contacts(h: &Harness) -> Vec<i64> {
    sqlx::query(
        r#"
        WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
        INSERT INTO contacts (email, created_at, updated_at)
        SELECT 'bulk' || n || '@example.com', ?2, ?2 FROM seq
        "#,
    )
    .bind(BULK_CONTACTS)
    .bind(crate::models::now_ts())
    .execute(&h.db_pool)
    .await
    .unwrap();

    sqlx::query_scalar::<_, i64>("SELECT id FROM contacts ORDER BY id")
        .fetch_all(&h.db_pool)
        .await
        .unwrap()
}

#[actix_rt::test]
async fn criteria_resolve_scales_past_the_sqlite_variable_limit() {
    let h = Harness::new().await;
    bulk_contacts(&h).await;
    let campaign = h.campaign("Everyone", None).await;

    let selector = RecipientSelector::Criteria(RecipientCriteria::default());
    let added = h.recipients.resolve(campaign, &selector).await.unwrap();
    assert_eq!(added, BULK_CONTACTS as u64);

    let again = h.recipients.resolve(campaign, &selector).await.unwrap();
    assert_eq!(again, 0);
    let stored = h.campaigns.get_campaign(campaign).await.unwrap().unwrap();
    assert_eq!(stored.counters.recipient_count, BULK_CONTACTS);
}

#[actix_rt::test]
async fn long_id_lists_are_resolved_in_chunks() {
    let h = Harness::new().await;
    let mut ids = bulk_contacts(&h).await;
    let gone = h
        .contact(NewContact {
            email: "gone@example.com",
            subscription_status: Some("unsubscribed"),
            ..Default::default()
        })
        .await;
    ids.push(gone);
    // Un id repetido entre tramos no duplica filas.
    ids.push(ids[0]);
    let campaign = h.campaign("Explicit", None).await;

    let added = h
        .recipients
        .resolve(campaign, &RecipientSelector::Contacts(ids))
        .await
        .unwrap();

    assert_eq!(added, BULK_CONTACTS as u64);
    assert_eq!(
        h.recipients.count_for_campaign(campaign).await.unwrap(),
        BULK_CONTACTS
    );
    assert!(h.recipients.get_recipient(campaign, gone).await.unwrap().is_none());
}

#[test]
fn selector_requires_ids_or_criteria() {
    let empty = RecipientSelector::try_from(AddRecipientsRequest::default());
    assert!(matches!(empty, Err(CampaignError::InvalidSelector)));

    let no_ids = RecipientSelector::try_from(AddRecipientsRequest {
        criteria: None,
        contact_ids: Some(vec![]),
    });
    assert!(matches!(no_ids, Err(CampaignError::InvalidSelector)));

    let ids = RecipientSelector::try_from(AddRecipientsRequest {
        criteria: Some(RecipientCriteria::default()),
        contact_ids: Some(vec![1, 2]),
    })
    .unwrap();
    assert_eq!(ids, RecipientSelector::Contacts(vec![1, 2]));
}
