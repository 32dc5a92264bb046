//! tests/status_tests.rs
//! Tablas de transición de campañas y destinatarios.

use crate::models::{campaign_model::CampaignStatus, recipient_model::RecipientStatus};

#[test]
fn recipient_statuses_never_regress() {
    use RecipientStatus::*;

    assert!(Pending.can_transition_to(Sent));
    assert!(Sent.can_transition_to(Opened));
    assert!(Delivered.can_transition_to(Clicked));
    assert!(Opened.can_transition_to(Clicked));

    assert!(!Opened.can_transition_to(Sent));
    assert!(!Clicked.can_transition_to(Opened));
    assert!(!Delivered.can_transition_to(Sent));
    assert!(!Opened.can_transition_to(Failed));
    assert!(!Pending.can_transition_to(Opened));
}

#[test]
fn failed_and_unsubscribed_are_terminal() {
    for terminal in [RecipientStatus::Failed, RecipientStatus::Unsubscribed] {
        assert!(terminal.is_terminal());
        for next in RecipientStatus::ALL {
            assert!(
                !terminal.can_transition_to(next),
                "{terminal} -> {next} must be rejected"
            );
        }
    }
}

#[test]
fn every_live_status_can_unsubscribe() {
    let sources = RecipientStatus::predecessors(RecipientStatus::Unsubscribed);
    assert_eq!(
        sources,
        vec![
            RecipientStatus::Pending,
            RecipientStatus::Sent,
            RecipientStatus::Delivered,
            RecipientStatus::Opened,
            RecipientStatus::Clicked,
        ]
    );
}

#[test]
fn open_only_advances_from_sent_or_delivered() {
    assert_eq!(
        RecipientStatus::predecessors(RecipientStatus::Opened),
        vec![RecipientStatus::Sent, RecipientStatus::Delivered]
    );
}

#[test]
fn sent_campaigns_are_terminal() {
    for next in CampaignStatus::ALL {
        assert!(!CampaignStatus::Sent.can_transition_to(next));
    }
    assert_eq!(
        CampaignStatus::predecessors(CampaignStatus::Canceled),
        vec![CampaignStatus::Scheduled]
    );
    assert_eq!(
        CampaignStatus::predecessors(CampaignStatus::Sent),
        vec![
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Canceled
        ]
    );
}
