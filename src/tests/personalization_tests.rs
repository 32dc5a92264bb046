//! tests/personalization_tests.rs

use chrono::NaiveDate;

use crate::models::{email_model::EmailTemplate, recipient_model::PendingRecipient};
use crate::services::personalization_service::{
    personalize, TemplateVariables, FALLBACK_FIRST_NAME,
};

fn recipient(first: Option<&str>, last: Option<&str>, company: Option<&str>) -> PendingRecipient {
    PendingRecipient {
        contact_id: 7,
        email: "marie@example.com".to_string(),
        first_name: first.map(str::to_string),
        last_name: last.map(str::to_string),
        company: company.map(str::to_string),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

#[test]
fn replaces_every_known_token_in_all_parts() {
    let template = EmailTemplate {
        subject: "{first_name}, votre invitation".to_string(),
        html: "<p>{full_name} ({company}) - {email} - {date}</p>".to_string(),
        text: Some("{last_name} {first_name}".to_string()),
    };
    let vars = TemplateVariables::for_recipient(
        &recipient(Some("Marie"), Some("Curie"), Some("Radium SA")),
        today(),
    );

    let content = personalize(&template, &vars);

    assert_eq!(content.subject, "Marie, votre invitation");
    assert_eq!(
        content.html,
        "<p>Marie Curie (Radium SA) - marie@example.com - 07/03/2025</p>"
    );
    assert_eq!(content.text, "Curie Marie");
}

#[test]
fn missing_first_name_uses_salutation() {
    let vars = TemplateVariables::for_recipient(&recipient(None, None, None), today());
    assert_eq!(vars.first_name, FALLBACK_FIRST_NAME);
    assert_eq!(vars.full_name, FALLBACK_FIRST_NAME);

    let blank = TemplateVariables::for_recipient(&recipient(Some("   "), Some("Curie"), None), today());
    assert_eq!(blank.first_name, FALLBACK_FIRST_NAME);
    assert_eq!(blank.full_name, "Curie");
}

#[test]
fn unknown_tokens_stay_verbatim() {
    let template = EmailTemplate {
        subject: "Hello {nickname}".to_string(),
        html: "<p>{first_name} {unknown} {first_name}</p>".to_string(),
        text: None,
    };
    let vars = TemplateVariables::for_recipient(&recipient(Some("Marie"), None, None), today());

    let content = personalize(&template, &vars);

    assert_eq!(content.subject, "Hello {nickname}");
    assert_eq!(content.html, "<p>Marie {unknown} Marie</p>");
    assert_eq!(content.text, "");
}

#[test]
fn values_are_inserted_without_escaping() {
    let template = EmailTemplate {
        subject: "s".to_string(),
        html: "<b>{company}</b>".to_string(),
        text: None,
    };
    let vars = TemplateVariables::for_recipient(
        &recipient(Some("Marie"), None, Some("<i>ACME</i> & Co")),
        today(),
    );

    assert_eq!(personalize(&template, &vars).html, "<b><i>ACME</i> & Co</b>");
}

#[test]
fn token_like_values_are_not_expanded_again() {
    let template = EmailTemplate {
        subject: "Hola {first_name}".to_string(),
        html: "<p>{company} / {first_name}</p>".to_string(),
        text: Some("{first_name} {email".to_string()),
    };
    let vars = TemplateVariables::for_recipient(
        &recipient(Some("{email}"), None, Some("{date}{first_name}")),
        today(),
    );

    let content = personalize(&template, &vars);

    assert_eq!(content.subject, "Hola {email}");
    assert_eq!(content.html, "<p>{date}{first_name} / {email}</p>");
    assert_eq!(content.text, "{email} {email");
}
