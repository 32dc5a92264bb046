//! services/personalization_service.rs
//! Sustitución de variables `{token}` en asunto, HTML y texto.
//!
//! Los valores se insertan tal cual, sin escapar HTML, en una sola pasada: un
//! valor que contenga `{email}` u otro token no se vuelve a expandir. Los tokens
//! desconocidos se dejan intactos para que una plantilla con errores no bloquee
//! el envío.

use chrono::NaiveDate;

use crate::models::{
    email_model::{EmailTemplate, PersonalizedContent},
    recipient_model::PendingRecipient,
};

/// Saludo cuando el contacto no tiene nombre.
pub const FALLBACK_FIRST_NAME: &str = "Cher contact";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariables {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub company: String,
    pub date: String,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TemplateVariables {
    pub fn for_recipient(recipient: &PendingRecipient, today: NaiveDate) -> Self {
        let first = non_blank(&recipient.first_name);
        let last = non_blank(&recipient.last_name);

        let full_name = match (first, last) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => FALLBACK_FIRST_NAME.to_string(),
        };

        TemplateVariables {
            first_name: first.unwrap_or(FALLBACK_FIRST_NAME).to_string(),
            last_name: last.unwrap_or_default().to_string(),
            full_name,
            email: recipient.email.clone(),
            company: non_blank(&recipient.company).unwrap_or_default().to_string(),
            date: today.format("%d/%m/%Y").to_string(),
        }
    }

    fn pairs(&self) -> [(&'static str, &str); 6] {
        [
            ("{first_name}", self.first_name.as_str()),
            ("{last_name}", self.last_name.as_str()),
            ("{full_name}", self.full_name.as_str()),
            ("{email}", self.email.as_str()),
            ("{company}", self.company.as_str()),
            ("{date}", self.date.as_str()),
        ]
    }
}

fn substitute(input: &str, vars: &TemplateVariables) -> String {
    let pairs = vars.pairs();
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match pairs.iter().find(|(token, _)| candidate.starts_with(token)) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn personalize(template: &EmailTemplate, vars: &TemplateVariables) -> PersonalizedContent {
    PersonalizedContent {
        subject: substitute(&template.subject, vars),
        html: substitute(&template.html, vars),
        text: template
            .text
            .as_deref()
            .map(|t| substitute(t, vars))
            .unwrap_or_default(),
    }
}
