use askama::Template;
use reqwest::Client;
use serde::Serialize;

use crate::{config::Config, error::AppResult, filters};

/// Transactional email client. The provider takes a flat JSON body over
/// HTTPS with a server token header; delivery internals stay on its side.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    api_url: String,
    token: String,
    from: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

/// Per-recipient outcome reported back to API callers after best-effort
/// notification sends.
#[derive(Debug, Serialize)]
pub struct EmailReport {
    pub to: String,
    pub sent: bool,
}

impl Mailer {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            api_url: config.email_api_url.clone(),
            token: config.email_api_token.clone(),
            from: config.email_from.clone(),
        }
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> AppResult<()> {
        let response = self
            .client
            .post(&self.api_url)
            .header("X-Server-Token", &self.token)
            .json(&OutboundEmail {
                from: &self.from,
                to,
                subject,
                html_body,
                text_body,
            })
            .send()
            .await?;

        response.error_for_status()?;
        log::info!("sent \"{}\" to {}", subject, to);
        Ok(())
    }

    /// Best-effort send for notifications that must never fail the primary
    /// operation. The outcome lands in the response metadata instead.
    pub async fn send_best_effort(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> EmailReport {
        let sent = match self.send(to, subject, html_body, text_body).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("email \"{}\" to {} failed: {}", subject, to, err);
                false
            }
        };

        EmailReport {
            to: to.to_string(),
            sent,
        }
    }
}

#[derive(Template)]
#[template(path = "email/quote_ready.html")]
pub struct QuoteReadyEmail {
    pub company_name: String,
    pub brand_color: String,
    pub quote_number: String,
    pub customer_name: String,
    pub total_cents: i64,
    pub currency: String,
    pub view_url: String,
}

impl QuoteReadyEmail {
    pub fn subject(&self) -> String {
        format!("{} sent you quote {}", self.company_name, self.quote_number)
    }

    pub fn text_body(&self) -> String {
        format!(
            "Hi {},\n\n{} has prepared quote {} for you ({} {}).\n\nView and sign it here: {}\n",
            self.customer_name,
            self.company_name,
            self.quote_number,
            self.currency,
            filters::money(&self.total_cents).unwrap_or_default(),
            self.view_url,
        )
    }
}

#[derive(Template)]
#[template(path = "email/quote_signed_customer.html")]
pub struct QuoteSignedCustomerEmail {
    pub company_name: String,
    pub brand_color: String,
    pub quote_number: String,
    pub signer_name: String,
    pub total_cents: i64,
    pub currency: String,
    pub accepted_at: String,
    pub view_url: String,
}

impl QuoteSignedCustomerEmail {
    pub fn subject(&self) -> String {
        format!("You accepted quote {} from {}", self.quote_number, self.company_name)
    }

    pub fn text_body(&self) -> String {
        format!(
            "Thanks {},\n\nYou accepted quote {} from {} on {} ({} {}).\n\nYour copy: {}\n",
            self.signer_name,
            self.quote_number,
            self.company_name,
            self.accepted_at,
            self.currency,
            filters::money(&self.total_cents).unwrap_or_default(),
            self.view_url,
        )
    }
}

#[derive(Template)]
#[template(path = "email/quote_signed_admin.html")]
pub struct QuoteSignedAdminEmail {
    pub company_name: String,
    pub quote_number: String,
    pub customer_name: String,
    pub signer_name: String,
    pub total_cents: i64,
    pub currency: String,
    pub accepted_at: String,
}

impl QuoteSignedAdminEmail {
    pub fn subject(&self) -> String {
        format!("Quote {} was accepted", self.quote_number)
    }

    pub fn text_body(&self) -> String {
        format!(
            "Quote {} for {} was accepted by {} on {} ({} {}).\n",
            self.quote_number,
            self.customer_name,
            self.signer_name,
            self.accepted_at,
            self.currency,
            filters::money(&self.total_cents).unwrap_or_default(),
        )
    }
}

#[derive(Template)]
#[template(path = "email/team_invite.html")]
pub struct TeamInviteEmail {
    pub company_name: String,
    pub inviter_email: String,
    pub role: String,
    pub sign_in_url: String,
}

impl TeamInviteEmail {
    pub fn subject(&self) -> String {
        format!("You've been invited to {}", self.company_name)
    }

    pub fn text_body(&self) -> String {
        format!(
            "{} invited you to join {} as {}.\n\nSign in to get started: {}\n",
            self.inviter_email, self.company_name, self.role, self.sign_in_url,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ready_email_renders_branding_and_link() {
        let email = QuoteReadyEmail {
            company_name: "Acme Fencing".into(),
            brand_color: "#1f7a4d".into(),
            quote_number: "Q-42".into(),
            customer_name: "Pat Doe".into(),
            total_cents: 3890,
            currency: "USD".into(),
            view_url: "https://quotes.example.com/quote?id=abc".into(),
        };

        let html = email.render().unwrap();
        assert!(html.contains("Acme Fencing"));
        assert!(html.contains("#1f7a4d"));
        assert!(html.contains("38.90"));
        assert!(html.contains("https://quotes.example.com/quote?id=abc"));

        assert_eq!(email.subject(), "Acme Fencing sent you quote Q-42");
        assert!(email.text_body().contains("38.90"));
    }

    #[test]
    fn signed_admin_email_names_the_signer() {
        let email = QuoteSignedAdminEmail {
            company_name: "Acme Fencing".into(),
            quote_number: "Q-42".into(),
            customer_name: "Pat Doe".into(),
            signer_name: "Pat Doe".into(),
            total_cents: 3890,
            currency: "USD".into(),
            accepted_at: "March 1, 2026 at 02:15 PM".into(),
        };

        let html = email.render().unwrap();
        assert!(html.contains("Pat Doe"));
        assert!(html.contains("Q-42"));
    }
}
