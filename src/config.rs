use std::env;

use chrono::{FixedOffset, NaiveDate, Utc};

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Base URL of the customer-facing site, used to build quote view links.
    pub public_base_url: String,
    pub email_api_url: String,
    pub email_api_token: String,
    pub email_from: String,
    /// Address alerted when a customer signs a quote.
    pub admin_notify_email: String,
    /// Public base URL of the object-storage bucket holding company logos.
    pub storage_base_url: String,
    /// Hosted auth provider's admin API, used for team invites.
    pub auth_admin_url: String,
    pub auth_admin_key: String,
    /// Minutes east of UTC used when stamping quote dates.
    pub utc_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .expect("PUBLIC_BASE_URL must be set")
                .trim_end_matches('/')
                .to_string(),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.postmarkapp.com/email".to_string()),
            email_api_token: env::var("EMAIL_API_TOKEN").expect("EMAIL_API_TOKEN must be set"),
            email_from: env::var("EMAIL_FROM").expect("EMAIL_FROM must be set"),
            admin_notify_email: env::var("ADMIN_NOTIFY_EMAIL")
                .expect("ADMIN_NOTIFY_EMAIL must be set"),
            storage_base_url: env::var("STORAGE_BASE_URL")
                .expect("STORAGE_BASE_URL must be set")
                .trim_end_matches('/')
                .to_string(),
            auth_admin_url: env::var("AUTH_ADMIN_URL")
                .expect("AUTH_ADMIN_URL must be set")
                .trim_end_matches('/')
                .to_string(),
            auth_admin_key: env::var("AUTH_ADMIN_KEY").expect("AUTH_ADMIN_KEY must be set"),
            utc_offset_minutes: env::var("DEFAULT_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Today's date in the tenant-facing timezone. Quote and expiry dates are
    /// stamped with this rather than raw UTC.
    pub fn local_today(&self) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Utc::now().with_timezone(&offset).date_naive()
    }

    pub fn quote_view_url(&self, quote_id: uuid::Uuid) -> String {
        format!("{}/quote?id={}", self.public_base_url, quote_id)
    }
}
