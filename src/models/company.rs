use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub brand_color: Option<String>,
    pub logo_path: Option<String>,
    pub payment_terms: Option<String>,
    pub tax_name: Option<String>,
    pub tax_rate: f64,
    pub billing_email: Option<String>,
    pub plan: String,
    #[serde(skip_serializing)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_BRAND_COLOR: &str = "#2563eb";

impl Company {
    pub fn brand_color(&self) -> &str {
        self.brand_color.as_deref().unwrap_or(DEFAULT_BRAND_COLOR)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub brand_color: Option<String>,
    pub logo_path: Option<String>,
    pub payment_terms: Option<String>,
    pub tax_name: Option<String>,
    pub tax_rate: Option<f64>,
    pub billing_email: Option<String>,
}

/// Role a user holds inside a company. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Sales,
}

impl MemberRole {
    /// Folds a stored role string to the typed role. Unrecognized values
    /// fall back to the least-privileged role.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => MemberRole::Owner,
            "admin" => MemberRole::Admin,
            _ => MemberRole::Sales,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Sales => "sales",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub company_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn role(&self) -> MemberRole {
        MemberRole::normalize(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_normalization_folds_case_and_unknowns() {
        assert_eq!(MemberRole::normalize("Owner"), MemberRole::Owner);
        assert_eq!(MemberRole::normalize(" ADMIN "), MemberRole::Admin);
        assert_eq!(MemberRole::normalize("sales"), MemberRole::Sales);
        assert_eq!(MemberRole::normalize("viewer"), MemberRole::Sales);
        assert_eq!(MemberRole::normalize(""), MemberRole::Sales);
    }
}
