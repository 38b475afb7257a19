use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reusable catalog entry. Quotes copy the price into their own snapshot at
/// creation time, so editing a product never changes an issued quote.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_type: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub show_breakdown: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub unit_type: Option<String>,
    pub unit_price_cents: i64,
    pub currency: Option<String>,
    pub show_breakdown: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_type: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub currency: Option<String>,
    pub show_breakdown: Option<bool>,
}
