use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Company;

/// Canonical quote status. Rows store free-form text; every business
/// decision goes through `normalize` so legacy aliases and casing never
/// leak into comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Cancelled,
}

impl QuoteStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => QuoteStatus::Sent,
            "viewed" => QuoteStatus::Viewed,
            "accepted" | "signed" => QuoteStatus::Accepted,
            "cancelled" | "canceled" => QuoteStatus::Cancelled,
            _ => QuoteStatus::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Viewed => "viewed",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    /// An accepted quote is final and a cancelled quote stays cancelled.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, QuoteStatus::Accepted | QuoteStatus::Cancelled)
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, QuoteStatus::Cancelled)
    }
}

/// Accepts a JSON number or a numeric string, folding anything malformed to
/// zero. Quote snapshots come from in-progress editor state, so a half-typed
/// quantity must never fail the whole document.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

fn lenient_cents<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_cents(&value))
}

fn coerce_f64(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn coerce_cents(value: &serde_json::Value) -> i64 {
    coerce_f64(value).round() as i64
}

/// Optional variants for patch payloads: absent/null stays `None`, anything
/// present is coerced with the same permissive policy as the snapshot.
pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(coerce_f64(&value)))
}

pub fn lenient_opt_cents<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(coerce_cents(&value)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub qty: f64,
    #[serde(default, deserialize_with = "lenient_cents")]
    pub unit_price_cents: i64,
    #[serde(default)]
    pub taxable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepositMode {
    #[default]
    Auto,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DepositSettings {
    #[serde(default)]
    pub mode: DepositMode,
    #[serde(default, deserialize_with = "lenient_cents")]
    pub amount_cents: i64,
}

/// Company letterhead captured into the quote when it is created. Later
/// settings changes must not retroactively alter issued quotes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompanySnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub brand_color: Option<String>,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub tax_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillTo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Lineage stamp pointing at the root of a version chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteOrigin {
    pub quote_id: Uuid,
    pub quote_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acceptance {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub signature_data_url: Option<String>,
    #[serde(default)]
    pub signature_text: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

pub enum AcceptOutcome {
    Applied(DateTime<Utc>),
    AlreadyAccepted(DateTime<Utc>),
}

/// Structured quote snapshot stored in the row's JSONB column. All fields
/// default so rows written by older builds still deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuoteData {
    #[serde(default)]
    pub company: CompanySnapshot,
    #[serde(default)]
    pub quote_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub prepared_by: Option<String>,
    #[serde(default)]
    pub bill_to: BillTo,
    #[serde(default)]
    pub project_location: Option<String>,
    #[serde(default)]
    pub scope_of_work: Option<String>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tax_rate: f64,
    #[serde(default, deserialize_with = "lenient_cents")]
    pub fees_cents: i64,
    #[serde(default)]
    pub deposit: DepositSettings,
    #[serde(default)]
    pub origin: Option<QuoteOrigin>,
    #[serde(default)]
    pub share_token: Option<Uuid>,
    #[serde(default)]
    pub acceptance: Option<Acceptance>,
}

impl QuoteData {
    /// Fresh snapshot seeded from the company's current letterhead and tax
    /// settings.
    pub fn from_company(company: &Company, quote_date: NaiveDate) -> Self {
        let address = [
            company.address_line1.as_deref(),
            company.address_line2.as_deref(),
            company.city.as_deref(),
            company.state.as_deref(),
            company.postal_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        Self {
            company: CompanySnapshot {
                name: company.name.clone(),
                email: company.email.clone(),
                phone: company.phone.clone(),
                address: if address.is_empty() {
                    None
                } else {
                    Some(address)
                },
                brand_color: company.brand_color.clone(),
                logo_path: company.logo_path.clone(),
                payment_terms: company.payment_terms.clone(),
                tax_name: company.tax_name.clone(),
            },
            quote_date: Some(quote_date),
            expiry_date: Some(quote_date + Duration::days(30)),
            tax_rate: company.tax_rate,
            ..Default::default()
        }
    }

    /// Deep copy for a "new version". Acceptance and the public share token
    /// are omitted rather than scrubbed key-by-key, and the lineage stamp is
    /// carried forward so a copy of a copy still points at the root.
    pub fn versioned_copy(
        &self,
        source_id: Uuid,
        source_number: &str,
        quote_date: NaiveDate,
    ) -> Self {
        let origin = self.origin.clone().unwrap_or(QuoteOrigin {
            quote_id: source_id,
            quote_number: source_number.to_string(),
        });

        Self {
            quote_date: Some(quote_date),
            expiry_date: Some(quote_date + Duration::days(30)),
            origin: Some(origin),
            share_token: None,
            acceptance: None,
            ..self.clone()
        }
    }

    /// Records an acceptance, or reports the original one. Once signed, a
    /// quote never changes its acceptance block again.
    pub fn apply_acceptance(&mut self, acceptance: Acceptance) -> AcceptOutcome {
        match &self.acceptance {
            Some(existing) => AcceptOutcome::AlreadyAccepted(existing.accepted_at),
            None => {
                let accepted_at = acceptance.accepted_at;
                self.acceptance = Some(acceptance);
                AcceptOutcome::Applied(accepted_at)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub company_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub number: i64,
    pub version_of: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub status: String,
    pub total_cents: i64,
    pub currency: String,
    pub data: sqlx::types::Json<QuoteData>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn status(&self) -> QuoteStatus {
        QuoteStatus::normalize(&self.status)
    }

    pub fn display_number(&self) -> String {
        format!("Q-{}", self.number)
    }

    /// Root of this quote's version chain: its own back-reference when it is
    /// itself a copy, else the quote itself.
    pub fn lineage_root(&self) -> Uuid {
        self.version_of.unwrap_or(self.id)
    }
}

/// List/summary shape returned by the quote and customer-history endpoints.
#[derive(Debug, Serialize)]
pub struct QuoteSummary {
    pub id: Uuid,
    pub number: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub total_cents: i64,
    pub currency: String,
    pub version_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Quote> for QuoteSummary {
    fn from(quote: Quote) -> Self {
        Self {
            number: quote.display_number(),
            status: quote.status().as_str().to_string(),
            id: quote.id,
            customer_name: quote.customer_name,
            customer_email: quote.customer_email,
            total_cents: quote.total_cents,
            currency: quote.currency,
            version_of: quote.version_of,
            created_at: quote.created_at,
            cancelled_at: quote.cancelled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> QuoteData {
        QuoteData {
            items: vec![LineItem {
                description: "Install".into(),
                qty: 2.0,
                unit_price_cents: 5000,
                taxable: true,
            }],
            tax_rate: 13.0,
            ..Default::default()
        }
    }

    #[test]
    fn status_normalization_folds_aliases() {
        assert_eq!(QuoteStatus::normalize("Draft"), QuoteStatus::Draft);
        assert_eq!(QuoteStatus::normalize("SENT"), QuoteStatus::Sent);
        assert_eq!(QuoteStatus::normalize("signed"), QuoteStatus::Accepted);
        assert_eq!(QuoteStatus::normalize("Accepted"), QuoteStatus::Accepted);
        assert_eq!(QuoteStatus::normalize("canceled"), QuoteStatus::Cancelled);
        assert_eq!(QuoteStatus::normalize(" cancelled "), QuoteStatus::Cancelled);
        assert_eq!(QuoteStatus::normalize("garbage"), QuoteStatus::Draft);
        assert_eq!(QuoteStatus::normalize(""), QuoteStatus::Draft);
    }

    #[test]
    fn cancel_rules_follow_the_state_machine() {
        assert!(QuoteStatus::Draft.can_cancel());
        assert!(QuoteStatus::Sent.can_cancel());
        assert!(QuoteStatus::Viewed.can_cancel());
        assert!(!QuoteStatus::Accepted.can_cancel());
        assert!(!QuoteStatus::Cancelled.can_cancel());
        assert!(!QuoteStatus::Cancelled.is_editable());
        assert!(QuoteStatus::Accepted.is_editable());
    }

    #[test]
    fn versioned_copy_drops_acceptance_and_share_token() {
        let mut data = sample_data();
        data.share_token = Some(Uuid::new_v4());
        data.acceptance = Some(Acceptance {
            name: "Pat Doe".into(),
            email: None,
            signature_data_url: Some("data:image/png;base64,AAAA".into()),
            signature_text: None,
            accepted_at: Utc::now(),
        });

        let source_id = Uuid::new_v4();
        let copy = data.versioned_copy(source_id, "Q-7", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        assert!(copy.acceptance.is_none());
        assert!(copy.share_token.is_none());
        assert_eq!(copy.items.len(), 1);
        assert_eq!(copy.tax_rate, 13.0);
        let origin = copy.origin.expect("lineage stamped");
        assert_eq!(origin.quote_id, source_id);
        assert_eq!(origin.quote_number, "Q-7");
    }

    #[test]
    fn versioned_copy_flattens_lineage_chains() {
        let root_id = Uuid::new_v4();
        let mut first_copy = sample_data().versioned_copy(
            root_id,
            "Q-1",
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        );
        first_copy.acceptance = Some(Acceptance {
            name: "Sam".into(),
            email: None,
            signature_data_url: None,
            signature_text: Some("Sam".into()),
            accepted_at: Utc::now(),
        });

        // Duplicating the duplicate still points at the root, not the copy.
        let second_copy = first_copy.versioned_copy(
            Uuid::new_v4(),
            "Q-2",
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        );
        let origin = second_copy.origin.expect("lineage stamped");
        assert_eq!(origin.quote_id, root_id);
        assert_eq!(origin.quote_number, "Q-1");
    }

    #[test]
    fn acceptance_is_idempotent() {
        let mut data = sample_data();
        let first = Acceptance {
            name: "Pat Doe".into(),
            email: Some("pat@example.com".into()),
            signature_data_url: Some("data:image/png;base64,AAAA".into()),
            signature_text: None,
            accepted_at: Utc::now(),
        };
        let first_at = first.accepted_at;

        match data.apply_acceptance(first) {
            AcceptOutcome::Applied(at) => assert_eq!(at, first_at),
            AcceptOutcome::AlreadyAccepted(_) => panic!("first acceptance must apply"),
        }

        let second = Acceptance {
            name: "Someone Else".into(),
            email: None,
            signature_data_url: None,
            signature_text: Some("Someone Else".into()),
            accepted_at: first_at + Duration::hours(2),
        };
        match data.apply_acceptance(second) {
            AcceptOutcome::AlreadyAccepted(at) => assert_eq!(at, first_at),
            AcceptOutcome::Applied(_) => panic!("re-acceptance must not overwrite"),
        }

        let stored = data.acceptance.expect("acceptance kept");
        assert_eq!(stored.name, "Pat Doe");
        assert!(stored.signature_data_url.is_some());
    }

    #[test]
    fn lenient_parsing_folds_garbage_to_zero() {
        let item: LineItem = serde_json::from_value(serde_json::json!({
            "description": "Demo",
            "qty": "3.5",
            "unit_price_cents": "1200",
            "taxable": true
        }))
        .unwrap();
        assert_eq!(item.qty, 3.5);
        assert_eq!(item.unit_price_cents, 1200);

        let item: LineItem = serde_json::from_value(serde_json::json!({
            "description": "Half-typed",
            "qty": "2x",
            "unit_price_cents": null,
            "taxable": false
        }))
        .unwrap();
        assert_eq!(item.qty, 0.0);
        assert_eq!(item.unit_price_cents, 0);

        let data: QuoteData = serde_json::from_value(serde_json::json!({
            "tax_rate": "not a number",
            "fees_cents": "250.4"
        }))
        .unwrap();
        assert_eq!(data.tax_rate, 0.0);
        assert_eq!(data.fees_cents, 250);
        assert!(data.items.is_empty());
    }

    #[test]
    fn old_rows_with_unknown_fields_still_deserialize() {
        let data: QuoteData = serde_json::from_value(serde_json::json!({
            "company": {"name": "Acme Fencing"},
            "items": [{"description": "Post", "qty": 4, "unit_price_cents": 2500, "taxable": true}],
            "legacy_field": {"nested": true}
        }))
        .unwrap();
        assert_eq!(data.company.name, "Acme Fencing");
        assert_eq!(data.items.len(), 1);
    }
}
