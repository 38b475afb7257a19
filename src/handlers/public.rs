use askama::Template;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    email::{EmailReport, QuoteSignedAdminEmail, QuoteSignedCustomerEmail},
    error::{AppError, AppResult},
    models::{
        company::DEFAULT_BRAND_COLOR, AcceptOutcome, Acceptance, Company, DepositSettings,
        LineItem, Quote, QuoteStatus,
    },
    pricing::{self, QuoteTotals},
    AppState,
};

/// Upper bound on an uploaded signature data-URL. Anything larger than this
/// is not a hand-drawn signature.
const MAX_SIGNATURE_LEN: usize = 2 * 1024 * 1024;

const ACCEPTED_AT_FORMAT: &str = "%B %d, %Y at %I:%M %p UTC";

#[derive(Debug, Deserialize)]
pub struct AcceptQuoteRequest {
    pub quote_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub signature_data_url: Option<String>,
    pub signature_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptQuoteResponse {
    pub ok: bool,
    pub accepted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<EmailReport>>,
}

/// Customer-facing signing endpoint. Idempotent at the data layer: a second
/// call reports the original acceptance instead of overwriting it, and the
/// notification emails are best-effort only.
pub async fn accept_quote(
    State(state): State<AppState>,
    Json(payload): Json<AcceptQuoteRequest>,
) -> AppResult<Json<AcceptQuoteResponse>> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::validation("signer name is required"))?;

    if let Some(data_url) = payload.signature_data_url.as_deref() {
        if !data_url.starts_with("data:image/") {
            return Err(AppError::validation("signature must be an image data URL"));
        }
        if data_url.len() > MAX_SIGNATURE_LEN {
            return Err(AppError::validation("signature image is too large"));
        }
    } else if payload
        .signature_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .is_none()
    {
        return Err(AppError::validation("a drawn or typed signature is required"));
    }

    let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1")
        .bind(payload.quote_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("quote"))?;

    if quote.status() == QuoteStatus::Cancelled {
        return Err(AppError::validation("quote has been cancelled"));
    }

    let mut data = quote.data.0.clone();
    let acceptance = Acceptance {
        name: name.to_string(),
        email: payload.email.clone(),
        signature_data_url: payload.signature_data_url.clone(),
        signature_text: payload.signature_text.clone(),
        accepted_at: Utc::now(),
    };

    let accepted_at = match data.apply_acceptance(acceptance) {
        AcceptOutcome::AlreadyAccepted(accepted_at) => {
            return Ok(Json(AcceptQuoteResponse {
                ok: true,
                accepted_at,
                emails: None,
            }))
        }
        AcceptOutcome::Applied(accepted_at) => accepted_at,
    };

    sqlx::query("UPDATE quotes SET status = 'accepted', data = $2 WHERE id = $1")
        .bind(quote.id)
        .bind(sqlx::types::Json(&data))
        .execute(&state.db)
        .await?;

    log::info!("quote {} accepted by {}", quote.id, name);

    let emails = send_acceptance_emails(&state, &quote, name, accepted_at).await;

    Ok(Json(AcceptQuoteResponse {
        ok: true,
        accepted_at,
        emails: Some(emails),
    }))
}

// The acceptance is already persisted at this point; nothing here may fail
// the request.
async fn send_acceptance_emails(
    state: &AppState,
    quote: &Quote,
    signer_name: &str,
    accepted_at: DateTime<Utc>,
) -> Vec<EmailReport> {
    let company = match sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(quote.company_id)
        .fetch_optional(&state.db)
        .await
    {
        Ok(Some(company)) => company,
        Ok(None) | Err(_) => {
            log::warn!("company lookup failed for quote {}, skipping emails", quote.id);
            return Vec::new();
        }
    };

    let accepted_at = accepted_at.format(ACCEPTED_AT_FORMAT).to_string();
    let mut reports = Vec::new();

    if let Some(customer_email) = quote
        .customer_email
        .clone()
        .or_else(|| quote.data.0.bill_to.email.clone())
    {
        let email = QuoteSignedCustomerEmail {
            company_name: company.name.clone(),
            brand_color: company.brand_color().to_string(),
            quote_number: quote.display_number(),
            signer_name: signer_name.to_string(),
            total_cents: quote.total_cents,
            currency: quote.currency.clone(),
            accepted_at: accepted_at.clone(),
            view_url: state.config.quote_view_url(quote.id),
        };
        match email.render() {
            Ok(html) => {
                reports.push(
                    state
                        .mailer
                        .send_best_effort(&customer_email, &email.subject(), &html, &email.text_body())
                        .await,
                );
            }
            Err(err) => log::warn!("customer confirmation render failed: {}", err),
        }
    }

    let alert = QuoteSignedAdminEmail {
        company_name: company.name.clone(),
        quote_number: quote.display_number(),
        customer_name: quote.customer_name.clone(),
        signer_name: signer_name.to_string(),
        total_cents: quote.total_cents,
        currency: quote.currency.clone(),
        accepted_at,
    };
    match alert.render() {
        Ok(html) => {
            reports.push(
                state
                    .mailer
                    .send_best_effort(
                        &state.config.admin_notify_email,
                        &alert.subject(),
                        &html,
                        &alert.text_body(),
                    )
                    .await,
            );
        }
        Err(err) => log::warn!("admin alert render failed: {}", err),
    }

    reports
}

#[derive(Debug, Deserialize)]
pub struct PublicQuoteQuery {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PublicCompany {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub brand_color: String,
    pub payment_terms: Option<String>,
    pub logo_url: String,
}

#[derive(Debug, Serialize)]
pub struct PublicAcceptance {
    pub name: String,
    pub signature_data_url: Option<String>,
    pub signature_text: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

/// Quote payload safe for unauthenticated viewing: no tenant or customer
/// ids, no share token, and the company block comes from the live row so a
/// rebrand shows up on already-sent quotes.
#[derive(Debug, Serialize)]
pub struct PublicQuote {
    pub id: Uuid,
    pub number: String,
    pub status: String,
    pub customer_name: String,
    pub currency: String,
    pub quote_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub prepared_by: Option<String>,
    pub bill_to_name: String,
    pub bill_to_address: Option<String>,
    pub project_location: Option<String>,
    pub scope_of_work: Option<String>,
    pub terms: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub tax_name: Option<String>,
    pub fees_cents: i64,
    pub deposit: DepositSettings,
    pub totals: QuoteTotals,
    pub acceptance: Option<PublicAcceptance>,
    pub company: PublicCompany,
}

pub async fn public_quote(
    State(state): State<AppState>,
    Query(query): Query<PublicQuoteQuery>,
) -> AppResult<Json<PublicQuote>> {
    let quote = sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1")
        .bind(query.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("quote"))?;

    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(quote.company_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("quote"))?;

    // First customer view of a sent quote marks it viewed. Best-effort; the
    // customer still gets their quote if the write races or fails.
    let mut status = quote.status();
    if status == QuoteStatus::Sent {
        match sqlx::query("UPDATE quotes SET status = 'viewed' WHERE id = $1 AND status = $2")
            .bind(quote.id)
            .bind(&quote.status)
            .execute(&state.db)
            .await
        {
            Ok(_) => status = QuoteStatus::Viewed,
            Err(err) => log::warn!("failed to mark quote {} viewed: {}", quote.id, err),
        }
    }

    let data = quote.data.0;
    let totals = pricing::compute_totals(&data.items, data.tax_rate, data.fees_cents, &data.deposit);

    Ok(Json(PublicQuote {
        id: quote.id,
        number: format!("Q-{}", quote.number),
        status: status.as_str().to_string(),
        customer_name: quote.customer_name,
        currency: quote.currency,
        quote_date: data.quote_date,
        expiry_date: data.expiry_date,
        prepared_by: data.prepared_by,
        bill_to_name: data.bill_to.name,
        bill_to_address: data.bill_to.address,
        project_location: data.project_location,
        scope_of_work: data.scope_of_work,
        terms: data.terms,
        notes: data.notes,
        items: data.items,
        tax_rate: data.tax_rate,
        tax_name: company.tax_name.clone().or(data.company.tax_name),
        fees_cents: data.fees_cents,
        deposit: data.deposit,
        totals,
        acceptance: data.acceptance.map(|acceptance| PublicAcceptance {
            name: acceptance.name,
            signature_data_url: acceptance.signature_data_url,
            signature_text: acceptance.signature_text,
            accepted_at: acceptance.accepted_at,
        }),
        company: PublicCompany {
            name: company.name.clone(),
            email: company.email.clone(),
            phone: company.phone.clone(),
            brand_color: company.brand_color().to_string(),
            payment_terms: company.payment_terms.clone(),
            logo_url: format!("/company-logo?company_id={}", company.id),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct CompanyLogoQuery {
    pub quote_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

#[derive(Template)]
#[template(path = "logo_placeholder.svg", escape = "html")]
struct LogoPlaceholder {
    initials: String,
    color: String,
}

/// Serves the company logo for `<img>` tags on quotes and emails. Every
/// failure path degrades to a generated placeholder; this endpoint never
/// returns an error status.
pub async fn company_logo(
    State(state): State<AppState>,
    Query(query): Query<CompanyLogoQuery>,
) -> Response {
    let company = resolve_logo_company(&state, &query).await;

    let company = match company {
        Some(company) => company,
        None => return placeholder_response("?", DEFAULT_BRAND_COLOR),
    };

    if let Some(path) = company.logo_path.clone() {
        match fetch_logo(&state, &path).await {
            Ok((content_type, bytes)) => {
                return ([(header::CONTENT_TYPE, content_type)], bytes).into_response();
            }
            Err(err) => {
                log::debug!("logo fetch for company {} failed: {}", company.id, err);
            }
        }
    }

    placeholder_response(&company.name, company.brand_color())
}

async fn resolve_logo_company(state: &AppState, query: &CompanyLogoQuery) -> Option<Company> {
    let company_id = match (query.company_id, query.quote_id) {
        (Some(company_id), _) => Some(company_id),
        (None, Some(quote_id)) => {
            sqlx::query_scalar::<_, Uuid>("SELECT company_id FROM quotes WHERE id = $1")
                .bind(quote_id)
                .fetch_optional(&state.db)
                .await
                .ok()
                .flatten()
        }
        (None, None) => None,
    }?;

    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(&state.db)
        .await
        .ok()
        .flatten()
}

async fn fetch_logo(state: &AppState, path: &str) -> AppResult<(String, Vec<u8>)> {
    let url = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            state.config.storage_base_url,
            path.trim_start_matches('/')
        )
    };

    let response = state.http.get(&url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("image/png")
        .to_string();
    let bytes = response.bytes().await?;

    Ok((content_type, bytes.to_vec()))
}

fn placeholder_response(name: &str, color: &str) -> Response {
    let template = LogoPlaceholder {
        initials: initials(name),
        color: color.to_string(),
    };

    let svg = template.render().unwrap_or_else(|_| {
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"128\" height=\"128\"/>".to_string()
    });

    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .collect();

    if letters.is_empty() {
        "?".to_string()
    } else {
        letters.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::initials;

    #[test]
    fn initials_take_the_first_two_words() {
        assert_eq!(initials("Acme Fencing"), "AF");
        assert_eq!(initials("acme fencing supply"), "AF");
        assert_eq!(initials("Acme"), "A");
        assert_eq!(initials(""), "?");
        assert_eq!(initials("   "), "?");
    }
}
