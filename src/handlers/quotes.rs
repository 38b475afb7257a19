use askama::Template;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    email::QuoteReadyEmail,
    error::{AppError, AppResult},
    middleware::resolve_tenant,
    models::{
        quote::{lenient_opt_cents, lenient_opt_f64},
        BillTo, Company, Customer, DepositSettings, LineItem, Quote, QuoteData, QuoteStatus,
        QuoteSummary,
    },
    pricing::{self, QuoteTotals},
    AppState,
};

/// Full quote shape returned by the editor-facing endpoints: row fields,
/// snapshot, and the freshly computed totals the UI displays.
#[derive(Debug, Serialize)]
pub struct QuoteDetail {
    pub id: Uuid,
    pub number: String,
    pub status: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub currency: String,
    pub version_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub totals: QuoteTotals,
    pub data: QuoteData,
}

impl From<Quote> for QuoteDetail {
    fn from(quote: Quote) -> Self {
        let data = quote.data.0;
        let totals = pricing::compute_totals(&data.items, data.tax_rate, data.fees_cents, &data.deposit);
        Self {
            number: format!("Q-{}", quote.number),
            status: QuoteStatus::normalize(&quote.status).as_str().to_string(),
            id: quote.id,
            customer_id: quote.customer_id,
            customer_name: quote.customer_name,
            customer_email: quote.customer_email,
            currency: quote.currency,
            version_of: quote.version_of,
            created_at: quote.created_at,
            cancelled_at: quote.cancelled_at,
            totals,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateQuote {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuotePatch {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub quote_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub prepared_by: Option<String>,
    pub bill_to: Option<BillTo>,
    pub project_location: Option<String>,
    pub scope_of_work: Option<String>,
    pub terms: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItem>>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub tax_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_cents")]
    pub fees_cents: Option<i64>,
    pub deposit: Option<DepositSettings>,
}

#[derive(Debug, Deserialize)]
pub struct SendQuoteLink {
    pub quote_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SendQuoteLinkResponse {
    pub ok: bool,
    pub status: String,
    pub view_url: String,
}

pub async fn list_quotes(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<QuoteSummary>>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let quotes =
        sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE company_id = $1 ORDER BY created_at DESC")
            .bind(ctx.company_id)
            .fetch_all(&state.db)
            .await?
            .into_iter()
            .map(QuoteSummary::from)
            .collect();

    Ok(Json(quotes))
}

pub async fn create_quote(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<CreateQuote>,
) -> AppResult<Json<QuoteDetail>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let company = find_company(&state, ctx.company_id).await?;

    let customer = match payload.customer_id {
        Some(customer_id) => Some(
            sqlx::query_as::<_, Customer>(
                "SELECT * FROM customers WHERE company_id = $1 AND id = $2",
            )
            .bind(ctx.company_id)
            .bind(customer_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("customer"))?,
        ),
        None => None,
    };

    let customer_name = match (&customer, &payload.customer_name) {
        (Some(customer), _) => customer.display_name(),
        (None, Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(AppError::validation("customer name is required")),
    };
    let customer_email = payload
        .customer_email
        .clone()
        .or_else(|| customer.as_ref().and_then(|c| c.email.clone()));

    let mut data = QuoteData::from_company(&company, state.config.local_today());
    data.prepared_by = Some(ctx.email.clone());
    data.bill_to = match &customer {
        Some(customer) => BillTo {
            name: customer.display_name(),
            company: customer.company_name.clone(),
            address: billing_address(customer),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
        },
        None => BillTo {
            name: customer_name.clone(),
            email: customer_email.clone(),
            ..Default::default()
        },
    };

    let number = next_quote_number(&state, ctx.company_id).await?;

    let quote = sqlx::query_as::<_, Quote>(
        r#"
        INSERT INTO quotes (
            company_id, customer_id, number, customer_name, customer_email,
            status, total_cents, currency, data
        )
        VALUES ($1, $2, $3, $4, $5, 'draft', 0, $6, $7)
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(customer.as_ref().map(|c| c.id))
    .bind(number)
    .bind(&customer_name)
    .bind(&customer_email)
    .bind(&company.currency)
    .bind(sqlx::types::Json(&data))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(QuoteDetail::from(quote)))
}

pub async fn get_quote(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<QuoteDetail>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let quote = find_quote(&state, ctx.company_id, id).await?;
    Ok(Json(QuoteDetail::from(quote)))
}

/// Editor save: applies the patch to the snapshot, recomputes totals and
/// persists both together so the row's `total_cents` always matches the
/// computed grand total.
pub async fn update_quote(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<QuotePatch>,
) -> AppResult<Json<QuoteDetail>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let quote = find_quote(&state, ctx.company_id, id).await?;

    if !quote.status().is_editable() {
        return Err(AppError::validation("a cancelled quote cannot be edited"));
    }

    let mut data = quote.data.0;
    if let Some(quote_date) = patch.quote_date {
        data.quote_date = Some(quote_date);
    }
    if let Some(expiry_date) = patch.expiry_date {
        data.expiry_date = Some(expiry_date);
    }
    if let Some(prepared_by) = patch.prepared_by {
        data.prepared_by = Some(prepared_by);
    }
    if let Some(bill_to) = patch.bill_to {
        data.bill_to = bill_to;
    }
    if let Some(project_location) = patch.project_location {
        data.project_location = Some(project_location);
    }
    if let Some(scope_of_work) = patch.scope_of_work {
        data.scope_of_work = Some(scope_of_work);
    }
    if let Some(terms) = patch.terms {
        data.terms = Some(terms);
    }
    if let Some(notes) = patch.notes {
        data.notes = Some(notes);
    }
    if let Some(items) = patch.items {
        data.items = items;
    }
    if let Some(tax_rate) = patch.tax_rate {
        data.tax_rate = tax_rate;
    }
    if let Some(fees_cents) = patch.fees_cents {
        data.fees_cents = fees_cents;
    }
    if let Some(deposit) = patch.deposit {
        data.deposit = deposit;
    }

    let customer_name = patch
        .customer_name
        .unwrap_or_else(|| quote.customer_name.clone());
    let customer_email = patch.customer_email.or_else(|| quote.customer_email.clone());

    let totals = pricing::compute_totals(&data.items, data.tax_rate, data.fees_cents, &data.deposit);

    let quote = sqlx::query_as::<_, Quote>(
        r#"
        UPDATE quotes SET
            customer_name = $3, customer_email = $4, total_cents = $5, data = $6
        WHERE company_id = $1 AND id = $2
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(id)
    .bind(&customer_name)
    .bind(&customer_email)
    .bind(totals.total_cents)
    .bind(sqlx::types::Json(&data))
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("quote"))?;

    Ok(Json(QuoteDetail::from(quote)))
}

pub async fn cancel_quote(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<QuoteSummary>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let quote = find_quote(&state, ctx.company_id, id).await?;

    match quote.status() {
        QuoteStatus::Accepted => {
            return Err(AppError::validation("an accepted quote cannot be cancelled"))
        }
        QuoteStatus::Cancelled => return Err(AppError::validation("quote is already cancelled")),
        _ => {}
    }

    let quote = sqlx::query_as::<_, Quote>(
        r#"
        UPDATE quotes SET status = 'cancelled', cancelled_at = NOW()
        WHERE company_id = $1 AND id = $2
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("quote"))?;

    log::info!("quote {} cancelled by {}", quote.id, ctx.user_id);
    Ok(Json(QuoteSummary::from(quote)))
}

/// "New version": fresh Draft carrying a copy of the source snapshot with
/// the acceptance and share token dropped, pointing at the lineage root.
pub async fn duplicate_quote(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<QuoteDetail>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let source = find_quote(&state, ctx.company_id, id).await?;

    let data = source
        .data
        .0
        .versioned_copy(source.id, &source.display_number(), state.config.local_today());
    let totals = pricing::compute_totals(&data.items, data.tax_rate, data.fees_cents, &data.deposit);
    let number = next_quote_number(&state, ctx.company_id).await?;

    let quote = sqlx::query_as::<_, Quote>(
        r#"
        INSERT INTO quotes (
            company_id, customer_id, number, version_of, customer_name, customer_email,
            status, total_cents, currency, data
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(source.customer_id)
    .bind(number)
    .bind(source.lineage_root())
    .bind(&source.customer_name)
    .bind(&source.customer_email)
    .bind(totals.total_cents)
    .bind(&source.currency)
    .bind(sqlx::types::Json(&data))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(QuoteDetail::from(quote)))
}

/// Emails the customer a view link, then advances a Draft to Sent. The email
/// is the primary operation here: a provider failure fails the request.
pub async fn send_quote_link(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<SendQuoteLink>,
) -> AppResult<Json<SendQuoteLinkResponse>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let quote = find_quote(&state, ctx.company_id, payload.quote_id).await?;

    match quote.status() {
        QuoteStatus::Cancelled => {
            return Err(AppError::validation("a cancelled quote cannot be sent"))
        }
        QuoteStatus::Accepted => {
            return Err(AppError::validation("quote is already accepted"))
        }
        _ => {}
    }

    let mut data = quote.data.0.clone();
    if data.share_token.is_none() {
        data.share_token = Some(Uuid::new_v4());
    }

    let to = quote
        .customer_email
        .clone()
        .or_else(|| data.bill_to.email.clone())
        .ok_or_else(|| AppError::validation("quote has no customer email"))?;

    let company = find_company(&state, ctx.company_id).await?;
    let view_url = state.config.quote_view_url(quote.id);

    let email = QuoteReadyEmail {
        company_name: company.name.clone(),
        brand_color: company.brand_color().to_string(),
        quote_number: quote.display_number(),
        customer_name: quote.customer_name.clone(),
        total_cents: quote.total_cents,
        currency: quote.currency.clone(),
        view_url: view_url.clone(),
    };
    let html = email.render()?;
    state
        .mailer
        .send(&to, &email.subject(), &html, &email.text_body())
        .await?;

    let status = match quote.status() {
        QuoteStatus::Draft => QuoteStatus::Sent,
        other => other,
    };

    sqlx::query("UPDATE quotes SET status = $3, data = $4 WHERE company_id = $1 AND id = $2")
        .bind(ctx.company_id)
        .bind(quote.id)
        .bind(status.as_str())
        .bind(sqlx::types::Json(&data))
        .execute(&state.db)
        .await?;

    Ok(Json(SendQuoteLinkResponse {
        ok: true,
        status: status.as_str().to_string(),
        view_url,
    }))
}

async fn find_quote(state: &AppState, company_id: Uuid, id: Uuid) -> AppResult<Quote> {
    sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE company_id = $1 AND id = $2")
        .bind(company_id)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("quote"))
}

async fn find_company(state: &AppState, company_id: Uuid) -> AppResult<Company> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("company"))
}

async fn next_quote_number(state: &AppState, company_id: Uuid) -> AppResult<i64> {
    let number = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(number), 0) + 1 FROM quotes WHERE company_id = $1",
    )
    .bind(company_id)
    .fetch_one(&state.db)
    .await?;

    Ok(number)
}

fn billing_address(customer: &Customer) -> Option<String> {
    let address = [
        customer.address_line1.as_deref(),
        customer.address_line2.as_deref(),
        customer.city.as_deref(),
        customer.state.as_deref(),
        customer.postal_code.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}
