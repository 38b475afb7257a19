use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::resolve_tenant,
    models::{CreateCustomer, Customer, Quote, QuoteSummary, UpdateCustomer},
    AppState,
};

pub async fn list_customers(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Customer>>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let customers = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE company_id = $1 ORDER BY last_name, first_name",
    )
    .bind(ctx.company_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(customers))
}

pub async fn create_customer(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomer>,
) -> AppResult<Json<Customer>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    if payload.first_name.trim().is_empty() && payload.last_name.trim().is_empty() {
        return Err(AppError::validation("customer name is required"));
    }

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (
            company_id, first_name, last_name, company_name, email, phone,
            address_line1, address_line2, city, state, postal_code, country, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&payload.company_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.postal_code)
    .bind(&payload.country)
    .bind(&payload.notes)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(customer))
}

pub async fn get_customer(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let customer = find_customer(&state, ctx.company_id, id).await?;
    Ok(Json(customer))
}

pub async fn update_customer(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomer>,
) -> AppResult<Json<Customer>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers SET
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            company_name = COALESCE($5, company_name),
            email = COALESCE($6, email),
            phone = COALESCE($7, phone),
            address_line1 = COALESCE($8, address_line1),
            address_line2 = COALESCE($9, address_line2),
            city = COALESCE($10, city),
            state = COALESCE($11, state),
            postal_code = COALESCE($12, postal_code),
            country = COALESCE($13, country),
            notes = COALESCE($14, notes),
            updated_at = NOW()
        WHERE company_id = $1 AND id = $2
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.company_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.postal_code)
    .bind(&payload.country)
    .bind(&payload.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("customer"))?;

    Ok(Json(customer))
}

pub async fn delete_customer(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let result = sqlx::query("DELETE FROM customers WHERE company_id = $1 AND id = $2")
        .bind(ctx.company_id)
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("customer"));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Quote history for a customer: linked rows first, plus quotes stamped with
/// the customer's email before a link existed.
pub async fn customer_quotes(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<QuoteSummary>>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;
    let customer = find_customer(&state, ctx.company_id, id).await?;

    let quotes = sqlx::query_as::<_, Quote>(
        r#"
        SELECT * FROM quotes
        WHERE company_id = $1
          AND (customer_id = $2 OR (customer_id IS NULL AND customer_email = $3))
        ORDER BY created_at DESC
        "#,
    )
    .bind(ctx.company_id)
    .bind(customer.id)
    .bind(&customer.email)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(QuoteSummary::from)
    .collect();

    Ok(Json(quotes))
}

async fn find_customer(state: &AppState, company_id: Uuid, id: Uuid) -> AppResult<Customer> {
    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE company_id = $1 AND id = $2")
        .bind(company_id)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("customer"))
}
