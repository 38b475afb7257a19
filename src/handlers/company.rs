use axum::{extract::State, http::HeaderMap, Json};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, AppResult},
    middleware::resolve_tenant,
    models::{Company, UpdateCompany},
    AppState,
};

pub async fn get_company(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
) -> AppResult<Json<Company>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(ctx.company_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("company"))?;

    Ok(Json(company))
}

/// Settings are owner-only. Changes only affect quotes created afterwards;
/// issued quotes keep their snapshot.
pub async fn update_company(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCompany>,
) -> AppResult<Json<Company>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    if !ctx.is_owner() {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("company name cannot be empty"));
        }
    }
    if let Some(tax_rate) = payload.tax_rate {
        if !(0.0..=100.0).contains(&tax_rate) {
            return Err(AppError::validation("tax rate must be between 0 and 100"));
        }
    }

    let company = sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            address_line1 = COALESCE($5, address_line1),
            address_line2 = COALESCE($6, address_line2),
            city = COALESCE($7, city),
            state = COALESCE($8, state),
            postal_code = COALESCE($9, postal_code),
            country = COALESCE($10, country),
            currency = COALESCE($11, currency),
            brand_color = COALESCE($12, brand_color),
            logo_path = COALESCE($13, logo_path),
            payment_terms = COALESCE($14, payment_terms),
            tax_name = COALESCE($15, tax_name),
            tax_rate = COALESCE($16, tax_rate),
            billing_email = COALESCE($17, billing_email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.postal_code)
    .bind(&payload.country)
    .bind(&payload.currency)
    .bind(&payload.brand_color)
    .bind(&payload.logo_path)
    .bind(&payload.payment_terms)
    .bind(&payload.tax_name)
    .bind(payload.tax_rate)
    .bind(&payload.billing_email)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("company"))?;

    Ok(Json(company))
}
