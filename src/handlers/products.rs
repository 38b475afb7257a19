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
    models::{CreateProduct, Product, UpdateProduct},
    AppState,
};

pub async fn list_products(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Product>>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let products =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE company_id = $1 ORDER BY name")
            .bind(ctx.company_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(products))
}

pub async fn create_product(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> AppResult<Json<Product>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::validation("product name is required"));
    }
    if payload.unit_price_cents < 0 {
        return Err(AppError::validation("unit price must not be negative"));
    }

    // Default the currency to the company's own when the caller omits it.
    let currency = match payload.currency {
        Some(currency) => currency,
        None => {
            sqlx::query_scalar::<_, String>("SELECT currency FROM companies WHERE id = $1")
                .bind(ctx.company_id)
                .fetch_one(&state.db)
                .await?
        }
    };

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (
            company_id, name, description, unit_type, unit_price_cents, currency, show_breakdown
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.unit_type.as_deref().unwrap_or("unit"))
    .bind(payload.unit_price_cents)
    .bind(&currency)
    .bind(payload.show_breakdown.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(product))
}

pub async fn get_product(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE company_id = $1 AND id = $2")
            .bind(ctx.company_id)
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("product"))?;

    Ok(Json(product))
}

pub async fn update_product(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> AppResult<Json<Product>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    if let Some(price) = payload.unit_price_cents {
        if price < 0 {
            return Err(AppError::validation("unit price must not be negative"));
        }
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            unit_type = COALESCE($5, unit_type),
            unit_price_cents = COALESCE($6, unit_price_cents),
            currency = COALESCE($7, currency),
            show_breakdown = COALESCE($8, show_breakdown),
            updated_at = NOW()
        WHERE company_id = $1 AND id = $2
        RETURNING *
        "#,
    )
    .bind(ctx.company_id)
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.unit_type)
    .bind(payload.unit_price_cents)
    .bind(&payload.currency)
    .bind(payload.show_breakdown)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("product"))?;

    Ok(Json(product))
}

pub async fn delete_product(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let result = sqlx::query("DELETE FROM products WHERE company_id = $1 AND id = $2")
        .bind(ctx.company_id)
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("product"));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
