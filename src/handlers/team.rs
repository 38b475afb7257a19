use askama::Template;
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    email::{EmailReport, TeamInviteEmail},
    error::{AppError, AppResult},
    middleware::resolve_tenant,
    models::{Company, MemberRole, Membership},
    AppState,
};

pub async fn list_members(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Membership>>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    let members = sqlx::query_as::<_, Membership>(
        "SELECT user_id, company_id, role, created_at FROM company_members WHERE company_id = $1 ORDER BY created_at",
    )
    .bind(ctx.company_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct InviteUser {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct InviteUserResponse {
    pub ok: bool,
    pub user_id: Uuid,
    pub role: String,
    pub email: EmailReport,
}

/// Admin-only team invite: the hosted auth provider creates the account and
/// returns its id, then the membership row binds it to this tenant.
pub async fn invite_user(
    headers: HeaderMap,
    cookies: Cookies,
    State(state): State<AppState>,
    Json(payload): Json<InviteUser>,
) -> AppResult<Json<InviteUserResponse>> {
    let ctx = resolve_tenant(&headers, &cookies, &state.db).await?;

    if !ctx.can_manage_team() {
        return Err(AppError::Forbidden);
    }

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("a valid email is required"));
    }

    let role = match payload.role.trim().to_ascii_lowercase().as_str() {
        "admin" => MemberRole::Admin,
        "sales" => MemberRole::Sales,
        _ => return Err(AppError::validation("role must be admin or sales")),
    };

    let user_id = invite_auth_user(&state, &email).await?;

    let inserted = sqlx::query(
        "INSERT INTO company_members (user_id, company_id, role) VALUES ($1, $2, $3) ON CONFLICT (user_id, company_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(ctx.company_id)
    .bind(role.as_str())
    .execute(&state.db)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::validation("user is already a member of this company"));
    }

    log::info!(
        "user {} invited to company {} as {} by {}",
        user_id,
        ctx.company_id,
        role.as_str(),
        ctx.user_id
    );

    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(ctx.company_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("company"))?;

    let invite = TeamInviteEmail {
        company_name: company.name.clone(),
        inviter_email: ctx.email.clone(),
        role: role.as_str().to_string(),
        sign_in_url: format!("{}/login", state.config.public_base_url),
    };
    let report = match invite.render() {
        Ok(html) => {
            state
                .mailer
                .send_best_effort(&email, &invite.subject(), &html, &invite.text_body())
                .await
        }
        Err(err) => {
            log::warn!("invite email render failed: {}", err);
            EmailReport {
                to: email.clone(),
                sent: false,
            }
        }
    };

    Ok(Json(InviteUserResponse {
        ok: true,
        user_id,
        role: role.as_str().to_string(),
        email: report,
    }))
}

async fn invite_auth_user(state: &AppState, email: &str) -> AppResult<Uuid> {
    #[derive(Serialize)]
    struct InviteRequest<'a> {
        email: &'a str,
    }

    #[derive(Deserialize)]
    struct InvitedUser {
        id: Uuid,
    }

    let response = state
        .http
        .post(format!("{}/invite", state.config.auth_admin_url))
        .bearer_auth(&state.config.auth_admin_key)
        .json(&InviteRequest { email })
        .send()
        .await?
        .error_for_status()?;

    let invited: InvitedUser = response.json().await?;
    Ok(invited.id)
}
