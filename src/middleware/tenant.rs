use axum::http::{header, HeaderMap};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{Company, MemberRole, Membership},
    utils::{verify_token, Claims},
};

/// Resolved caller identity plus tenant scope. Constructed once per request
/// and passed explicitly to every data-access call.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub user_id: Uuid,
    pub email: String,
    pub company_id: Uuid,
    pub role: MemberRole,
}

impl TenantContext {
    pub fn can_manage_team(&self) -> bool {
        matches!(self.role, MemberRole::Owner | MemberRole::Admin)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.role, MemberRole::Owner)
    }
}

/// Resolves `(company_id, role)` for the authenticated caller, bootstrapping
/// a company and owner membership on first use.
pub async fn resolve_tenant(
    headers: &HeaderMap,
    cookies: &Cookies,
    db: &Database,
) -> AppResult<TenantContext> {
    let token = bearer_token(headers, cookies).ok_or(AppError::Unauthorized)?;
    let claims = verify_token(&token).map_err(|_| AppError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    if let Some(membership) = find_membership(db, user_id).await? {
        return Ok(context_from(membership, claims.email));
    }

    bootstrap_tenant(db, user_id, &claims).await
}

// Authorization header first, session cookie as a fallback.
fn bearer_token(headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim().to_string());
        }
    }

    cookies.get("auth_token").map(|c| c.value().to_string())
}

fn context_from(membership: Membership, email: String) -> TenantContext {
    TenantContext {
        user_id: membership.user_id,
        email,
        company_id: membership.company_id,
        role: membership.role(),
    }
}

async fn find_membership(db: &Database, user_id: Uuid) -> AppResult<Option<Membership>> {
    let membership = sqlx::query_as::<_, Membership>(
        "SELECT user_id, company_id, role, created_at FROM company_members WHERE user_id = $1 ORDER BY created_at LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(membership)
}

/// First login after signup: reuse a company this user already created (a
/// previous bootstrap may have lost the membership race), else create one,
/// then insert the owner membership.
async fn bootstrap_tenant(db: &Database, user_id: Uuid, claims: &Claims) -> AppResult<TenantContext> {
    let existing = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE created_by = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    let company = match existing {
        Some(company) => company,
        None => {
            let name = company_name_from_claims(claims);
            sqlx::query_as::<_, Company>(
                r#"
                INSERT INTO companies (name, email, created_by)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(&name)
            .bind(&claims.email)
            .bind(user_id)
            .fetch_one(db)
            .await?
        }
    };

    log::info!("bootstrapped company {} for user {}", company.id, user_id);

    // A concurrent request may have inserted the membership already; the
    // duplicate key is swallowed, not surfaced.
    sqlx::query(
        "INSERT INTO company_members (user_id, company_id, role) VALUES ($1, $2, 'owner') ON CONFLICT (user_id, company_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(company.id)
    .execute(db)
    .await?;

    let membership = find_membership(db, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("membership missing after bootstrap".to_string()))?;

    Ok(context_from(membership, claims.email.clone()))
}

fn company_name_from_claims(claims: &Claims) -> String {
    if let Some(name) = claims.company_name.as_deref() {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    claims
        .email
        .split('@')
        .nth(1)
        .and_then(|domain| domain.split('.').next())
        .filter(|label| !label.is_empty())
        .map(|label| label.to_string())
        .unwrap_or_else(|| "My Company".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(email: &str, company_name: Option<&str>) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            email: email.to_string(),
            company_name: company_name.map(str::to_string),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        }
    }

    #[test]
    fn company_name_prefers_signup_metadata() {
        let c = claims("pat@acmefence.com", Some("Acme Fencing"));
        assert_eq!(company_name_from_claims(&c), "Acme Fencing");
    }

    #[test]
    fn company_name_falls_back_to_email_domain() {
        let c = claims("pat@acmefence.com", None);
        assert_eq!(company_name_from_claims(&c), "acmefence");

        let c = claims("pat@acmefence.com", Some("   "));
        assert_eq!(company_name_from_claims(&c), "acmefence");
    }

    #[test]
    fn company_name_survives_a_malformed_email() {
        let c = claims("not-an-email", None);
        assert_eq!(company_name_from_claims(&c), "My Company");
    }

    #[test]
    fn role_gates_follow_membership() {
        let ctx = TenantContext {
            user_id: Uuid::new_v4(),
            email: "pat@example.com".into(),
            company_id: Uuid::new_v4(),
            role: MemberRole::Sales,
        };
        assert!(!ctx.can_manage_team());
        assert!(!ctx.is_owner());

        let admin = TenantContext {
            role: MemberRole::Admin,
            ..ctx.clone()
        };
        assert!(admin.can_manage_team());
        assert!(!admin.is_owner());

        let owner = TenantContext {
            role: MemberRole::Owner,
            ..ctx
        };
        assert!(owner.can_manage_team());
        assert!(owner.is_owner());
    }
}
