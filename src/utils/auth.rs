use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;

/// Claims carried by the hosted auth provider's session token. The provider
/// signs with the shared HS256 secret; this service only ever verifies.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    /// Company name captured at signup, used when bootstrapping a tenant.
    #[serde(default)]
    pub company_name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn issue(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "staff@example.com".to_string(),
            company_name: Some("Acme Fencing".to_string()),
            exp,
            iat: Utc::now().timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_a_token_signed_with_the_shared_secret() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = issue("test-secret", exp);

        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.email, "staff@example.com");
        assert_eq!(claims.company_name.as_deref(), Some("Acme Fencing"));
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = issue("other-secret", exp);

        assert!(verify_token(&token).is_err());
    }

    #[test]
    fn rejects_an_expired_token() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let exp = (Utc::now() - Duration::hours(1)).timestamp();
        let token = issue("test-secret", exp);

        assert!(verify_token(&token).is_err());
    }
}
