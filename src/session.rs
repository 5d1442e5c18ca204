//! Per-request session built from the auth provider's bearer token.

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    User,
    Therapist,
    Admin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Claims issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub user_type: UserType,
    pub name: Option<String>,
}

impl Session {
    pub fn require_therapist(&self) -> Result<(), AppError> {
        match self.user_type {
            UserType::Therapist => Ok(()),
            _ => Err(AppError::Forbidden("Therapist access required")),
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.user_type {
            UserType::Admin => Ok(()),
            _ => Err(AppError::Forbidden("Admin access required")),
        }
    }

    /// Name shown to moderators when this user reports a message.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "Anonymous".to_string())
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let mut validation = Validation::default();
    // Provider tokens carry an audience this service does not pin.
    validation.validate_aud = false;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::InvalidToken
    })?;

    let claims = data.claims;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
    let metadata = claims.user_metadata.unwrap_or_default();

    Ok(Session {
        user_id,
        email: claims.email,
        user_type: metadata.user_type.unwrap_or_default(),
        name: metadata.name.filter(|n| !n.trim().is_empty()),
    })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        verify_token(token, &state.config.jwt_secret)
    }
}

/// Anonymous when the header is absent; a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => verify_token(token, &state.config.jwt_secret).map(|s| MaybeSession(Some(s))),
            None => Ok(MaybeSession(None)),
        }
    }
}

#[cfg(test)]
pub(crate) fn mint_token(secret: &str, user_id: Uuid, user_type: UserType) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.com", user_type_label(user_type))),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        user_metadata: Some(UserMetadata {
            user_type: Some(user_type),
            name: None,
        }),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token encodes")
}

#[cfg(test)]
fn user_type_label(user_type: UserType) -> &'static str {
    match user_type {
        UserType::User => "user",
        UserType::Therapist => "therapist",
        UserType::Admin => "admin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    #[test]
    fn test_verify_token_reads_metadata() {
        let id = Uuid::new_v4();
        let token = mint_token(SECRET, id, UserType::Therapist);
        let session = verify_token(&token, SECRET).unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(session.user_type, UserType::Therapist);
        assert!(session.require_therapist().is_ok());
        assert!(session.require_admin().is_err());
    }

    #[test]
    fn test_missing_user_type_defaults_to_user() {
        let claims = serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "exp": (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
            "aud": "authenticated",
        });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        let session = verify_token(&token, SECRET).unwrap();
        assert_eq!(session.user_type, UserType::User);
        assert_eq!(session.display_name(), "Anonymous");
    }

    #[test]
    fn test_wrong_secret_and_expired_tokens_rejected() {
        let token = mint_token(SECRET, Uuid::new_v4(), UserType::User);
        assert!(matches!(verify_token(&token, "other"), Err(AppError::InvalidToken)));

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: None,
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp(),
            user_metadata: None,
        };
        let expired = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(matches!(verify_token(&expired, SECRET), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = Claims {
            sub: "not-a-uuid".into(),
            email: None,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
            user_metadata: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }
}
