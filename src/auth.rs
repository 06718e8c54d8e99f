//! Token issuance and verification, password hashing, and the bearer-token
//! extractor used by handlers that need an authenticated caller.

use crate::error::ApiError;
use crate::schemas::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use model::entities::user;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided")]
    MissingToken,

    #[error("Token is invalid or expired")]
    TokenExpired,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Token has wrong type")]
    WrongTokenType,

    #[error("Internal error: password hashing failed")]
    HashingFailed,

    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token kinds. Access tokens embed the account
/// attributes so downstream checks need no second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            access_token_ttl: Duration::minutes(5),
            refresh_token_ttl: Duration::days(1),
        }
    }
}

/// Signed token pair returned by login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and validates HS256 tokens
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_token_ttl", &self.config.access_token_ttl)
            .field("refresh_token_ttl", &self.config.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn issue(&self, account: &user::Model, token_type: TokenType) -> AuthResult<String> {
        let ttl = match token_type {
            TokenType::Access => self.config.access_token_ttl,
            TokenType::Refresh => self.config.refresh_token_ttl,
        };
        let now = Utc::now();

        let claims = Claims {
            token_type,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            user_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            is_staff: account.is_staff,
            is_superuser: account.is_superuser,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    pub fn access_token(&self, account: &user::Model) -> AuthResult<String> {
        self.issue(account, TokenType::Access)
    }

    pub fn token_pair(&self, account: &user::Model) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access: self.issue(account, TokenType::Access)?,
            refresh: self.issue(account, TokenType::Refresh)?,
        })
    }

    /// Validate signature and expiry, then require the expected token type.
    pub fn validate(&self, token: &str, expected: TokenType) -> AuthResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(data.claims)
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Verify a password against its stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <access token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.jwt.validate(token, TokenType::Access)?;
        debug!("Authenticated request for user ID: {}", claims.user_id);
        Ok(AuthUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::new(JwtConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            ..JwtConfig::default()
        })
    }

    fn create_test_account() -> user::Model {
        user::Model {
            id: 42,
            username: "0700000001".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Otieno".to_string(),
            email: "amina@example.com".to_string(),
            password_hash: hash_password("pw").unwrap(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_verify_against_garbage_hash() {
        assert!(!verify_password("pw", "not-a-phc-string"));
    }

    #[test]
    fn test_access_token_embeds_account_attributes() {
        let manager = create_test_manager();
        let account = create_test_account();

        let pair = manager.token_pair(&account).unwrap();
        assert_eq!(pair.access.split('.').count(), 3);

        let claims = manager.validate(&pair.access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "0700000001");
        assert_eq!(claims.email, "amina@example.com");
        assert_eq!(claims.first_name, "Amina");
        assert!(!claims.is_staff);
        assert!(!pair.access.contains(&account.password_hash));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let manager = create_test_manager();
        let pair = manager.token_pair(&create_test_account()).unwrap();

        assert_eq!(
            manager.validate(&pair.refresh, TokenType::Access),
            Err(AuthError::WrongTokenType)
        );
        assert_eq!(
            manager.validate(&pair.access, TokenType::Refresh),
            Err(AuthError::WrongTokenType)
        );
        assert!(manager.validate(&pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::new(JwtConfig {
            secret: "another_secret".to_string(),
            ..JwtConfig::default()
        });

        let token = manager.access_token(&create_test_account()).unwrap();
        assert_eq!(other.validate(&token, TokenType::Access), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new(JwtConfig {
            secret: "test_secret".to_string(),
            access_token_ttl: Duration::hours(-2),
            ..JwtConfig::default()
        });

        let token = manager.access_token(&create_test_account()).unwrap();
        assert_eq!(manager.validate(&token, TokenType::Access), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let manager = create_test_manager();
        assert_eq!(
            manager.validate("invalid.token.here", TokenType::Access),
            Err(AuthError::InvalidToken)
        );
    }
}
