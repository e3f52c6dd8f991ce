use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;

pub mod password;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Session token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Team invitation token claims, e-mailed to the invitee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteClaims {
    pub team_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
}

const TEAM_INVITE_PURPOSE: &str = "team-invite";

impl InviteClaims {
    pub fn new(team_id: Uuid, email: String, invited_by: Uuid, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            team_id,
            email,
            invited_by,
            purpose: TEAM_INVITE_PURPOSE.to_string(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Password reset token claims, e-mailed on request. `stamp` is the user's
/// `updated_at` in milliseconds at issue time, so a completed reset (or any
/// later profile write) retires every outstanding link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub user_id: Uuid,
    pub email: String,
    pub stamp: i64,
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
}

const PASSWORD_RESET_PURPOSE: &str = "password-reset";

impl ResetClaims {
    pub fn new(user_id: Uuid, email: String, stamp: i64, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email,
            stamp,
            purpose: PASSWORD_RESET_PURPOSE.to_string(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

fn encoding_key(security: &SecurityConfig) -> Result<EncodingKey, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(EncodingKey::from_secret(security.jwt_secret.as_bytes()))
}

fn decoding_key(security: &SecurityConfig) -> Result<DecodingKey, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(DecodingKey::from_secret(security.jwt_secret.as_bytes()))
}

pub fn generate_jwt(security: &SecurityConfig, claims: &Claims) -> Result<String, AuthError> {
    encode(&Header::default(), claims, &encoding_key(security)?)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(security: &SecurityConfig, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(token, &decoding_key(security)?, &Validation::default())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(token_data.claims)
}

pub fn generate_invite_token(security: &SecurityConfig, claims: &InviteClaims) -> Result<String, AuthError> {
    encode(&Header::default(), claims, &encoding_key(security)?)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn validate_invite_token(security: &SecurityConfig, token: &str) -> Result<InviteClaims, AuthError> {
    let claims = decode::<InviteClaims>(token, &decoding_key(security)?, &Validation::default())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?
        .claims;
    if claims.purpose != TEAM_INVITE_PURPOSE {
        return Err(AuthError::InvalidToken("not a team invitation".to_string()));
    }
    Ok(claims)
}

pub fn generate_reset_token(security: &SecurityConfig, claims: &ResetClaims) -> Result<String, AuthError> {
    encode(&Header::default(), claims, &encoding_key(security)?)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn validate_reset_token(security: &SecurityConfig, token: &str) -> Result<ResetClaims, AuthError> {
    let claims = decode::<ResetClaims>(token, &decoding_key(security)?, &Validation::default())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?
        .claims;
    if claims.purpose != PASSWORD_RESET_PURPOSE {
        return Err(AuthError::InvalidToken("not a password reset link".to_string()));
    }
    Ok(claims)
}
