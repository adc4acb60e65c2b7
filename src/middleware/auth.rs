use actix_web::dev::Extensions;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{config::get_jwt_secret, errors::ApiError};

const TOKEN_LIFETIME_SECS: i64 = 24 * 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id, hex-encoded.
    pub sub: String,
    pub exp: usize,
}

/// Identity resolved from the bearer token, inserted into request
/// extensions by the `Authentication` middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: ObjectId,
}

pub fn issue_token(user_id: ObjectId) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id.to_hex(),
        exp: (Utc::now().timestamp() + TOKEN_LIFETIME_SECS) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_jwt_secret().as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(token: &str) -> Option<AuthenticatedUser> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(get_jwt_secret().as_ref()),
        &Validation::default(),
    )
    .ok()?;
    let id = ObjectId::parse_str(&data.claims.sub).ok()?;
    Some(AuthenticatedUser { id })
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

pub fn get_current_user(extensions: &Extensions) -> Option<AuthenticatedUser> {
    extensions.get::<AuthenticatedUser>().cloned()
}

pub fn require_auth(extensions: &Extensions) -> Result<AuthenticatedUser, ApiError> {
    get_current_user(extensions)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
}
