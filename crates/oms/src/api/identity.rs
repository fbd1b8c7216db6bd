//! Caller identity from trusted gateway headers
//!
//! The gateway authenticates the request and forwards the account id, role
//! and verification tier. Role defaults to `user` and tier to `unverified`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};

use common::{AccountId, Actor, Role, VerificationTier};

use crate::api::models::{ErrorDetail, ErrorResponse};

pub const ACCOUNT_HEADER: &str = "x-account-id";
pub const ROLE_HEADER: &str = "x-account-role";
pub const TIER_HEADER: &str = "x-verification-tier";

/// Authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

fn rejection(status: StatusCode, code: &str, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        }),
    )
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = header(parts, ACCOUNT_HEADER)
            .ok_or_else(|| {
                rejection(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    format!("missing {} header", ACCOUNT_HEADER),
                )
            })?
            .parse::<AccountId>()
            .map_err(|e| rejection(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", e.to_string()))?;

        let role = match header(parts, ROLE_HEADER) {
            Some(value) => value
                .parse::<Role>()
                .map_err(|e| rejection(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()))?,
            None => Role::default(),
        };

        let tier = match header(parts, TIER_HEADER) {
            Some(value) => value
                .parse::<VerificationTier>()
                .map_err(|e| rejection(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()))?,
            None => VerificationTier::default(),
        };

        Ok(Caller(Actor {
            account_id,
            role,
            tier,
        }))
    }
}
