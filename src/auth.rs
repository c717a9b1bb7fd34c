use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use rand::{Rng, distr::Alphanumeric};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::{error::ApiError, models::Role, repository::RepositoryState};

/// Length of every issued bearer token (and of the legacy `api_token` field).
pub const TOKEN_LEN: usize = 60;

/// Fixed label returned alongside every issued token.
pub const TOKEN_TYPE: &str = "Bearer";

// --- Password hashing ---

/// Hashes a plaintext password with argon2id and a fresh random salt.
/// The plaintext is never persisted or logged anywhere in this crate.
pub fn hash_password(plain: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

/// Verifies a plaintext password against a stored PHC hash string.
/// Verification is constant-time within argon2; an unparseable stored hash
/// counts as a mismatch rather than an error.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// A throwaway hash for equalizing login cost when the email resolves to no
/// user: verifying against it takes as long as a real mismatch, so response
/// timing does not reveal whether an address is registered.
pub fn dummy_hash() -> &'static str {
    // An empty fallback fails verification closed if hashing ever errors.
    DUMMY_HASH.get_or_init(|| hash_password("throwaway-timing-pad").unwrap_or_default())
}

// --- Opaque bearer tokens ---

/// Generates a cryptographically random alphanumeric token. The plaintext is
/// returned to the caller exactly once; only its digest is stored.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a token, the form the token store keeps. Lookup by
/// digest means a leaked `access_tokens` table does not leak usable tokens.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// --- Request identity extractor ---

/// AuthUser
///
/// The resolved identity of an authenticated request: who the bearer token
/// belongs to, their role, and the id of the token row used for this request
/// (logout revokes exactly that row). The token is passed explicitly into
/// every workflow call; there is no ambient session state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    /// The access-token row authorizing this request.
    pub token_id: Uuid,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler.
///
/// The process:
/// 1. Extract the `Authorization: Bearer <token>` header.
/// 2. Digest the opaque token and look it up in the token store; revoked
///    tokens do not resolve.
/// 3. Return the owning user's id and role plus the token row id.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any failure, so the error
/// envelope stays consistent with the rest of the API.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;

        match repo.find_user_by_token(&token_digest(token)).await {
            Ok(Some((user, token_id))) => Ok(AuthUser {
                id: user.id,
                role: user.role,
                token_id,
            }),
            // Unknown and revoked tokens are indistinguishable to the caller.
            Ok(None) => Err(ApiError::Unauthenticated),
            Err(e) => Err(ApiError::internal("Authentication failed", e)),
        }
    }
}
