//! Identity boundary.
//!
//! Token issuance belongs to an external identity provider; this service only
//! resolves a presented token into a [`Principal`] and trusts it verbatim.
//!
//! The shipped [`SignedTokenIdentity`] verifies tokens of the form
//!
//! ```text
//! base64url(claims) "." base64url(hmac_sha256(secret, claims))
//! ```
//!
//! where `claims` is the JSON `{"user_id": "<uuid>", "role": "CUSTOMER"}`.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn history(AuthenticatedUser(principal): AuthenticatedUser) -> WebResult<Json<Vec<Order>>> {
//!     // principal.user_id and principal.role are trusted
//! }
//! ```

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rush_core::{DispatchError, Principal};
use hmac::{Hmac, Mac};
use rush_web::AppError;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Resolves bearer tokens into principals.
pub trait IdentityProvider: Send + Sync {
    /// Verifies `token` and returns the principal it names.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unauthenticated`] for any token that does not verify.
    fn resolve(&self, token: &str) -> Result<Principal, DispatchError>;
}

/// Verifier for tokens signed with a shared secret.
pub struct SignedTokenIdentity {
    secret: Vec<u8>,
}

impl SignedTokenIdentity {
    /// Creates a verifier for `secret`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, claims: &[u8]) -> Result<HmacSha256, DispatchError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| {
            tracing::error!(error = %e, "Unusable token secret");
            DispatchError::Unauthenticated
        })?;
        mac.update(claims);
        Ok(mac)
    }

    /// Signs a token for `principal`, as the identity provider would.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unauthenticated`] if the secret cannot key the MAC.
    pub fn issue(&self, principal: &Principal) -> Result<String, DispatchError> {
        let claims = serde_json::json!({
            "user_id": principal.user_id,
            "role": principal.role,
        })
        .to_string();
        let signature = self.mac(claims.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(claims.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

impl IdentityProvider for SignedTokenIdentity {
    fn resolve(&self, token: &str) -> Result<Principal, DispatchError> {
        let (claims, signature) = token.split_once('.').ok_or(DispatchError::Unauthenticated)?;
        let claims = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| DispatchError::Unauthenticated)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| DispatchError::Unauthenticated)?;

        self.mac(&claims)?
            .verify_slice(&signature)
            .map_err(|_| DispatchError::Unauthenticated)?;
        serde_json::from_slice(&claims).map_err(|_| DispatchError::Unauthenticated)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// Browsers cannot set headers on a WebSocket handshake.
fn query_token(parts: &Parts) -> Option<&str> {
    parts
        .uri
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value)
        .filter(|token| !token.is_empty())
}

/// Authenticated caller.
///
/// Reads `Authorization: Bearer <token>`, falling back to the `token` query
/// parameter. Rejects with 401 when neither verifies.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<dyn IdentityProvider>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Arc::<dyn IdentityProvider>::from_ref(state);
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

        let principal = identity.resolve(token).map_err(AppError::from)?;
        tracing::Span::current().record("user_id", tracing::field::display(principal.user_id));
        Ok(Self(principal))
    }
}
