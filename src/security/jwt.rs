//! JWT capability.
//!
//! HS256 tokens signed with a shared secret. [`TokenCodec::authenticate`]
//! is a middleware that verifies `Authorization: Bearer <token>` and puts
//! the [`Claims`] in the request extensions.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::{Capability, CapabilityError};
use crate::http::ApiResponse;
use crate::routing::Middleware;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_secs: u64,
    pub issuer: Option<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expires_in_secs: 3600,
            issuer: None,
        }
    }
}

/// Registered claims plus any custom ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Signs and verifies tokens.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<CodecInner>,
}

struct CodecInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expires_in_secs: u64,
    issuer: Option<String>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("expires_in_secs", &self.inner.expires_in_secs)
            .field("issuer", &self.inner.issuer)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Result<Self, CapabilityError> {
        if config.secret.is_empty() {
            return Err(CapabilityError::InvalidConfig {
                capability: Capability::Jwt,
                reason: "`secret` must not be empty".into(),
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            inner: Arc::new(CodecInner {
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.secret.as_bytes()),
                validation,
                expires_in_secs: config.expires_in_secs,
                issuer: config.issuer,
            }),
        })
    }

    /// Token for `subject` carrying `extra` claims.
    pub fn sign(
        &self,
        subject: &str,
        extra: Map<String, Value>,
    ) -> Result<String, CapabilityError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp: iat + self.inner.expires_in_secs,
            iss: self.inner.issuer.clone(),
            extra,
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, CapabilityError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.inner.encoding,
        )?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, CapabilityError> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)?;
        Ok(data.claims)
    }

    /// Middleware rejecting requests without a valid bearer token with
    /// `auth_required`.
    pub fn authenticate(&self) -> Middleware {
        let codec = self.clone();
        Middleware::from_fn("jwt", move |mut req: Request, next: Next| {
            let codec = codec.clone();
            async move {
                let token = req
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::trim);

                let Some(token) = token else {
                    return ApiResponse::AuthRequired("authentication required".into())
                        .into_response();
                };

                match codec.verify(token) {
                    Ok(claims) => {
                        req.extensions_mut().insert(claims);
                        next.run(req).await
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Rejected bearer token");
                        ApiResponse::AuthRequired("invalid or expired token".into()).into_response()
                    }
                }
            }
        })
    }
}
