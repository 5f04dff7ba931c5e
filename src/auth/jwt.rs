//! Agent-claim validation, behind a trait so the production JWKS path
//! can be swapped in without touching route code.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::AuthError;

/// The token's registered claims plus every other claim it carries,
/// flattened so a configurable claim name (`RERUM_AGENT_CLAIM`) can be
/// looked up by name rather than hardcoded as a `agent` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Look up the named claim's string value, whether it's a
    /// registered field (`aud`/`iss`) or one carried in `extra`.
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        match name {
            "aud" => self.aud.as_deref(),
            "iss" => self.iss.as_deref(),
            _ => self.extra.get(name).and_then(Value::as_str),
        }
    }
}

/// Decodes and validates a bearer token down to its [`Claims`].
/// Implementors own the key material (an HMAC secret, or a JWKS cache
/// keyed by `kid`) and the algorithm; callers only need the claims.
#[async_trait]
pub trait AgentValidator: Send + Sync {
    async fn decode(&self, token: &str) -> Result<Claims, AuthError>;
}

/// HS256 validator for the in-memory/test deployment. Production
/// deployments validate against a fetched JWKS instead, implementing
/// the same [`AgentValidator`] trait.
pub struct HsAgentValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl HsAgentValidator {
    /// `audience`/`issuer` are validated only when configured — an
    /// unconfigured deployment keeps accepting tokens that don't carry
    /// those claims at all.
    pub fn new(secret: &str, audience: Option<&str>, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        if let Some(aud) = audience {
            validation.set_audience(&[aud]);
        }
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self { decoding_key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }
}

#[async_trait]
impl AgentValidator for HsAgentValidator {
    async fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Pull the bearer token out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    header_value.strip_prefix("Bearer ").ok_or(AuthError::MalformedHeader)
}
