//! The validated agent identity extracted from a request's bearer token.

use super::errors::AuthError;
use super::jwt::{bearer_token, AgentValidator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentClaim(pub String);

impl AgentClaim {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate an `Authorization` header value and extract the agent
/// claim (named `agent_claim_name`, configurable via
/// `RERUM_AGENT_CLAIM`), for use by write-route extractors.
pub async fn extract_agent(
    validator: &dyn AgentValidator,
    header_value: Option<&str>,
    agent_claim_name: &str,
) -> Result<AgentClaim, AuthError> {
    let header_value = header_value.ok_or(AuthError::MissingHeader)?;
    let token = bearer_token(header_value)?;
    let claims = validator.decode(token).await?;
    let agent = claims.claim_str(agent_claim_name).unwrap_or_default();
    if agent.is_empty() {
        return Err(AuthError::MissingAgentClaim);
    }
    Ok(AgentClaim(agent.to_string()))
}
