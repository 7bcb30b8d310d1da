use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{AuthError, AuthOutcome, Authenticator};
use crate::config::{AuthConfig, ConfigError};
use crate::dispatch::RequestContext;

/// Session attribute holding the challenge awaiting its callback
pub const PENDING_VERIFICATION_KEY: &str = "pendingVerification";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingVerification {
    state: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
    #[serde(default)]
    identity: Option<String>,
}

/// Redirect-based login against an external identity provider.
///
/// `authenticate` sends the browser to `login_url` with `identity`,
/// `return_to` and a one-time `state`. The provider redirects back to
/// `return_url` (the `register/verify` action), whose query parameters are
/// posted to `verify_url`; a JSON answer `{"valid": true, "identity": ".."}`
/// completes the login.
pub struct ExternalProvider {
    client: reqwest::Client,
    login_url: Url,
    verify_url: Url,
    return_url: Url,
}

impl ExternalProvider {
    pub fn new(
        login_url: Url,
        verify_url: Url,
        return_url: Url,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            login_url,
            verify_url,
            return_url,
        })
    }

    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let login_url = required_url("AUTH_LOGIN_URL", config.login_url.as_deref())?;
        let verify_url = required_url("AUTH_VERIFY_URL", config.verify_url.as_deref())?;
        let return_url = required_url("AUTH_RETURN_URL", config.return_url.as_deref())?;
        Ok(Self::new(
            login_url,
            verify_url,
            return_url,
            Duration::from_secs(config.timeout_secs),
        )?)
    }
}

fn required_url(field: &'static str, value: Option<&str>) -> Result<Url, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(field))?;
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

#[async_trait]
impl Authenticator for ExternalProvider {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn authenticate(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        _password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let state = Uuid::new_v4().simple().to_string();
        let pending = PendingVerification {
            state: state.clone(),
            username: username.to_string(),
        };
        ctx.session_mut().set(PENDING_VERIFICATION_KEY, &pending).await?;

        let mut redirect_to = self.login_url.clone();
        redirect_to
            .query_pairs_mut()
            .append_pair("identity", username)
            .append_pair("return_to", self.return_url.as_str())
            .append_pair("state", &state);

        tracing::info!(
            "Redirecting '{}' to identity provider {}",
            username,
            self.login_url.host_str().unwrap_or_default()
        );
        Ok(AuthOutcome::Challenge { redirect_to })
    }

    async fn verify(&self, ctx: &mut RequestContext) -> Result<Option<String>, AuthError> {
        let pending: Option<PendingVerification> =
            ctx.session().get(PENDING_VERIFICATION_KEY).await?;
        // One attempt per challenge
        ctx.session_mut().remove(PENDING_VERIFICATION_KEY).await?;

        let Some(pending) = pending else {
            tracing::warn!("Verification callback without a pending challenge");
            return Ok(None);
        };
        if ctx.request_param("state") != Some(pending.state.as_str()) {
            tracing::warn!("Verification state mismatch for '{}'", pending.username);
            return Ok(None);
        }

        let response = self
            .client
            .post(self.verify_url.clone())
            .form(ctx.request_params())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(response.status()));
        }

        let verdict: VerifyResponse = response.json().await?;
        if !verdict.valid {
            tracing::warn!("Identity provider rejected verification for '{}'", pending.username);
            return Ok(None);
        }

        let identity = verdict
            .identity
            .or_else(|| ctx.request_param("identity").map(str::to_string))
            .unwrap_or(pending.username);
        Ok(Some(identity))
    }
}
