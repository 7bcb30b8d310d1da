//! Pluggable credential verification behind the `register` resource.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::{AuthConfig, AuthProvider};
use crate::dispatch::RequestContext;
use crate::session::SessionError;

pub mod external;
pub mod no_password;

pub use external::ExternalProvider;
pub use no_password::NoPasswordNeeded;

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials resolved to this identity
    Authenticated(String),
    /// The client must visit `redirect_to`; the flow resumes at `verify`
    Challenge { redirect_to: Url },
    /// No identity could be established
    Failed,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider answered with status {0}")]
    Provider(reqwest::StatusCode),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Verifies credentials and resolves session identities.
///
/// One instance is shared by every request, so implementations must be
/// reentrant.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, AuthError>;

    /// Complete a challenge started by `authenticate`; `None` means not verified
    async fn verify(&self, ctx: &mut RequestContext) -> Result<Option<String>, AuthError>;
}

/// Build the authenticator selected by configuration
pub fn from_config(config: &AuthConfig) -> anyhow::Result<Arc<dyn Authenticator>> {
    let authenticator: Arc<dyn Authenticator> = match config.provider {
        AuthProvider::None => Arc::new(NoPasswordNeeded),
        AuthProvider::External => Arc::new(ExternalProvider::from_config(config)?),
    };
    tracing::info!("Using '{}' authenticator", authenticator.name());
    Ok(authenticator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn default_config_selects_pass_through() {
        let config = AppConfig::development();
        let authenticator = from_config(&config.auth).unwrap();
        assert_eq!(authenticator.name(), "no-password");
    }

    #[test]
    fn external_provider_requires_urls() {
        let mut config = AppConfig::development().auth;
        config.provider = AuthProvider::External;
        assert!(from_config(&config).is_err());

        config.login_url = Some("https://id.example.com/login".to_string());
        config.verify_url = Some("https://id.example.com/verify".to_string());
        config.return_url = Some("http://localhost:3000/register/verify".to_string());
        let authenticator = from_config(&config).unwrap();
        assert_eq!(authenticator.name(), "external");
    }
}
