use async_trait::async_trait;

use super::{AuthError, AuthOutcome, Authenticator};
use crate::dispatch::RequestContext;

/// Accepts any non-empty username; the password is ignored
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPasswordNeeded;

#[async_trait]
impl Authenticator for NoPasswordNeeded {
    fn name(&self) -> &'static str {
        "no-password"
    }

    async fn authenticate(
        &self,
        _ctx: &mut RequestContext,
        username: &str,
        _password: &str,
    ) -> Result<AuthOutcome, AuthError> {
        if username.is_empty() {
            return Ok(AuthOutcome::Failed);
        }
        Ok(AuthOutcome::Authenticated(username.to_string()))
    }

    async fn verify(&self, _ctx: &mut RequestContext) -> Result<Option<String>, AuthError> {
        // Nothing is ever pending
        Ok(None)
    }
}
