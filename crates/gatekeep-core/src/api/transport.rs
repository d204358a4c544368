use async_trait::async_trait;

use super::envelope::{ApiMessage, ApiReply, Credentials, LoginData, RefreshData};
use super::ApiError;

/// The three auth endpoints the session depends on.
///
/// `AuthClient` is the HTTP implementation; tests substitute their own.
#[async_trait]
pub trait CredentialTransport: Send + Sync {
    /// Exchange credentials for a token pair and the user profile.
    async fn login(&self, credentials: &Credentials) -> Result<ApiReply<LoginData>, ApiError>;

    /// Invalidate the server-side session behind `access_token`.
    async fn logout(&self, access_token: &str) -> Result<ApiMessage, ApiError>;

    /// Exchange the current access token for a renewed pair.
    async fn refresh(&self, access_token: &str) -> Result<ApiReply<RefreshData>, ApiError>;
}
