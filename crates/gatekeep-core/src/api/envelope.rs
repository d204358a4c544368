//! Response envelope shared by every auth API endpoint.

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::TokenPair;

/// `{status, message, data}` wrapper returned by the auth API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReply<T> {
    #[serde(default, deserialize_with = "status_text")]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// Envelope without a payload, as returned by logout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default, deserialize_with = "status_text")]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(default)]
    pub user: serde_json::Value,
}

impl LoginData {
    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// Payload of a successful token refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl From<RefreshData> for TokenPair {
    fn from(data: RefreshData) -> Self {
        TokenPair::new(data.access_token, data.refresh_token)
    }
}

/// Login request body.
#[derive(Clone, Serialize)]
pub struct Credentials {
    #[serde(rename = "usernameOrEmail")]
    pub username_or_email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username_or_email", &self.username_or_email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The API reports `status` as either a word ("success") or an HTTP code.
pub(crate) fn status_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_reply() {
        let json = r#"{"status":"success","message":"Welcome back","data":{"accessToken":"A1","refreshToken":"R1","user":{"id":1,"name":"Ada"}}}"#;
        let reply: ApiReply<LoginData> = serde_json::from_str(json).expect("valid login reply");
        assert_eq!(reply.status.as_deref(), Some("success"));
        assert_eq!(reply.message.as_deref(), Some("Welcome back"));
        assert_eq!(reply.data.tokens(), TokenPair::new("A1", "R1"));
        assert_eq!(reply.data.user["id"], 1);
    }

    #[test]
    fn test_parse_numeric_status_and_missing_message() {
        let json = r#"{"status":200,"data":{"accessToken":"A2","refreshToken":"R2"}}"#;
        let reply: ApiReply<RefreshData> = serde_json::from_str(json).expect("valid refresh reply");
        assert_eq!(reply.status.as_deref(), Some("200"));
        assert!(reply.message.is_none());
        assert_eq!(TokenPair::from(reply.data), TokenPair::new("A2", "R2"));
    }

    #[test]
    fn test_parse_bare_message() {
        let reply: ApiMessage =
            serde_json::from_str(r#"{"status":"success","message":"Logged out","data":null}"#)
                .expect("valid logout reply");
        assert_eq!(reply.message.as_deref(), Some("Logged out"));

        let empty: ApiMessage = serde_json::from_str("{}").expect("empty object");
        assert!(empty.status.is_none());
    }

    #[test]
    fn test_credentials_body_and_debug() {
        let creds = Credentials::new("ada@example.org", "hunter2");
        let body = serde_json::to_value(&creds).expect("serializable");
        assert_eq!(body["usernameOrEmail"], "ada@example.org");
        assert_eq!(body["password"], "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
