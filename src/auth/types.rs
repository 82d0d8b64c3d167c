// Session and token wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DrupalConfig;

/// Externally observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    LoggedOut,
    Refreshing,
    LoggedIn,
}

impl LoginStatus {
    /// Numeric code on the public status surface: -1 logged out,
    /// 0 refreshing, 1 logged in.
    pub fn code(self) -> i8 {
        match self {
            LoginStatus::LoggedOut => -1,
            LoginStatus::Refreshing => 0,
            LoginStatus::LoggedIn => 1,
        }
    }
}

/// Bearer credential held in memory while a session is live. Never
/// persisted; the refresh token is what survives restarts.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token_type: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Form-encoded body for the token endpoint. Fields not used by the grant
/// are omitted from the encoding.
#[derive(Debug, Serialize)]
pub struct TokenRequest {
    grant_type: &'static str,
    client_id: String,
    client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl TokenRequest {
    pub fn password_grant(config: &DrupalConfig, username: &str, password: &str) -> Self {
        Self {
            grant_type: "password",
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            refresh_token: None,
        }
    }

    pub fn refresh_grant(config: &DrupalConfig, refresh_token: &str) -> Self {
        Self {
            grant_type: "refresh_token",
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: None,
            username: None,
            password: None,
            refresh_token: Some(refresh_token.to_string()),
        }
    }

    pub fn grant_type(&self) -> &'static str {
        self.grant_type
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DrupalConfig {
        DrupalConfig::new(
            "https://cms.example.org",
            "frontend",
            "s3cret",
            Some("editor".to_string()),
            "oauth/token",
        )
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LoginStatus::LoggedOut.code(), -1);
        assert_eq!(LoginStatus::Refreshing.code(), 0);
        assert_eq!(LoginStatus::LoggedIn.code(), 1);
    }

    #[test]
    fn test_credential_header_value() {
        let credential = Credential {
            token_type: "Bearer".to_string(),
            access_token: "abc123".to_string(),
            expires_at: Utc::now(),
        };
        assert_eq!(credential.header_value(), "Bearer abc123");
    }

    #[test]
    fn test_password_grant_encoding() {
        let request = TokenRequest::password_grant(&config(), "alice", "secret");
        let encoded = serde_urlencoded::to_string(&request).unwrap();

        assert!(encoded.contains("grant_type=password"));
        assert!(encoded.contains("client_id=frontend"));
        assert!(encoded.contains("client_secret=s3cret"));
        assert!(encoded.contains("scope=editor"));
        assert!(encoded.contains("username=alice"));
        assert!(encoded.contains("password=secret"));
        assert!(!encoded.contains("refresh_token"));
    }

    #[test]
    fn test_refresh_grant_encoding() {
        let request = TokenRequest::refresh_grant(&config(), "refresh-1");
        let encoded = serde_urlencoded::to_string(&request).unwrap();

        assert!(encoded.contains("grant_type=refresh_token"));
        assert!(encoded.contains("refresh_token=refresh-1"));
        assert!(!encoded.contains("username"));
        assert!(!encoded.contains("password="));
        assert!(!encoded.contains("scope"));
    }

    #[test]
    fn test_password_grant_without_scope() {
        let mut config = config();
        config.scope = None;
        let request = TokenRequest::password_grant(&config, "alice", "secret");
        let encoded = serde_urlencoded::to_string(&request).unwrap();
        assert!(!encoded.contains("scope"));
    }

    #[test]
    fn test_token_response_decoding() {
        let response: TokenResponse = serde_json::from_str(
            r#"{
                "token_type": "Bearer",
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 300
            }"#,
        )
        .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 300);
    }
}
