use anyhow::{Context, Result};

/// Connection settings for a Drupal backend.
///
/// Injected by the host application at startup, or loaded from the
/// environment with [`DrupalConfig::from_env`].
#[derive(Clone, Debug)]
pub struct DrupalConfig {
    /// Base API URL, without a trailing slash
    pub url: String,

    /// OAuth2 consumer id
    pub client_id: String,

    /// OAuth2 consumer secret
    pub client_secret: String,

    /// Scope requested on password grants
    pub scope: Option<String>,

    /// Token endpoint path, relative to `url`
    pub token_path: String,
}

impl DrupalConfig {
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
        token_path: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope,
            token_path: token_path.into(),
        }
    }

    /// Load configuration from environment variables, reading `.env` first.
    ///
    /// `DRUPAL_URL`, `DRUPAL_CLIENT_ID` and `DRUPAL_CLIENT_SECRET` are
    /// required; `DRUPAL_SCOPE` is optional and `DRUPAL_TOKEN_PATH` defaults
    /// to `oauth/token`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = DrupalConfig::new(
            std::env::var("DRUPAL_URL").context("DRUPAL_URL is required")?,
            std::env::var("DRUPAL_CLIENT_ID").context("DRUPAL_CLIENT_ID is required")?,
            std::env::var("DRUPAL_CLIENT_SECRET").context("DRUPAL_CLIENT_SECRET is required")?,
            std::env::var("DRUPAL_SCOPE").ok(),
            std::env::var("DRUPAL_TOKEN_PATH").unwrap_or_else(|_| "oauth/token".to_string()),
        );

        config.validate()?;
        Ok(config)
    }

    /// Absolute URL for a path relative to the configured base.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("base URL must not be empty");
        }
        if self.client_id.is_empty() {
            anyhow::bail!("client_id must not be empty");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("client_secret must not be empty");
        }
        Ok(())
    }
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
    fn test_endpoint_joining() {
        let config = config();
        assert_eq!(
            config.endpoint("oauth/token"),
            "https://cms.example.org/oauth/token"
        );
        assert_eq!(
            config.endpoint("/node/1"),
            "https://cms.example.org/node/1"
        );
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let config = DrupalConfig::new("https://cms.example.org/", "id", "secret", None, "oauth/token");
        assert_eq!(config.url, "https://cms.example.org");
        assert_eq!(
            config.endpoint("user/api/forgot"),
            "https://cms.example.org/user/api/forgot"
        );
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut broken = config();
        broken.url = String::new();
        assert!(broken.validate().is_err());

        let mut broken = config();
        broken.client_id = String::new();
        assert!(broken.validate().is_err());

        let mut broken = config();
        broken.client_secret = String::new();
        assert!(broken.validate().is_err());
    }
}
