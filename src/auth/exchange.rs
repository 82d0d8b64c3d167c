// Token endpoint exchange

use std::time::Duration;

use reqwest::Client;

use super::types::{TokenRequest, TokenResponse};
use crate::config::DrupalConfig;
use crate::error::ApiError;
use crate::http_client::execute_with_policy;

pub(crate) const TOKEN_RETRIES: u32 = 3;
pub(crate) const TOKEN_TIMEOUT: Duration = Duration::from_secs(16);

/// Submit a grant to the configured token endpoint.
///
/// Transport and decoding only; session state is the manager's business.
pub(crate) async fn request_token(
    client: &Client,
    config: &DrupalConfig,
    request: &TokenRequest,
) -> Result<TokenResponse, ApiError> {
    let url = config.endpoint(&config.token_path);
    tracing::debug!(grant_type = request.grant_type(), url = %url, "submitting token request");

    let builder = client.post(&url).form(request);
    let response = execute_with_policy(builder, TOKEN_RETRIES, TOKEN_TIMEOUT).await?;

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Transport(format!("failed to decode token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(ApiError::Transport(
            "token response contains no access token".to_string(),
        ));
    }

    Ok(token)
}
