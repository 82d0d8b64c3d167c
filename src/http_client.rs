use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthManager;
use crate::error::ApiError;

// Per-verb policy. GET is safe to re-issue aggressively; writes get fewer
// attempts and a longer per-attempt window.
const GET_RETRIES: u32 = 5;
const GET_TIMEOUT: Duration = Duration::from_secs(8);
pub(crate) const POST_RETRIES: u32 = 3;
pub(crate) const POST_TIMEOUT: Duration = Duration::from_secs(30);
const PATCH_RETRIES: u32 = 3;
const PATCH_TIMEOUT: Duration = Duration::from_secs(24);

/// HTTP client for Drupal resource endpoints.
///
/// Attaches the current bearer token when a session is live and applies the
/// fixed per-verb retry/timeout policy. Requests without a token go out
/// anonymous; whether they succeed is the endpoint's business.
pub struct DrupalHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Source of the `Authorization` header value
    auth: Arc<AuthManager>,
}

impl DrupalHttpClient {
    pub fn new(auth: Arc<AuthManager>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client, auth })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let builder = self.client.get(self.auth.config().endpoint(path));
        self.execute_json(builder, GET_RETRIES, GET_TIMEOUT).await
    }

    /// GET with query parameters appended to the endpoint URL.
    pub async fn get_with_params(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let builder = self
            .client
            .get(self.auth.config().endpoint(path))
            .query(params);
        self.execute_json(builder, GET_RETRIES, GET_TIMEOUT).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<Value, ApiError> {
        let builder = self
            .client
            .post(self.auth.config().endpoint(path))
            .json(data);
        self.execute_json(builder, POST_RETRIES, POST_TIMEOUT).await
    }

    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<Value, ApiError> {
        let builder = self
            .client
            .patch(self.auth.config().endpoint(path))
            .json(data);
        self.execute_json(builder, PATCH_RETRIES, PATCH_TIMEOUT)
            .await
    }

    async fn execute_json(
        &self,
        mut builder: RequestBuilder,
        max_retries: u32,
        per_attempt_timeout: Duration,
    ) -> Result<Value, ApiError> {
        if let Some(authorization) = self.auth.authorization().await {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let response = execute_with_policy(builder, max_retries, per_attempt_timeout).await?;
        decode_json_body(response).await
    }
}

/// Re-issue a request up to `max_retries` extra times, each attempt bounded
/// by `per_attempt_timeout`.
///
/// Timeouts, transport errors, and non-2xx statuses are all retryable; the
/// final failure is normalized through [`ApiError`]. No backoff between
/// attempts.
pub(crate) async fn execute_with_policy(
    builder: RequestBuilder,
    max_retries: u32,
    per_attempt_timeout: Duration,
) -> Result<Response, ApiError> {
    let mut attempt = 0;

    loop {
        let request = builder
            .try_clone()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("request body is not cloneable")))?;

        tracing::debug!(
            attempt = attempt + 1,
            max_attempts = max_retries + 1,
            "executing request attempt"
        );

        match tokio::time::timeout(per_attempt_timeout, request.send()).await {
            Err(_) => {
                if attempt < max_retries {
                    tracing::warn!(attempt = attempt + 1, "request attempt timed out, retrying");
                    attempt += 1;
                    continue;
                }
                return Err(ApiError::Timeout);
            }

            Ok(Err(e)) => {
                if attempt < max_retries {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "request attempt failed, retrying"
                    );
                    attempt += 1;
                    continue;
                }
                if e.is_timeout() {
                    return Err(ApiError::Timeout);
                }
                return Err(ApiError::Transport(e.to_string()));
            }

            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if attempt < max_retries {
                    tracing::warn!(
                        status = %status,
                        attempt = attempt + 1,
                        "received error response, retrying"
                    );
                    attempt += 1;
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = status.as_u16(),
                    body = %body,
                    total_attempts = attempt + 1,
                    "request failed after all attempts"
                );
                return Err(ApiError::from_status(status, &body));
            }
        }
    }
}

/// Decode a JSON response body, treating an empty body as `null`.
pub(crate) async fn decode_json_body(response: Response) -> Result<Value, ApiError> {
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Transport(format!("failed to read response body: {e}")))?;

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .map_err(|e| ApiError::Transport(format!("failed to decode response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retries_exhaust_then_normalize() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(3)
            .create_async()
            .await;

        let client = Client::new();
        let builder = client.get(format!("{}/missing", server.url()));
        let err = execute_with_policy(builder, 2, Duration::from_secs(2))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "not found");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_returns_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body(r#"{"id":1}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Client::new();
        let builder = client.get(format!("{}/ok", server.url()));
        let response = execute_with_policy(builder, 5, Duration::from_secs(2))
            .await
            .unwrap();
        let value = decode_json_body(response).await.unwrap();

        assert_eq!(value["id"], 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_null() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/empty")
            .with_status(200)
            .create_async()
            .await;

        let client = Client::new();
        let builder = client.get(format!("{}/empty", server.url()));
        let response = execute_with_policy(builder, 0, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(decode_json_body(response).await.unwrap(), Value::Null);
    }
}
