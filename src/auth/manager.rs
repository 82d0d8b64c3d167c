use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::exchange;
use super::store::TokenStore;
use super::types::{Credential, LoginStatus, TokenRequest, TokenResponse};
use crate::config::DrupalConfig;
use crate::error::ApiError;
use crate::http_client::{decode_json_body, execute_with_policy, POST_RETRIES, POST_TIMEOUT};

/// Seconds subtracted from `expires_in` so the proactive refresh lands
/// before the server invalidates the old token.
const REFRESH_MARGIN_SECS: u64 = 30;

const FORGOT_PATH: &str = "user/api/forgot";
const RESTORE_PATH: &str = "user/api/restore";

/// Mutable session owned by the manager: the in-memory credential, the
/// pending refresh timer, and the generation stamp that invalidates stale
/// exchanges.
struct Session {
    credential: Option<Credential>,
    refresh_timer: Option<JoinHandle<()>>,
    generation: u64,
}

/// Owns the authentication lifecycle against a Drupal backend.
///
/// One instance per client runtime. State transitions are published on a
/// replay-latest channel: a subscriber obtained through
/// [`AuthManager::login_status`] sees the current state immediately, then
/// every later transition.
pub struct AuthManager {
    config: DrupalConfig,

    /// Injected refresh-token persistence
    store: Arc<dyn TokenStore>,

    /// Dedicated client for token and account endpoints
    client: Client,

    session: Mutex<Session>,

    status_tx: watch::Sender<LoginStatus>,

    /// Handle the refresh timer uses to find its way back to the manager.
    /// Weak so a pending timer does not keep a dropped manager alive.
    self_ref: Weak<AuthManager>,
}

impl AuthManager {
    pub fn new(config: DrupalConfig, store: Arc<dyn TokenStore>) -> Result<Arc<Self>, ApiError> {
        let client = Client::builder()
            .build()
            .context("failed to create HTTP client")?;

        // The stream starts at Refreshing; initialize() is expected to
        // resolve it one way or the other at startup.
        let (status_tx, _) = watch::channel(LoginStatus::Refreshing);

        Ok(Arc::new_cyclic(|self_ref| Self {
            config,
            store,
            client,
            session: Mutex::new(Session {
                credential: None,
                refresh_timer: None,
                generation: 0,
            }),
            status_tx,
            self_ref: self_ref.clone(),
        }))
    }

    /// Connection settings this manager was built with.
    pub fn config(&self) -> &DrupalConfig {
        &self.config
    }

    /// Replay-latest stream of session state changes.
    pub fn login_status(&self) -> watch::Receiver<LoginStatus> {
        self.status_tx.subscribe()
    }

    /// Current `Authorization` header value, if a session is live.
    pub async fn authorization(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .credential
            .as_ref()
            .map(Credential::header_value)
    }

    /// Attempt silent re-authentication from the persisted refresh token.
    ///
    /// Called once at application startup. Never fails: a missing token or
    /// a failed exchange degrades to `LoggedOut`.
    pub async fn initialize(&self) {
        tracing::info!("drupal client initialized");
        self.refresh().await;
    }

    /// Exchange username and password for a session.
    ///
    /// The error is surfaced to the caller; the failure transition to
    /// `LoggedOut` is published on the status stream independently.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let request = TokenRequest::password_grant(&self.config, username, password);
        self.exchange(request).await
    }

    /// Drop the session immediately and discard the persisted refresh token.
    ///
    /// The state transition is synchronous; token deletion runs best-effort
    /// in the background and is only logged on failure.
    pub async fn logout(&self) {
        {
            let mut session = self.session.lock().await;
            session.generation += 1;
            if let Some(timer) = session.refresh_timer.take() {
                timer.abort();
            }
            session.credential = None;
        }
        self.status_tx.send_replace(LoginStatus::LoggedOut);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.delete_refresh_token().await {
                Ok(()) => tracing::info!("stale refresh token removed"),
                Err(e) => tracing::warn!(error = %e, "failed to remove stale refresh token"),
            }
        });
    }

    /// Request a password-reset mail for `username`.
    ///
    /// Not gated on session state. `base_url` is the address the backend
    /// embeds in the reset link; the caller computes it.
    pub async fn forgot_password(
        &self,
        username: &str,
        base_url: &str,
    ) -> Result<Value, ApiError> {
        self.account_post(
            FORGOT_PATH,
            &json!({
                "username": username,
                "url": base_url,
            }),
        )
        .await
    }

    /// Submit a reset token together with the new password.
    pub async fn restore_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Value, ApiError> {
        self.account_post(
            RESTORE_PATH,
            &json!({
                "token": token,
                "password": new_password,
            }),
        )
        .await
    }

    /// Anonymous POST to an account endpoint with the write policy.
    async fn account_post(&self, path: &str, data: &Value) -> Result<Value, ApiError> {
        let builder = self.client.post(self.config.endpoint(path)).json(data);
        let response = execute_with_policy(builder, POST_RETRIES, POST_TIMEOUT).await?;
        decode_json_body(response).await
    }

    /// Re-enter the token exchange using the persisted refresh token.
    ///
    /// Returns a boxed future to type-erase this edge of the
    /// refresh -> exchange -> complete_exchange -> (spawned) refresh cycle,
    /// which otherwise leaves `Send` inference unable to terminate.
    fn refresh(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            match self.store.get_refresh_token().await {
                Ok(Some(token)) => {
                    let request = TokenRequest::refresh_grant(&self.config, &token);
                    if let Err(e) = self.exchange(request).await {
                        tracing::warn!(error = %e, "silent re-authentication failed");
                    }
                }
                Ok(None) => {
                    self.status_tx.send_replace(LoginStatus::LoggedOut);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read persisted refresh token");
                    self.status_tx.send_replace(LoginStatus::LoggedOut);
                }
            }
        })
    }

    /// Token exchange state machine.
    ///
    /// Publishes `Refreshing`, submits the grant, then applies the outcome
    /// unless a newer login or logout superseded this exchange in the
    /// meantime.
    async fn exchange(&self, request: TokenRequest) -> Result<(), ApiError> {
        let generation = {
            let mut session = self.session.lock().await;
            session.generation += 1;
            if let Some(timer) = session.refresh_timer.take() {
                timer.abort();
            }
            session.generation
        };

        self.status_tx.send_replace(LoginStatus::Refreshing);
        tracing::info!(grant_type = request.grant_type(), "requesting access token");

        match exchange::request_token(&self.client, &self.config, &request).await {
            Ok(response) => {
                self.complete_exchange(generation, response).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "token exchange failed");
                self.abandon_session(generation).await;
                Err(e)
            }
        }
    }

    /// Success path: store the credential, persist the rotated refresh
    /// token, arm the proactive refresh timer, publish `LoggedIn`.
    async fn complete_exchange(&self, generation: u64, response: TokenResponse) {
        let delay = refresh_delay(response.expires_in);

        let mut session = self.session.lock().await;
        if session.generation != generation {
            tracing::debug!("discarding stale token exchange result");
            return;
        }

        session.credential = Some(Credential {
            token_type: response.token_type.clone(),
            access_token: response.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in as i64),
        });

        if let Err(e) = self.store.set_refresh_token(&response.refresh_token).await {
            tracing::warn!(error = %e, "failed to persist refresh token");
        }

        if let Some(timer) = session.refresh_timer.take() {
            timer.abort();
        }
        tracing::debug!(delay_secs = delay.as_secs(), "scheduling proactive token refresh");
        let weak = self.self_ref.clone();
        session.refresh_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            // The timer may already be running while a newer exchange aborts
            // it; re-check the generation before refreshing.
            if manager.session.lock().await.generation != generation {
                return;
            }
            manager.refresh().await;
        }));
        drop(session);

        tracing::info!("access token renewed");
        self.status_tx.send_replace(LoginStatus::LoggedIn);
    }

    /// Failure path: drop the credential, publish `LoggedOut`, and discard
    /// the persisted refresh token so the next startup does not replay a
    /// grant the server already rejected.
    async fn abandon_session(&self, generation: u64) {
        {
            let mut session = self.session.lock().await;
            if session.generation != generation {
                tracing::debug!("discarding stale token exchange failure");
                return;
            }
            session.credential = None;
        }
        self.status_tx.send_replace(LoginStatus::LoggedOut);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.delete_refresh_token().await {
                Ok(()) => tracing::info!("stale refresh token removed"),
                Err(e) => tracing::warn!(error = %e, "failed to remove stale refresh token"),
            }
        });
    }
}

/// Delay before the proactive refresh: `expires_in` minus the safety
/// margin, clamped at zero so short-lived tokens refresh immediately.
fn refresh_delay(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in.saturating_sub(REFRESH_MARGIN_SECS))
}
