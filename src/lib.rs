// Drupal client - library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;

pub use auth::{AuthManager, LoginStatus, MemoryTokenStore, TokenStore};
pub use config::DrupalConfig;
pub use error::ApiError;
pub use http_client::DrupalHttpClient;
