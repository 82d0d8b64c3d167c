// Authentication module
// Owns the session lifecycle: token exchange, proactive refresh, status stream

mod exchange;
mod manager;
mod store;
mod types;

pub use manager::AuthManager;
pub use store::{MemoryTokenStore, TokenStore};
pub use types::{Credential, LoginStatus, TokenRequest, TokenResponse};
