// Authentication module
// Session state, token persistence and single-flight refresh

mod manager;
mod refresh;
mod session;
mod slot;
mod token_store;
mod types;

pub use manager::AuthManager;
pub use refresh::{RefreshCoordinator, RefreshError};
pub use session::Session;
pub use slot::{DurableSlot, MemorySlot, SqliteSlot, COOKIES_KEY, IDENTITY_KEY, TOKEN_KEY};
pub use token_store::TokenStore;
pub use types::{Identity, SessionState, SigninRequest, SignupRequest, User, UserRole};
