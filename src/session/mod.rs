//! Session integration
//!
//! Turns a login response into a normalized granted permission set, persists
//! it through a pluggable key/value storage, and publishes session changes
//! to the route guard.

mod login;
mod storage;
mod store;

pub use login::{LoginId, LoginPayload, PermissionList};
pub use storage::{keys, FileStorage, MemoryStorage, SessionStorage};
pub use store::{HydrationTicket, SessionInfo, SessionState, SessionStore};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage format error: {0}")]
    Format(#[from] serde_json::Error),
    #[error("no authenticated session")]
    NotAuthenticated,
}
