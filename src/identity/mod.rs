//! Central identity and session management for the vault.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod credentials;
mod session;
mod gate;

pub use principal::{Principal, Role};
pub use credentials::CredentialStore;
pub use session::{Session, SessionToken, SessionStore, SESSION_TTL};
pub use gate::{authorize, AuthOutcome, InlineCredentials, OperationClass, RequestCredentials};
