//! Request-time authorization gate.
//!
//! Every inbound operation passes through `authorize` before touching the
//! vault. The decision order is fixed: inline Basic credentials win over a
//! session token, so a single endpoint serves programmatic and browser
//! callers without the caller declaring which mode it is in.

use crate::error::AppError;
use crate::tprintln;

use super::credentials::CredentialStore;
use super::principal::Principal;
use super::session::SessionStore;

/// API operations get a credential challenge on failure; interactive ones a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Api,
    Interactive,
}

#[derive(Debug, Clone)]
pub struct InlineCredentials {
    pub username: String,
    pub password: String,
}

/// Credentials as extracted from one request: either, both, or neither of an
/// inline username/password pair and an opaque session token.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub inline: Option<InlineCredentials>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authorized(Principal),
    Denied(AppError),
    RedirectToLogin,
}

/// Ordered decision, first match wins:
/// 1. inline credentials that verify;
/// 2. a session token that resolves;
/// 3. API class -> Denied (invalid credentials if some were presented,
///    otherwise an authentication challenge);
/// 4. Interactive class -> RedirectToLogin.
///
/// Role is attached to the outcome but not further gated on: admin and user
/// hold identical rights over the vault.
pub fn authorize(
    users: &CredentialStore,
    sessions: &SessionStore,
    creds: &RequestCredentials,
    class: OperationClass,
) -> AuthOutcome {
    let mut inline_rejected = false;
    if let Some(inline) = &creds.inline {
        match users.verify(&inline.username, &inline.password) {
            Ok(principal) => {
                tprintln!("gate.authorize path=inline user={}", principal.username);
                return AuthOutcome::Authorized(principal);
            }
            Err(_) => { inline_rejected = true; }
        }
    }
    if let Some(token) = &creds.session_token {
        if let Some(principal) = sessions.resolve(token) {
            tprintln!("gate.authorize path=session user={}", principal.username);
            return AuthOutcome::Authorized(principal);
        }
    }
    match class {
        OperationClass::Api => {
            if inline_rejected {
                AuthOutcome::Denied(AppError::invalid_credentials(
                    "invalid_credentials",
                    "invalid username or password",
                ))
            } else {
                AuthOutcome::Denied(AppError::auth("auth_required", "authentication required"))
            }
        }
        OperationClass::Interactive => AuthOutcome::RedirectToLogin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn fixtures() -> (CredentialStore, SessionStore) {
        let users = CredentialStore::new("admin", "root-pw", "user", "user-pw").expect("store");
        (users, SessionStore::default())
    }

    fn inline(u: &str, p: &str) -> RequestCredentials {
        RequestCredentials {
            inline: Some(InlineCredentials { username: u.into(), password: p.into() }),
            session_token: None,
        }
    }

    #[test]
    fn valid_inline_credentials_authorize() {
        let (users, sessions) = fixtures();
        match authorize(&users, &sessions, &inline("admin", "root-pw"), OperationClass::Api) {
            AuthOutcome::Authorized(p) => assert_eq!(p.role, Role::Admin),
            other => panic!("expected Authorized, got {:?}", other),
        }
    }

    #[test]
    fn inline_credentials_take_priority_over_session_token() {
        let (users, sessions) = fixtures();
        // Session belongs to "user"; inline credentials are admin's.
        let sess = sessions.create(Principal::new("user", Role::User));
        let creds = RequestCredentials {
            inline: Some(InlineCredentials { username: "admin".into(), password: "root-pw".into() }),
            session_token: Some(sess.token),
        };
        match authorize(&users, &sessions, &creds, OperationClass::Api) {
            AuthOutcome::Authorized(p) => assert_eq!(p.username, "admin"),
            other => panic!("expected inline principal to win, got {:?}", other),
        }
    }

    #[test]
    fn rejected_inline_falls_through_to_valid_session() {
        let (users, sessions) = fixtures();
        let sess = sessions.create(Principal::new("user", Role::User));
        let creds = RequestCredentials {
            inline: Some(InlineCredentials { username: "admin".into(), password: "wrong".into() }),
            session_token: Some(sess.token),
        };
        match authorize(&users, &sessions, &creds, OperationClass::Api) {
            AuthOutcome::Authorized(p) => assert_eq!(p.username, "user"),
            other => panic!("expected session principal, got {:?}", other),
        }
    }

    #[test]
    fn bare_api_request_gets_challenge() {
        let (users, sessions) = fixtures();
        match authorize(&users, &sessions, &RequestCredentials::default(), OperationClass::Api) {
            AuthOutcome::Denied(e) => assert_eq!(e.code_str(), "auth_required"),
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[test]
    fn rejected_inline_without_session_is_invalid_credentials() {
        let (users, sessions) = fixtures();
        match authorize(&users, &sessions, &inline("admin", "nope"), OperationClass::Api) {
            AuthOutcome::Denied(e) => assert_eq!(e.code_str(), "invalid_credentials"),
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[test]
    fn bare_interactive_request_redirects_to_login() {
        let (users, sessions) = fixtures();
        match authorize(&users, &sessions, &RequestCredentials::default(), OperationClass::Interactive) {
            AuthOutcome::RedirectToLogin => {}
            other => panic!("expected RedirectToLogin, got {:?}", other),
        }
    }
}
