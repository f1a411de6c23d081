//! Credentials provider: the second login flow, carried by its own cookie.
//!
//! `authorize` checks email + password, `jwt_callback` shapes the claims at
//! sign-in and `session_callback` projects claims onto what `/api/auth/session`
//! returns. Tokens are issued through the same `SessionManager` as the plain
//! cookie login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::claims::{Identity, SessionClaims};
use super::session::{IssuedSession, SessionManager};
use crate::accounts::CredentialStore;
use crate::error::{AppError, AppResult, AuthError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub card_number: String,
}

/// Externally visible session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CredentialsProvider {
    accounts: CredentialStore,
    sessions: SessionManager,
}

impl CredentialsProvider {
    pub fn new(accounts: CredentialStore, sessions: SessionManager) -> Self {
        Self { accounts, sessions }
    }

    /// `Ok(None)` for bad or blank credentials; errors only for internal failures.
    pub async fn authorize(&self, email: &str, password: &str) -> AppResult<Option<Identity>> {
        match self.accounts.authenticate(email, password).await {
            Ok(account) => Ok(Some(Identity::from(&account))),
            Err(AppError::Auth { .. }) | Err(AppError::UserInput { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Claims for a new sign-in. With a fresh `user` its id and card number are
    /// written over whatever `claims` carried.
    pub fn jwt_callback(&self, mut claims: SessionClaims, user: Option<&Identity>) -> SessionClaims {
        if let Some(user) = user {
            claims.account_id = user.account_id.clone();
            claims.card_number = user.card_number.clone();
            claims.email = user.email.clone();
            claims.name = user.name.clone();
        }
        claims
    }

    pub fn session_callback(&self, claims: &SessionClaims) -> SessionView {
        SessionView {
            user: SessionUser {
                id: claims.account_id.clone(),
                name: claims.name.clone(),
                email: claims.email.clone(),
                card_number: claims.card_number.clone(),
            },
            expires: claims.expires_at_utc(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<IssuedSession> {
        let identity = self.authorize(email, password).await?.ok_or(AuthError::InvalidCredentials)?;
        let base = self.sessions.tokens().claims_for(&identity);
        let claims = self.jwt_callback(base, Some(&identity));
        let issued = self.sessions.issue_claims(claims)?;
        debug!(target: "auth", account = %identity.account_id, "provider.sign_in");
        Ok(issued)
    }
}
