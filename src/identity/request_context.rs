use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use super::claims::{Identity, SessionClaims};
use super::session::{SessionManager, SessionSource};
use crate::error::{AppError, AuthError};

/// Per-request identity, resolved once by the access gate and stored in the
/// request extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub claims: Option<SessionClaims>,
    pub source: Option<SessionSource>,
}

impl RequestContext {
    pub fn anonymous() -> Self { Self::default() }

    pub fn from_headers(sessions: &SessionManager, headers: &axum::http::HeaderMap) -> Self {
        match sessions.resolve(headers) {
            Some(r) => Self { identity: Some(r.identity()), claims: Some(r.claims), source: Some(r.source) },
            None => Self::anonymous(),
        }
    }

    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }
}

fn context_of<S>(parts: &Parts, state: &S) -> RequestContext
where
    SessionManager: FromRef<S>,
{
    if let Some(ctx) = parts.extensions.get::<RequestContext>() {
        return ctx.clone();
    }
    RequestContext::from_headers(&SessionManager::from_ref(state), &parts.headers)
}

/// Extractor for handlers that need a signed-in caller; rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match context_of(parts, state).identity {
            Some(identity) => Ok(CurrentIdentity(identity)),
            None => Err(AuthError::Unauthorized.into()),
        }
    }
}

/// Full context including claims; never rejects.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(context_of(parts, state))
    }
}
