//! Page access gate.
//!
//! `evaluate` is pure; `access_gate` is the axum middleware wrapping it. API
//! routes are not gated here, their handlers reject with 401 on their own.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use super::request_context::RequestContext;
use super::session::SessionManager;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard";

const PROTECTED: &[&str] = &["/dashboard", "/documents", "/profile", "/settings"];
const AUTH_ONLY: &[&str] = &["/login", "/register"];
const EXEMPT: &[&str] = &["/api", "/_next/static", "/_next/image", "/favicon.ico", "/public"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(String),
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p))
}

pub fn is_exempt(path: &str) -> bool {
    matches_any(path, EXEMPT)
}

pub fn evaluate(path: &str, has_identity: bool) -> GateDecision {
    if matches_any(path, PROTECTED) && !has_identity {
        return GateDecision::Redirect(format!("{}?callbackUrl={}", LOGIN_PATH, urlencoding::encode(path)));
    }
    if matches_any(path, AUTH_ONLY) && has_identity {
        return GateDecision::Redirect(HOME_PATH.to_string());
    }
    GateDecision::Allow
}

pub async fn access_gate(State(sessions): State<SessionManager>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_exempt(&path) {
        return next.run(req).await;
    }
    let ctx = RequestContext::from_headers(&sessions, req.headers());
    match evaluate(&path, ctx.is_authenticated()) {
        GateDecision::Allow => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        GateDecision::Redirect(to) => {
            debug!(target: "auth", %path, %to, "gate.redirect");
            Redirect::temporary(&to).into_response()
        }
    }
}
