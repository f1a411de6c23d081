use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use tracing::debug;

use super::claims::{Identity, SessionClaims};
use super::token::TokenService;
use crate::error::AuthError;

/// Cookie set by `POST /api/auth/login`.
pub const SESSION_COOKIE: &str = "token";
/// Cookie set by the credentials provider sign-in.
pub const PROVIDER_SESSION_COOKIE: &str = "digicard.session-token";

/// Where a session token travels between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Cookie,
    Provider,
}

impl Carrier {
    pub fn cookie_name(&self) -> &'static str {
        match self {
            Carrier::Cookie => SESSION_COOKIE,
            Carrier::Provider => PROVIDER_SESSION_COOKIE,
        }
    }
}

/// Which part of the request a resolved session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Cookie,
    Bearer,
    Provider,
}

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Adds `Secure`; on in production.
    pub secure: bool,
    pub same_site: &'static str,
}

impl Default for CookiePolicy {
    fn default() -> Self { Self { secure: false, same_site: "Lax" } }
}

impl CookiePolicy {
    pub fn production() -> Self { Self { secure: true, ..Default::default() } }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub claims: SessionClaims,
    pub source: SessionSource,
}

impl ResolvedSession {
    pub fn identity(&self) -> Identity { self.claims.identity() }
}

/// The one session abstraction every login path goes through.
#[derive(Debug, Clone)]
pub struct SessionManager {
    tokens: Arc<TokenService>,
    cookies: CookiePolicy,
}

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = v.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

impl SessionManager {
    pub fn new(tokens: TokenService, cookies: CookiePolicy) -> Self {
        Self { tokens: Arc::new(tokens), cookies }
    }

    pub fn tokens(&self) -> &TokenService { &self.tokens }

    pub fn ttl(&self) -> Duration { self.tokens.ttl() }

    pub fn issue(&self, identity: &Identity) -> Result<IssuedSession> {
        let (token, claims) = self.tokens.issue(identity)?;
        debug!(target: "auth", account = %claims.account_id, exp = claims.expires_at, "session.issue");
        Ok(IssuedSession { token, claims })
    }

    /// Sign claims that were prepared elsewhere (provider callbacks).
    pub fn issue_claims(&self, claims: SessionClaims) -> Result<IssuedSession> {
        let token = self.tokens.sign(&claims)?;
        debug!(target: "auth", account = %claims.account_id, exp = claims.expires_at, "session.issue");
        Ok(IssuedSession { token, claims })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.tokens.verify(token)
    }

    fn cookie_header(&self, name: &str, value: &str, max_age: u64) -> Result<HeaderValue> {
        let mut s = format!("{}={}; HttpOnly; Path=/; Max-Age={}; SameSite={}", name, value, max_age, self.cookies.same_site);
        if self.cookies.secure {
            s.push_str("; Secure");
        }
        HeaderValue::from_str(&s).map_err(|e| anyhow!("invalid cookie header: {}", e))
    }

    /// `Set-Cookie` value carrying `token` for the session ttl.
    pub fn set_cookie_value(&self, carrier: Carrier, token: &str) -> Result<HeaderValue> {
        self.cookie_header(carrier.cookie_name(), token, self.ttl().as_secs())
    }

    /// `Set-Cookie` value that removes the carrier cookie.
    pub fn clear_cookie_value(&self, carrier: Carrier) -> Result<HeaderValue> {
        self.cookie_header(carrier.cookie_name(), "", 0)
    }

    pub fn attach_to_response(&self, headers: &mut HeaderMap, carrier: Carrier, token: &str) -> Result<()> {
        headers.append(SET_COOKIE, self.set_cookie_value(carrier, token)?);
        Ok(())
    }

    pub fn clear(&self, headers: &mut HeaderMap, carrier: Carrier) -> Result<()> {
        headers.append(SET_COOKIE, self.clear_cookie_value(carrier)?);
        Ok(())
    }

    /// Identity of the request: `token` cookie, then bearer header, then provider
    /// cookie. The first candidate that verifies wins; bad ones are skipped.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<ResolvedSession> {
        let candidates = [
            (SessionSource::Cookie, parse_cookie(headers, SESSION_COOKIE)),
            (SessionSource::Bearer, bearer_token(headers)),
            (SessionSource::Provider, parse_cookie(headers, PROVIDER_SESSION_COOKIE)),
        ];
        for (source, token) in candidates {
            let Some(token) = token else { continue; };
            match self.tokens.verify(&token) {
                Ok(claims) => return Some(ResolvedSession { claims, source }),
                Err(e) => debug!(target: "auth", ?source, reason = e.code(), "session.skip"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::token::ManualClock;

    fn manager(secure: bool) -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let tokens = TokenService::with_clock("secret", Duration::from_secs(86_400), clock.clone()).unwrap();
        let policy = if secure { CookiePolicy::production() } else { CookiePolicy::default() };
        (SessionManager::new(tokens, policy), clock)
    }

    fn ident(id: &str) -> Identity {
        Identity { account_id: id.into(), email: format!("{id}@example.com"), name: id.into(), card_number: "IAR/10000".into() }
    }

    fn with_cookie(headers: &mut HeaderMap, name: &str, value: &str) {
        headers.append(COOKIE, HeaderValue::from_str(&format!("{name}={value}")).unwrap());
    }

    #[test]
    fn cookie_attributes() {
        let (sm, _) = manager(false);
        let v = sm.set_cookie_value(Carrier::Cookie, "abc").unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("token=abc;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Path=/"));
        assert!(s.contains("Max-Age=86400"));
        assert!(!s.contains("Secure"));

        let (sm, _) = manager(true);
        assert!(sm.set_cookie_value(Carrier::Provider, "abc").unwrap().to_str().unwrap().contains("; Secure"));
        let cleared = sm.clear_cookie_value(Carrier::Cookie).unwrap();
        assert!(cleared.to_str().unwrap().starts_with("token=;"));
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn resolution_order() {
        let (sm, _) = manager(false);
        let a = sm.issue(&ident("a")).unwrap();
        let b = sm.issue(&ident("b")).unwrap();
        let c = sm.issue(&ident("c")).unwrap();

        let mut h = HeaderMap::new();
        with_cookie(&mut h, SESSION_COOKIE, &a.token);
        h.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", b.token)).unwrap());
        with_cookie(&mut h, PROVIDER_SESSION_COOKIE, &c.token);
        let r = sm.resolve(&h).unwrap();
        assert_eq!(r.source, SessionSource::Cookie);
        assert_eq!(r.claims.account_id, "a");

        // a broken cookie falls through to the bearer header
        let mut h = HeaderMap::new();
        with_cookie(&mut h, SESSION_COOKIE, "not-a-token");
        h.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", b.token)).unwrap());
        with_cookie(&mut h, PROVIDER_SESSION_COOKIE, &c.token);
        let r = sm.resolve(&h).unwrap();
        assert_eq!(r.source, SessionSource::Bearer);
        assert_eq!(r.identity(), ident("b"));

        let mut h = HeaderMap::new();
        with_cookie(&mut h, PROVIDER_SESSION_COOKIE, &c.token);
        assert_eq!(sm.resolve(&h).unwrap().source, SessionSource::Provider);

        assert!(sm.resolve(&HeaderMap::new()).is_none());
    }

    #[test]
    fn expired_sessions_resolve_to_nobody() {
        let (sm, clock) = manager(false);
        let a = sm.issue(&ident("a")).unwrap();
        let mut h = HeaderMap::new();
        with_cookie(&mut h, SESSION_COOKIE, &a.token);
        assert!(sm.resolve(&h).is_some());
        clock.advance(Duration::from_secs(86_400));
        assert!(sm.resolve(&h).is_none());
    }

    #[test]
    fn parses_multi_cookie_headers() {
        let mut h = HeaderMap::new();
        h.insert(COOKIE, HeaderValue::from_static("theme=dark; token=xyz; other=1"));
        assert_eq!(parse_cookie(&h, "token").as_deref(), Some("xyz"));
        assert_eq!(parse_cookie(&h, "missing"), None);
        h.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(parse_cookie(&h, "token"), None);
    }
}
