//! HS256 session tokens.
//!
//! Expiry is checked here against an injectable `Clock` rather than by
//! `jsonwebtoken` itself, so a token is expired exactly when `now >= exp`
//! (no leeway) and tests can move time.

use std::fmt;
#[cfg(test)]
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{Identity, SessionClaims};
use crate::error::AuthError;

/// Default session lifetime: one day.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current unix time in seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 { chrono::Utc::now().timestamp() }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualClock(AtomicI64);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start: i64) -> Self { Self(AtomicI64::new(start)) }
    pub(crate) fn advance(&self, d: Duration) { self.0.fetch_add(d.as_secs() as i64, Ordering::SeqCst); }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> i64 { self.0.load(Ordering::SeqCst) }
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService").field("ttl", &self.ttl).field("clock", &self.clock).finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        if secret.is_empty() {
            bail!("session secret must not be empty");
        }
        if ttl.as_secs() == 0 {
            bail!("session ttl must be at least one second");
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            clock,
        })
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn now(&self) -> i64 { self.clock.now() }

    /// Fresh claims for `identity`, valid for the configured ttl from now.
    pub fn claims_for(&self, identity: &Identity) -> SessionClaims {
        let iat = self.clock.now();
        SessionClaims::new(identity, iat, iat + self.ttl.as_secs() as i64)
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| anyhow!("token encoding failed: {}", e))
    }

    pub fn issue(&self, identity: &Identity) -> Result<(String, SessionClaims)> {
        let claims = self.claims_for(identity);
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;
        let claims = data.claims;
        if claims.account_id.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        if self.clock.now() >= claims.expires_at {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            account_id: "acc-1".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            card_number: "IAR/12345".into(),
        }
    }

    fn service(clock: Arc<ManualClock>) -> TokenService {
        TokenService::with_clock("test-secret", Duration::from_secs(3600), clock).unwrap()
    }

    #[test]
    fn roundtrip_until_expiry() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let svc = service(clock.clone());
        let (token, claims) = svc.issue(&alice()).unwrap();
        assert_eq!(claims.expires_at - claims.issued_at, 3600);

        assert_eq!(svc.verify(&token).unwrap(), claims);
        clock.advance(Duration::from_secs(3599));
        assert_eq!(svc.verify(&token).unwrap().identity(), alice());
        clock.advance(Duration::from_secs(1));
        assert_eq!(svc.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn rejects_foreign_and_tampered_tokens() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let svc = service(clock.clone());
        let other = TokenService::with_clock("other-secret", Duration::from_secs(3600), clock).unwrap();
        let (token, _) = other.issue(&alice()).unwrap();
        assert_eq!(svc.verify(&token), Err(AuthError::TokenInvalid));

        let (mine, _) = svc.issue(&alice()).unwrap();
        let mut parts: Vec<&str> = mine.split('.').collect();
        let forged_payload = {
            let (_, c) = other.issue(&Identity { account_id: "acc-2".into(), ..alice() }).unwrap();
            c
        };
        let forged = svc.sign(&forged_payload).unwrap();
        let forged_body = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_body;
        assert_eq!(svc.verify(&parts.join(".")), Err(AuthError::TokenInvalid));

        assert_eq!(svc.verify("garbage"), Err(AuthError::TokenInvalid));
        assert_eq!(svc.verify(""), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(TokenService::new("", DEFAULT_SESSION_TTL).is_err());
        assert!(TokenService::new("x", Duration::from_secs(0)).is_err());
    }
}
