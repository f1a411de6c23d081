//! Identity and session handling shared by every login path.
//! Keep the public surface thin and split implementation across sub-modules.

mod claims;
pub mod gate;
mod provider;
mod request_context;
mod session;
pub mod token;

pub use claims::{Identity, SessionClaims};
pub use gate::{access_gate, evaluate, GateDecision};
pub use provider::{CredentialsProvider, SessionUser, SessionView};
pub use request_context::{CurrentIdentity, RequestContext};
pub use session::{
    Carrier, CookiePolicy, IssuedSession, ResolvedSession, SessionManager, SessionSource, PROVIDER_SESSION_COOKIE,
    SESSION_COOKIE,
};
pub use token::{Clock, SystemClock, TokenService, DEFAULT_SESSION_TTL};
