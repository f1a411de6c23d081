use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Account;

/// Who the caller is. Every session carrier resolves to this same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub account_id: String,
    pub email: String,
    pub name: String,
    pub card_number: String,
}

impl From<&Account> for Identity {
    fn from(acc: &Account) -> Self {
        Self {
            account_id: acc.id.clone(),
            email: acc.email.clone(),
            name: acc.name.clone(),
            card_number: acc.card_number.clone(),
        }
    }
}

/// Signed payload of every session token. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "sub")]
    pub account_id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "cardNumber")]
    pub card_number: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionClaims {
    pub fn new(identity: &Identity, issued_at: i64, expires_at: i64) -> Self {
        Self {
            account_id: identity.account_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            card_number: identity.card_number.clone(),
            issued_at,
            expires_at,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            account_id: self.account_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            card_number: self.card_number.clone(),
        }
    }

    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.expires_at, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
