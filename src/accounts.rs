//! Account registration, login and self-service profile operations.
//!
//! Every password hash and verification runs on the blocking pool; nothing else
//! here blocks.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, AuthError};
use crate::security::{self, PasswordHasher};
use crate::storage::{Account, SharedStore, StoreError, StoredAccount};

/// Attempts at finding an unused card number before giving up.
const CARD_NUMBER_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    /// Accepted only when equal to the stored address.
    pub email: Option<String>,
}

/// Produces candidate card numbers; the store decides which are free.
pub type CardNumberSource = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

#[derive(Clone)]
pub struct CredentialStore {
    store: SharedStore,
    hasher: PasswordHasher,
    card_numbers: CardNumberSource,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").field("store", &self.store).field("hasher", &self.hasher).finish_non_exhaustive()
    }
}

fn required(value: &str, field: &'static str) -> Result<(), AuthError> {
    if value.trim().is_empty() { Err(AuthError::MissingField(field)) } else { Ok(()) }
}

impl CredentialStore {
    pub fn new(store: SharedStore, hasher: PasswordHasher) -> Self {
        Self { store, hasher, card_numbers: Arc::new(security::generate_card_number) }
    }

    pub fn with_card_numbers(mut self, source: CardNumberSource) -> Self {
        self.card_numbers = source;
        self
    }

    async fn hash(&self, password: &str) -> AppResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let phc = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(phc)
    }

    async fn verify(&self, password: &str, phc: Option<String>) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let ok = tokio::task::spawn_blocking(move || match phc {
            Some(phc) => hasher.verify(&password, &phc),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await
        .map_err(anyhow::Error::from)?;
        Ok(ok)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<Account> {
        required(name, "name")?;
        required(email, "email")?;
        if password.is_empty() {
            return Err(AuthError::MissingField("password").into());
        }
        let name = security::check_name(name)?;
        let email = security::normalize_email(email);
        if !security::is_valid_email(&email) {
            return Err(AuthError::EmailInvalid.into());
        }
        security::check_password_length(password)?;
        if self.store.account_by_email(&email).is_some() {
            return Err(AuthError::EmailTaken.into());
        }

        let password_hash = self.hash(password).await?;
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        for attempt in 1..=CARD_NUMBER_ATTEMPTS {
            let account = Account {
                id: id.clone(),
                name: name.clone(),
                email: email.clone(),
                card_number: (self.card_numbers)()?,
                phone: String::new(),
                profile_image: String::new(),
                created_at: now,
                updated_at: now,
            };
            match self.store.insert_account(StoredAccount::new(account.clone(), password_hash.clone())) {
                Ok(()) => {
                    info!(account = %account.id, card = %account.card_number, "account.register");
                    return Ok(account);
                }
                Err(StoreError::CardNumberTaken) => {
                    debug!(attempt, "card number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        warn!(attempts = CARD_NUMBER_ATTEMPTS, "no free card number found");
        Err(AppError::from(anyhow!("card number space exhausted after {} attempts", CARD_NUMBER_ATTEMPTS)))
    }

    /// Unknown email and wrong password fail identically. Blank input is a
    /// validation error and never reaches the lookup.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Account> {
        required(email, "email")?;
        if password.is_empty() {
            return Err(AuthError::MissingField("password").into());
        }
        let stored = self.store.account_by_email(email);
        let phc = stored.as_ref().map(|s| s.password_hash.clone());
        let ok = self.verify(password, phc).await?;
        match stored {
            Some(s) if ok => Ok(s.account),
            _ => {
                debug!(target: "auth", "login rejected");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    pub async fn change_password(&self, account_id: &str, current: &str, new: &str, confirm: &str) -> AppResult<()> {
        for (value, field) in [(current, "currentPassword"), (new, "newPassword"), (confirm, "confirmPassword")] {
            if value.is_empty() {
                return Err(AuthError::MissingField(field).into());
            }
        }
        if new != confirm {
            return Err(AuthError::Mismatch.into());
        }
        security::check_password_length(new)?;
        security::check_password_strength(new)?;

        let stored = self.store.account(account_id).ok_or(AuthError::AccountNotFound)?;
        if !self.verify(current, Some(stored.password_hash.clone())).await? {
            return Err(AuthError::CurrentIncorrect.into());
        }
        let password_hash = self.hash(new).await?;
        self.store
            .update_account(account_id, move |acc| acc.password_hash = password_hash)?
            .ok_or(AuthError::AccountNotFound)?;
        info!(account = %account_id, "account.password_changed");
        Ok(())
    }

    pub fn get_profile(&self, account_id: &str) -> AppResult<Account> {
        let stored = self.store.account(account_id).ok_or(AuthError::AccountNotFound)?;
        Ok(stored.account)
    }

    pub fn update_profile(&self, account_id: &str, update: ProfileUpdate) -> AppResult<Account> {
        let name = security::check_name(&update.name)?;
        let stored = self.store.account(account_id).ok_or(AuthError::AccountNotFound)?;
        if let Some(email) = update.email.as_deref() {
            if security::normalize_email(email) != stored.account.email {
                return Err(AuthError::EmailImmutable.into());
            }
        }
        let phone = update.phone.map(|p| p.trim().to_string());
        let profile_image = update.profile_image.map(|p| p.trim().to_string());
        let updated = self
            .store
            .update_account(account_id, move |acc| {
                acc.account.name = name;
                if let Some(phone) = phone {
                    acc.account.phone = phone;
                }
                if let Some(image) = profile_image {
                    acc.account.profile_image = image;
                }
            })?
            .ok_or(AuthError::AccountNotFound)?;
        debug!(account = %account_id, "account.profile_updated");
        Ok(updated.account)
    }
}
