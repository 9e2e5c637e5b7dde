//! Identity collaborator.
//!
//! [`IdentityService`] is the seam to whatever authenticates users. The core
//! only needs two things from it: who is acting right now, and a fresh
//! credential check before destructive operations.
//!
//! [`LocalIdentity`] is a self-contained implementation that keeps accounts in
//! the `users` collection of any [`PersistenceService`].

use crate::clock::{Clock, SystemClock};
use crate::error::{CrewtrackError, PermissionDenied, Result};
use crate::model::Actor;
use crate::paths;
use crate::store::{self, Filter, PersistenceService};
use crate::types::{Collection, Role};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// IdentityService
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The signed-in actor, or `PermissionDenied::Unauthenticated`.
    async fn current_actor(&self) -> Result<Actor>;

    /// Verify `credential` for `actor_id` again. Failure carries one of the
    /// credential sub-reasons of [`PermissionDenied`].
    async fn reauthenticate(&self, actor_id: &str, credential: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// UserAccount
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub role: Role,
    pub credential_salt: String,
    pub credential_digest: String,
    #[serde(default)]
    pub failed_reauth_attempts: u32,
    /// Set when the failure count reaches the limit; re-authentication is
    /// refused until this instant passes.
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.username.clone(), self.role)
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    fn verify(&self, credential: &str) -> bool {
        digest_credential(&self.credential_salt, credential) == self.credential_digest
    }
}

fn digest_credential(salt: &str, credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(credential.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// LocalIdentity
// ---------------------------------------------------------------------------

pub struct LocalIdentity<S> {
    store: Arc<S>,
    session: Option<String>,
    max_attempts: u32,
    lockout: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: PersistenceService> LocalIdentity<S> {
    pub fn new(store: Arc<S>, max_attempts: u32) -> Self {
        Self {
            store,
            session: None,
            max_attempts,
            lockout: Duration::minutes(15),
            clock: Arc::new(SystemClock),
        }
    }

    /// How long an account stays locked after hitting the failure limit.
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Bind the session to `username`. The account is resolved lazily.
    pub fn signed_in(mut self, username: impl Into<String>) -> Self {
        self.session = Some(username.into());
        self
    }

    pub async fn register(&self, username: &str, role: Role, password: &str) -> Result<UserAccount> {
        paths::validate_username(username)?;
        if password.is_empty() {
            return Err(CrewtrackError::validation("password must not be empty"));
        }
        if self.find_user(username).await?.is_some() {
            return Err(CrewtrackError::Validation(format!(
                "username '{username}' is already taken"
            )));
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        let mut account = UserAccount {
            id: String::new(),
            username: username.to_string(),
            role,
            credential_digest: digest_credential(&salt, password),
            credential_salt: salt,
            failed_reauth_attempts: 0,
            locked_until: None,
            created_at: self.clock.now(),
        };
        account.id = store::insert(self.store.as_ref(), Collection::Users, &account).await?;
        tracing::info!(user = %account.username, role = %role, "registered user");
        Ok(account)
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<UserAccount>> {
        let mut found: Vec<UserAccount> = store::find_as(
            self.store.as_ref(),
            Collection::Users,
            &[Filter::eq("username", username)],
        )
        .await?;
        Ok(found.pop())
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let mut users: Vec<UserAccount> =
            store::find_as(self.store.as_ref(), Collection::Users, &[]).await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn session_account(&self) -> Result<UserAccount> {
        let Some(username) = &self.session else {
            return Err(PermissionDenied::Unauthenticated.into());
        };
        self.find_user(username)
            .await?
            .ok_or_else(|| PermissionDenied::Unauthenticated.into())
    }

    async fn set_failed_attempts(
        &self,
        account: &UserAccount,
        count: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.store
            .update(
                Collection::Users,
                &account.id,
                store::patch(serde_json::json!({
                    "failed_reauth_attempts": count,
                    "locked_until": locked_until,
                })),
            )
            .await
    }
}

#[async_trait]
impl<S: PersistenceService> IdentityService for LocalIdentity<S> {
    async fn current_actor(&self) -> Result<Actor> {
        Ok(self.session_account().await?.actor())
    }

    async fn reauthenticate(&self, actor_id: &str, credential: &str) -> Result<()> {
        let account = self.session_account().await?;
        if account.id != actor_id {
            return Err(PermissionDenied::AccountMismatch.into());
        }
        if credential.is_empty() {
            return Err(PermissionDenied::InvalidCredential.into());
        }
        let now = self.clock.now();
        if account.is_locked(now) {
            tracing::warn!(user = %account.username, "re-authentication rate limited");
            return Err(PermissionDenied::TooManyAttempts.into());
        }
        // An expired lock starts a fresh count.
        let previous = if account.locked_until.is_some() {
            0
        } else {
            account.failed_reauth_attempts
        };
        if !account.verify(credential) {
            let attempts = previous + 1;
            let locked_until = (attempts >= self.max_attempts).then(|| now + self.lockout);
            self.set_failed_attempts(&account, attempts, locked_until)
                .await?;
            tracing::warn!(user = %account.username, attempts, "re-authentication failed");
            return Err(PermissionDenied::WrongCredential.into());
        }
        if account.failed_reauth_attempts > 0 || account.locked_until.is_some() {
            self.set_failed_attempts(&account, 0, None).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
