//! Authentication collaborator and the explicit session object.
//!
//! A [`Session`] is passed to every record store call; nothing reads the
//! current user from ambient state. [`LocalAuth`] is an in-process
//! [`AuthService`] that keeps salted SHA-256 password digests in memory and
//! broadcasts session changes over a `watch` channel.
//!
//! `LocalAuth` is a stand-in for tests and single-process use. A single
//! salted SHA-256 round is not a password-hashing scheme; a hosted identity
//! provider (or a slow KDF) must back any deployment that holds real
//! credentials.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, watch};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::UserId;

pub const MIN_PASSWORD_LEN: usize = 6;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// A session for a known user id, e.g. one supplied by configuration.
    pub fn for_user(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            username: None,
            issued_at: Utc::now(),
        }
    }
}

pub trait AuthService: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<Session>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;

    /// The current session, if signed in.
    fn session(&self) -> Option<Session>;

    /// Session-change notifications. The receiver starts at the current value.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    /// The current session or an [`Error::Auth`].
    fn require_session(&self) -> Result<Session> {
        self.session()
            .ok_or_else(|| Error::Auth("not signed in".to_string()))
    }
}

struct Account {
    user_id: UserId,
    username: String,
    salt: Uuid,
    digest: Vec<u8>,
}

/// In-process authentication for local runs and tests.
pub struct LocalAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: watch::Sender<Option<Session>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current,
        }
    }
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthService for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        let accounts = self.accounts.lock().await;
        let account = accounts
            .get(&email)
            .filter(|a| digest(a.salt, password) == a.digest)
            .ok_or_else(|| Error::Auth("invalid email or password".to_string()))?;

        let session = Session {
            user_id: account.user_id,
            email,
            username: Some(account.username.clone()),
            issued_at: Utc::now(),
        };
        drop(accounts);

        info!(user_id = %session.user_id, "signed in");
        self.current.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Auth(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Auth("username must not be empty".to_string()));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(Error::Auth(format!("account already exists for {email}")));
        }

        let salt = Uuid::new_v4();
        let account = Account {
            user_id: UserId::new(),
            username: username.to_string(),
            salt,
            digest: digest(salt, password),
        };
        let session = Session {
            user_id: account.user_id,
            email: email.clone(),
            username: Some(account.username.clone()),
            issued_at: Utc::now(),
        };
        accounts.insert(email, account);
        drop(accounts);

        info!(user_id = %session.user_id, "signed up");
        self.current.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(previous) = self.current.send_replace(None) {
            info!(user_id = %previous.user_id, "signed out");
        }
        Ok(())
    }

    fn session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Auth(format!("invalid email address: {raw}")));
    }
    Ok(email)
}

fn digest(salt: Uuid, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
