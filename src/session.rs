//! Session State
//!
//! The identity provider is external; this module only holds the current
//! session and lets controllers observe sign-in, sign-out and user switches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::UserId;

/// Signed-in user as handed out by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    /// Bearer token for the hosted backend
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Session {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: None,
            access_token: None,
        }
    }
}

/// Read side of the session, shared with backends and controllers
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<Session>;

    fn watch(&self) -> watch::Receiver<Option<Session>>;

    fn user_id(&self) -> Option<UserId> {
        self.current().map(|s| s.user_id)
    }
}

/// Owned session slot
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionHandle {
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(session: Session) -> Self {
        let handle = Self::signed_out();
        handle.sign_in(session);
        handle
    }

    pub fn sign_in(&self, session: Session) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&session) {
                return false;
            }
            *current = Some(session);
            true
        });
    }

    pub fn sign_out(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }
}

impl SessionProvider for SessionHandle {
    fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
