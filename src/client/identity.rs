//! Identity oracle: who is driving the portal.
//!
//! The portal only needs to know whether someone is signed in and what to call them.
//! Identity changes are pushed through a watch channel; an [`IdentitySubscription`]
//! unsubscribes when dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::AppError;

/// A signed-in user. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    pub subject: String,
}

#[async_trait]
pub trait IdentityOracle: Send + Sync {
    async fn sign_in(&self) -> Result<Identity, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    /// Stream of identity changes, starting with the current state.
    fn subscribe(&self) -> IdentitySubscription;
}

/// Receiving end of identity changes.
pub struct IdentitySubscription {
    rx: watch::Receiver<Option<Identity>>,
}

impl IdentitySubscription {
    pub fn new(rx: watch::Receiver<Option<Identity>>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. `None` once the oracle is gone.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Snapshot of the current identity as a session value.
    pub fn session(&self) -> Session {
        Session {
            identity: self.current(),
        }
    }
}

/// Session state handed to the portal flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

/// Oracle backed by an identity supplied up front (command-line flags, environment).
pub struct ConfiguredIdentityOracle {
    configured: Option<Identity>,
    tx: watch::Sender<Option<Identity>>,
}

impl ConfiguredIdentityOracle {
    /// Starts signed out; `sign_in` yields `configured`.
    pub fn new(configured: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { configured, tx }
    }
}

#[async_trait]
impl IdentityOracle for ConfiguredIdentityOracle {
    async fn sign_in(&self) -> Result<Identity, AppError> {
        let identity = self.configured.clone().ok_or_else(|| {
            AppError::Unauthorized("No identity configured for sign-in".to_string())
        })?;

        tracing::info!(subject = %identity.subject, "Signed in as {}", identity.display_name);
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.tx.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription::new(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asha() -> Identity {
        Identity {
            display_name: "Asha".to_string(),
            subject: "asha@example.edu".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_in_and_out_are_observed() {
        let oracle = ConfiguredIdentityOracle::new(Some(asha()));
        let mut subscription = oracle.subscribe();
        assert!(!subscription.session().is_signed_in());

        oracle.sign_in().await.unwrap();
        assert_eq!(subscription.changed().await, Some(Some(asha())));
        assert_eq!(subscription.session().identity(), Some(&asha()));

        oracle.sign_out().await.unwrap();
        assert_eq!(subscription.changed().await, Some(None));
    }

    #[tokio::test]
    async fn test_sign_in_without_identity_fails() {
        let oracle = ConfiguredIdentityOracle::new(None);
        assert!(matches!(oracle.sign_in().await, Err(AppError::Unauthorized(_))));
        assert_eq!(oracle.subscribe().current(), None);
    }

    #[tokio::test]
    async fn test_subscription_ends_with_oracle() {
        let oracle = ConfiguredIdentityOracle::new(Some(asha()));
        let mut subscription = oracle.subscribe();
        drop(oracle);
        assert_eq!(subscription.changed().await, None);
    }
}
