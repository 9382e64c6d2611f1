/// Signed-in identity, injected into the session rather than read from a
/// global.
///
/// `IdentityContext` owns a `watch` channel; the authorization gate and the
/// dispatcher hold receivers and always see the latest sign-in.

use std::fmt;
use tokio::sync::watch;

use crate::curation::UserId;

/// Current user, if any. Both fields are required to be signed in.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: Option<UserId>,
    pub id_token: Option<String>,
}

impl SignedInUser {
    pub fn signed_in(user_id: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            user_id: Some(UserId::new(user_id)),
            id_token: Some(id_token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// User id and token, or `None` unless both are present and non-empty.
    pub fn credentials(&self) -> Option<(&UserId, &str)> {
        match (&self.user_id, &self.id_token) {
            (Some(user), Some(token)) if !user.as_str().is_empty() && !token.is_empty() => {
                Some((user, token.as_str()))
            }
            _ => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.credentials().is_some()
    }
}

// Never print the token.
impl fmt::Debug for SignedInUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedInUser")
            .field("user_id", &self.user_id)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Publisher of the current identity.
pub struct IdentityContext {
    tx: watch::Sender<SignedInUser>,
}

impl IdentityContext {
    pub fn new(initial: SignedInUser) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn anonymous() -> Self {
        Self::new(SignedInUser::anonymous())
    }

    /// Replace the identity. Subscribers are woken only on an actual change.
    pub fn set(&self, user: SignedInUser) {
        self.tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                log::debug!("Identity changed: signed in = {}", user.is_signed_in());
                *current = user;
                true
            }
        });
    }

    pub fn current(&self) -> SignedInUser {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SignedInUser> {
        self.tx.subscribe()
    }
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
