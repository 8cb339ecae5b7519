//! Opaque credentials and the sign-in seam.

use crate::error::ClientResult;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque credential passed with every store call.
/// Each store implementation knows which concrete type it expects and
/// downcasts to it; anything else is treated as anonymous.
#[derive(Clone)]
pub struct Credential(Arc<dyn Any + Send + Sync>);

impl Credential {
    /// Wraps a store-specific credential.
    pub fn new<T: Any + Send + Sync + 'static>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    /// Borrows the store-specific credential, if it has type `T`.
    pub fn downcast_ref<T: Any + Send + Sync + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both handles refer to the same credential.
    pub fn same_as(&self, other: &Credential) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// OAuth-style bearer token understood by the HTTP store.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl From<BearerToken> for Credential {
    fn from(token: BearerToken) -> Self {
        Credential::new(token)
    }
}

/// Produces a credential, typically by running an interactive sign-in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Runs the sign-in flow. Failures are reported as
    /// [`ClientError::Auth`](crate::ClientError::Auth).
    async fn sign_in(&self) -> ClientResult<Credential>;
}
