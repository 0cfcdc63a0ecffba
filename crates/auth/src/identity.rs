use std::sync::Arc;

use wayfare_core::UserId;

/// Resolves the identity a request is acting as.
///
/// `None` means the caller is unauthenticated. Implementations must not cache
/// across requests; build one resolver per request (or per session).
pub trait IdentityResolver: Send + Sync {
    fn current(&self) -> Option<UserId>;
}

impl<R> IdentityResolver for Arc<R>
where
    R: IdentityResolver + ?Sized,
{
    fn current(&self) -> Option<UserId> {
        (**self).current()
    }
}

impl<R> IdentityResolver for &R
where
    R: IdentityResolver + ?Sized,
{
    fn current(&self) -> Option<UserId> {
        (**self).current()
    }
}

/// Identity fixed at construction time (request extensions, tests, jobs).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn user(user_id: UserId) -> Self {
        Self(Some(user_id))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityResolver for StaticIdentity {
    fn current(&self) -> Option<UserId> {
        self.0
    }
}
