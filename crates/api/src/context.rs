use wayfare_auth::StaticIdentity;
use wayfare_core::UserId;

/// Authenticated identity for a request.
///
/// Inserted by the auth middleware; present on every protected route. The raw
/// bearer token is kept so store calls can be made on the caller's behalf.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityContext {
    user_id: UserId,
    role: Option<String>,
    access_token: String,
}

impl IdentityContext {
    pub fn new(user_id: UserId, role: Option<String>, access_token: String) -> Self {
        Self {
            user_id,
            role,
            access_token,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn resolver(&self) -> StaticIdentity {
        StaticIdentity::user(self.user_id)
    }
}

impl std::fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityContext")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
