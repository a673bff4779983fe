use lunora_core::model::UserId;

/// Explicit authentication context for data access.
///
/// Every storage-facing call names the identity it acts for by taking one
/// of these; there is no ambient signed-in-user state. The context is built
/// once per authenticated session by the embedding application and torn
/// down with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: UserId,
}

impl AuthContext {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Whether this context owns a record stored under `owner_id`.
    #[must_use]
    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id.as_str() == owner_id
    }
}
