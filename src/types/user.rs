pub(crate) type Username = String;

#[derive(Clone, Debug, sqlx::FromRow)]
pub(crate) struct User {
    pub(crate) id: i32,
    pub(crate) username: Username,
    pub(crate) password_hash: String,
}

impl User {
    /// Stable identifier placed in credentials.
    pub(crate) fn subject(&self) -> String {
        self.id.to_string()
    }
}

/// Subject of the credential that authorized the current request.
#[derive(Clone, Debug)]
pub(crate) struct AuthenticatedSubject(pub(crate) String);
