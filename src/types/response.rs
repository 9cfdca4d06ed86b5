use serde::Serialize;

use crate::token::authority::IssuedToken;

#[derive(Serialize)]
pub(crate) struct Token {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) expires_in: i64,
}

impl From<IssuedToken> for Token {
    fn from(issued: IssuedToken) -> Self {
        let expires_in = issued.expires_in();

        Self {
            access_token: issued.credential,
            token_type: "Bearer",
            expires_in,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct Validation {
    pub(crate) valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) subject: Option<String>,
}

impl Validation {
    pub(crate) fn valid(subject: String) -> Self {
        Self {
            valid: true,
            subject: Some(subject),
        }
    }

    pub(crate) fn invalid() -> Self {
        Self {
            valid: false,
            subject: None,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct Message {
    pub(crate) message: &'static str,
}

impl Message {
    pub(crate) fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[derive(Serialize)]
pub(crate) struct Health {
    pub(crate) status: &'static str,
    pub(crate) store: &'static str,
}
