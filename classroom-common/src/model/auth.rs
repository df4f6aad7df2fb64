use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// Bearer token issued by the classroom service on sign in.
#[derive(Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_token_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"[redacted]").finish()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidCredentialsError {
    #[error("The email address is empty")]
    MissingEmail,
    #[error("The password is empty")]
    MissingPassword,
}

#[derive(Clone, Eq, PartialEq, Hash, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Result<Self, InvalidCredentialsError> {
        if email.trim().is_empty() {
            return Err(InvalidCredentialsError::MissingEmail);
        }
        if password.trim().is_empty() {
            return Err(InvalidCredentialsError::MissingPassword);
        }

        Ok(Self {
            email: email.to_owned(),
            password: password.to_owned(),
        })
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}
