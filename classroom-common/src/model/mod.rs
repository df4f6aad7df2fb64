pub mod auth;
pub mod classroom;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::InvalidCredentialsError, classroom::InvalidClassYearError, post::EmptyContentError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error("An identifier was empty")]
    EmptyId,
    #[error("The field {0} is missing")]
    MissingField(&'static str),
    #[error(transparent)]
    EmptyContent(#[from] EmptyContentError),
    #[error(transparent)]
    ClassYear(#[from] InvalidClassYearError),
    #[error(transparent)]
    Credentials(#[from] InvalidCredentialsError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
}

/// Opaque identifier handed out by the classroom service, typed by what it
/// identifies.
#[derive_where(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(String, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into(), PhantomData)
    }

    /// Like [`Id::new`], but rejects the empty string.
    pub fn parse(id: impl Into<String>) -> Result<Self, ModelValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelValidationError::EmptyId);
        }

        Ok(Self::new(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<&str> for Id<Marker> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<String> for Id<Marker> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for String {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}
