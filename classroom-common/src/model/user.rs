use crate::model::Id;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: Id<UserMarker>,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Author {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// A user as referenced from a post, comment or like: the service sends either
/// the bare id or the populated record.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Reference(Id<UserMarker>),
    Resolved(Author),
}

impl AuthorRef {
    #[must_use]
    pub fn id(&self) -> &Id<UserMarker> {
        match self {
            AuthorRef::Reference(id) => id,
            AuthorRef::Resolved(author) => &author.id,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, AuthorRef::Resolved(_))
    }

    #[must_use]
    pub fn author(&self) -> Option<&Author> {
        match self {
            AuthorRef::Reference(_) => None,
            AuthorRef::Resolved(author) => Some(author),
        }
    }

    /// Keeps `previous` when it is the resolved record of the user `self` only
    /// references.
    #[must_use]
    pub fn retaining(self, previous: &AuthorRef) -> AuthorRef {
        match (self, previous) {
            (AuthorRef::Reference(id), AuthorRef::Resolved(author)) if author.id == id => {
                AuthorRef::Resolved(author.clone())
            }
            (incoming, _) => incoming,
        }
    }
}

impl From<Id<UserMarker>> for AuthorRef {
    fn from(value: Id<UserMarker>) -> Self {
        AuthorRef::Reference(value)
    }
}

impl From<Author> for AuthorRef {
    fn from(value: Author) -> Self {
        AuthorRef::Resolved(value)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: Id<UserMarker>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Education>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl UserProfile {
    #[must_use]
    pub fn full_name(&self) -> String {
        join_name(&self.firstname, &self.lastname)
    }
}

pub(crate) fn join_name(firstname: &str, lastname: &str) -> String {
    [firstname, lastname]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<School>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor: Option<Advisor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct School {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Advisor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
