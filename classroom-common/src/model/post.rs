use crate::model::{
    Id, ModelValidationError,
    user::{AuthorRef, UserMarker},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub content: String,
    pub author: AuthorRef,
    pub likes: Vec<AuthorRef>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub content: String,
    pub author: AuthorRef,
    pub likes: Vec<AuthorRef>,
    pub like_count: Option<u32>,
    pub has_liked: Option<bool>,
    pub comments: Vec<Comment>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Post {
    /// Whether `user` likes this post. A flag reported by the service wins;
    /// otherwise the like set is searched. Without a user this is `false`.
    #[must_use]
    pub fn has_liked_by(&self, user: Option<&Id<UserMarker>>) -> bool {
        if let Some(has_liked) = self.has_liked {
            return has_liked;
        }

        user.is_some_and(|user| self.is_liked_by(user))
    }

    #[must_use]
    pub fn is_liked_by(&self, user: &Id<UserMarker>) -> bool {
        self.likes.iter().any(|like| like.id() == user)
    }

    #[must_use]
    pub fn like_total(&self) -> u32 {
        self.like_count.unwrap_or_else(|| count(&self.likes))
    }

    /// Rewrites a present `like_count` to the size of the like set.
    pub fn sync_like_count(&mut self) {
        if self.like_count.is_some() {
            self.like_count = Some(count(&self.likes));
        }
    }

    #[must_use]
    pub fn comment(&self, id: &Id<CommentMarker>) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == id)
    }
}

/// A post as a mutation reply may carry it: only `id` is guaranteed, every
/// other field is `None` when the reply left it out.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostPatch {
    pub id: Id<PostMarker>,
    pub content: Option<String>,
    pub author: Option<AuthorRef>,
    pub likes: Option<Vec<AuthorRef>>,
    pub like_count: Option<u32>,
    pub has_liked: Option<bool>,
    pub comments: Option<Vec<Comment>>,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
}

impl PostPatch {
    #[must_use]
    pub fn new(id: Id<PostMarker>) -> Self {
        Self {
            id,
            content: None,
            author: None,
            likes: None,
            like_count: None,
            has_liked: None,
            comments: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// A complete post, for replies that introduce a post not held locally.
    pub fn into_post(self) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: self.id,
            content: self.content.unwrap_or_default(),
            author: self.author.ok_or(ModelValidationError::MissingField("author"))?,
            likes: self.likes.unwrap_or_default(),
            like_count: self.like_count,
            has_liked: self.has_liked,
            comments: self.comments.unwrap_or_default(),
            created_at: self
                .created_at
                .ok_or(ModelValidationError::MissingField("created_at"))?,
            updated_at: self.updated_at,
        })
    }
}

impl From<Post> for PostPatch {
    fn from(value: Post) -> Self {
        Self {
            id: value.id,
            content: Some(value.content),
            author: Some(value.author),
            likes: Some(value.likes),
            like_count: value.like_count,
            has_liked: value.has_liked,
            comments: Some(value.comments),
            created_at: Some(value.created_at),
            updated_at: value.updated_at,
        }
    }
}

fn count(likes: &[AuthorRef]) -> u32 {
    u32::try_from(likes.len()).unwrap_or(u32::MAX)
}

/// Text of a new post or comment: trimmed and never empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostContent(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The content is empty")]
pub struct EmptyContentError;

impl PostContent {
    pub fn new(content: &str) -> Result<Self, EmptyContentError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(EmptyContentError);
        }

        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for PostContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostContent::new(&inner).map_err(serde::de::Error::custom)
    }
}
