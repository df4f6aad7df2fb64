use classroom_common::model::{
    Id, ModelValidationError,
    auth::AuthToken,
    post::{Comment, Post, PostPatch},
    user::{AuthorRef, UserProfile},
};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

/// `{ "data": ... }` wrapper the classroom service puts around every reply.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

/// A status as the service sends it. Mutation replies may leave out any field
/// but `_id`.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_by: Option<AuthorRef>,
    #[serde(default)]
    pub like: Option<Vec<Option<AuthorRef>>>,
    #[serde(default)]
    pub like_count: Option<u32>,
    #[serde(default)]
    pub has_liked: Option<bool>,
    #[serde(default)]
    pub comment: Option<Vec<CommentRecord>>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub created_by: AuthorRef,
    #[serde(default)]
    pub like: Option<Vec<Option<AuthorRef>>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SignInRecord {
    pub token: AuthToken,
    #[serde(flatten)]
    pub profile: UserProfile,
}

fn likes(record: Option<Vec<Option<AuthorRef>>>) -> Vec<AuthorRef> {
    record.into_iter().flatten().flatten().collect()
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::parse(value.id)?,
            content: value.content,
            author: value.created_by,
            likes: likes(value.like),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<StatusRecord> for PostPatch {
    type Error = ModelValidationError;

    fn try_from(value: StatusRecord) -> Result<Self, Self::Error> {
        let comments = value
            .comment
            .map(|comments| {
                comments
                    .into_iter()
                    .map(Comment::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Self {
            id: Id::parse(value.id)?,
            content: value.content,
            author: value.created_by,
            likes: value.like.map(|like| likes(Some(like))),
            like_count: value.like_count,
            has_liked: value.has_liked,
            comments,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Feed listings carry complete statuses; `createdBy` and `createdAt` are
/// required there.
impl TryFrom<StatusRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: StatusRecord) -> Result<Self, Self::Error> {
        PostPatch::try_from(value)?.into_post()
    }
}

/// Whether a reply entity carries the non-empty `_id` needed to patch local
/// state with it.
pub(crate) fn has_usable_id(value: &Value) -> bool {
    value
        .get("_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use crate::record::{Envelope, SignInRecord, StatusRecord, has_usable_id};
    use classroom_common::model::{
        Id, ModelValidationError,
        post::{Post, PostPatch},
        user::AuthorRef,
    };
    use serde_json::{Value, json};

    fn status_json() -> Value {
        json!({
            "_id": "p1",
            "content": "hello",
            "createdBy": {"_id": "u1", "email": "u1@example.com"},
            "like": ["u2", null, {"_id": "u3", "email": "u3@example.com"}],
            "likeCount": 2,
            "comment": [{
                "_id": "c1",
                "content": "hi",
                "createdBy": "u2",
                "like": [],
                "createdAt": "2025-01-01T10:00:00.000Z"
            }],
            "createdAt": "2025-01-01T09:00:00.000Z",
            "updatedAt": "2025-01-01T11:00:00Z"
        })
    }

    #[test]
    fn status_converts_into_post() {
        let record: StatusRecord = serde_json::from_value(status_json()).unwrap();
        let post = Post::try_from(record).unwrap();

        assert_eq!(post.id, Id::new("p1"));
        assert!(post.author.is_resolved());
        assert_eq!(post.likes.len(), 2);
        assert_eq!(post.likes[0], AuthorRef::Reference(Id::new("u2")));
        assert_eq!(post.like_count, Some(2));
        assert_eq!(post.has_liked, None);
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].author, AuthorRef::Reference(Id::new("u2")));
        assert!(post.updated_at.is_some());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let record: StatusRecord = serde_json::from_value(json!({
            "_id": "p1",
            "content": "hello",
            "createdBy": "u1",
            "like": null,
            "createdAt": "2025-01-01T09:00:00Z"
        }))
        .unwrap();
        let post = Post::try_from(record).unwrap();

        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn partial_reply_keeps_absent_fields_absent() {
        let record: StatusRecord = serde_json::from_value(json!({
            "_id": "p1",
            "like": ["u1"],
            "likeCount": 1
        }))
        .unwrap();
        let patch = PostPatch::try_from(record.clone()).unwrap();

        let mut expected = PostPatch::new(Id::new("p1"));
        expected.likes = Some(vec![AuthorRef::Reference(Id::new("u1"))]);
        expected.like_count = Some(1);
        assert_eq!(patch, expected);

        assert_eq!(
            Post::try_from(record),
            Err(ModelValidationError::MissingField("author"))
        );
    }

    #[test]
    fn present_but_empty_collections_stay_present() {
        let record: StatusRecord =
            serde_json::from_value(json!({ "_id": "p1", "like": [], "comment": [] })).unwrap();
        let patch = PostPatch::try_from(record).unwrap();

        assert_eq!(patch.likes, Some(Vec::new()));
        assert_eq!(patch.comments, Some(Vec::new()));
        assert_eq!(patch.content, None);
    }

    #[test]
    fn empty_id_is_invalid() {
        let mut value = status_json();
        value["_id"] = json!("");
        let record: StatusRecord = serde_json::from_value(value).unwrap();

        assert_eq!(Post::try_from(record), Err(ModelValidationError::EmptyId));
    }

    #[test]
    fn usable_id_detection() {
        assert!(has_usable_id(&status_json()));
        assert!(!has_usable_id(&json!({"_id": ""})));
        assert!(!has_usable_id(&json!({"message": "ok"})));
        assert!(!has_usable_id(&json!(null)));
    }

    #[test]
    fn envelope_without_data() {
        let envelope: Envelope<Value> = serde_json::from_str(r#"{"message":"done"}"#).unwrap();

        assert_eq!(envelope.data, None);
        assert_eq!(envelope.message.as_deref(), Some("done"));
    }

    #[test]
    fn sign_in_splits_token_from_profile() {
        let record: SignInRecord = serde_json::from_value(json!({
            "_id": "u1",
            "firstname": "Somchai",
            "lastname": "Jaidee",
            "email": "somchai@example.com",
            "role": "student",
            "type": "student",
            "confirmed": true,
            "token": "t1"
        }))
        .unwrap();

        assert_eq!(record.token.as_token_str(), "t1");
        assert_eq!(record.profile.id, Id::new("u1"));
    }
}
