use crate::{
    config::{ClientConfig, ConfigError},
    record::{Envelope, SignInRecord, StatusRecord, has_usable_id},
    session::SignedIn,
};
use async_trait::async_trait;
use classroom_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthToken, Credentials},
        classroom::{ClassYear, ClassroomMember},
        post::{CommentMarker, Post, PostContent, PostMarker, PostPatch},
        user::UserProfile,
    },
    util::PositiveDuration,
};
use reqwest::{Method, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

const DEFAULT_ERROR_MESSAGE: &str = "The classroom service returned an error";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Building the HTTP client failed: {0}")]
    Build(#[source] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} replied with status {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },
    #[error("{path} replied without data")]
    MissingData { path: String },
    #[error("Response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response contained an invalid entity: {0}")]
    Model(#[from] ModelValidationError),
}

/// The calls the feed makes against the classroom service.
///
/// Mutations return the post fields the reply carried, or `Ok(None)` when the
/// reply has no identifiable or readable post; the caller then has to refetch
/// the feed.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn fetch_statuses(&self, token: &AuthToken) -> Result<Vec<Post>>;

    async fn create_status(&self, token: &AuthToken, content: &PostContent)
    -> Result<Option<PostPatch>>;

    async fn delete_status(&self, token: &AuthToken, id: &Id<PostMarker>) -> Result<()>;

    async fn like_status(&self, token: &AuthToken, id: &Id<PostMarker>) -> Result<Option<PostPatch>>;

    async fn unlike_status(&self, token: &AuthToken, id: &Id<PostMarker>)
    -> Result<Option<PostPatch>>;

    async fn create_comment(
        &self,
        token: &AuthToken,
        post_id: &Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<PostPatch>>;

    async fn delete_comment(
        &self,
        token: &AuthToken,
        comment_id: &Id<CommentMarker>,
        post_id: &Id<PostMarker>,
    ) -> Result<Option<PostPatch>>;
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_base_url(&config.api_url, config.request_timeout()?)
    }

    pub fn with_base_url(base_url: &str, timeout: PositiveDuration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout.as_std())
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&AuthToken>,
        body: Option<&Value>,
    ) -> Result<Vec<u8>> {
        debug!(%method, path, "Calling classroom service");

        let mut request = self
            .http
            .request(method, self.url(path))
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token.as_token_str());
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let request_error = |source| ClientError::Request {
            path: path.to_owned(),
            source,
        };
        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(request_error)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let message = if text.trim().is_empty() {
                DEFAULT_ERROR_MESSAGE.to_owned()
            } else {
                text.into_owned()
            };
            warn!(path, status = status.as_u16(), "Classroom service rejected request");

            return Err(ClientError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(bytes.to_vec())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&AuthToken>,
        body: Option<&Value>,
    ) -> Result<Envelope<T>> {
        let bytes = self.send(method, path, token, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a mutation whose reply may carry the updated post.
    async fn mutate_status(
        &self,
        method: Method,
        path: &str,
        token: &AuthToken,
        body: &Value,
    ) -> Result<Option<PostPatch>> {
        let envelope = self
            .call::<Value>(method, path, Some(token), Some(body))
            .await?;

        let Some(data) = envelope.data.filter(has_usable_id) else {
            debug!(path, "Reply carried no identifiable post");
            return Ok(None);
        };

        let patch = serde_json::from_value::<StatusRecord>(data)
            .map_err(ClientError::from)
            .and_then(|record| Ok(PostPatch::try_from(record)?));
        match patch {
            Ok(patch) => Ok(Some(patch)),
            Err(e) => {
                warn!(path, error = %e, "Reply post could not be read");
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SignedIn> {
        let body = serde_json::to_value(credentials)?;
        let envelope = self
            .call::<SignInRecord>(Method::POST, "/signin", None, Some(&body))
            .await?;
        let record = envelope.data.ok_or_else(|| ClientError::MissingData {
            path: String::from("/signin"),
        })?;

        Ok(SignedIn::new(record.profile, record.token))
    }

    pub async fn fetch_profile(&self, token: &AuthToken) -> Result<Option<UserProfile>> {
        let envelope = self
            .call::<UserProfile>(Method::GET, "/profile", Some(token), None)
            .await?;

        Ok(envelope.data)
    }

    pub async fn fetch_class_members(
        &self,
        token: &AuthToken,
        year: ClassYear,
    ) -> Result<Vec<ClassroomMember>> {
        let envelope = self
            .call::<Vec<ClassroomMember>>(
                Method::GET,
                &format!("/class/{year}"),
                Some(token),
                None,
            )
            .await?;

        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl FeedApi for ApiClient {
    async fn fetch_statuses(&self, token: &AuthToken) -> Result<Vec<Post>> {
        let envelope = self
            .call::<Vec<StatusRecord>>(Method::GET, "/status", Some(token), None)
            .await?;

        let posts = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_status(
        &self,
        token: &AuthToken,
        content: &PostContent,
    ) -> Result<Option<PostPatch>> {
        let body = json!({ "content": content });
        self.mutate_status(Method::POST, "/status", token, &body)
            .await
    }

    async fn delete_status(&self, token: &AuthToken, id: &Id<PostMarker>) -> Result<()> {
        self.send(Method::DELETE, &format!("/status/{id}"), Some(token), None)
            .await?;
        Ok(())
    }

    async fn like_status(&self, token: &AuthToken, id: &Id<PostMarker>) -> Result<Option<PostPatch>> {
        let body = json!({ "statusId": id });
        self.mutate_status(Method::POST, "/like", token, &body).await
    }

    async fn unlike_status(
        &self,
        token: &AuthToken,
        id: &Id<PostMarker>,
    ) -> Result<Option<PostPatch>> {
        let body = json!({ "statusId": id });
        self.mutate_status(Method::DELETE, "/like", token, &body)
            .await
    }

    async fn create_comment(
        &self,
        token: &AuthToken,
        post_id: &Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<PostPatch>> {
        let body = json!({ "statusId": post_id, "content": content });
        self.mutate_status(Method::POST, "/comment", token, &body)
            .await
    }

    async fn delete_comment(
        &self,
        token: &AuthToken,
        comment_id: &Id<CommentMarker>,
        post_id: &Id<PostMarker>,
    ) -> Result<Option<PostPatch>> {
        let body = json!({ "statusId": post_id });
        self.mutate_status(
            Method::DELETE,
            &format!("/comment/{comment_id}"),
            token,
            &body,
        )
        .await
    }
}
