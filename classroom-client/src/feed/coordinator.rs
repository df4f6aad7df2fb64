use crate::{
    client::{ClientError, FeedApi},
    feed::{
        Alert, AlertKind, FeedError, Outcome,
        state::{FeedState, Flag, FlagGuard},
    },
    session::Session,
};
use classroom_common::model::{
    Id,
    auth::AuthToken,
    post::{CommentMarker, Post, PostContent, PostMarker},
    user::{AuthorRef, UserMarker},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Applies feed mutations against the classroom service and keeps the
/// [`FeedState`] consistent with the replies.
///
/// The state lock is never held across a call to the service, so mutations on
/// the same post may overlap. Each one reverts to what it saw when it started.
#[derive(Debug)]
pub struct FeedCoordinator<A> {
    api: A,
    session: Arc<Session>,
    state: Arc<Mutex<FeedState>>,
    detached: CancellationToken,
}

impl<A: FeedApi> FeedCoordinator<A> {
    #[must_use]
    pub fn new(api: A, session: Arc<Session>) -> Self {
        Self {
            api,
            session,
            state: Arc::default(),
            detached: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().list().to_vec()
    }

    #[must_use]
    pub fn post(&self, id: &Id<PostMarker>) -> Option<Post> {
        self.state.lock().get(id).cloned()
    }

    #[must_use]
    pub fn has_liked(&self, id: &Id<PostMarker>) -> bool {
        let user = self.session.user_id();
        self.state
            .lock()
            .get(id)
            .is_some_and(|post| post.has_liked_by(user.as_ref()))
    }

    #[must_use]
    pub fn is_processing(&self, id: &Id<PostMarker>) -> bool {
        self.is_flagged(&Flag::PostProcessing(id.clone()))
    }

    #[must_use]
    pub fn is_composing(&self, id: &Id<PostMarker>) -> bool {
        self.is_flagged(&Flag::Composing(id.clone()))
    }

    #[must_use]
    pub fn is_comment_processing(&self, id: &Id<CommentMarker>) -> bool {
        self.is_flagged(&Flag::CommentProcessing(id.clone()))
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading()
    }

    #[must_use]
    pub fn load_error(&self) -> Option<String> {
        self.state.lock().load_error().map(ToOwned::to_owned)
    }

    fn is_flagged(&self, flag: &Flag) -> bool {
        self.state.lock().is_flagged(flag)
    }

    /// Marks the view as gone. Replies arriving afterwards leave the state
    /// untouched.
    pub fn detach(&self) {
        debug!("Detaching feed");
        self.detached.cancel();
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.is_cancelled()
    }

    /// Loads the whole feed. On failure the previous list stays and the error
    /// is kept for display.
    pub async fn refresh(&self) -> Result<Outcome, FeedError> {
        let Some(token) = self.session.token() else {
            self.state.lock().clear();
            return Err(FeedError::Unauthenticated);
        };

        let _loading = FlagGuard::raise(&self.state, Flag::Loading);
        let request = self.api.fetch_statuses(&token);
        let Some(fetched) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        match fetched {
            Ok(posts) => {
                debug!(count = posts.len(), "Loaded feed");
                let mut state = self.state.lock();
                state.reset(posts);
                state.set_load_error(None);
                Ok(Outcome::Committed)
            }
            Err(e) => {
                error!(error = %e, "Loading the feed failed");
                self.state.lock().set_load_error(Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub async fn create_post(&self, content: &str) -> Result<Outcome, FeedError> {
        let content = PostContent::new(content)?;
        let token = self.token()?;

        let request = self.api.create_status(&token, &content);
        let Some(created) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        let created = created.inspect_err(|e| error!(error = %e, "Creating a post failed"))?;
        let Some(patch) = created else {
            return Ok(self.refetch().await);
        };

        match patch.into_post() {
            Ok(post) => {
                debug!(post = %post.id, "Created post");
                self.state.lock().prepend(post);
                Ok(Outcome::Committed)
            }
            Err(e) => {
                debug!(error = %e, "Created post is incomplete");
                Ok(self.refetch().await)
            }
        }
    }

    pub async fn delete_post(&self, id: &Id<PostMarker>) -> Result<Outcome, FeedError> {
        let token = self.token()?;
        let _processing = FlagGuard::raise(&self.state, Flag::PostProcessing(id.clone()));

        let request = self.api.delete_status(&token, id);
        let Some(deleted) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        match deleted {
            Ok(()) => {
                debug!(post = %id, "Deleted post");
                self.state.lock().remove(id);
                Ok(Outcome::Committed)
            }
            Err(e) => Ok(revert(AlertKind::DeletePost, &e)),
        }
    }

    /// Likes or unlikes `id` depending on what the current user did before.
    ///
    /// With a known user the flip is shown immediately and undone if the call
    /// fails. Without one the feed only changes once the reply arrives.
    pub async fn toggle_like(&self, id: &Id<PostMarker>) -> Result<Outcome, FeedError> {
        let token = self.token()?;
        let user = self.session.user_id();
        let _processing = FlagGuard::raise(&self.state, Flag::PostProcessing(id.clone()));

        let projection = LikeProjection::apply(&mut self.state.lock(), id, user.as_ref());
        let request = if projection.liked_before {
            self.api.unlike_status(&token, id)
        } else {
            self.api.like_status(&token, id)
        };

        let Some(reply) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        match reply {
            Ok(Some(patch)) => {
                debug!(post = %id, liked = !projection.liked_before, "Updated like");
                self.state.lock().reconcile(patch);
                Ok(Outcome::Committed)
            }
            Ok(None) => Ok(self.refetch().await),
            Err(e) => {
                projection.revert(&mut self.state.lock());
                Ok(revert(AlertKind::ToggleLike, &e))
            }
        }
    }

    pub async fn create_comment(
        &self,
        post_id: &Id<PostMarker>,
        content: &str,
    ) -> Result<Outcome, FeedError> {
        let content = PostContent::new(content)?;
        let token = self.token()?;
        let _composing = FlagGuard::raise(&self.state, Flag::Composing(post_id.clone()));

        let request = self.api.create_comment(&token, post_id, &content);
        let Some(reply) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        match reply.inspect_err(|e| error!(error = %e, post = %post_id, "Commenting failed"))? {
            Some(patch) => {
                debug!(post = %post_id, "Added comment");
                self.state.lock().reconcile(patch);
                Ok(Outcome::Committed)
            }
            None => Ok(self.refetch().await),
        }
    }

    pub async fn delete_comment(
        &self,
        comment_id: &Id<CommentMarker>,
        post_id: &Id<PostMarker>,
    ) -> Result<Outcome, FeedError> {
        let token = self.token()?;
        let _processing =
            FlagGuard::raise(&self.state, Flag::CommentProcessing(comment_id.clone()));

        let request = self.api.delete_comment(&token, comment_id, post_id);
        let Some(reply) = self.unless_detached(request).await else {
            return Ok(Outcome::Discarded);
        };

        match reply {
            Ok(Some(patch)) => {
                debug!(post = %post_id, comment = %comment_id, "Deleted comment");
                self.state.lock().reconcile(patch);
                Ok(Outcome::Committed)
            }
            Ok(None) => Ok(self.refetch().await),
            Err(e) => Ok(revert(AlertKind::DeleteComment, &e)),
        }
    }

    /// Runs a service call, yielding `None` when the feed is detached before
    /// or by the time it resolves.
    async fn unless_detached<F: Future>(&self, call: F) -> Option<F::Output> {
        let output = self.detached.run_until_cancelled(call).await?;
        if self.detached.is_cancelled() {
            debug!("Discarding reply for a detached feed");
            return None;
        }
        Some(output)
    }

    fn token(&self) -> Result<AuthToken, FeedError> {
        self.session.token().ok_or_else(|| {
            debug!("Rejecting feed mutation without a session");
            FeedError::Unauthenticated
        })
    }

    /// Fallback for replies without an identifiable post. A failed reload is
    /// recorded as the load error and does not fail the mutation.
    async fn refetch(&self) -> Outcome {
        debug!("Reply carried no usable post, reloading the feed");
        match self.refresh().await {
            Ok(Outcome::Discarded) => Outcome::Discarded,
            _ => Outcome::Refetched,
        }
    }
}

fn revert(kind: AlertKind, error: &ClientError) -> Outcome {
    error!(error = %error, ?kind, "Feed mutation failed");
    Outcome::Reverted(Alert::new(kind, error))
}

/// Like fields of a post before an optimistic flip.
#[derive(Clone, Debug)]
struct LikeSnapshot {
    likes: Vec<AuthorRef>,
    like_count: Option<u32>,
    has_liked: Option<bool>,
}

impl LikeSnapshot {
    fn capture(post: &Post) -> Self {
        Self {
            likes: post.likes.clone(),
            like_count: post.like_count,
            has_liked: post.has_liked,
        }
    }

    fn restore(self, post: &mut Post) {
        post.likes = self.likes;
        post.like_count = self.like_count;
        post.has_liked = self.has_liked;
    }
}

#[derive(Debug)]
struct LikeProjection {
    id: Id<PostMarker>,
    liked_before: bool,
    snapshot: Option<LikeSnapshot>,
}

impl LikeProjection {
    fn apply(state: &mut FeedState, id: &Id<PostMarker>, user: Option<&Id<UserMarker>>) -> Self {
        let liked_before = state
            .get(id)
            .is_some_and(|post| post.has_liked_by(user));

        let snapshot = match (user, state.post_mut(id)) {
            (Some(user), Some(post)) => {
                let snapshot = LikeSnapshot::capture(post);
                project_like(post, user, !liked_before);
                Some(snapshot)
            }
            _ => None,
        };

        Self {
            id: id.clone(),
            liked_before,
            snapshot,
        }
    }

    fn revert(self, state: &mut FeedState) {
        if let (Some(snapshot), Some(post)) = (self.snapshot, state.post_mut(&self.id)) {
            snapshot.restore(post);
        }
    }
}

fn project_like(post: &mut Post, user: &Id<UserMarker>, like: bool) {
    if like {
        if !post.is_liked_by(user) {
            post.likes.push(AuthorRef::Reference(user.clone()));
        }
    } else {
        post.likes.retain(|entry| entry.id() != user);
    }

    post.like_count = Some(u32::try_from(post.likes.len()).unwrap_or(u32::MAX));
    post.has_liked = Some(like);
}
