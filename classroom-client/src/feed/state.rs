use classroom_common::{
    merge::{merge_patch, merge_post},
    model::{
        Id,
        post::{CommentMarker, Post, PostMarker, PostPatch},
    },
    ordering::sort_by_creation,
};
use parking_lot::Mutex;
use std::{collections::HashMap, mem, sync::Arc};

/// Transient markers that disable controls while a call is in flight.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Flag {
    Loading,
    PostProcessing(Id<PostMarker>),
    Composing(Id<PostMarker>),
    CommentProcessing(Id<CommentMarker>),
}

/// The visible feed. The post list is kept sorted newest first after every
/// mutation.
#[derive(Clone, Debug, Default)]
pub struct FeedState {
    posts: Vec<Post>,
    flags: HashMap<Flag, usize>,
    load_error: Option<String>,
}

impl FeedState {
    #[must_use]
    pub fn list(&self) -> &[Post] {
        &self.posts
    }

    #[must_use]
    pub fn get(&self, id: &Id<PostMarker>) -> Option<&Post> {
        self.posts.iter().find(|post| &post.id == id)
    }

    pub(crate) fn post_mut(&mut self, id: &Id<PostMarker>) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| &post.id == id)
    }

    /// Adds `post` to the front, or merges it into the post it is already
    /// present as.
    pub fn prepend(&mut self, post: Post) {
        match self.posts.iter().position(|known| known.id == post.id) {
            Some(index) => self.posts[index] = merge_post(Some(&self.posts[index]), post),
            None => self.posts.insert(0, post),
        }
        self.sort();
    }

    /// Returns `false` when no post with `id` is held.
    pub fn replace(&mut self, id: &Id<PostMarker>, post: Post) -> bool {
        let Some(known) = self.post_mut(id) else {
            return false;
        };

        *known = post;
        self.sort();
        true
    }

    /// Merges what a reply carried about a held post into it.
    pub fn reconcile(&mut self, patch: PostPatch) -> bool {
        let Some(known) = self.get(&patch.id) else {
            return false;
        };

        let merged = merge_patch(known, patch);
        let id = merged.id.clone();
        self.replace(&id, merged)
    }

    pub fn remove(&mut self, id: &Id<PostMarker>) -> Option<Post> {
        let index = self.posts.iter().position(|post| &post.id == id)?;
        Some(self.posts.remove(index))
    }

    /// Replaces the membership with `posts`, keeping what was known locally
    /// about the ones already held.
    pub fn reset(&mut self, posts: Vec<Post>) {
        let previous = mem::take(&mut self.posts);
        self.posts = posts
            .into_iter()
            .map(|post| {
                let known = previous.iter().find(|known| known.id == post.id);
                merge_post(known, post)
            })
            .collect();
        self.sort();
    }

    pub fn clear(&mut self) {
        self.posts.clear();
    }

    #[must_use]
    pub fn is_flagged(&self, flag: &Flag) -> bool {
        self.flags.contains_key(flag)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_flagged(&Flag::Loading)
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub(crate) fn set_load_error(&mut self, error: Option<String>) {
        self.load_error = error;
    }

    fn raise(&mut self, flag: Flag) {
        *self.flags.entry(flag).or_default() += 1;
    }

    fn lower(&mut self, flag: &Flag) {
        if let Some(count) = self.flags.get_mut(flag) {
            *count -= 1;
            if *count == 0 {
                self.flags.remove(flag);
            }
        }
    }

    fn sort(&mut self) {
        self.posts = sort_by_creation(mem::take(&mut self.posts));
    }
}

/// Holds a [`Flag`] raised until dropped. The state must not be locked by the
/// current thread when the guard goes out of scope.
#[derive(Debug)]
pub struct FlagGuard {
    state: Arc<Mutex<FeedState>>,
    flag: Flag,
}

impl FlagGuard {
    #[must_use]
    pub fn raise(state: &Arc<Mutex<FeedState>>, flag: Flag) -> Self {
        state.lock().raise(flag.clone());
        Self {
            state: Arc::clone(state),
            flag,
        }
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.state.lock().lower(&self.flag);
    }
}
