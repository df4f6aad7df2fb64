//! Reconciliation of locally held posts and comments with the versions the
//! service returns after a mutation.
//!
//! The service is authoritative for every field it sends, with one
//! exception: a bare author id never replaces an author record already known
//! locally for the same user. Both functions are idempotent.

use crate::model::{
    post::{Comment, Post, PostPatch},
    user::AuthorRef,
};

#[must_use]
pub fn merge_post(previous: Option<&Post>, incoming: Post) -> Post {
    let comments = incoming
        .comments
        .into_iter()
        .map(|comment| {
            let known = previous.and_then(|previous| previous.comment(&comment.id));
            merge_comment(known, comment)
        })
        .collect();

    let mut merged = Post {
        id: incoming.id,
        content: incoming.content,
        author: retain_author(
            previous.map(|previous| &previous.author),
            incoming.author,
        ),
        likes: merge_likes(
            previous.map_or(&[][..], |previous| previous.likes.as_slice()),
            incoming.likes,
        ),
        like_count: incoming.like_count,
        has_liked: incoming.has_liked,
        comments,
        created_at: incoming.created_at,
        updated_at: incoming
            .updated_at
            .or(previous.and_then(|previous| previous.updated_at)),
    };
    merged.sync_like_count();
    merged
}

/// Applies a partial reply to the held `previous`. Fields the reply left out
/// keep their local value; a new like set without a flag re-derives
/// `has_liked`.
#[must_use]
pub fn merge_patch(previous: &Post, patch: PostPatch) -> Post {
    let has_liked = match (patch.has_liked, &patch.likes) {
        (Some(has_liked), _) => Some(has_liked),
        (None, Some(_)) => None,
        (None, None) => previous.has_liked,
    };

    let incoming = Post {
        id: patch.id,
        content: patch.content.unwrap_or_else(|| previous.content.clone()),
        author: patch.author.unwrap_or_else(|| previous.author.clone()),
        likes: patch.likes.unwrap_or_else(|| previous.likes.clone()),
        like_count: patch.like_count.or(previous.like_count),
        has_liked,
        comments: patch.comments.unwrap_or_else(|| previous.comments.clone()),
        created_at: patch.created_at.unwrap_or(previous.created_at),
        updated_at: patch.updated_at,
    };
    merge_post(Some(previous), incoming)
}

#[must_use]
pub fn merge_comment(previous: Option<&Comment>, incoming: Comment) -> Comment {
    Comment {
        id: incoming.id,
        content: incoming.content,
        author: retain_author(
            previous.map(|previous| &previous.author),
            incoming.author,
        ),
        likes: merge_likes(
            previous.map_or(&[][..], |previous| previous.likes.as_slice()),
            incoming.likes,
        ),
        created_at: incoming.created_at,
        updated_at: incoming
            .updated_at
            .or(previous.and_then(|previous| previous.updated_at)),
    }
}

fn retain_author(previous: Option<&AuthorRef>, incoming: AuthorRef) -> AuthorRef {
    match previous {
        Some(previous) => incoming.retaining(previous),
        None => incoming,
    }
}

/// Like sets are sets: one entry per user, resolved whenever either side
/// knows the record.
fn merge_likes(previous: &[AuthorRef], incoming: Vec<AuthorRef>) -> Vec<AuthorRef> {
    let mut merged: Vec<AuthorRef> = Vec::with_capacity(incoming.len());

    for like in incoming {
        if let Some(existing) = merged.iter_mut().find(|existing| existing.id() == like.id()) {
            if !existing.is_resolved() {
                *existing = like;
            }
            continue;
        }

        let known = previous
            .iter()
            .find(|known| known.is_resolved() && known.id() == like.id());
        merged.push(retain_author(known, like));
    }

    merged
}
