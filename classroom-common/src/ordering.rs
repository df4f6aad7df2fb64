use crate::model::post::Post;
use std::cmp::Ordering;

/// Most recent first. Posts created at the same instant keep their relative
/// order.
#[must_use]
pub fn sort_by_creation(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(newest_first);
    posts
}

#[must_use]
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at.cmp(&a.created_at)
}

#[must_use]
pub fn is_sorted_by_creation(posts: &[Post]) -> bool {
    posts.is_sorted_by(|a, b| newest_first(a, b).is_le())
}
