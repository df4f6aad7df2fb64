//! The post feed: the locally held view of the classroom timeline and the
//! coordinator that applies mutations to it.

pub mod coordinator;
pub mod state;

use crate::client::ClientError;
use classroom_common::model::post::EmptyContentError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub use coordinator::FeedCoordinator;
pub use state::{FeedState, Flag};

/// Reasons a mutation did not start, or a create that has to go back to its
/// form so the draft is kept.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] EmptyContentError),
    #[error("Not signed in")]
    Unauthenticated,
    #[error(transparent)]
    Transport(#[from] ClientError),
}

/// How a started mutation ended.
#[derive(Clone, Eq, PartialEq, Debug)]
#[must_use]
pub enum Outcome {
    /// The reply was merged into the feed.
    Committed,
    /// The reply was ambiguous and the whole feed was loaded again.
    Refetched,
    /// The call failed and the feed is back where it was.
    Reverted(Alert),
    /// The feed was detached before the reply arrived.
    Discarded,
}

impl Outcome {
    #[must_use]
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Outcome::Reverted(alert) => Some(alert),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum AlertKind {
    DeletePost,
    ToggleLike,
    DeleteComment,
}

/// Message for the user after a failed mutation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Alert {
    pub kind: AlertKind,
    pub detail: String,
}

impl Alert {
    #[must_use]
    pub fn new(kind: AlertKind, error: &ClientError) -> Self {
        Self {
            kind,
            detail: error.to_string(),
        }
    }
}

impl Display for Alert {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let action = match self.kind {
            AlertKind::DeletePost => "Deleting the post",
            AlertKind::ToggleLike => "Updating the like",
            AlertKind::DeleteComment => "Deleting the comment",
        };

        write!(f, "{action} failed: {}", self.detail)
    }
}
