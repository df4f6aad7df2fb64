//! The signed-in user and their token, with an explicit lifecycle: restored
//! by [`Session::init`] at startup, replaced by [`Session::set`] on sign in
//! and dropped by [`Session::clear`] on sign out.

use crate::client::{ApiClient, ClientError};
use classroom_common::model::{
    Id,
    auth::{AuthToken, Credentials, InvalidCredentialsError},
    user::{UserMarker, UserProfile},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session file could not be accessed: {0}")]
    Io(#[from] io::Error),
    #[error("Session file could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Credentials(#[from] InvalidCredentialsError),
    #[error("Sign in failed: {0}")]
    SignIn(#[from] ClientError),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct SignedIn {
    pub token: AuthToken,
    pub profile: UserProfile,
}

impl SignedIn {
    #[must_use]
    pub fn new(profile: UserProfile, token: AuthToken) -> Self {
        Self { token, profile }
    }
}

#[derive(Deserialize)]
struct PersistedSession {
    #[serde(default)]
    token: Option<AuthToken>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

/// JSON document holding the last signed-in session.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A document missing either the token or the profile counts as absent.
    pub fn load(&self) -> Result<Option<SignedIn>, SessionError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedSession = serde_json::from_slice(&raw)?;
        match (persisted.token, persisted.profile) {
            (Some(token), Some(profile)) if !token.as_token_str().is_empty() => {
                Ok(Some(SignedIn::new(profile, token)))
            }
            _ => Ok(None),
        }
    }

    pub fn save(&self, signed_in: &SignedIn) -> Result<(), SessionError> {
        fs::write(&self.path, serde_json::to_vec(signed_in)?)?;
        Ok(())
    }

    pub fn remove(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
struct SessionState {
    token: Option<AuthToken>,
    profile: Option<UserProfile>,
}

#[derive(Debug, Default)]
pub struct Session {
    file: Option<SessionFile>,
    state: RwLock<SessionState>,
}

impl Session {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A session that only knows a token, for example one handed over by
    /// another tool. There is no current user, so nothing is optimistic.
    #[must_use]
    pub fn from_token(token: AuthToken) -> Self {
        Self {
            file: None,
            state: RwLock::new(SessionState {
                token: Some(token),
                profile: None,
            }),
        }
    }

    /// Restores whatever `file` holds. An unreadable file leaves the session
    /// signed out.
    #[must_use]
    pub fn init(file: SessionFile) -> Self {
        let state = match file.load() {
            Ok(Some(signed_in)) => {
                debug!(user = %signed_in.profile.id, "Restored session");
                SessionState {
                    token: Some(signed_in.token),
                    profile: Some(signed_in.profile),
                }
            }
            Ok(None) => SessionState::default(),
            Err(e) => {
                warn!(error = %e, path = %file.path().display(), "Reading the stored session failed");
                SessionState::default()
            }
        };

        Self {
            file: Some(file),
            state: RwLock::new(state),
        }
    }

    pub fn set(&self, signed_in: SignedIn) -> Result<(), SessionError> {
        debug!(user = %signed_in.profile.id, "Signed in");

        {
            let mut state = self.state.write();
            state.token = Some(signed_in.token.clone());
            state.profile = Some(signed_in.profile.clone());
        }

        if let Some(file) = &self.file {
            file.save(&signed_in)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        debug!("Signed out");
        *self.state.write() = SessionState::default();

        if let Some(file) = &self.file {
            file.remove()?;
        }
        Ok(())
    }

    pub async fn sign_in(
        &self,
        api: &ApiClient,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let credentials = Credentials::new(email, password)?;
        let signed_in = api.sign_in(&credentials).await.inspect_err(|e| {
            warn!(error = %e, email = credentials.email(), "Sign in failed");
        })?;

        self.set(signed_in)
    }

    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.state.read().token.clone()
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Id<UserMarker>> {
        self.state
            .read()
            .profile
            .as_ref()
            .map(|profile| profile.id.clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.state.read().token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::session::{Session, SessionFile, SignedIn};
    use classroom_common::model::{Id, auth::AuthToken, user::UserProfile};
    use std::fs;

    fn signed_in() -> SignedIn {
        SignedIn::new(
            UserProfile {
                id: Id::new("u1"),
                email: String::from("u1@example.com"),
                ..UserProfile::default()
            },
            AuthToken::new("t1"),
        )
    }

    #[test]
    fn lifecycle_persists_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classroom-auth.json");

        let session = Session::init(SessionFile::new(&path));
        assert!(!session.is_signed_in());

        session.set(signed_in()).unwrap();
        assert_eq!(session.user_id(), Some(Id::new("u1")));
        assert!(path.exists());

        let restored = Session::init(SessionFile::new(&path));
        assert_eq!(restored.token(), Some(AuthToken::new("t1")));
        assert_eq!(restored.profile(), Some(signed_in().profile));

        restored.clear().unwrap();
        assert!(!restored.is_signed_in());
        assert_eq!(restored.user_id(), None);
        assert!(!path.exists());
        restored.clear().unwrap();
    }

    #[test]
    fn partial_or_corrupt_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classroom-auth.json");

        fs::write(&path, r#"{"token":"t1","profile":null}"#).unwrap();
        assert!(!Session::init(SessionFile::new(&path)).is_signed_in());

        fs::write(&path, "{not json").unwrap();
        assert!(!Session::init(SessionFile::new(&path)).is_signed_in());
        assert!(SessionFile::new(&path).load().is_err());
    }

    #[test]
    fn token_only_session_has_no_user() {
        let session = Session::from_token(AuthToken::new("t1"));

        assert!(session.is_signed_in());
        assert_eq!(session.user_id(), None);
    }
}
