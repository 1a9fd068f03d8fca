//! Auth session shared by every request.
//!
//! # Design
//! The bearer token lives behind an `Arc<RwLock<..>>` handed to `ApiClient`
//! at construction. The client reads it each time it builds a request, so a
//! login or logout after startup is observed by the very next call. When a
//! token file is configured, login and logout persist the change; the file
//! is the only client state that survives between runs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no configuration directory available for the token file")]
    NoConfigDir,

    #[error("token is empty")]
    EmptyToken,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
    store: Option<PathBuf>,
}

impl Session {
    /// A session with no token and no backing file.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An in-memory session holding `token`.
    pub fn with_token(token: &str) -> Self {
        let session = Self::default();
        session.set(Some(token.to_string()));
        session
    }

    /// Load the token stored at `path`, if any. Later logins write back to it.
    pub fn persisted(path: &Path) -> Result<Self, SessionError> {
        let token = match std::fs::read_to_string(path) {
            Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), signed_in = token.is_some(), "loaded session");
        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            store: Some(path.to_path_buf()),
        })
    }

    /// `<config dir>/ula-admin/token`.
    pub fn default_token_path() -> Result<PathBuf, SessionError> {
        dirs::config_dir()
            .map(|dir| dir.join("ula-admin").join("token"))
            .ok_or(SessionError::NoConfigDir)
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    /// `Authorization` header value for the current token.
    pub fn authorization(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {token}"))
    }

    pub fn login(&self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        if let Some(path) = &self.store {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, token)?;
        }
        self.set(Some(token.to_string()));
        Ok(())
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        if let Some(path) = &self.store {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.set(None);
        Ok(())
    }

    fn set(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_login_and_logout() {
        let session = Session::anonymous();
        let shared = session.clone();
        assert_eq!(shared.authorization(), None);

        session.login("abc").unwrap();
        assert_eq!(shared.authorization().as_deref(), Some("Bearer abc"));

        session.logout().unwrap();
        assert!(!shared.is_signed_in());
    }

    #[test]
    fn persisted_session_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token");

        let session = Session::persisted(&path).unwrap();
        assert!(!session.is_signed_in());
        session.login("  secret\n").unwrap();

        let reloaded = Session::persisted(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("secret"));

        reloaded.logout().unwrap();
        assert!(!path.exists());
        reloaded.logout().unwrap();
    }

    #[test]
    fn blank_login_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        let session = Session::persisted(&path).unwrap();

        assert!(matches!(session.login("  \n"), Err(SessionError::EmptyToken)));
        assert!(!session.is_signed_in());
        assert_eq!(session.authorization(), None);
        assert!(!path.exists());
    }

    #[test]
    fn empty_token_file_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "\n").unwrap();
        assert!(!Session::persisted(&path).unwrap().is_signed_in());
    }
}
