use crate::error_handling::types::SessionError;
use crate::session_management::session::Session;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// The structure related to session management
///
/// Owns every live session token handed out by the login endpoint.
///
/// # Fields Overview
///
/// - `sessions`: live sessions keyed by token
/// - `session_timeout`: the lifetime of a session, advertised to clients as
///   `expires_in` and enforced by `validate` and `cleanup_expired_sessions`
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    session_timeout: Duration,
}

impl SessionManager {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_timeout,
        }
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.session_timeout).unwrap_or(chrono::Duration::MAX)
    }

    pub fn create_session(&self, username: &str) -> Result<Session, SessionError> {
        self.create_session_at(username, Utc::now())
    }

    pub(crate) fn create_session_at(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let session = Session::new(username, now);
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned)?;
        sessions.insert(session.token.clone(), session.clone());
        debug!("Created session for {}", username);
        Ok(session)
    }

    /// Looks a token up, evicting it if it has expired.
    pub fn validate(&self, token: &str) -> Result<Session, SessionError> {
        self.validate_at(token, Utc::now())
    }

    pub(crate) fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let lifetime = self.lifetime();
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned)?;
        let session = sessions.get(token).ok_or(SessionError::NotFound)?;
        if session.is_expired(now, lifetime) {
            sessions.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(session.clone())
    }

    pub fn remove_session(&self, token: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned)?;
        sessions.remove(token).ok_or(SessionError::NotFound)
    }

    /// Drops every session that belongs to `username`.
    pub fn invalidate_user(&self, username: &str) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| s.username != username);
        let removed = before - sessions.len();
        debug!("Invalidated {} session(s) of {}", removed, username);
        Ok(removed)
    }

    pub fn cleanup_expired_sessions(&self) -> Result<usize, SessionError> {
        self.cleanup_expired_sessions_at(Utc::now())
    }

    pub(crate) fn cleanup_expired_sessions_at(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let lifetime = self.lifetime();
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, lifetime));
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Evicted {} expired session(s)", removed);
        }
        Ok(removed)
    }

    pub fn get_active_session_count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().map_err(|_| SessionError::LockPoisoned)?.len())
    }
}
