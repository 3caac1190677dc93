//! Operator authentication with bcrypt.
//!
//! Credentials live in the remote `admin` table; this module verifies them,
//! tracks failed-attempt lockout, and keeps the signed-in session in
//! memory. Sessions expire on inactivity or at a maximum age; there is no
//! on-disk session persistence.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PosError;
use crate::store::TransactionStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;
const SESSION_INACTIVITY_MINUTES: i64 = 30;
/// One full business day.
const SESSION_MAX_DURATION_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An active operator session.
#[derive(Clone)]
struct OperatorSession {
    session_id: String,
    admin_id: String,
    username: String,
    login_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl OperatorSession {
    /// Check whether this session has expired (inactivity or max duration).
    fn is_expired(&self) -> bool {
        let now = Utc::now();
        if now >= self.expires_at {
            return true;
        }
        now - self.last_activity > Duration::minutes(SESSION_INACTIVITY_MINUTES)
    }
}

/// What callers get to see of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub admin_id: String,
    pub username: String,
    pub login_time: DateTime<Utc>,
}

/// Lockout tracking entry.
struct LockoutEntry {
    attempts: u32,
    last_attempt: DateTime<Utc>,
}

/// Managed authentication state for one terminal.
pub struct AuthState {
    sessions: Mutex<HashMap<String, OperatorSession>>,
    current_session_id: Mutex<Option<String>>,
    lockout: Mutex<LockoutEntry>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            current_session_id: Mutex::new(None),
            lockout: Mutex::new(LockoutEntry {
                attempts: 0,
                last_attempt: Utc::now(),
            }),
        }
    }

    /// Minutes left on an active lockout, if any.
    fn lockout_remaining(&self) -> Option<i64> {
        let lockout = self.lockout.lock().unwrap_or_else(|e| e.into_inner());
        if lockout.attempts < MAX_FAILED_ATTEMPTS {
            return None;
        }
        let elapsed = Utc::now() - lockout.last_attempt;
        let remaining = Duration::minutes(LOCKOUT_MINUTES) - elapsed;
        if remaining > Duration::zero() {
            Some((remaining.num_seconds() + 59) / 60)
        } else {
            None
        }
    }

    fn record_failure(&self) {
        let mut lockout = self.lockout.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        // A stale window starts counting from scratch.
        if now - lockout.last_attempt > Duration::minutes(LOCKOUT_MINUTES) {
            lockout.attempts = 0;
        }
        lockout.attempts += 1;
        lockout.last_attempt = now;
        if lockout.attempts >= MAX_FAILED_ATTEMPTS {
            warn!(attempts = lockout.attempts, "login locked out");
        }
    }

    fn clear_failures(&self) {
        let mut lockout = self.lockout.lock().unwrap_or_else(|e| e.into_inner());
        lockout.attempts = 0;
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Verify credentials against the `admin` table and open a session.
pub async fn login<S: TransactionStore>(
    state: &AuthState,
    store: &S,
    username: &str,
    password: &str,
) -> Result<SessionInfo, PosError> {
    if let Some(minutes) = state.lockout_remaining() {
        return Err(PosError::Locked { minutes });
    }

    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(PosError::InvalidCredentials);
    }

    let Some(admin) = store.fetch_admin(username).await? else {
        state.record_failure();
        return Err(PosError::InvalidCredentials);
    };

    let valid = bcrypt::verify(password, &admin.password_hash).unwrap_or(false);
    if !valid {
        state.record_failure();
        return Err(PosError::InvalidCredentials);
    }

    state.clear_failures();

    let now = Utc::now();
    let session = OperatorSession {
        session_id: Uuid::new_v4().to_string(),
        admin_id: admin.id.clone(),
        username: admin.username.clone(),
        login_time: now,
        last_activity: now,
        expires_at: now + Duration::hours(SESSION_MAX_DURATION_HOURS),
    };
    let info = SessionInfo {
        session_id: session.session_id.clone(),
        admin_id: session.admin_id.clone(),
        username: session.username.clone(),
        login_time: session.login_time,
    };

    {
        let mut sessions = state.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.session_id.clone(), session);
    }
    {
        let mut current = state
            .current_session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *current = Some(info.session_id.clone());
    }

    info!(username, "operator logged in");
    Ok(info)
}

/// End the current session, if any.
pub fn logout(state: &AuthState) {
    let mut current = state
        .current_session_id
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(session_id) = current.take() {
        let mut sessions = state.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.remove(&session_id) {
            info!(username = %session.username, "operator logged out");
        }
    }
}

/// The current session, with its activity timestamp refreshed. Expired
/// sessions are dropped and `None` is returned.
pub fn current_session(state: &AuthState) -> Option<SessionInfo> {
    let mut current = state
        .current_session_id
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let session_id = current.clone()?;

    let mut sessions = state.sessions.lock().unwrap_or_else(|e| e.into_inner());
    let Some(session) = sessions.get_mut(&session_id) else {
        *current = None;
        return None;
    };

    if session.is_expired() {
        info!(username = %session.username, "session expired");
        sessions.remove(&session_id);
        *current = None;
        return None;
    }

    session.last_activity = Utc::now();
    Some(SessionInfo {
        session_id: session.session_id.clone(),
        admin_id: session.admin_id.clone(),
        username: session.username.clone(),
        login_time: session.login_time,
    })
}

pub fn is_authenticated(state: &AuthState) -> bool {
    current_session(state).is_some()
}

// ===========================================================================
// Tests
// ===========================================================================
