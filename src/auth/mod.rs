//! Authentication: guest and staff logins backed by bearer-token sessions.

pub mod model;

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::StaffCredentials;
use crate::error::AuthError;
use crate::store::traits::{GuestStore, SessionStore};

pub use model::{Guest, Session, Subject};

/// Length of generated session tokens.
const TOKEN_LEN: usize = 48;

/// Issues and verifies sessions.
pub struct AuthService {
    sessions: Arc<dyn SessionStore>,
    guests: Arc<dyn GuestStore>,
    staff: Option<StaffCredentials>,
    ttl: chrono::Duration,
}

impl AuthService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        guests: Arc<dyn GuestStore>,
        staff: Option<StaffCredentials>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            sessions,
            guests,
            staff,
            ttl,
        }
    }

    pub fn staff_login_enabled(&self) -> bool {
        self.staff.is_some()
    }

    /// Log a guest in by room number and the name they checked in under.
    pub async fn guest_login(&self, room: &str, guest_name: &str) -> Result<Session, AuthError> {
        let room = room.trim();
        let guest_name = guest_name.trim();
        if room.is_empty() || guest_name.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let Some(guest) = self.guests.current_guest(room).await? else {
            warn!(room = %room, "Guest login for unoccupied room");
            return Err(AuthError::InvalidGuest);
        };
        if !guest.guest_name.eq_ignore_ascii_case(guest_name) {
            warn!(room = %room, "Guest login with wrong name");
            return Err(AuthError::InvalidGuest);
        }

        let session = self
            .issue(Subject::Guest {
                room_number: guest.room_number,
                guest_name: guest.guest_name,
            })
            .await?;
        info!(room = %room, "Guest logged in");
        Ok(session)
    }

    /// Log a staff member in against the configured credentials.
    pub async fn staff_login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let Some(staff) = &self.staff else {
            warn!("Staff login attempted but no admin password is configured");
            return Err(AuthError::InvalidStaff);
        };

        let user_ok = constant_time_eq(staff.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(
            staff.password.expose_secret().as_bytes(),
            password.as_bytes(),
        );
        if !(user_ok && pass_ok) {
            warn!(username = %username, "Staff login rejected");
            return Err(AuthError::InvalidStaff);
        }

        let session = self
            .issue(Subject::Staff {
                username: username.to_string(),
            })
            .await?;
        info!(username = %username, "Staff logged in");
        Ok(session)
    }

    /// Resolve a bearer token to its live session.
    pub async fn verify(&self, token: &str) -> Result<Session, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidSession);
        }
        let Some(session) = self.sessions.get_session(token).await? else {
            return Err(AuthError::InvalidSession);
        };
        if session.is_expired(Utc::now()) {
            debug!("Expired session presented");
            self.sessions.delete_session(token).await?;
            return Err(AuthError::InvalidSession);
        }
        Ok(session)
    }

    /// Returns `true` if a session was removed.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.sessions.delete_session(token.trim()).await?)
    }

    /// Drop every expired session.
    pub async fn prune_expired(&self) -> Result<usize, AuthError> {
        let removed = self.sessions.prune_sessions(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Pruned expired sessions");
        }
        Ok(removed)
    }

    async fn issue(&self, subject: Subject) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            token: generate_token(),
            subject,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.create_session(&session).await?;
        Ok(session)
    }
}

/// Prune expired sessions on a fixed interval.
pub fn spawn_prune_task(
    auth: Arc<AuthService>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = auth.prune_expired().await {
                warn!(error = %e, "Session prune failed");
            }
        }
    })
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
