//! Password hashing and opaque session tokens.
//!
//! Tokens are 32 random bytes, base64url-encoded. The registry only keeps
//! their SHA-256 digest, so a dump of server memory does not yield usable
//! tokens.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::{NotesError, Result, User};

/// Hash a plaintext password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| NotesError::PasswordHash {
            message: e.to_string(),
        })
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch and an error only if the stored hash is
/// malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| NotesError::PasswordHash {
        message: format!("invalid hash format: {e}"),
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(NotesError::PasswordHash {
            message: format!("verify error: {e}"),
        }),
    }
}

/// Generate a cryptographically random opaque session token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of a raw token, hex-encoded. This is the registry key.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Decides when a freshly issued session stops being valid.
pub trait ExpiryPolicy: Send + Sync {
    /// `None` means the session never expires.
    fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Sessions live until revoked or until the server restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpiryPolicy for NeverExpire {
    fn expires_at(&self, _issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }
}

/// Sessions expire a fixed time after login. A lifetime reaching past the
/// representable date range means the session never expires.
#[derive(Debug, Clone, Copy)]
pub struct FixedLifetime(pub Duration);

impl ExpiryPolicy for FixedLifetime {
    fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        issued_at.checked_add_signed(self.0)
    }
}

/// Builds the policy for a lifetime in hours, `0` meaning no expiry.
pub fn expiry_policy_for_hours(hours: u64) -> Box<dyn ExpiryPolicy> {
    if hours == 0 {
        return Box::new(NeverExpire);
    }

    match i64::try_from(hours).ok().and_then(Duration::try_hours) {
        Some(ttl) => Box::new(FixedLifetime(ttl)),
        None => {
            warn!("Session lifetime of {} hours is out of range, sessions will not expire", hours);
            Box::new(NeverExpire)
        }
    }
}

/// An authenticated session as seen by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    /// Display name of the user
    pub name: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory table of live sessions keyed by token digest.
pub struct SessionRegistry {
    policy: Box<dyn ExpiryPolicy>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(policy: Box<dyn ExpiryPolicy>) -> Self {
        Self {
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a new token for `user` and returns the raw token.
    pub fn issue(&self, user: &User) -> Result<String> {
        let token = generate_token();
        let issued_at = Utc::now();
        let session = Session {
            user_id: user.id.clone(),
            name: user.name.clone(),
            issued_at,
            expires_at: self.policy.expires_at(issued_at),
        };

        self.lock()?.insert(hash_token(&token), session);
        info!("Issued session for user {}", user.id);
        Ok(token)
    }

    /// Resolves a raw token. Unknown and expired tokens are both
    /// `Unauthorized`; expired entries are dropped on the way.
    pub fn resolve(&self, token: &str) -> Result<Session> {
        let key = hash_token(token);
        let mut sessions = self.lock()?;

        let expired_user = match sessions.get(&key) {
            None => return Err(NotesError::Unauthorized),
            Some(session) if !session.is_expired_at(Utc::now()) => return Ok(session.clone()),
            Some(session) => session.user_id.clone(),
        };

        debug!("Session for user {} has expired", expired_user);
        sessions.remove(&key);
        Err(NotesError::Unauthorized)
    }

    /// Drops a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.lock()?.remove(&hash_token(token)).is_some())
    }

    /// Removes every expired session, returning how many were dropped.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }

    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on session registry".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every session is already expired when issued.
    struct AlreadyExpired;

    impl ExpiryPolicy for AlreadyExpired {
        fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
            Some(issued_at - Duration::seconds(1))
        }
    }

    fn user() -> User {
        User::new("Ann".into(), "ann@example.com", "hash".into())
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn issue_resolve_revoke() {
        let registry = SessionRegistry::new(Box::new(NeverExpire));
        let user = user();
        let token = registry.issue(&user).unwrap();

        let session = registry.resolve(&token).unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.name, "Ann");
        assert!(session.expires_at.is_none());

        assert!(registry.revoke(&token).unwrap());
        assert!(matches!(
            registry.resolve(&token),
            Err(NotesError::Unauthorized)
        ));
        assert!(!registry.revoke(&token).unwrap());
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let registry = SessionRegistry::new(Box::new(NeverExpire));
        assert!(matches!(
            registry.resolve("nope"),
            Err(NotesError::Unauthorized)
        ));
    }

    #[test]
    fn expired_sessions_are_rejected_and_purged() {
        let registry = SessionRegistry::new(Box::new(AlreadyExpired));
        let token = registry.issue(&user()).unwrap();
        registry.issue(&user()).unwrap();

        assert!(matches!(
            registry.resolve(&token),
            Err(NotesError::Unauthorized)
        ));
        assert_eq!(registry.active_sessions().unwrap(), 1);
        assert_eq!(registry.purge_expired().unwrap(), 1);
        assert_eq!(registry.active_sessions().unwrap(), 0);
    }

    #[test]
    fn fixed_lifetime_sets_expiry() {
        let policy = expiry_policy_for_hours(24);
        let now = Utc::now();
        assert_eq!(policy.expires_at(now), Some(now + Duration::hours(24)));
        assert!(expiry_policy_for_hours(0).expires_at(now).is_none());
    }

    #[test]
    fn oversized_lifetimes_never_expire_instead_of_failing() {
        for hours in [u64::MAX, i64::MAX as u64, 100_000_000_000] {
            let registry = SessionRegistry::new(expiry_policy_for_hours(hours));
            let token = registry.issue(&user()).unwrap();

            let session = registry.resolve(&token).unwrap();
            assert!(session.expires_at.map_or(true, |at| at > session.issued_at));
        }
    }

    #[test]
    fn fixed_lifetime_past_date_range_does_not_panic() {
        let policy = FixedLifetime(Duration::MAX);
        assert!(policy.expires_at(Utc::now()).is_none());
    }
}
