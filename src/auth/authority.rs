// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Authority
//!
//! Issues signed session tokens and verifies presented ones.
//!
//! ## Verification order
//!
//! 1. Parse and check the signature against the public key
//! 2. Reject if `now > exp`
//! 3. Look the session up; missing, revoked, or owned by a different user
//!    all reject the same way
//!
//! The repository lookup happens on every verify so that revocation takes
//! effect on the next request instead of at token expiry.
//!
//! ## Failure policy
//!
//! Repository failures are returned as-is and never retried. Issuance writes
//! the session before signing, so no token exists without a durable session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::error::TokenError;
use super::identity::AuthenticatedIdentity;
use super::keys::SigningKeys;
use super::token::{self, Token, TokenClaims};
use crate::storage::{SessionRepository, StorageError, StoredSession};

/// Default token/session lifetime in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 3600;

/// A freshly issued token with the session it refers to.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: Token,
    pub session: StoredSession,
}

/// Issues and verifies session tokens.
///
/// Cheap to share: key material and repository are behind `Arc`.
#[derive(Clone)]
pub struct TokenAuthority {
    keys: Arc<SigningKeys>,
    sessions: Arc<dyn SessionRepository>,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(keys: Arc<SigningKeys>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            keys,
            sessions,
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id` now.
    pub fn issue(&self, user_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token for `user_id` as of `now`.
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        // Checked up front so a verify-only node never writes an orphan session.
        if !self.keys.can_sign() {
            return Err(TokenError::KeyUnavailable);
        }

        let session = StoredSession::new(user_id, now, self.ttl)
            .and_then(|session| self.sessions.create(&session).map(|()| session))
            .map_err(|e| {
                warn!(user_id, error = %e, "Session write failed; no token issued");
                TokenError::Repository(e)
            })?;

        let claims = TokenClaims {
            sid: session.id.clone(),
            sub: session.user_id.clone(),
            exp: session.expires_at.timestamp(),
        };
        let token = token::encode(&claims, &self.keys).map_err(|e| {
            warn!(session_id = %session.id, error = %e, "Token signing failed");
            TokenError::KeyUnavailable
        })?;

        info!(user_id, session_id = %session.id, "Session issued");
        Ok(IssuedToken { token, session })
    }

    /// Verify `token` now.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, TokenError> {
        let claims = token::decode(token, &self.keys).map_err(|reason| {
            debug!(%reason, "Token rejected");
            TokenError::InvalidSignature
        })?;

        if now.timestamp() > claims.exp {
            debug!(session_id = %claims.sid, exp = claims.exp, "Token expired");
            return Err(TokenError::Expired);
        }

        match self.sessions.find(&claims.sid) {
            Ok(session) if !session.revoked && session.user_id == claims.sub => {
                Ok(AuthenticatedIdentity::from_claims(claims))
            }
            Ok(session) => {
                debug!(
                    session_id = %session.id,
                    revoked = session.revoked,
                    "Token refers to a dead session"
                );
                Err(TokenError::SessionRevoked)
            }
            Err(StorageError::NotFound(_)) => {
                debug!(session_id = %claims.sid, "Token refers to a missing session");
                Err(TokenError::SessionRevoked)
            }
            Err(e) => Err(TokenError::Repository(e)),
        }
    }

    /// Revoke a session. Revoking an already revoked session succeeds.
    pub fn revoke(&self, session_id: &str) -> Result<StoredSession, TokenError> {
        let session = self.sessions.mark_revoked(session_id).map_err(not_found)?;
        info!(session_id, user_id = %session.user_id, "Session revoked");
        Ok(session)
    }

    /// Replace the caller's session with a new one.
    ///
    /// The new session is issued before the old one is revoked, so a failure
    /// part way leaves the caller with at least one working token.
    pub fn reissue(&self, identity: &AuthenticatedIdentity) -> Result<IssuedToken, TokenError> {
        let issued = self.issue(&identity.user_id)?;
        self.revoke(&identity.session_id)?;
        Ok(issued)
    }

    /// Session metadata by id.
    pub fn session(&self, session_id: &str) -> Result<StoredSession, TokenError> {
        self.sessions.find(session_id).map_err(not_found)
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("keys", &self.keys)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

fn not_found(err: StorageError) -> TokenError {
    match err {
        StorageError::NotFound(_) => TokenError::NotFound,
        other => TokenError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, RedbSessionRepository, StorageResult};

    fn test_keys() -> Arc<SigningKeys> {
        let (private_pem, public_pem) = SigningKeys::generate_pem().unwrap();
        Arc::new(SigningKeys::from_pem(private_pem.as_bytes(), public_pem.as_bytes()).unwrap())
    }

    fn test_authority() -> (TokenAuthority, Arc<RedbSessionRepository>) {
        let db = Database::in_memory().unwrap();
        let repo = Arc::new(RedbSessionRepository::new(db.new_session()));
        (TokenAuthority::new(test_keys(), repo.clone()), repo)
    }

    /// Repository whose every call fails.
    struct BrokenRepository;

    impl SessionRepository for BrokenRepository {
        fn create(&self, _: &StoredSession) -> StorageResult<()> {
            Err(std::io::Error::other("disk full").into())
        }
        fn find(&self, _: &str) -> StorageResult<StoredSession> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn mark_revoked(&self, _: &str) -> StorageResult<StoredSession> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn purge_expired(&self, _: DateTime<Utc>) -> StorageResult<usize> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[test]
    fn verify_of_issue_returns_same_user() {
        let (authority, _) = test_authority();
        for user in ["u1", "user-with-dashes", "ユーザー"] {
            let issued = authority.issue(user).unwrap();
            let identity = authority.verify(issued.token.as_str()).unwrap();
            assert_eq!(identity.user_id, user);
            assert_eq!(identity.session_id, issued.session.id);
        }
    }

    #[test]
    fn issued_session_is_persisted() {
        let (authority, repo) = test_authority();
        let issued = authority.issue("u1").unwrap();

        let stored = repo.find(&issued.session.id).unwrap();
        assert_eq!(stored.user_id, "u1");
        assert!(!stored.revoked);
        assert_eq!(stored.expires_at - stored.issued_at, authority.ttl());
    }

    #[test]
    fn overflowing_ttl_fails_issue_without_panicking() {
        let db = Database::in_memory().unwrap();
        let repo = Arc::new(RedbSessionRepository::new(db.new_session()));
        let authority = TokenAuthority::new(test_keys(), repo.clone())
            .with_ttl(Duration::seconds(9_000_000_000_000));

        let result = authority.issue("u1");
        assert!(matches!(
            result,
            Err(TokenError::Repository(StorageError::OutOfRange(_)))
        ));
        assert_eq!(repo.purge_expired(Utc::now() + Duration::days(1)).unwrap(), 0);
    }

    #[test]
    fn tampering_with_any_byte_is_invalid_signature() {
        let (authority, _) = test_authority();
        let token = authority.issue("u1").unwrap().token.into_string();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                matches!(authority.verify(&tampered), Err(TokenError::InvalidSignature)),
                "byte {i} accepted"
            );
        }
    }

    #[test]
    fn garbage_is_invalid_signature() {
        let (authority, _) = test_authority();
        for garbage in ["", "Bearer", "a.b.c", "not a token at all"] {
            assert!(matches!(
                authority.verify(garbage),
                Err(TokenError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn revoke_then_verify_is_rejected_before_expiry() {
        let (authority, _) = test_authority();
        let issued = authority.issue("U1").unwrap();

        let identity = authority.verify(issued.token.as_str()).unwrap();
        assert_eq!(identity.user_id, "U1");

        authority.revoke(&issued.session.id).unwrap();
        let result = authority.verify(issued.token.as_str());
        assert!(matches!(result, Err(TokenError::SessionRevoked)));
    }

    #[test]
    fn expired_token_is_rejected_regardless_of_revocation() {
        let (authority, _) = test_authority();
        let now = Utc::now();
        let live = authority.issue_at("u1", now).unwrap();
        let revoked = authority.issue_at("u1", now).unwrap();
        authority.revoke(&revoked.session.id).unwrap();

        let later = now + authority.ttl() + Duration::seconds(1);
        for issued in [&live, &revoked] {
            let result = authority.verify_at(issued.token.as_str(), later);
            assert!(matches!(result, Err(TokenError::Expired)));
        }
    }

    #[test]
    fn token_is_valid_up_to_its_expiry_second() {
        let (authority, _) = test_authority();
        let now = Utc::now();
        let issued = authority.issue_at("u1", now).unwrap();

        let at_expiry = DateTime::from_timestamp(issued.session.expires_at.timestamp(), 0).unwrap();
        assert!(authority.verify_at(issued.token.as_str(), at_expiry).is_ok());
    }

    #[test]
    fn revoke_is_idempotent() {
        let (authority, _) = test_authority();
        let issued = authority.issue("u1").unwrap();

        assert!(authority.revoke(&issued.session.id).unwrap().revoked);
        assert!(authority.revoke(&issued.session.id).unwrap().revoked);
    }

    #[test]
    fn revoke_unknown_session_is_not_found() {
        let (authority, _) = test_authority();
        assert!(matches!(
            authority.revoke("no-such-session"),
            Err(TokenError::NotFound)
        ));
    }

    #[test]
    fn missing_session_looks_like_revoked() {
        let (authority, repo) = test_authority();
        let issued = authority.issue("u1").unwrap();
        repo.purge_expired(issued.session.expires_at + Duration::seconds(1))
            .unwrap();

        let result = authority.verify_at(issued.token.as_str(), issued.session.issued_at);
        assert!(matches!(result, Err(TokenError::SessionRevoked)));
    }

    #[test]
    fn failing_repository_issues_no_token() {
        let authority = TokenAuthority::new(test_keys(), Arc::new(BrokenRepository));
        assert!(matches!(
            authority.issue("u1"),
            Err(TokenError::Repository(_))
        ));
    }

    #[test]
    fn failing_repository_surfaces_on_verify() {
        let keys = test_keys();
        let (healthy, _) = {
            let db = Database::in_memory().unwrap();
            let repo = Arc::new(RedbSessionRepository::new(db.new_session()));
            (TokenAuthority::new(keys.clone(), repo.clone()), repo)
        };
        let issued = healthy.issue("u1").unwrap();

        let broken = TokenAuthority::new(keys, Arc::new(BrokenRepository));
        assert!(matches!(
            broken.verify(issued.token.as_str()),
            Err(TokenError::Repository(_))
        ));
    }

    #[test]
    fn verifying_only_keys_cannot_issue() {
        let (private_pem, public_pem) = SigningKeys::generate_pem().unwrap();
        let full = Arc::new(
            SigningKeys::from_pem(private_pem.as_bytes(), public_pem.as_bytes()).unwrap(),
        );
        let verifier = Arc::new(SigningKeys::verifying_only(public_pem.as_bytes()).unwrap());

        let db = Database::in_memory().unwrap();
        let repo: Arc<dyn SessionRepository> =
            Arc::new(RedbSessionRepository::new(db.new_session()));
        let issuer = TokenAuthority::new(full, repo.clone());
        let verifier = TokenAuthority::new(verifier, repo);

        assert!(matches!(
            verifier.issue("u1"),
            Err(TokenError::KeyUnavailable)
        ));

        let issued = issuer.issue("u1").unwrap();
        assert_eq!(verifier.verify(issued.token.as_str()).unwrap().user_id, "u1");
    }

    #[test]
    fn reissue_creates_new_session_and_revokes_old() {
        let (authority, _) = test_authority();
        let first = authority.issue("u1").unwrap();
        let identity = authority.verify(first.token.as_str()).unwrap();

        let second = authority.reissue(&identity).unwrap();
        assert_ne!(second.session.id, first.session.id);
        assert!(authority.verify(second.token.as_str()).is_ok());
        assert!(matches!(
            authority.verify(first.token.as_str()),
            Err(TokenError::SessionRevoked)
        ));
    }

    #[test]
    fn custom_ttl_is_applied() {
        let (authority, _) = test_authority();
        let authority = authority.with_ttl(Duration::minutes(5));
        let now = Utc::now();
        let issued = authority.issue_at("u1", now).unwrap();

        let too_late = now + Duration::minutes(6);
        assert!(matches!(
            authority.verify_at(issued.token.as_str(), too_late),
            Err(TokenError::Expired)
        ));
    }
}
