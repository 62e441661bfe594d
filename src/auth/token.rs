// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token wire format.
//!
//! A token is a compact JWS signed with Ed25519:
//!
//! ```text
//! header: {"alg":"EdDSA","typ":"session","kid":"<key id>"}
//! claims: {"sid":"<session id>","sub":"<user id>","exp":<unix seconds>}
//! ```
//!
//! The claims carry nothing beyond session id, user id and expiry. Expiry is
//! left to [`TokenAuthority`](super::TokenAuthority), which checks it against
//! an explicit clock, so the codec only validates structure and signature.

use std::fmt;

use jsonwebtoken::{errors::ErrorKind, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};

use super::keys::{KeyError, SigningKeys};

pub const ALGORITHM: Algorithm = Algorithm::EdDSA;
pub const TOKEN_TYPE: &str = "session";

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Session id
    pub sid: String,
    /// User id
    pub sub: String,
    /// Expiry, Unix seconds
    pub exp: i64,
}

/// An encoded, signed token. `Debug` is redacted; use [`Token::as_str`] to
/// put it on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Why a presented token could not be decoded. Only used for diagnostics;
/// callers collapse every variant into one rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenFormatError {
    #[error("token is not a well-formed JWS")]
    Malformed,
    #[error("unsupported algorithm or token type")]
    UnsupportedAlgorithm,
    #[error("token was signed by a different key")]
    KeyMismatch,
    #[error("signature does not verify")]
    Signature,
}

/// Serialize and sign `claims`.
pub fn encode(claims: &TokenClaims, keys: &SigningKeys) -> Result<Token, KeyError> {
    let mut header = Header::new(ALGORITHM);
    header.typ = Some(TOKEN_TYPE.to_string());
    header.kid = Some(keys.key_id().to_string());
    let token = jsonwebtoken::encode(&header, claims, keys.encoding_key()?)?;
    Ok(Token(token))
}

/// Parse `token` and verify its signature, returning the claims.
///
/// Expiry is not checked here.
pub fn decode(token: &str, keys: &SigningKeys) -> Result<TokenClaims, TokenFormatError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| TokenFormatError::Malformed)?;
    if header.alg != ALGORITHM || header.typ.as_deref() != Some(TOKEN_TYPE) {
        return Err(TokenFormatError::UnsupportedAlgorithm);
    }
    if header.kid.as_deref() != Some(keys.key_id()) {
        return Err(TokenFormatError::KeyMismatch);
    }

    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, keys.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenFormatError::Signature,
            _ => TokenFormatError::Malformed,
        })
}
