// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ed25519 signing key material for the token authority.
//!
//! ## Formats
//!
//! - Private key: PEM `PRIVATE KEY` (PKCS#8 v1 or v2, as produced by
//!   `openssl genpkey -algorithm ed25519`)
//! - Public key: PEM `PUBLIC KEY` (SubjectPublicKeyInfo)
//!
//! ## Security
//!
//! - Loaded once at startup and never mutated; shared by reference
//! - `Debug` prints only the key id, never key bytes
//! - A node built with [`SigningKeys::verifying_only`] can verify tokens but
//!   cannot issue them

use std::fmt;
use std::path::{Path, PathBuf};

use jsonwebtoken::{DecodingKey, EncodingKey};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use sha2::{Digest, Sha256};

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410), followed by the
/// 32 raw key bytes.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

const ED25519_PUBLIC_KEY_LEN: usize = 32;

const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";

/// Errors while loading key material. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM: {0}")]
    Pem(#[from] pem::PemError),

    #[error("unexpected PEM block '{found}' (expected '{expected}')")]
    UnexpectedTag {
        expected: &'static str,
        found: String,
    },

    #[error("private key rejected: {0}")]
    Rejected(String),

    #[error("public key is not an Ed25519 SubjectPublicKeyInfo")]
    InvalidPublicKey,

    #[error("public key does not match the private key")]
    Mismatch,

    #[error("no private key loaded; this node can only verify")]
    NoSigningKey,

    #[error("token codec rejected the key or claims: {0}")]
    Codec(#[from] jsonwebtoken::errors::Error),

    #[error("key generation failed")]
    Generation,
}

/// Immutable signing key pair, held in the form the token codec consumes.
pub struct SigningKeys {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    key_id: String,
}

impl SigningKeys {
    /// Load both halves from disk. Either failing is a startup error.
    pub fn load(private_key_path: &Path, public_key_path: &Path) -> Result<Self, KeyError> {
        let private_pem = read_key_file(private_key_path)?;
        let public_pem = read_key_file(public_key_path)?;
        Self::from_pem(&private_pem, &public_pem)
    }

    /// Build from PEM text, checking that the halves belong together.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, KeyError> {
        let private_der = parse_pem(private_pem, PRIVATE_KEY_TAG)?;
        let signer = Ed25519KeyPair::from_pkcs8_maybe_unchecked(&private_der)
            .map_err(|e| KeyError::Rejected(e.to_string()))?;

        let public_key = parse_public_key(public_pem)?;
        if signer.public_key().as_ref() != public_key.as_slice() {
            return Err(KeyError::Mismatch);
        }

        Ok(Self {
            key_id: key_id(&public_key),
            encoding: Some(EncodingKey::from_ed_pem(private_pem)?),
            decoding: DecodingKey::from_ed_pem(public_pem)?,
        })
    }

    /// Verification-only key material.
    pub fn verifying_only(public_pem: &[u8]) -> Result<Self, KeyError> {
        let public_key = parse_public_key(public_pem)?;
        Ok(Self {
            key_id: key_id(&public_key),
            encoding: None,
            decoding: DecodingKey::from_ed_pem(public_pem)?,
        })
    }

    /// Generate a fresh key pair, returned as `(private_pem, public_pem)`.
    pub fn generate_pem() -> Result<(String, String), KeyError> {
        let document = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())
            .map_err(|_| KeyError::Generation)?;
        let pair = Ed25519KeyPair::from_pkcs8(document.as_ref())
            .map_err(|e| KeyError::Rejected(e.to_string()))?;

        let mut spki = ED25519_SPKI_PREFIX.to_vec();
        spki.extend_from_slice(pair.public_key().as_ref());

        let private_pem = pem::encode(&pem::Pem::new(
            PRIVATE_KEY_TAG,
            document.as_ref().to_vec(),
        ));
        let public_pem = pem::encode(&pem::Pem::new(PUBLIC_KEY_TAG, spki));
        Ok((private_pem, public_pem))
    }

    /// Short identifier of the public key, embedded in token headers.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Whether this node holds the private half.
    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }

    pub fn encoding_key(&self) -> Result<&EncodingKey, KeyError> {
        self.encoding.as_ref().ok_or(KeyError::NoSigningKey)
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("key_id", &self.key_id)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_pem(input: &[u8], expected: &'static str) -> Result<Vec<u8>, KeyError> {
    let block = pem::parse(input)?;
    if block.tag() != expected {
        return Err(KeyError::UnexpectedTag {
            expected,
            found: block.tag().to_string(),
        });
    }
    Ok(block.into_contents())
}

fn parse_public_key(public_pem: &[u8]) -> Result<Vec<u8>, KeyError> {
    let der = parse_pem(public_pem, PUBLIC_KEY_TAG)?;
    match der.strip_prefix(&ED25519_SPKI_PREFIX[..]) {
        Some(raw) if raw.len() == ED25519_PUBLIC_KEY_LEN => Ok(raw.to_vec()),
        _ => Err(KeyError::InvalidPublicKey),
    }
}

/// First 8 bytes of SHA-256 over the raw public key, hex encoded.
fn key_id(public_key: &[u8]) -> String {
    Sha256::digest(public_key)[..8]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
