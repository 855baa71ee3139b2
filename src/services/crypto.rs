// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encryption of OAuth tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under a key derived from
//! `TOKEN_ENCRYPTION_KEY` via HKDF-SHA256. Stored form is
//! `base64(nonce || ciphertext || tag)`. The associated data binds each
//! ciphertext to the session it belongs to, so a token copied into another
//! user's session fails to decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

const HKDF_INFO: &[u8] = b"caravan-clubs oauth token encryption v1";

/// Symmetric cipher for session tokens.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
    rng: SystemRandom,
}

impl TokenCipher {
    /// Derive the cipher key from configured key material.
    pub fn new(key_material: &[u8]) -> Result<Self, AppError> {
        if key_material.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Token encryption key is empty"
            )));
        }
        let mut key = [0u8; 32];
        Hkdf::<Sha256>::new(None, key_material)
            .expand(HKDF_INFO, &mut key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {}", e)))?;
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    fn sealing_key(&self) -> Result<LessSafeKey, AppError> {
        UnboundKey::new(&AES_256_GCM, &self.key)
            .map(LessSafeKey::new)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid AES key")))
    }

    /// Encrypt `plaintext`, binding it to `context`.
    pub fn encrypt(&self, plaintext: &str, context: &str) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Nonce generation failed")))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.sealing_key()?
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(context.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt) with the same `context`.
    pub fn decrypt(&self, sealed_b64: &str, context: &str) -> Result<String, AppError> {
        let sealed = BASE64
            .decode(sealed_b64)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Base64 decode failed: {}", e)))?;
        if sealed.len() < NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!("Ciphertext too short")));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid nonce")))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .sealing_key()?
            .open_in_place(nonce, Aad::from(context.as_bytes()), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token decryption failed")))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}
