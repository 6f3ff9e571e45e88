use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::secret::SessionSecret;
use crate::error::CipherError;

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    ///
    /// # Arguments
    ///
    /// * `key` - A 32-byte array representing the AES-256 key.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// A nonce and the ciphertext (with its trailing tag) it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Concatenates `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        combined.extend_from_slice(&self.nonce);
        combined.extend_from_slice(&self.ciphertext);
        combined
    }

    /// Splits `nonce || ciphertext`, rejecting blobs too short to hold a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::Truncated(bytes.len()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut nonce_arr = [0u8; NONCE_SIZE];
        nonce_arr.copy_from_slice(nonce);

        Ok(Self {
            nonce: nonce_arr,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Standard (padded) base64 of `nonce || ciphertext`, as carried in the QR envelope.
    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(self.to_bytes())
    }

    /// Parses the base64 body of a QR envelope.
    pub fn decode(encoded: &str) -> Result<Self, CipherError> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CipherError::Encoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Derives the AES-256 key for a session secret.
///
/// The key is the first 32 bytes of the secret's UTF-8 form, which is what the
/// scanning side expects. Shorter secrets are stretched with SHA-256.
pub fn derive_key(secret: &SessionSecret) -> SecureKey {
    derive_key_from_bytes(secret.expose().as_bytes())
}

/// Same as [`derive_key`] for raw key material.
pub fn derive_key_from_bytes(material: &[u8]) -> SecureKey {
    let mut key = [0u8; KEY_SIZE];
    if material.len() >= KEY_SIZE {
        key.copy_from_slice(&material[..KEY_SIZE]);
    } else {
        let digest = Sha256::digest(material);
        key.copy_from_slice(&digest);
    }
    SecureKey::new(key)
}

/// Generates a new random AES-GCM nonce.
///
/// # Returns
///
/// A 12-byte array representing the nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts a plaintext using AES-256-GCM under a fresh random nonce.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `plaintext` - The data to encrypt.
///
/// # Returns
///
/// The nonce together with the authenticated ciphertext.
pub fn encrypt(key: &SecureKey, plaintext: &[u8]) -> Result<SealedPayload, CipherError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Seal)?;

    Ok(SealedPayload {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts and authenticates a sealed payload using AES-256-GCM.
///
/// Any modification of the nonce or ciphertext fails with [`CipherError::Open`].
pub fn decrypt(key: &SecureKey, sealed: &SealedPayload) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(sealed.nonce);

    cipher
        .decrypt(&nonce, sealed.ciphertext.as_slice())
        .map_err(|_| CipherError::Open)
}

/// Serializes `payload` to JSON and seals it.
pub fn encrypt_json<T: Serialize>(key: &SecureKey, payload: &T) -> Result<SealedPayload, CipherError> {
    let json = sonic_rs::to_vec(payload).map_err(|e| CipherError::Serialization(e.to_string()))?;
    encrypt(key, &json)
}

/// Opens a sealed payload and parses the JSON inside.
pub fn decrypt_json<T: DeserializeOwned>(key: &SecureKey, sealed: &SealedPayload) -> Result<T, CipherError> {
    let plaintext = decrypt(key, sealed)?;
    sonic_rs::from_slice(&plaintext).map_err(|e| CipherError::Serialization(e.to_string()))
}
