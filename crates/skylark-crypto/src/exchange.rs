//! P-256 ECDH key exchange and AES-CTR payload encryption
//!
//! One [`KeyExchange`] engine backs one session. An ephemeral key pair
//! exists only while an exchange attempt is in flight and is consumed by
//! the agreement step; the derived shared secret and its fingerprint
//! outlive the exchange and key all subsequent encryption.
//!
//! Public keys cross the wire as SPKI/PEM bytes so either side can be
//! implemented against any standard ECDH stack. Ciphertexts are
//! self-describing: a fresh random 16-byte IV is prepended to every
//! output, and AES-256-CTR needs no padding for variable-length tokens.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ctr::cipher::{KeyIvInit, StreamCipher};
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::store::CachedKey;
use crate::{FINGERPRINT_LEN, IV_LEN};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Key-exchange engine: ephemeral ECDH pair, agreed shared secret, and
/// the fingerprint derived from it.
pub struct KeyExchange {
    /// Ephemeral secret for the exchange attempt in flight, if any.
    ephemeral: Option<EphemeralSecret>,
    /// Raw ECDH shared secret once agreed or loaded from the store.
    shared_secret: Option<Zeroizing<Vec<u8>>>,
    /// Cached fingerprint; `0` means not yet computed or no cached key.
    fingerprint: i64,
}

impl KeyExchange {
    /// Engine with no key material.
    pub fn new() -> Self {
        Self {
            ephemeral: None,
            shared_secret: None,
            fingerprint: 0,
        }
    }

    /// Engine seeded with key material loaded from a [`crate::KeyStore`].
    pub fn from_cached(cached: CachedKey) -> Self {
        Self {
            ephemeral: None,
            shared_secret: cached.secret,
            fingerprint: cached.fingerprint,
        }
    }

    /// Generate a fresh ephemeral P-256 key pair, discarding any prior one.
    pub fn generate_key_pair(&mut self) {
        self.ephemeral = Some(EphemeralSecret::random(&mut OsRng));
    }

    /// The local public key as SPKI/PEM bytes.
    pub fn public_key_pem(&self) -> Result<Vec<u8>> {
        let ephemeral = self
            .ephemeral
            .as_ref()
            .ok_or(CryptoError::NotReady("key pair not generated"))?;
        let pem = ephemeral
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(pem.into_bytes())
    }

    /// Perform ECDH agreement with the peer's SPKI/PEM public key.
    ///
    /// Consumes the ephemeral pair and replaces any previously held
    /// shared secret; the fingerprint cache is invalidated so the next
    /// [`KeyExchange::fingerprint`] call reflects the new secret.
    pub fn derive_shared_secret(&mut self, peer_public_key_pem: &[u8]) -> Result<()> {
        if self.ephemeral.is_none() {
            return Err(CryptoError::NotReady("key pair not generated"));
        }

        let pem = std::str::from_utf8(peer_public_key_pem)
            .map_err(|e| CryptoError::InvalidPeerKey(e.to_string()))?;
        let peer_key = PublicKey::from_public_key_pem(pem)
            .map_err(|e| CryptoError::InvalidPeerKey(e.to_string()))?;

        // take() so the pair is gone after this attempt, success or not
        let ephemeral = self
            .ephemeral
            .take()
            .ok_or(CryptoError::NotReady("key pair not generated"))?;
        let secret = ephemeral.diffie_hellman(&peer_key);

        self.shared_secret = Some(Zeroizing::new(secret.raw_secret_bytes().to_vec()));
        self.fingerprint = 0;
        Ok(())
    }

    /// Fingerprint of the shared secret.
    ///
    /// Returns the cached value when set, otherwise folds the first 8
    /// bytes of the current secret into a little-endian signed 64-bit
    /// integer and caches it. Equal secrets always yield equal
    /// fingerprints, on any engine instance.
    pub fn fingerprint(&mut self) -> Result<i64> {
        if self.fingerprint != 0 {
            return Ok(self.fingerprint);
        }
        let secret = self
            .shared_secret
            .as_ref()
            .ok_or(CryptoError::NotReady("shared secret not derived"))?;
        if secret.len() < FINGERPRINT_LEN {
            return Err(CryptoError::Malformed(format!(
                "shared secret too short for fingerprint: {} bytes",
                secret.len()
            )));
        }
        let mut leading = [0u8; FINGERPRINT_LEN];
        leading.copy_from_slice(&secret[..FINGERPRINT_LEN]);
        self.fingerprint = i64::from_le_bytes(leading);
        Ok(self.fingerprint)
    }

    /// Fingerprint currently cached, `0` when none.
    pub fn cached_fingerprint(&self) -> i64 {
        self.fingerprint
    }

    /// True when a usable cached key exists (fingerprint and secret).
    pub fn has_cached_key(&self) -> bool {
        self.fingerprint != 0 && self.shared_secret.is_some()
    }

    /// Raw shared secret bytes, if agreed.
    pub fn shared_secret(&self) -> Option<&[u8]> {
        self.shared_secret.as_deref().map(Vec::as_slice)
    }

    /// Encrypt a payload, producing `iv ∥ ciphertext` with a fresh
    /// random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let secret = self
            .shared_secret
            .as_ref()
            .ok_or(CryptoError::NotReady("shared secret not derived"))?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut cipher = Aes256Ctr::new_from_slices(secret, &iv)
            .map_err(|_| CryptoError::Malformed(format!("invalid key length: {}", secret.len())))?;

        let mut out = Vec::with_capacity(IV_LEN + plaintext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);
        cipher.apply_keystream(&mut out[IV_LEN..]);
        Ok(out)
    }

    /// Decrypt `iv ∥ ciphertext` produced by [`KeyExchange::encrypt`].
    pub fn decrypt(&self, iv_and_ciphertext: &[u8]) -> Result<Vec<u8>> {
        let secret = self
            .shared_secret
            .as_ref()
            .ok_or(CryptoError::NotReady("shared secret not derived"))?;
        if iv_and_ciphertext.len() < IV_LEN {
            return Err(CryptoError::Malformed(format!(
                "ciphertext shorter than IV: {} bytes",
                iv_and_ciphertext.len()
            )));
        }

        let (iv, body) = iv_and_ciphertext.split_at(IV_LEN);
        let mut cipher = Aes256Ctr::new_from_slices(secret, iv)
            .map_err(|_| CryptoError::Malformed(format!("invalid key length: {}", secret.len())))?;

        let mut out = body.to_vec();
        cipher.apply_keystream(&mut out);
        Ok(out)
    }

    /// Encrypt and base64-encode, for string-valued wire parameters.
    pub fn encrypt_to_base64(&self, plaintext: &[u8]) -> Result<String> {
        Ok(BASE64.encode(self.encrypt(plaintext)?))
    }

    /// Base64-decode and decrypt a string-valued wire parameter.
    pub fn decrypt_from_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        self.decrypt(&bytes)
    }
}

impl Default for KeyExchange {
    fn default() -> Self {
        Self::new()
    }
}
