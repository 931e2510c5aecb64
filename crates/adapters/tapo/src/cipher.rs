//! Session cipher: AES-128-CBC keyed from the session token.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::TapoError;

type Encryptor = cbc::Encryptor<aes::Aes128>;
type Decryptor = cbc::Decryptor<aes::Aes128>;

/// Key is the first 16 bytes of SHA-256(token), IV the first 16 bytes of
/// SHA-1(token). Ciphertext travels base64-encoded.
#[derive(Clone)]
pub struct TapoCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl TapoCipher {
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        let mut key = [0u8; 16];
        key.copy_from_slice(&Sha256::digest(token.as_bytes())[..16]);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&Sha1::digest(token.as_bytes())[..16]);
        Self { key, iv }
    }

    /// PKCS7-pad, encrypt and base64-encode.
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let ciphertext = Encryptor::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        STANDARD.encode(ciphertext)
    }

    /// Reverse of [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`TapoError::Cipher`] for invalid base64, a length that is not
    /// a whole number of blocks, or bad padding.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, TapoError> {
        let ciphertext = STANDARD
            .decode(encoded.trim())
            .map_err(|_| TapoError::Cipher("response is not valid base64"))?;
        Decryptor::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| TapoError::Cipher("response does not decrypt under the session key"))
    }
}

impl std::fmt::Debug for TapoCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TapoCipher(..)")
    }
}
