//! Token-derived AES-128-CBC.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::MiioError;

type Encryptor = cbc::Encryptor<aes::Aes128>;
type Decryptor = cbc::Decryptor<aes::Aes128>;

/// `key = MD5(token)`, `iv = MD5(key ‖ token)`.
#[derive(Clone)]
pub struct MiioCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl MiioCipher {
    #[must_use]
    pub fn new(token: &[u8; 16]) -> Self {
        let key = md5::compute(token).0;
        let mut ctx = md5::Context::new();
        ctx.consume(key);
        ctx.consume(token);
        Self {
            key,
            iv: ctx.compute().0,
        }
    }

    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Encryptor::new(&self.key.into(), &self.iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// # Errors
    ///
    /// Returns [`MiioError::Cipher`] for misaligned input or bad padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, MiioError> {
        Decryptor::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| MiioError::Cipher)
    }
}

impl std::fmt::Debug for MiioCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MiioCipher(..)")
    }
}
