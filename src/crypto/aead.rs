use anyhow::{Result, anyhow};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroizing;

use super::{KEY_LEN, KdfParams, NONCE_LEN, SALT_LEN, TAG_LEN, derive_key, secure_random};

const VERIFY_AAD: &[u8] = b"hukstore password check";

/// Seals key material with XChaCha20-Poly1305 under a password-derived key.
///
/// Sealed form: `NONCE (24) | CIPHERTEXT | TAG (16)`. The alias is bound in
/// as associated data so a record cannot be moved under another name.
pub struct Sealer {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl Sealer {
    pub fn derive(password: &str, salt: &[u8; SALT_LEN], kdf: KdfParams) -> Result<Self> {
        let key = derive_key(password, salt, kdf)?;
        Ok(Self { key })
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }

    /// Number of bytes `seal` adds to the plaintext.
    pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        secure_random(&mut nonce)?;

        let ciphertext = self
            .cipher()
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| anyhow!("encryption failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, aad: &[u8], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < Self::OVERHEAD {
            return Err(anyhow!("sealed material too short"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let plaintext = self
            .cipher()
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| anyhow!("Invalid password or corrupted data"))?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Produces the nonce and tag stored in the image header.
    pub fn verifier(&self) -> Result<([u8; NONCE_LEN], [u8; TAG_LEN])> {
        let sealed = self.seal(VERIFY_AAD, &[])?;
        let mut nonce = [0u8; NONCE_LEN];
        let mut tag = [0u8; TAG_LEN];
        nonce.copy_from_slice(&sealed[..NONCE_LEN]);
        tag.copy_from_slice(&sealed[NONCE_LEN..]);
        Ok((nonce, tag))
    }

    /// Fails unless this key produced the given header verifier.
    pub fn check_verifier(&self, nonce: &[u8; NONCE_LEN], tag: &[u8; TAG_LEN]) -> Result<()> {
        let mut sealed = [0u8; NONCE_LEN + TAG_LEN];
        sealed[..NONCE_LEN].copy_from_slice(nonce);
        sealed[NONCE_LEN..].copy_from_slice(tag);
        self.open(VERIFY_AAD, &sealed)
            .map(|_| ())
            .map_err(|_| anyhow!("Invalid password or corrupted data"))
    }
}
