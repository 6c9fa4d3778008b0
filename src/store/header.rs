use crate::crypto::{KdfParams, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Magic bytes identifying a key store image ("HKST").
pub const MAGIC: &[u8; 4] = b"HKST";
pub const VERSION_V1: u16 = 1;

/// Values for the header's sealing algorithm field.
pub mod sealing {
    pub const NONE: u32 = 0;
    pub const XCHACHA20_POLY1305: u32 = 1;
}

const MAGIC_LEN: usize = 4;
const VER_LEN: usize = 2;
const COUNT_LEN: usize = 2;
const TOTAL_LEN: usize = 4;
const SEAL_LEN: usize = 4;
const KDF_LEN: usize = 12;

/// Fixed image header.
///
/// `key_count` and `total_len` are bookkeeping written by this crate; a
/// header read back from disk is never trusted to index the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHeader {
    version: u16,
    key_count: u16,
    total_len: u32,
    sealing_alg: u32,
    kdf: Option<KdfParams>,
    salt: [u8; SALT_LEN],
    verify_nonce: [u8; NONCE_LEN],
    verify_tag: [u8; TAG_LEN],
}

impl StoreHeader {
    pub const LEN: usize = MAGIC_LEN
        + VER_LEN
        + COUNT_LEN
        + TOTAL_LEN
        + SEAL_LEN
        + KDF_LEN
        + SALT_LEN
        + NONCE_LEN
        + TAG_LEN;

    /// Header of an empty store whose material is stored as-is.
    pub fn plain() -> Self {
        Self {
            version: VERSION_V1,
            key_count: 0,
            total_len: Self::LEN as u32,
            sealing_alg: sealing::NONE,
            kdf: None,
            salt: [0; SALT_LEN],
            verify_nonce: [0; NONCE_LEN],
            verify_tag: [0; TAG_LEN],
        }
    }

    /// Header of an empty store whose material is sealed.
    pub fn sealed(
        kdf: KdfParams,
        salt: [u8; SALT_LEN],
        verify_nonce: [u8; NONCE_LEN],
        verify_tag: [u8; TAG_LEN],
    ) -> Self {
        Self {
            sealing_alg: sealing::XCHACHA20_POLY1305,
            kdf: Some(kdf),
            salt,
            verify_nonce,
            verify_tag,
            ..Self::plain()
        }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn key_count(&self) -> u16 {
        self.key_count
    }

    pub fn total_len(&self) -> u32 {
        self.total_len
    }

    pub fn sealing_alg(&self) -> u32 {
        self.sealing_alg
    }

    pub fn is_sealed(&self) -> bool {
        self.sealing_alg != sealing::NONE
    }

    pub fn kdf(&self) -> Option<KdfParams> {
        self.kdf
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn verify_nonce(&self) -> &[u8; NONCE_LEN] {
        &self.verify_nonce
    }

    pub fn verify_tag(&self) -> &[u8; TAG_LEN] {
        &self.verify_tag
    }

    /// Same header with new bookkeeping counts.
    pub fn with_counts(&self, key_count: u16, total_len: u32) -> Self {
        Self {
            key_count,
            total_len,
            ..self.clone()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);

        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.key_count.to_le_bytes());
        buf.extend_from_slice(&self.total_len.to_le_bytes());
        buf.extend_from_slice(&self.sealing_alg.to_le_bytes());

        let (mem, time, par) = match self.kdf {
            Some(kdf) => (kdf.mem_cost_kib(), kdf.time_cost(), kdf.parallelism()),
            None => (0, 0, 0),
        };
        buf.extend_from_slice(&mem.to_le_bytes());
        buf.extend_from_slice(&time.to_le_bytes());
        buf.extend_from_slice(&par.to_le_bytes());

        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.verify_nonce);
        buf.extend_from_slice(&self.verify_tag);

        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let corrupt = |msg: String| Error::CorruptImage(format!("header: {msg}"));
        let mut cur = Cursor::new(data);

        let magic: [u8; MAGIC_LEN] = cur.read_array().map_err(|e| corrupt(e.to_string()))?;
        if &magic != MAGIC {
            return Err(corrupt("invalid magic".to_string()));
        }

        let version = cur.read_u16().map_err(|e| corrupt(e.to_string()))?;
        if version != VERSION_V1 {
            return Err(corrupt(format!("unsupported version: {version}")));
        }

        let key_count = cur.read_u16().map_err(|e| corrupt(e.to_string()))?;
        let total_len = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let sealing_alg = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let mem = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let time = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let par = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let salt = cur.read_array().map_err(|e| corrupt(e.to_string()))?;
        let verify_nonce = cur.read_array().map_err(|e| corrupt(e.to_string()))?;
        let verify_tag = cur.read_array().map_err(|e| corrupt(e.to_string()))?;

        let kdf = match sealing_alg {
            sealing::NONE => None,
            sealing::XCHACHA20_POLY1305 => Some(
                KdfParams::new(mem, time, par).map_err(|e| corrupt(format!("kdf params: {e}")))?,
            ),
            other => return Err(corrupt(format!("unknown sealing algorithm {other}"))),
        };

        Ok(Self {
            version,
            key_count,
            total_len,
            sealing_alg,
            kdf,
            salt,
            verify_nonce,
            verify_tag,
        })
    }
}
