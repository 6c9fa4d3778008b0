use crate::blob::try_alloc;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::param::{ParamSet, Tag, key_role};

/// Fixed part of every record, ahead of the alias bytes.
pub const KEY_INFO_LEN: usize = 32;
pub const MAX_ALIAS_LEN: usize = 64;
/// Records are padded with zeros to this boundary.
pub const RECORD_ALIGN: usize = 4;

/// Per-key metadata kept in the fixed part of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMetadata {
    pub key_alg: u32,
    /// Key length in bits as requested in the params.
    pub key_len: u32,
    pub purpose: u32,
    pub role: u32,
    pub flag: u8,
}

impl KeyMetadata {
    /// Reads algorithm, size, purpose and role from a key's params.
    ///
    /// A missing role is recorded as [`key_role::ALL`].
    pub fn from_params(params: &ParamSet, flag: u8) -> Result<Self> {
        let key_alg = params
            .get_u32(Tag::ALGORITHM)?
            .ok_or_else(|| Error::InvalidArgument("params name no algorithm".to_string()))?;
        let purpose = params
            .get_u32(Tag::PURPOSE)?
            .ok_or_else(|| Error::InvalidArgument("params name no purpose".to_string()))?;
        let key_len = params.get_u32(Tag::KEY_SIZE)?.unwrap_or(0);
        let role = match params.get_u32(Tag::KEY_ROLE)? {
            Some(role) => role,
            None => key_role::ALL,
        };

        Ok(Self {
            key_alg,
            key_len,
            purpose,
            role,
            flag,
        })
    }
}

/// A record parsed in place from an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo<'a> {
    offset: usize,
    key_info_len: u32,
    meta: KeyMetadata,
    alias: &'a [u8],
    param_set: &'a [u8],
    material: &'a [u8],
}

impl<'a> KeyInfo<'a> {
    /// Parses the record at `offset`, checking every field against `image`.
    pub fn parse(image: &'a [u8], offset: usize) -> Result<Self> {
        let corrupt = |msg: String| Error::CorruptImage(format!("record at {offset}: {msg}"));
        let mut cur = Cursor::at(image, offset).map_err(|e| corrupt(e.to_string()))?;

        let key_info_len = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let key_size = cur.read_u32().map_err(|e| corrupt(e.to_string()))? as usize;
        let param_set_size = cur.read_u32().map_err(|e| corrupt(e.to_string()))? as usize;
        let key_alg = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let key_len = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let purpose = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let role = cur.read_u32().map_err(|e| corrupt(e.to_string()))?;
        let flag = cur.read_u8().map_err(|e| corrupt(e.to_string()))?;
        let _rsv = cur.read_u8().map_err(|e| corrupt(e.to_string()))?;
        let alias_size = cur.read_u16().map_err(|e| corrupt(e.to_string()))? as usize;

        let stride = key_info_len as usize;
        let body = KEY_INFO_LEN as u64 + alias_size as u64 + param_set_size as u64 + key_size as u64;
        if (stride as u64) < body {
            return Err(corrupt(format!(
                "keyInfoLen {stride} smaller than its {body} content bytes"
            )));
        }
        if stride > image.len() - offset {
            return Err(corrupt(format!(
                "keyInfoLen {stride} runs past image end {}",
                image.len()
            )));
        }

        let alias = cur.read_bytes(alias_size).map_err(|e| corrupt(e.to_string()))?;
        let param_set = cur
            .read_bytes(param_set_size)
            .map_err(|e| corrupt(e.to_string()))?;
        let material = cur.read_bytes(key_size).map_err(|e| corrupt(e.to_string()))?;

        Ok(Self {
            offset,
            key_info_len,
            meta: KeyMetadata {
                key_alg,
                key_len,
                purpose,
                role,
                flag,
            },
            alias,
            param_set,
            material,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Authoritative record length, padding included.
    pub fn key_info_len(&self) -> u32 {
        self.key_info_len
    }

    pub fn metadata(&self) -> &KeyMetadata {
        &self.meta
    }

    pub fn alias(&self) -> &'a [u8] {
        self.alias
    }

    /// Parses the built param set describing the key.
    pub fn param_set(&self) -> Result<ParamSet> {
        ParamSet::from_bytes(self.param_set).map_err(|e| {
            Error::CorruptImage(format!("record at {}: key params: {e}", self.offset))
        })
    }

    /// Stored material, sealed when the image is sealed.
    pub fn material(&self) -> &'a [u8] {
        self.material
    }
}

pub(crate) fn check_alias(alias: &[u8]) -> Result<()> {
    if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
        return Err(Error::InvalidArgument(format!(
            "alias must be 1..={MAX_ALIAS_LEN} bytes, got {}",
            alias.len()
        )));
    }
    Ok(())
}

/// Encodes one record and returns it with its `keyInfoLen`.
///
/// Layout (little endian):
/// ```text
/// KEY_INFO_LEN (4) | KEY_SIZE (4) | PARAM_SET_SIZE (4) | KEY_ALG (4) | KEY_LEN (4)
/// | PURPOSE (4) | ROLE (4) | FLAG (1) | RSV (1) | ALIAS_SIZE (2)
/// | ALIAS | PARAM_SET | MATERIAL | zero padding to RECORD_ALIGN
/// ```
pub fn serialize_key_info(
    alias: &[u8],
    material: &[u8],
    params: &ParamSet,
    meta: &KeyMetadata,
) -> Result<(Vec<u8>, u32)> {
    check_alias(alias)?;
    let param_set = params.as_bytes()?;

    let body = KEY_INFO_LEN + alias.len() + param_set.len() + material.len();
    let padded = body.div_ceil(RECORD_ALIGN) * RECORD_ALIGN;
    let key_info_len = u32::try_from(padded)
        .map_err(|_| Error::Serialization(format!("record of {padded} bytes too large")))?;
    let key_size = u32::try_from(material.len())
        .map_err(|_| Error::Serialization("key material too large".to_string()))?;

    let mut buf = try_alloc(padded)?;
    buf.extend_from_slice(&key_info_len.to_le_bytes());
    buf.extend_from_slice(&key_size.to_le_bytes());
    buf.extend_from_slice(&(param_set.len() as u32).to_le_bytes());
    buf.extend_from_slice(&meta.key_alg.to_le_bytes());
    buf.extend_from_slice(&meta.key_len.to_le_bytes());
    buf.extend_from_slice(&meta.purpose.to_le_bytes());
    buf.extend_from_slice(&meta.role.to_le_bytes());
    buf.push(meta.flag);
    buf.push(0);
    buf.extend_from_slice(&(alias.len() as u16).to_le_bytes());
    buf.extend_from_slice(alias);
    buf.extend_from_slice(param_set);
    buf.extend_from_slice(material);
    buf.resize(padded, 0);

    if buf.len() != key_info_len as usize {
        return Err(Error::Serialization(format!(
            "wrote {} bytes for a keyInfoLen of {key_info_len}",
            buf.len()
        )));
    }

    Ok((buf, key_info_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Param, alg, key_flag, purpose};

    fn params() -> ParamSet {
        ParamSet::from_params(&[
            Param::u32(Tag::ALGORITHM, alg::AES),
            Param::u32(Tag::KEY_SIZE, 128),
            Param::u32(Tag::PURPOSE, purpose::ENCRYPT | purpose::DECRYPT),
        ])
        .unwrap()
    }

    #[test]
    fn record_length_is_padded_and_parses_back() {
        let params = params();
        let meta = KeyMetadata::from_params(&params, key_flag::GENERATE_KEY as u8).unwrap();
        let (record, len) = serialize_key_info(b"abc", &[9u8; 16], &params, &meta).unwrap();

        assert_eq!(record.len(), len as usize);
        assert_eq!(len as usize % RECORD_ALIGN, 0);
        assert!(len as usize > KEY_INFO_LEN + 3 + 16);

        let info = KeyInfo::parse(&record, 0).unwrap();
        assert_eq!(info.alias(), b"abc");
        assert_eq!(info.material(), &[9u8; 16]);
        assert_eq!(info.key_info_len(), len);
        assert_eq!(info.metadata(), &meta);
        assert_eq!(info.param_set().unwrap().params(), params.params());
    }

    #[test]
    fn missing_role_records_wildcard() {
        let meta = KeyMetadata::from_params(&params(), 0).unwrap();
        assert_eq!(meta.role, key_role::ALL);
        assert_eq!(meta.key_alg, alg::AES);
        assert_eq!(meta.key_len, 128);
    }

    #[test]
    fn explicit_role_is_kept() {
        let set = ParamSet::from_params(&[
            Param::u32(Tag::ALGORITHM, alg::HMAC),
            Param::u32(Tag::PURPOSE, purpose::MAC),
            Param::u32(Tag::KEY_ROLE, key_role::MAIN),
        ])
        .unwrap();
        assert_eq!(KeyMetadata::from_params(&set, 0).unwrap().role, key_role::MAIN);
    }

    #[test]
    fn metadata_requires_algorithm() {
        let set = ParamSet::from_params(&[Param::u32(Tag::PURPOSE, purpose::MAC)]).unwrap();
        assert!(KeyMetadata::from_params(&set, 0).is_err());
    }

    #[test]
    fn alias_bounds_are_enforced() {
        let params = params();
        let meta = KeyMetadata::default();
        assert!(serialize_key_info(b"", b"k", &params, &meta).is_err());
        assert!(serialize_key_info(&[b'a'; MAX_ALIAS_LEN + 1], b"k", &params, &meta).is_err());
        assert!(serialize_key_info(&[b'a'; MAX_ALIAS_LEN], b"k", &params, &meta).is_ok());
    }

    #[test]
    fn unbuilt_params_are_refused() {
        let set = ParamSet::init().unwrap();
        let err = serialize_key_info(b"a", b"k", &set, &KeyMetadata::default()).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
    }

    #[test]
    fn parse_rejects_short_stride_and_overrun() {
        let params = params();
        let (mut record, _) =
            serialize_key_info(b"abc", b"material", &params, &KeyMetadata::default()).unwrap();

        let mut short = record.clone();
        short[..4].copy_from_slice(&(KEY_INFO_LEN as u32).to_le_bytes());
        assert!(matches!(
            KeyInfo::parse(&short, 0),
            Err(Error::CorruptImage(_))
        ));

        record.truncate(record.len() - 1);
        assert!(matches!(
            KeyInfo::parse(&record, 0),
            Err(Error::CorruptImage(_))
        ));
    }
}
