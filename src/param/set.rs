//! Growable parameter set with a one-way build into a contiguous layout.
//!
//! Built layout (little endian):
//! ```text
//! PARAM_SET_SIZE (4) | PARAMS_CNT (4) | ENTRY (16) * PARAMS_CNT | BLOB PAYLOADS
//! ENTRY = TAG (4) | RESERVED (4) | VALUE (8)
//! ```
//! A bytes value is stored as `SIZE (4) | OFFSET (4)` in the value slot,
//! with the offset measured from the start of the set. Payloads follow the
//! entries back to back, in entry order.

use log::debug;
use zeroize::Zeroizing;

use super::{Param, ParamValue, Tag, TagType};
use crate::blob::{Blob, try_alloc};
use crate::cursor::Cursor;
use crate::error::{Error, Result};

pub const PARAM_SET_HEADER_LEN: usize = 8;
pub const PARAM_ENTRY_LEN: usize = 16;
/// Initial advisory size of a fresh set; not a limit.
pub const DEFAULT_PARAM_SET_SIZE: u32 = 512;
/// Hard limit on the serialized size of any set.
pub const PARAM_SET_MAX_SIZE: u32 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Building,
    Built,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Building => "building",
            State::Built => "built",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSet {
    state: State,
    params: Vec<Param>,
    param_set_size: u32,
    bytes: Option<Zeroizing<Vec<u8>>>,
}

impl ParamSet {
    /// Creates an empty set in the building state.
    pub fn init() -> Result<Self> {
        let mut params = Vec::new();
        let slots = (DEFAULT_PARAM_SET_SIZE as usize - PARAM_SET_HEADER_LEN) / PARAM_ENTRY_LEN;
        params
            .try_reserve(slots)
            .map_err(|_| Error::Allocation(slots * std::mem::size_of::<Param>()))?;

        Ok(Self {
            state: State::Building,
            params,
            param_set_size: DEFAULT_PARAM_SET_SIZE,
            bytes: None,
        })
    }

    /// Convenience for `init` + `add_params` + `build`.
    pub fn from_params(params: &[Param]) -> Result<Self> {
        let mut set = Self::init()?;
        set.add_params(params)?;
        set.build()?;
        Ok(set)
    }

    /// Releases the set behind `handle` and leaves `None` in its place.
    pub fn free(handle: &mut Option<ParamSet>) {
        if let Some(set) = handle.take() {
            debug!("freeing param set with {} params", set.params.len());
            drop(set);
        }
    }

    fn require(&self, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(Error::State {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    /// Appends copies of `params`. Either all of them are added or none.
    pub fn add_params(&mut self, params: &[Param]) -> Result<()> {
        self.require(State::Building)?;

        let mut added = 0u64;
        for param in params {
            param.check()?;
            added += PARAM_ENTRY_LEN as u64 + payload_len(param) as u64;
        }

        let estimate = self.serialized_len() as u64 + added;
        if estimate > PARAM_SET_MAX_SIZE as u64 {
            return Err(Error::InvalidArgument(format!(
                "param set of {estimate} bytes exceeds {PARAM_SET_MAX_SIZE}"
            )));
        }

        self.params
            .try_reserve(params.len())
            .map_err(|_| Error::Allocation(params.len() * std::mem::size_of::<Param>()))?;
        self.params.extend_from_slice(params);
        self.param_set_size = self.param_set_size.max(estimate as u32);
        Ok(())
    }

    /// Serializes the set and freezes it.
    pub fn build(&mut self) -> Result<()> {
        self.require(State::Building)?;

        let mut compacted = Vec::new();
        compacted
            .try_reserve_exact(self.params.len())
            .map_err(|_| Error::Allocation(self.params.len() * std::mem::size_of::<Param>()))?;

        for param in &self.params {
            let value = match param.value() {
                ParamValue::Blob(blob) => {
                    if !blob.is_consistent() {
                        return Err(Error::Build(format!(
                            "blob for tag {} declares {} bytes without backing data",
                            param.tag(),
                            blob.size()
                        )));
                    }
                    ParamValue::Blob(Blob::from_slice(blob.bytes()?)?)
                }
                other => other.clone(),
            };
            compacted.push(Param::new(param.tag(), value));
        }

        let size = serialized_len_of(&compacted);
        if size > PARAM_SET_MAX_SIZE as usize {
            return Err(Error::Build(format!(
                "param set of {size} bytes exceeds {PARAM_SET_MAX_SIZE}"
            )));
        }

        let bytes = encode(&compacted, size)?;
        if bytes.len() != size {
            return Err(Error::Build(format!(
                "encoded {} bytes, expected {size}",
                bytes.len()
            )));
        }

        debug!("built param set: {} params, {size} bytes", compacted.len());
        self.params = compacted;
        self.param_set_size = size as u32;
        self.bytes = Some(bytes);
        self.state = State::Built;
        Ok(())
    }

    /// Parses and validates a serialized set. The result is already built.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let invalid = |msg: String| Error::InvalidArgument(format!("param set bytes: {msg}"));

        let mut cur = Cursor::new(data);
        let declared = cur.read_u32().map_err(|e| invalid(e.to_string()))?;
        let count = cur.read_u32().map_err(|e| invalid(e.to_string()))? as usize;

        if declared as usize != data.len() {
            return Err(invalid(format!(
                "declares {declared} bytes, buffer holds {}",
                data.len()
            )));
        }
        if declared > PARAM_SET_MAX_SIZE {
            return Err(invalid(format!("size {declared} exceeds maximum")));
        }

        let payload_start = count
            .checked_mul(PARAM_ENTRY_LEN)
            .and_then(|n| n.checked_add(PARAM_SET_HEADER_LEN))
            .filter(|&n| n <= data.len())
            .ok_or_else(|| invalid(format!("{count} entries do not fit")))?;

        let mut params = Vec::new();
        params
            .try_reserve_exact(count)
            .map_err(|_| Error::Allocation(count * std::mem::size_of::<Param>()))?;

        let mut next_payload = payload_start;
        for _ in 0..count {
            let tag = Tag(cur.read_u32().map_err(|e| invalid(e.to_string()))?);
            let reserved = cur.read_u32().map_err(|e| invalid(e.to_string()))?;
            let raw = cur.read_u64().map_err(|e| invalid(e.to_string()))?;

            if reserved != 0 {
                return Err(invalid(format!("reserved field set for tag {tag}")));
            }

            let value = match tag.tag_type() {
                Some(TagType::Uint) => {
                    let v = u32::try_from(raw)
                        .map_err(|_| invalid(format!("uint32 tag {tag} holds {raw:#x}")))?;
                    ParamValue::U32(v)
                }
                Some(TagType::Ulong) => ParamValue::U64(raw),
                Some(TagType::Bool) => match raw {
                    0 => ParamValue::Bool(false),
                    1 => ParamValue::Bool(true),
                    _ => return Err(invalid(format!("bool tag {tag} holds {raw:#x}"))),
                },
                Some(TagType::Bytes) => {
                    let size = (raw & 0xFFFF_FFFF) as usize;
                    let offset = (raw >> 32) as usize;
                    if offset != next_payload {
                        return Err(invalid(format!(
                            "blob for tag {tag} at offset {offset}, expected {next_payload}"
                        )));
                    }
                    let mut payload = Cursor::at(data, offset).map_err(|e| invalid(e.to_string()))?;
                    let bytes = payload
                        .read_bytes(size)
                        .map_err(|e| invalid(e.to_string()))?;
                    next_payload += size;
                    ParamValue::Blob(Blob::from_slice(bytes)?)
                }
                None => return Err(invalid(format!("tag {tag} has no valid type class"))),
            };
            params.push(Param::new(tag, value));
        }

        if next_payload != data.len() {
            return Err(invalid(format!(
                "{} trailing bytes after payloads",
                data.len() - next_payload
            )));
        }

        let mut bytes = try_alloc(data.len())?;
        bytes.extend_from_slice(data);

        Ok(Self {
            state: State::Built,
            params,
            param_set_size: declared,
            bytes: Some(Zeroizing::new(bytes)),
        })
    }

    /// Size field: advisory capacity while building, exact size once built.
    pub fn param_set_size(&self) -> u32 {
        self.param_set_size
    }

    pub fn is_built(&self) -> bool {
        self.state == State::Built
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The contiguous serialized form of a built set.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.require(State::Built)?;
        self.bytes
            .as_deref()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Build("built set lost its bytes".to_string()))
    }

    /// First param carrying `tag`. Later duplicates are never returned.
    pub fn get_param(&self, tag: Tag) -> Option<&Param> {
        self.params.iter().find(|p| p.tag() == tag)
    }

    pub fn get_u32(&self, tag: Tag) -> Result<Option<u32>> {
        self.get_param(tag).map(Param::as_u32).transpose()
    }

    pub fn get_u64(&self, tag: Tag) -> Result<Option<u64>> {
        self.get_param(tag).map(Param::as_u64).transpose()
    }

    pub fn get_bool(&self, tag: Tag) -> Result<Option<bool>> {
        self.get_param(tag).map(Param::as_bool).transpose()
    }

    pub fn get_blob(&self, tag: Tag) -> Result<Option<&Blob>> {
        self.get_param(tag).map(Param::as_blob).transpose()
    }

    fn serialized_len(&self) -> usize {
        serialized_len_of(&self.params)
    }
}

fn payload_len(param: &Param) -> usize {
    match param.value() {
        ParamValue::Blob(blob) => blob.size() as usize,
        _ => 0,
    }
}

fn serialized_len_of(params: &[Param]) -> usize {
    PARAM_SET_HEADER_LEN
        + params
            .iter()
            .map(|p| PARAM_ENTRY_LEN + payload_len(p))
            .sum::<usize>()
}

fn encode(params: &[Param], size: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(try_alloc(size)?);

    buf.extend_from_slice(&(size as u32).to_le_bytes());
    buf.extend_from_slice(&(params.len() as u32).to_le_bytes());

    let mut payload_offset = (PARAM_SET_HEADER_LEN + params.len() * PARAM_ENTRY_LEN) as u64;
    for param in params {
        let raw = match param.value() {
            ParamValue::U32(v) => u64::from(*v),
            ParamValue::U64(v) => *v,
            ParamValue::Bool(v) => u64::from(*v),
            ParamValue::Blob(blob) => {
                let raw = u64::from(blob.size()) | (payload_offset << 32);
                payload_offset += u64::from(blob.size());
                raw
            }
        };
        buf.extend_from_slice(&param.tag().value().to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&raw.to_le_bytes());
    }

    for param in params {
        if let ParamValue::Blob(blob) = param.value() {
            buf.extend_from_slice(blob.bytes()?);
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{alg, purpose};

    fn blob(bytes: &[u8]) -> Blob {
        Blob::from_slice(bytes).unwrap()
    }

    #[test]
    fn scalar_set_has_exact_size_and_lookup() {
        let mut set = ParamSet::init().unwrap();
        set.add_params(&[
            Param::u32(Tag::ALGORITHM, alg::AES),
            Param::u32(Tag::KEY_SIZE, 256),
        ])
        .unwrap();
        set.build().unwrap();

        assert_eq!(
            set.param_set_size() as usize,
            PARAM_SET_HEADER_LEN + 2 * PARAM_ENTRY_LEN
        );
        assert_eq!(set.as_bytes().unwrap().len(), set.param_set_size() as usize);
        assert_eq!(set.get_u32(Tag::ALGORITHM).unwrap(), Some(alg::AES));
    }

    #[test]
    fn serialized_set_parses_back_to_same_params() {
        let set = ParamSet::from_params(&[
            Param::u32(Tag::ALGORITHM, alg::X25519),
            Param::u32(Tag::PURPOSE, purpose::SIGN | purpose::VERIFY),
            Param::u64(Tag::CREATION_DATETIME, 1_700_000_000_000),
            Param::bool(Tag::NO_AUTH_REQUIRED, true),
            Param::blob(Tag::ATTESTATION_CHALLENGE, blob(b"challenge")),
            Param::blob(Tag::SALT, blob(&[7u8; 16])),
        ])
        .unwrap();

        let parsed = ParamSet::from_bytes(set.as_bytes().unwrap()).unwrap();

        assert!(parsed.is_built());
        assert_eq!(parsed.params(), set.params());
        assert_eq!(parsed.param_set_size(), set.param_set_size());
        assert_eq!(
            set.param_set_size() as usize,
            PARAM_SET_HEADER_LEN + 6 * PARAM_ENTRY_LEN + 9 + 16
        );
    }

    #[test]
    fn add_params_is_all_or_nothing() {
        let mut set = ParamSet::init().unwrap();
        let result = set.add_params(&[
            Param::u32(Tag::ALGORITHM, alg::AES),
            Param::bool(Tag::KEY_SIZE, true),
            Param::u32(Tag::PURPOSE, purpose::ENCRYPT),
        ]);

        assert!(matches!(result, Err(Error::Mismatch { .. })));
        assert!(set.is_empty());
        assert_eq!(set.param_set_size(), DEFAULT_PARAM_SET_SIZE);
    }

    #[test]
    fn add_after_build_is_a_state_error() {
        let mut set = ParamSet::from_params(&[Param::u32(Tag::ALGORITHM, alg::AES)]).unwrap();
        let err = set
            .add_params(&[Param::u32(Tag::KEY_SIZE, 128)])
            .unwrap_err();

        assert!(matches!(err, Error::State { .. }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn second_build_is_a_state_error() {
        let mut set = ParamSet::init().unwrap();
        set.build().unwrap();
        assert!(matches!(set.build(), Err(Error::State { .. })));
    }

    #[test]
    fn bytes_before_build_is_a_state_error() {
        let set = ParamSet::init().unwrap();
        assert!(matches!(set.as_bytes(), Err(Error::State { .. })));
    }

    #[test]
    fn build_rejects_blob_without_data() {
        let hollow = Blob::construct(true, 12, false, 0).unwrap().unwrap();
        let mut set = ParamSet::init().unwrap();
        set.add_params(&[Param::blob(Tag::IV, hollow)]).unwrap();

        assert!(matches!(set.build(), Err(Error::Build(_))));
        assert!(!set.is_built());
    }

    #[test]
    fn build_trims_blob_to_declared_size() {
        let fixture = Blob::construct(true, 4, true, 32).unwrap().unwrap();
        let set = ParamSet::from_params(&[Param::blob(Tag::NONCE, fixture)]).unwrap();

        assert_eq!(set.get_blob(Tag::NONCE).unwrap().unwrap().size(), 4);
        assert_eq!(
            set.param_set_size() as usize,
            PARAM_SET_HEADER_LEN + PARAM_ENTRY_LEN + 4
        );
    }

    #[test]
    fn duplicate_tags_resolve_to_first() {
        let set = ParamSet::from_params(&[
            Param::u32(Tag::KEY_SIZE, 128),
            Param::u32(Tag::KEY_SIZE, 256),
        ])
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_u32(Tag::KEY_SIZE).unwrap(), Some(128));
    }

    #[test]
    fn absent_tag_is_none_not_error() {
        let set = ParamSet::from_params(&[Param::u32(Tag::ALGORITHM, alg::AES)]).unwrap();
        assert_eq!(set.get_u32(Tag::KEY_ROLE).unwrap(), None);
        assert!(set.get_param(Tag::KEY_ROLE).is_none());
    }

    #[test]
    fn typed_getter_rejects_wrong_kind() {
        let set = ParamSet::from_params(&[Param::u32(Tag::ALGORITHM, alg::AES)]).unwrap();
        assert!(matches!(
            set.get_u64(Tag::ALGORITHM),
            Err(Error::Mismatch { .. })
        ));
    }

    #[test]
    fn free_is_idempotent() {
        let mut handle = Some(ParamSet::init().unwrap());
        ParamSet::free(&mut handle);
        assert!(handle.is_none());
        ParamSet::free(&mut handle);
        assert!(handle.is_none());
    }

    #[test]
    fn oversized_set_is_refused_whole() {
        let big = Blob::from_vec(vec![0u8; PARAM_SET_MAX_SIZE as usize]).unwrap();
        let mut set = ParamSet::init().unwrap();

        assert!(set.add_params(&[Param::blob(Tag::INFO, big)]).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn from_bytes_rejects_truncated_payload() {
        let set = ParamSet::from_params(&[Param::blob(Tag::SALT, blob(b"0123456789"))]).unwrap();
        let bytes = set.as_bytes().unwrap();
        let mut cut = bytes[..bytes.len() - 3].to_vec();
        let len = cut.len() as u32;
        cut[..4].copy_from_slice(&len.to_le_bytes());

        assert!(matches!(
            ParamSet::from_bytes(&cut),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_bytes_rejects_size_mismatch() {
        let set = ParamSet::from_params(&[Param::u32(Tag::ALGORITHM, alg::AES)]).unwrap();
        let mut bytes = set.as_bytes().unwrap().to_vec();
        bytes.push(0);

        assert!(ParamSet::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_bad_bool_and_count() {
        let set = ParamSet::from_params(&[Param::bool(Tag::ALL_USERS, true)]).unwrap();
        let mut bytes = set.as_bytes().unwrap().to_vec();
        bytes[PARAM_SET_HEADER_LEN + 8] = 2;
        assert!(ParamSet::from_bytes(&bytes).is_err());

        let mut bytes = set.as_bytes().unwrap().to_vec();
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(ParamSet::from_bytes(&bytes).is_err());
    }
}
