//! Typed key parameters and parameter sets.
//!
//! A [`Param`] pairs a [`Tag`] with one of four value kinds. The kind is
//! fixed by the tag's type class, and every typed accessor checks that
//! before handing out a value.

use crate::blob::Blob;
use crate::error::{Error, Result};

mod set;
mod tag;

pub use set::{
    DEFAULT_PARAM_SET_SIZE, PARAM_ENTRY_LEN, PARAM_SET_HEADER_LEN, PARAM_SET_MAX_SIZE, ParamSet,
};
pub use tag::{
    Tag, TagType, alg, digest, generate_type, key_flag, key_role, mode, padding, purpose,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    U32(u32),
    U64(u64),
    Bool(bool),
    Blob(Blob),
}

impl ParamValue {
    fn kind(&self) -> TagType {
        match self {
            ParamValue::U32(_) => TagType::Uint,
            ParamValue::U64(_) => TagType::Ulong,
            ParamValue::Bool(_) => TagType::Bool,
            ParamValue::Blob(_) => TagType::Bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    tag: Tag,
    value: ParamValue,
}

impl Param {
    /// Pairs a tag with a value without checking them; see [`Param::check`].
    pub fn new(tag: Tag, value: ParamValue) -> Self {
        Self { tag, value }
    }

    pub fn u32(tag: Tag, value: u32) -> Self {
        Self::new(tag, ParamValue::U32(value))
    }

    pub fn u64(tag: Tag, value: u64) -> Self {
        Self::new(tag, ParamValue::U64(value))
    }

    pub fn bool(tag: Tag, value: bool) -> Self {
        Self::new(tag, ParamValue::Bool(value))
    }

    pub fn blob(tag: Tag, value: Blob) -> Self {
        Self::new(tag, ParamValue::Blob(value))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Rejects tags without a value kind and values of the wrong kind.
    pub fn check(&self) -> Result<()> {
        let expected = self.tag.tag_type().ok_or_else(|| {
            Error::InvalidArgument(format!("tag {} has no valid type class", self.tag))
        })?;

        if self.value.kind() != expected {
            return Err(Error::Mismatch {
                tag: self.tag,
                expected,
            });
        }
        Ok(())
    }

    fn mismatch(&self, expected: TagType) -> Error {
        Error::Mismatch {
            tag: self.tag,
            expected,
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match (&self.value, self.tag.tag_type()) {
            (ParamValue::U32(v), Some(TagType::Uint)) => Ok(*v),
            _ => Err(self.mismatch(TagType::Uint)),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match (&self.value, self.tag.tag_type()) {
            (ParamValue::U64(v), Some(TagType::Ulong)) => Ok(*v),
            _ => Err(self.mismatch(TagType::Ulong)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match (&self.value, self.tag.tag_type()) {
            (ParamValue::Bool(v), Some(TagType::Bool)) => Ok(*v),
            _ => Err(self.mismatch(TagType::Bool)),
        }
    }

    pub fn as_blob(&self) -> Result<&Blob> {
        match (&self.value, self.tag.tag_type()) {
            (ParamValue::Blob(v), Some(TagType::Bytes)) => Ok(v),
            _ => Err(self.mismatch(TagType::Bytes)),
        }
    }
}
