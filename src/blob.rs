//! Length-prefixed byte buffers.
//!
//! A [`Blob`] carries a declared `size` next to an optional owned buffer.
//! The two are allowed to disagree (fixtures construct such blobs on
//! purpose), so every reader goes through [`Blob::data`], which only hands
//! out bytes when the buffer actually covers the declared size.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

use crate::crypto;
use crate::error::{Error, Result};

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob {
    size: u32,
    data: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("size", &self.size)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

impl Blob {
    /// Takes ownership of `bytes`; the declared size is the buffer length.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        let size = u32::try_from(bytes.len())
            .map_err(|_| Error::InvalidArgument(format!("blob of {} bytes", bytes.len())))?;
        Ok(Self {
            size,
            data: Some(Zeroizing::new(bytes)),
        })
    }

    /// Copies `bytes` into a new blob.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut buf = try_alloc(bytes.len())?;
        buf.extend_from_slice(bytes);
        Self::from_vec(buf)
    }

    /// Builds a fixture blob.
    ///
    /// Returns `Ok(None)` when `exists` is false. With `data_exists` the
    /// buffer holds `data_size` random bytes; the declared size is then set
    /// to `declared_size`, which production callers keep equal to
    /// `data_size`.
    pub fn construct(
        exists: bool,
        declared_size: u32,
        data_exists: bool,
        data_size: u32,
    ) -> Result<Option<Self>> {
        if !exists {
            return Ok(None);
        }

        let data = if data_exists {
            let len = data_size as usize;
            let mut buf = try_alloc(len)?;
            buf.resize(len, 0);
            crypto::secure_random(&mut buf)?;
            Some(Zeroizing::new(buf))
        } else {
            None
        };

        Ok(Some(Self {
            size: declared_size,
            data,
        }))
    }

    /// Releases the blob behind `handle` and leaves `None` in its place.
    pub fn free(handle: &mut Option<Blob>) {
        if let Some(mut blob) = handle.take() {
            blob.free_fields();
        }
    }

    /// Releases the buffer only and zeroes the declared size.
    pub fn free_fields(&mut self) {
        if let Some(mut data) = self.data.take() {
            data.zeroize();
        }
        self.size = 0;
    }

    /// Declared length.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// True when no bytes would be read from this blob.
    pub fn is_empty(&self) -> bool {
        self.data.is_none() || self.size == 0
    }

    /// The buffer holds at least `size` bytes, or there is no buffer and
    /// `size` is zero.
    pub fn is_consistent(&self) -> bool {
        match &self.data {
            Some(data) => data.len() >= self.size as usize,
            None => self.size == 0,
        }
    }

    /// The first `size` bytes of the buffer.
    ///
    /// A missing buffer reads as empty. An inconsistent blob yields `None`.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.data {
            Some(data) if data.len() >= self.size as usize => Some(&data[..self.size as usize]),
            Some(_) => None,
            None => Some(&[]),
        }
    }

    /// Like [`Blob::data`] but rejects any blob that is not consistent.
    pub fn bytes(&self) -> Result<&[u8]> {
        match self.data() {
            Some(data) if self.is_consistent() => Ok(data),
            _ => Err(Error::InvalidArgument(format!(
                "blob declares {} bytes but holds fewer",
                self.size
            ))),
        }
    }
}

/// Reserves exactly `len` bytes, reporting allocator failure as an error.
pub(crate) fn try_alloc(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Allocation(len))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_absent_is_not_an_error() {
        assert_eq!(Blob::construct(false, 16, true, 16).unwrap(), None);
    }

    #[test]
    fn construct_fills_random_bytes() {
        let a = Blob::construct(true, 32, true, 32).unwrap().unwrap();
        let b = Blob::construct(true, 32, true, 32).unwrap().unwrap();

        assert_eq!(a.size(), 32);
        assert_eq!(a.data().unwrap().len(), 32);
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn construct_without_data_keeps_declared_size() {
        let blob = Blob::construct(true, 8, false, 0).unwrap().unwrap();

        assert_eq!(blob.size(), 8);
        assert!(!blob.is_consistent());
        assert_eq!(blob.data(), Some(&[][..]));
        assert!(blob.bytes().is_err());
    }

    #[test]
    fn construct_mismatched_sizes() {
        let short = Blob::construct(true, 4, true, 16).unwrap().unwrap();
        assert!(short.is_consistent());
        assert_eq!(short.data().unwrap().len(), 4);

        let long = Blob::construct(true, 64, true, 16).unwrap().unwrap();
        assert!(!long.is_consistent());
        assert!(long.data().is_none());
    }

    #[test]
    fn free_nulls_handle_and_is_idempotent() {
        let mut handle = Blob::construct(true, 8, true, 8).unwrap();
        Blob::free(&mut handle);
        assert!(handle.is_none());

        Blob::free(&mut handle);
        assert!(handle.is_none());
    }

    #[test]
    fn free_fields_keeps_struct() {
        let mut blob = Blob::from_slice(b"alias").unwrap();
        blob.free_fields();

        assert_eq!(blob.size(), 0);
        assert!(blob.is_empty());
        assert_eq!(blob.data(), Some(&[][..]));
    }
}
