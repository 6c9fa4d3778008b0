//! Error taxonomy shared by the param set, blob and key store modules.

use crate::param::{Tag, TagType};

/// Errors raised by the in-memory core.
///
/// Alias absence during a scan is not represented here: lookups return
/// `Ok(None)` for that. `NotFound` is only used where a key is required to
/// exist (comparison, fetch, delete).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The allocator could not satisfy a request of the given size.
    #[error("memory allocation of {0} bytes failed")]
    Allocation(usize),
    /// A param set was used outside its legal state sequence.
    #[error("param set is {actual}, operation requires {expected}")]
    State {
        expected: &'static str,
        actual: &'static str,
    },
    /// A param set could not be finalized.
    #[error("param set build failed: {0}")]
    Build(String),
    /// A record's computed length disagrees with the bytes written.
    #[error("record serialization failed: {0}")]
    Serialization(String),
    /// Header or record fields point outside the image.
    #[error("key store image is corrupt: {0}")]
    CorruptImage(String),
    /// The alias is not in the store.
    #[error("key '{0}' not found")]
    NotFound(String),
    /// A param's value does not match the type class encoded in its tag.
    #[error("tag {tag} expects a {expected} value")]
    Mismatch { tag: Tag, expected: TagType },
    /// Malformed caller input or malformed serialized bytes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The random source collaborator failed.
    #[error("random generator unavailable")]
    RandomUnavailable,
    /// The alias is already taken.
    #[error("key '{0}' already exists")]
    AlreadyExists(String),
}

pub type Result<T> = std::result::Result<T, Error>;
