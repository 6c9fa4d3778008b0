//! Crypto engine collaborator.
//!
//! The key store only asks an engine for fresh material and random bytes;
//! everything else an engine does happens elsewhere. [`SoftEngine`] fills
//! material from the OS random source, sized from the request params.

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::param::{ParamSet, Tag, alg};

pub trait CryptoEngine {
    /// Produces key material for a built param set.
    fn generate_key(&self, params: &ParamSet) -> Result<Blob>;

    /// Produces `len` random bytes.
    fn generate_random(&self, len: u32) -> Result<Blob>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftEngine;

/// Key sizes in bits an algorithm accepts.
enum KeySizes {
    OneOf(&'static [u32]),
    /// The size is implied; params may omit it.
    Fixed(u32),
}

fn key_sizes(key_alg: u32) -> Result<KeySizes> {
    let sizes = match key_alg {
        alg::AES => KeySizes::OneOf(&[128, 192, 256]),
        alg::SM4 => KeySizes::OneOf(&[128]),
        alg::HMAC => KeySizes::OneOf(&[256, 384, 512]),
        alg::RSA => KeySizes::OneOf(&[512, 768, 1024, 2048, 3072, 4096]),
        alg::ECC => KeySizes::OneOf(&[224, 256, 384, 521]),
        alg::SM2 => KeySizes::OneOf(&[256]),
        alg::DSA => KeySizes::OneOf(&[1024, 2048, 3072]),
        alg::DH => KeySizes::OneOf(&[2048, 3072, 4096]),
        alg::X25519 | alg::ED25519 => KeySizes::Fixed(256),
        other => {
            return Err(Error::InvalidArgument(format!(
                "algorithm {other} cannot be generated"
            )));
        }
    };
    Ok(sizes)
}

impl CryptoEngine for SoftEngine {
    fn generate_key(&self, params: &ParamSet) -> Result<Blob> {
        let key_alg = params
            .get_u32(Tag::ALGORITHM)?
            .ok_or_else(|| Error::InvalidArgument("params name no algorithm".to_string()))?;
        let requested = params.get_u32(Tag::KEY_SIZE)?;

        let bits = match (key_sizes(key_alg)?, requested) {
            (KeySizes::OneOf(allowed), Some(size)) if allowed.contains(&size) => size,
            (KeySizes::OneOf(_), Some(size)) => {
                return Err(Error::InvalidArgument(format!(
                    "key size {size} not supported for algorithm {key_alg}"
                )));
            }
            (KeySizes::OneOf(_), None) => {
                return Err(Error::InvalidArgument(format!(
                    "algorithm {key_alg} requires a key size"
                )));
            }
            (KeySizes::Fixed(fixed), Some(size)) if size != fixed => {
                return Err(Error::InvalidArgument(format!(
                    "algorithm {key_alg} only supports {fixed} bit keys"
                )));
            }
            (KeySizes::Fixed(fixed), _) => fixed,
        };

        self.generate_random(bits.div_ceil(8))
    }

    fn generate_random(&self, len: u32) -> Result<Blob> {
        Blob::construct(true, len, true, len)?
            .ok_or_else(|| Error::Allocation(len as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Param, purpose};

    fn params(list: &[Param]) -> ParamSet {
        ParamSet::from_params(list).unwrap()
    }

    #[test]
    fn material_length_follows_key_size() {
        let set = params(&[
            Param::u32(Tag::ALGORITHM, alg::AES),
            Param::u32(Tag::KEY_SIZE, 192),
            Param::u32(Tag::PURPOSE, purpose::ENCRYPT),
        ]);
        assert_eq!(SoftEngine.generate_key(&set).unwrap().size(), 24);

        let ecc = params(&[
            Param::u32(Tag::ALGORITHM, alg::ECC),
            Param::u32(Tag::KEY_SIZE, 521),
        ]);
        assert_eq!(SoftEngine.generate_key(&ecc).unwrap().size(), 66);
    }

    #[test]
    fn curve25519_size_is_implied() {
        let set = params(&[Param::u32(Tag::ALGORITHM, alg::X25519)]);
        assert_eq!(SoftEngine.generate_key(&set).unwrap().size(), 32);

        let wrong = params(&[
            Param::u32(Tag::ALGORITHM, alg::ED25519),
            Param::u32(Tag::KEY_SIZE, 128),
        ]);
        assert!(SoftEngine.generate_key(&wrong).is_err());
    }

    #[test]
    fn unsupported_requests_fail() {
        let no_alg = params(&[Param::u32(Tag::KEY_SIZE, 128)]);
        assert!(SoftEngine.generate_key(&no_alg).is_err());

        let no_size = params(&[Param::u32(Tag::ALGORITHM, alg::AES)]);
        assert!(SoftEngine.generate_key(&no_size).is_err());

        let bad_size = params(&[
            Param::u32(Tag::ALGORITHM, alg::AES),
            Param::u32(Tag::KEY_SIZE, 100),
        ]);
        assert!(SoftEngine.generate_key(&bad_size).is_err());

        let hkdf = params(&[Param::u32(Tag::ALGORITHM, alg::HKDF)]);
        assert!(SoftEngine.generate_key(&hkdf).is_err());
    }

    #[test]
    fn fresh_material_differs() {
        let set = params(&[Param::u32(Tag::ALGORITHM, alg::X25519)]);
        let a = SoftEngine.generate_key(&set).unwrap();
        let b = SoftEngine.generate_key(&set).unwrap();
        assert_ne!(a.data(), b.data());
    }
}
