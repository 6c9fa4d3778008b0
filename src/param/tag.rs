//! Tag numbering and value catalogues.
//!
//! A tag is a `u32` whose top four bits name the value kind and whose low
//! bits name the meaning.

use std::fmt;

const TYPE_SHIFT: u32 = 28;
const TYPE_MASK: u32 = 0xF << TYPE_SHIFT;

/// Value kind carried in the top bits of a [`Tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Uint,
    Ulong,
    Bool,
    Bytes,
}

impl TagType {
    pub const INVALID: u32 = 0;
    pub const INT: u32 = 1 << TYPE_SHIFT;
    pub const UINT: u32 = 2 << TYPE_SHIFT;
    pub const ULONG: u32 = 3 << TYPE_SHIFT;
    pub const BOOL: u32 = 4 << TYPE_SHIFT;
    pub const BYTES: u32 = 5 << TYPE_SHIFT;

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            Self::UINT => Some(TagType::Uint),
            Self::ULONG => Some(TagType::Ulong),
            Self::BOOL => Some(TagType::Bool),
            Self::BYTES => Some(TagType::Bytes),
            _ => None,
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagType::Uint => "uint32",
            TagType::Ulong => "uint64",
            TagType::Bool => "bool",
            TagType::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u32);

impl Tag {
    /// Value kind, or `None` for INVALID/INT and unassigned classes.
    pub fn tag_type(self) -> Option<TagType> {
        TagType::from_bits(self.0 & TYPE_MASK)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub const INVALID: Tag = Tag(TagType::INVALID);

    // base algorithm properties
    pub const ALGORITHM: Tag = Tag(TagType::UINT | 1);
    pub const PURPOSE: Tag = Tag(TagType::UINT | 2);
    pub const KEY_SIZE: Tag = Tag(TagType::UINT | 3);
    pub const DIGEST: Tag = Tag(TagType::UINT | 4);
    pub const PADDING: Tag = Tag(TagType::UINT | 5);
    pub const BLOCK_MODE: Tag = Tag(TagType::UINT | 6);
    pub const KEY_TYPE: Tag = Tag(TagType::UINT | 7);
    pub const ASSOCIATED_DATA: Tag = Tag(TagType::BYTES | 8);
    pub const NONCE: Tag = Tag(TagType::BYTES | 9);
    pub const IV: Tag = Tag(TagType::BYTES | 10);

    // key derivation and agreement
    pub const INFO: Tag = Tag(TagType::BYTES | 11);
    pub const SALT: Tag = Tag(TagType::BYTES | 12);
    pub const PWD: Tag = Tag(TagType::BYTES | 13);
    pub const ITERATION: Tag = Tag(TagType::UINT | 14);
    pub const KEY_GENERATE_TYPE: Tag = Tag(TagType::UINT | 15);
    pub const DERIVE_MAIN_KEY: Tag = Tag(TagType::BYTES | 16);
    pub const DERIVE_FACTOR: Tag = Tag(TagType::BYTES | 17);
    pub const DERIVE_ALG: Tag = Tag(TagType::UINT | 18);
    pub const AGREE_ALG: Tag = Tag(TagType::UINT | 19);
    pub const AGREE_PUBLIC_KEY_IS_KEY_ALIAS: Tag = Tag(TagType::BOOL | 20);
    pub const AGREE_PRIVATE_KEY_ALIAS: Tag = Tag(TagType::BYTES | 21);
    pub const AGREE_PUBLIC_KEY: Tag = Tag(TagType::BYTES | 22);
    pub const KEY_ALIAS: Tag = Tag(TagType::BYTES | 23);
    pub const DERIVE_KEY_SIZE: Tag = Tag(TagType::UINT | 24);

    // key validity period
    pub const ACTIVE_DATETIME: Tag = Tag(TagType::ULONG | 201);
    pub const ORIGINATION_EXPIRE_DATETIME: Tag = Tag(TagType::ULONG | 202);
    pub const USAGE_EXPIRE_DATETIME: Tag = Tag(TagType::ULONG | 203);
    pub const CREATION_DATETIME: Tag = Tag(TagType::ULONG | 204);

    // user authentication
    pub const ALL_USERS: Tag = Tag(TagType::BOOL | 301);
    pub const USER_ID: Tag = Tag(TagType::UINT | 302);
    pub const NO_AUTH_REQUIRED: Tag = Tag(TagType::BOOL | 303);
    pub const USER_AUTH_TYPE: Tag = Tag(TagType::UINT | 304);
    pub const AUTH_TIMEOUT: Tag = Tag(TagType::UINT | 305);
    pub const AUTH_TOKEN: Tag = Tag(TagType::BYTES | 306);

    // attestation
    pub const ATTESTATION_CHALLENGE: Tag = Tag(TagType::BYTES | 501);
    pub const ATTESTATION_APPLICATION_ID: Tag = Tag(TagType::BYTES | 502);
    pub const ATTESTATION_ID_BRAND: Tag = Tag(TagType::BYTES | 503);
    pub const ATTESTATION_ID_DEVICE: Tag = Tag(TagType::BYTES | 504);
    pub const ATTESTATION_ID_PRODUCT: Tag = Tag(TagType::BYTES | 505);
    pub const ATTESTATION_ID_SERIAL: Tag = Tag(TagType::BYTES | 506);
    pub const ATTESTATION_ID_IMEI: Tag = Tag(TagType::BYTES | 507);
    pub const ATTESTATION_ID_MEID: Tag = Tag(TagType::BYTES | 508);
    pub const ATTESTATION_ID_MANUFACTURER: Tag = Tag(TagType::BYTES | 509);
    pub const ATTESTATION_ID_MODEL: Tag = Tag(TagType::BYTES | 510);
    pub const ATTESTATION_ID_ALIAS: Tag = Tag(TagType::BYTES | 511);
    pub const ATTESTATION_ID_SOCID: Tag = Tag(TagType::BYTES | 512);
    pub const ATTESTATION_ID_UDID: Tag = Tag(TagType::BYTES | 513);
    pub const ATTESTATION_ID_SEC_LEVEL_INFO: Tag = Tag(TagType::BYTES | 514);
    pub const ATTESTATION_ID_VERSION_INFO: Tag = Tag(TagType::BYTES | 515);

    // extension
    pub const IS_KEY_ALIAS: Tag = Tag(TagType::BOOL | 1001);
    pub const KEY_STORAGE_FLAG: Tag = Tag(TagType::UINT | 1002);
    pub const IS_ALLOWED_WRAP: Tag = Tag(TagType::BOOL | 1003);
    pub const KEY_WRAP_TYPE: Tag = Tag(TagType::UINT | 1004);
    pub const KEY_AUTH_ID: Tag = Tag(TagType::BYTES | 1005);
    pub const KEY_ROLE: Tag = Tag(TagType::UINT | 1006);
    pub const KEY_FLAG: Tag = Tag(TagType::UINT | 1007);
    pub const IS_ASYNCHRONIZED: Tag = Tag(TagType::UINT | 1008);
    pub const SECURE_KEY_ALIAS: Tag = Tag(TagType::BOOL | 1009);
    pub const SECURE_KEY_UUID: Tag = Tag(TagType::BYTES | 1010);
    pub const KEY_DOMAIN: Tag = Tag(TagType::UINT | 1011);

    // inner use
    pub const PROCESS_NAME: Tag = Tag(TagType::BYTES | 10001);
    pub const PACKAGE_NAME: Tag = Tag(TagType::BYTES | 10002);
    pub const ACCESS_TIME: Tag = Tag(TagType::UINT | 10003);
    pub const USES_TIME: Tag = Tag(TagType::UINT | 10004);
    pub const CRYPTO_CTX: Tag = Tag(TagType::ULONG | 10005);
    pub const KEY: Tag = Tag(TagType::BYTES | 10006);
    pub const KEY_VERSION: Tag = Tag(TagType::UINT | 10007);
    pub const PAYLOAD_LEN: Tag = Tag(TagType::UINT | 10008);
    pub const AE_TAG: Tag = Tag(TagType::BYTES | 10009);
    pub const IS_KEY_HANDLE: Tag = Tag(TagType::ULONG | 10010);
    pub const OS_VERSION: Tag = Tag(TagType::UINT | 10101);
    pub const OS_PATCHLEVEL: Tag = Tag(TagType::UINT | 10102);

    // key material import
    pub const SYMMETRIC_KEY_DATA: Tag = Tag(TagType::BYTES | 20001);
    pub const ASYMMETRIC_PUBLIC_KEY_DATA: Tag = Tag(TagType::BYTES | 20002);
    pub const ASYMMETRIC_PRIVATE_KEY_DATA: Tag = Tag(TagType::BYTES | 20003);
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(0x{:08x})", self.0)
    }
}

/// Values for [`Tag::ALGORITHM`].
pub mod alg {
    pub const RSA: u32 = 1;
    pub const ECC: u32 = 2;
    pub const DSA: u32 = 3;
    pub const AES: u32 = 20;
    pub const HMAC: u32 = 50;
    pub const HKDF: u32 = 51;
    pub const PBKDF2: u32 = 52;
    pub const ECDH: u32 = 100;
    pub const X25519: u32 = 101;
    pub const ED25519: u32 = 102;
    pub const DH: u32 = 103;
    pub const SM2: u32 = 150;
    pub const SM3: u32 = 151;
    pub const SM4: u32 = 152;
}

/// Bit flags for [`Tag::PURPOSE`].
pub mod purpose {
    pub const ENCRYPT: u32 = 1;
    pub const DECRYPT: u32 = 2;
    pub const SIGN: u32 = 4;
    pub const VERIFY: u32 = 8;
    pub const DERIVE: u32 = 16;
    pub const WRAP: u32 = 32;
    pub const UNWRAP: u32 = 64;
    pub const MAC: u32 = 128;
    pub const AGREE: u32 = 256;
}

/// Values for [`Tag::DIGEST`].
pub mod digest {
    pub const NONE: u32 = 0;
    pub const MD5: u32 = 1;
    pub const SM3: u32 = 2;
    pub const SHA1: u32 = 10;
    pub const SHA224: u32 = 11;
    pub const SHA256: u32 = 12;
    pub const SHA384: u32 = 13;
    pub const SHA512: u32 = 14;
}

/// Values for [`Tag::PADDING`].
pub mod padding {
    pub const NONE: u32 = 0;
    pub const OAEP: u32 = 1;
    pub const PSS: u32 = 2;
    pub const PKCS1_V1_5: u32 = 3;
    pub const PKCS5: u32 = 4;
    pub const PKCS7: u32 = 5;
}

/// Values for [`Tag::BLOCK_MODE`].
pub mod mode {
    pub const ECB: u32 = 1;
    pub const CBC: u32 = 2;
    pub const CTR: u32 = 3;
    pub const OFB: u32 = 4;
    pub const CCM: u32 = 31;
    pub const GCM: u32 = 32;
}

/// Values for [`Tag::KEY_GENERATE_TYPE`].
pub mod generate_type {
    pub const DEFAULT: u32 = 0;
    pub const DERIVE: u32 = 1;
    pub const AGREE: u32 = 2;
}

/// Values for [`Tag::KEY_FLAG`].
pub mod key_flag {
    pub const IMPORT_KEY: u32 = 1;
    pub const GENERATE_KEY: u32 = 2;
    pub const AGREE_KEY: u32 = 3;
    pub const DERIVE_KEY: u32 = 4;
}

/// Values for [`Tag::KEY_ROLE`].
pub mod key_role {
    pub const MAIN: u32 = 1;
    pub const BACKUP: u32 = 2;
    /// Wildcard recorded for keys whose params name no role.
    pub const ALL: u32 = 0xFFFF_FFFF;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_class_comes_from_top_bits() {
        assert_eq!(Tag::ALGORITHM.tag_type(), Some(TagType::Uint));
        assert_eq!(Tag::CREATION_DATETIME.tag_type(), Some(TagType::Ulong));
        assert_eq!(Tag::NO_AUTH_REQUIRED.tag_type(), Some(TagType::Bool));
        assert_eq!(Tag::ATTESTATION_CHALLENGE.tag_type(), Some(TagType::Bytes));
    }

    #[test]
    fn unassigned_classes_have_no_type() {
        assert_eq!(Tag::INVALID.tag_type(), None);
        assert_eq!(Tag(TagType::INT | 7).tag_type(), None);
        assert_eq!(Tag(0xF000_0001).tag_type(), None);
    }
}
