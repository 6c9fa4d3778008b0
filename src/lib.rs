//! Key parameter sets and an alias-keyed key store image.
//!
//! [`param::ParamSet`] describes a key or an operation as tagged values.
//! [`store`] holds the binary image that persists keys by alias, and
//! [`Hukstore`] drives that image on disk one whole-file update at a time.

pub mod blob;
pub mod crypto;
mod cursor;
pub mod engine;
pub mod error;
pub mod param;
mod storage;
pub mod store;

pub use crate::blob::Blob;
pub use crate::crypto::KdfParams;
pub use crate::engine::{CryptoEngine, SoftEngine};
pub use crate::error::Error;
pub use crate::storage::Storage;

use crate::crypto::Sealer;
use crate::param::{Param, ParamSet, Tag, key_flag, key_role};
use crate::store::{KeyMetadata, StoreHeader};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use zeroize::Zeroizing;

/// How a new store protects the key material it holds.
pub enum Sealing {
    /// Material is stored as produced.
    Plain,
    /// Material is sealed under a key derived from `password`.
    Password {
        password: Zeroizing<String>,
        kdf: KdfParams,
    },
}

/// A key read back from the store.
#[derive(Debug)]
pub struct StoredKey {
    pub alias: Vec<u8>,
    pub metadata: KeyMetadata,
    /// Characteristics recorded when the key was stored.
    pub params: ParamSet,
    pub material: Blob,
}

/// One line of `list` output.
#[derive(Debug, Serialize)]
pub struct KeySummary {
    pub alias: String,
    pub algorithm: u32,
    pub key_size: u32,
    pub purpose: u32,
    pub role: u32,
    pub flag: u8,
    pub created_ms: Option<u64>,
    pub record_len: u32,
}

#[derive(Debug, Serialize)]
pub struct StoreInfo {
    pub path: String,
    pub version: u16,
    pub sealed: bool,
    pub key_count: u16,
    pub image_size: u64,
    pub argon_mem_kib: Option<u32>,
    pub argon_time: Option<u32>,
    pub argon_parallelism: Option<u32>,
}

impl fmt::Display for StoreInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:       {}", self.path)?;
        writeln!(f, "version:    {}", self.version)?;
        writeln!(f, "sealed:     {}", self.sealed)?;
        if let (Some(mem), Some(time), Some(par)) =
            (self.argon_mem_kib, self.argon_time, self.argon_parallelism)
        {
            writeln!(f, "argon2id:   m={mem} KiB, t={time}, p={par}")?;
        }
        writeln!(f, "keys:       {}", self.key_count)?;
        write!(f, "image size: {} bytes", self.image_size)
    }
}

/// Key management over one store image.
///
/// Nothing is cached between calls: every operation loads the image,
/// works on it in memory and replaces the file whole.
pub struct Hukstore {
    storage: Storage,
    sealer: Option<Sealer>,
}

impl Hukstore {
    pub fn init(storage: Storage, sealing: Sealing) -> Result<Self> {
        if storage.exists() {
            bail!("key store already exists at {}", storage.path().display());
        }

        let (header, sealer) = match sealing {
            Sealing::Plain => (StoreHeader::plain(), None),
            Sealing::Password { password, kdf } => {
                let salt = crypto::generate_salt()?;
                let sealer = Sealer::derive(&password, &salt, kdf)
                    .context("failed to derive sealing key")?;
                drop(password);
                let (nonce, tag) = sealer.verifier()?;
                (StoreHeader::sealed(kdf, salt, nonce, tag), Some(sealer))
            }
        };

        storage.save(&store::empty_image(&header))?;
        debug!(
            "initialized {} key store at {}",
            if sealer.is_some() { "sealed" } else { "plain" },
            storage.path().display()
        );

        Ok(Self { storage, sealer })
    }

    /// Opens an existing store. `password` is only consulted for sealed stores.
    pub fn open(storage: Storage, password: Option<Zeroizing<String>>) -> Result<Self> {
        if !storage.exists() {
            bail!("key store does not exist at {}", storage.path().display());
        }

        let (header, _) = load_image(&storage)?;
        if !header.is_sealed() {
            return Ok(Self {
                storage,
                sealer: None,
            });
        }

        let password = password.context("key store is sealed; a password is required")?;
        let kdf = header
            .kdf()
            .context("sealed key store header carries no kdf params")?;
        let sealer = Sealer::derive(&password, header.salt(), kdf)
            .context("unable to derive sealing key")?;
        drop(password);

        sealer
            .check_verifier(header.verify_nonce(), header.verify_tag())
            .context("failed to unlock key store; possibly wrong password or corrupted data")?;

        Ok(Self {
            storage,
            sealer: Some(sealer),
        })
    }

    /// Whether the store at `storage` seals its material, read from the header.
    pub fn is_sealed(storage: &Storage) -> Result<bool> {
        let (header, _) = load_image(storage)?;
        Ok(header.is_sealed())
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Asks `engine` for fresh material and stores it under `alias`.
    pub fn generate_key(
        &self,
        engine: &dyn CryptoEngine,
        alias: &[u8],
        params: &ParamSet,
    ) -> Result<()> {
        store::check_alias(alias)?;
        KeyMetadata::from_params(params, key_flag::GENERATE_KEY as u8)?;

        let material = engine.generate_key(params)?;
        self.store_key(alias, params, material.bytes()?, key_flag::GENERATE_KEY)
    }

    /// Stores caller-provided material under `alias`.
    pub fn import_key(&self, alias: &[u8], params: &ParamSet, material: &Blob) -> Result<()> {
        if material.is_empty() {
            bail!(Error::InvalidArgument("imported key material is empty".to_string()));
        }
        self.store_key(alias, params, material.bytes()?, key_flag::IMPORT_KEY)
    }

    fn store_key(&self, alias: &[u8], params: &ParamSet, material: &[u8], flag: u32) -> Result<()> {
        store::check_alias(alias)?;
        let characteristics = stamp_characteristics(params, flag)?;
        let meta = KeyMetadata::from_params(&characteristics, flag as u8)?;

        let (header, image) = self.load()?;
        if store::find_offset_by_alias(&image, alias)?.is_some() {
            bail!(Error::AlreadyExists(display_alias(alias)));
        }

        let stored = match &self.sealer {
            Some(sealer) => Zeroizing::new(sealer.seal(alias, material)?),
            None => Zeroizing::new(material.to_vec()),
        };

        let (record, _) = store::serialize_key_info(alias, &stored, &characteristics, &meta)?;
        let image = store::append_record(&image, &record)?;
        self.storage.save(&image)?;

        debug!(
            "stored key '{}' ({} records, {} byte image, sealed: {})",
            display_alias(alias),
            header.key_count() as u32 + 1,
            image.len(),
            header.is_sealed()
        );
        Ok(())
    }

    pub fn key_exists(&self, alias: &[u8]) -> Result<bool> {
        let (_, image) = self.load()?;
        Ok(store::find_offset_by_alias(&image, alias)?.is_some())
    }

    /// Reads a key's characteristics and its material, unsealed.
    pub fn get_key(&self, alias: &[u8]) -> Result<StoredKey> {
        let (_, image) = self.load()?;
        let info = store::key_info(&image, alias)?
            .ok_or_else(|| Error::NotFound(display_alias(alias)))?;

        let material = match &self.sealer {
            Some(sealer) => {
                let plain = sealer.open(alias, info.material()).inspect_err(|_| {
                    warn!("failed to unseal key '{}'", display_alias(alias));
                })?;
                Blob::from_slice(&plain)?
            }
            None => Blob::from_slice(info.material())?,
        };

        Ok(StoredKey {
            alias: alias.to_vec(),
            metadata: *info.metadata(),
            params: info.param_set()?,
            material,
        })
    }

    pub fn delete_key(&self, alias: &[u8]) -> Result<()> {
        let (_, image) = self.load()?;
        let image = store::delete_record(&image, alias)?;
        self.storage.save(&image)?;
        debug!("deleted key '{}'", display_alias(alias));
        Ok(())
    }

    pub fn aliases(&self) -> Result<Vec<Vec<u8>>> {
        let (_, image) = self.load()?;
        Ok(store::records(&image)?
            .iter()
            .map(|info| info.alias().to_vec())
            .collect())
    }

    pub fn list(&self) -> Result<Vec<KeySummary>> {
        let (_, image) = self.load()?;
        let mut out = Vec::new();
        for info in store::records(&image)? {
            let meta = info.metadata();
            out.push(KeySummary {
                alias: display_alias(info.alias()),
                algorithm: meta.key_alg,
                key_size: meta.key_len,
                purpose: meta.purpose,
                role: meta.role,
                flag: meta.flag,
                created_ms: info.param_set()?.get_u64(Tag::CREATION_DATETIME)?,
                record_len: info.key_info_len(),
            });
        }
        Ok(out)
    }

    pub fn key_count(&self) -> Result<usize> {
        let (_, image) = self.load()?;
        Ok(store::records(&image)?.len())
    }

    /// Full-record equality of two stored keys. Both must exist.
    pub fn compare_keys(&self, alias_a: &[u8], alias_b: &[u8]) -> Result<bool> {
        let (_, image) = self.load()?;
        Ok(store::compare_records(&image, alias_a, alias_b)?)
    }

    pub fn info(&self) -> Result<StoreInfo> {
        let (header, _) = self.load()?;
        let kdf = header.kdf();
        Ok(StoreInfo {
            path: self.storage.path().display().to_string(),
            version: header.version(),
            sealed: header.is_sealed(),
            key_count: header.key_count(),
            image_size: self.storage.size()?,
            argon_mem_kib: kdf.map(|k| k.mem_cost_kib()),
            argon_time: kdf.map(|k| k.time_cost()),
            argon_parallelism: kdf.map(|k| k.parallelism()),
        })
    }

    fn load(&self) -> Result<(StoreHeader, Vec<u8>)> {
        let (header, image) = load_image(&self.storage)?;
        if header.is_sealed() != self.sealer.is_some() {
            bail!("key store sealing changed since it was opened");
        }
        Ok((header, image))
    }
}

fn load_image(storage: &Storage) -> Result<(StoreHeader, Vec<u8>)> {
    let image = storage.load()?;
    let header = StoreHeader::from_bytes(&image)?;
    store::check_integrity(&image).inspect_err(|e| warn!("{e}"))?;
    Ok((header, image))
}

/// Rebuilds `params` with the bookkeeping tags a stored key carries.
///
/// Caller-supplied values for the stamped tags are replaced.
fn stamp_characteristics(params: &ParamSet, flag: u32) -> Result<ParamSet> {
    params.as_bytes()?;
    let role = params.get_u32(Tag::KEY_ROLE)?.unwrap_or(key_role::ALL);
    let stamped = [Tag::CREATION_DATETIME, Tag::KEY_ROLE, Tag::KEY_FLAG];

    let mut list: Vec<Param> = params
        .params()
        .iter()
        .filter(|p| !stamped.contains(&p.tag()))
        .cloned()
        .collect();
    list.push(Param::u64(
        Tag::CREATION_DATETIME,
        chrono::Utc::now().timestamp_millis().max(0) as u64,
    ));
    list.push(Param::u32(Tag::KEY_ROLE, role));
    list.push(Param::u32(Tag::KEY_FLAG, flag));

    Ok(ParamSet::from_params(&list)?)
}

fn display_alias(alias: &[u8]) -> String {
    String::from_utf8_lossy(alias).into_owned()
}

pub fn default_storage() -> Result<Storage> {
    let project_dirs =
        ProjectDirs::from("", "", "hukstore").context("could not determine platform directories")?;

    let path = project_dirs.data_dir().join("keystore.hks");

    Ok(Storage::new(path))
}
