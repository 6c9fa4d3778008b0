use anyhow::{Context, Result, anyhow, bail};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::KEY_LEN;

/// Argon2id cost parameters, persisted in the key store header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 64 * 1024, // 64 MiB
            time_cost: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    /// Checks the costs against the bounds Argon2id accepts.
    ///
    /// Header values are untrusted, so the memory floor is computed in
    /// `u64` and cannot wrap.
    pub fn validate(&self) -> Result<()> {
        if self.time_cost == 0 {
            bail!("argon2 time cost must be >= 1");
        }
        if !(1..=Params::MAX_P_COST).contains(&self.parallelism) {
            bail!(
                "argon2 parallelism must be in 1..={}, got {}",
                Params::MAX_P_COST,
                self.parallelism
            );
        }
        let floor = 8 * u64::from(self.parallelism);
        if u64::from(self.mem_cost_kib) < floor {
            bail!(
                "argon2 memory cost must be at least 8 * parallelism ({floor} KiB), got {}",
                self.mem_cost_kib
            );
        }
        Ok(())
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        self.validate().context("invalid Argon2 parameters")?;
        let params = Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| anyhow!("Argon2 rejected its parameters: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derives the store sealing key from a password and the header salt.
pub fn derive_key(password: &str, salt: &[u8], kdf: KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    kdf.hasher()?
        .hash_password_into(password.as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| anyhow!("sealing key derivation failed: {e}"))?;
    Ok(key)
}
