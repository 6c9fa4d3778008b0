use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
mod auth;
use hukstore::param::{Param, ParamSet, Tag, alg, key_role, purpose};
use hukstore::{Hukstore, KdfParams, Sealing, SoftEngine, Storage, default_storage};
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 1)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn to_kdf_params(&self) -> anyhow::Result<KdfParams> {
        let default = KdfParams::default();

        KdfParams::new(
            self.mem_cost_kib.unwrap_or(default.mem_cost_kib()),
            self.time_cost.unwrap_or(default.time_cost()),
            self.parallelism.unwrap_or(default.parallelism()),
        )
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgArg {
    Aes,
    Hmac,
    Rsa,
    Ecc,
    Dsa,
    Dh,
    X25519,
    Ed25519,
    Sm2,
    Sm4,
}

impl AlgArg {
    fn value(self) -> u32 {
        match self {
            AlgArg::Aes => alg::AES,
            AlgArg::Hmac => alg::HMAC,
            AlgArg::Rsa => alg::RSA,
            AlgArg::Ecc => alg::ECC,
            AlgArg::Dsa => alg::DSA,
            AlgArg::Dh => alg::DH,
            AlgArg::X25519 => alg::X25519,
            AlgArg::Ed25519 => alg::ED25519,
            AlgArg::Sm2 => alg::SM2,
            AlgArg::Sm4 => alg::SM4,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PurposeArg {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    Derive,
    Wrap,
    Unwrap,
    Mac,
    Agree,
}

impl PurposeArg {
    fn flag(self) -> u32 {
        match self {
            PurposeArg::Encrypt => purpose::ENCRYPT,
            PurposeArg::Decrypt => purpose::DECRYPT,
            PurposeArg::Sign => purpose::SIGN,
            PurposeArg::Verify => purpose::VERIFY,
            PurposeArg::Derive => purpose::DERIVE,
            PurposeArg::Wrap => purpose::WRAP,
            PurposeArg::Unwrap => purpose::UNWRAP,
            PurposeArg::Mac => purpose::MAC,
            PurposeArg::Agree => purpose::AGREE,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Main,
    Backup,
}

fn resolve_storage(path: Option<PathBuf>) -> Result<Storage> {
    match path {
        Some(p) => Ok(Storage::new(p)),
        None => default_storage(),
    }
}

/// Opens the store, asking for a password only when the image is sealed.
fn open_store(path: Option<PathBuf>) -> Result<Hukstore> {
    let storage = resolve_storage(path)?;
    let password = if storage.exists() && Hukstore::is_sealed(&storage)? {
        Some(auth::read_password()?)
    } else {
        None
    };
    Hukstore::open(storage, password)
}

#[derive(Debug, Parser)]
#[command(name = "hukstore")]
#[command(
    version,
    about = "Alias-keyed key store with typed key parameter sets."
)]
struct Cli {
    ///Path to the key store image
    #[arg(long, global = true, value_name = "PATH", env = "HUKSTORE_PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates an empty key store
    Init {
        /// Store key material unsealed; no password is used
        #[arg(long, default_value_t = false)]
        plain: bool,

        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Generates a key and stores it under an alias
    #[command(arg_required_else_help = true)]
    Generate {
        alias: String,

        #[arg(long, value_enum)]
        alg: AlgArg,

        /// Key size in bits
        #[arg(long)]
        size: Option<u32>,

        #[arg(long, value_enum, value_delimiter = ',', required = true)]
        purpose: Vec<PurposeArg>,

        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },

    /// Reports whether an alias is stored
    #[command(arg_required_else_help = true)]
    Exists { alias: String },

    /// Removes a key by alias
    #[command(arg_required_else_help = true)]
    Delete { alias: String },

    /// Lists stored keys
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compares the full stored records of two keys
    #[command(arg_required_else_help = true)]
    Compare { alias_a: String, alias_b: String },

    /// Shows information about the store
    Info {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Cli::parse();
    match args.command {
        Commands::Init { plain, argon2 } => {
            let storage = resolve_storage(args.store)?;
            let sealing = if plain {
                Sealing::Plain
            } else {
                Sealing::Password {
                    kdf: argon2.to_kdf_params()?,
                    password: auth::read_new_password_with_confirmation()?,
                }
            };
            Hukstore::init(storage, sealing)?;
            println!("key store initialized");
        }
        Commands::Generate {
            alias,
            alg,
            size,
            purpose,
            role,
        } => {
            let hks = open_store(args.store)?;

            let mut params = vec![
                Param::u32(Tag::ALGORITHM, alg.value()),
                Param::u32(
                    Tag::PURPOSE,
                    purpose.iter().fold(0, |acc, p| acc | p.flag()),
                ),
            ];
            if let Some(size) = size {
                params.push(Param::u32(Tag::KEY_SIZE, size));
            }
            if let Some(role) = role {
                let role = match role {
                    RoleArg::Main => key_role::MAIN,
                    RoleArg::Backup => key_role::BACKUP,
                };
                params.push(Param::u32(Tag::KEY_ROLE, role));
            }
            let params = ParamSet::from_params(&params)?;

            hks.generate_key(&SoftEngine, alias.as_bytes(), &params)?;
            println!("generated key '{alias}'");
        }
        Commands::Exists { alias } => {
            let hks = open_store(args.store)?;
            if hks.key_exists(alias.as_bytes())? {
                println!("key '{alias}' exists");
            } else {
                println!("key '{alias}' not found");
            }
        }
        Commands::Delete { alias } => {
            let hks = open_store(args.store)?;
            hks.delete_key(alias.as_bytes())?;
            println!("key '{alias}' deleted");
        }
        Commands::List { json } => {
            let hks = open_store(args.store)?;
            let keys = hks.list()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
                return Ok(());
            }

            if keys.is_empty() {
                println!("No keys stored.");
                return Ok(());
            }

            let alias_width = keys
                .iter()
                .map(|k| k.alias.len())
                .chain(std::iter::once("Alias".len()))
                .max()
                .unwrap_or(0);

            println!("{:<alias_width$}  {:>5}  {:>6}  Purpose", "Alias", "Alg", "Bits");
            println!("{:-<alias_width$}  {:->5}  {:->6}  {:-<8}", "", "", "", "");
            for k in keys {
                println!(
                    "{:<alias_width$}  {:>5}  {:>6}  0x{:x}",
                    k.alias, k.algorithm, k.key_size, k.purpose
                );
            }
        }
        Commands::Compare { alias_a, alias_b } => {
            let hks = open_store(args.store)?;
            if hks.compare_keys(alias_a.as_bytes(), alias_b.as_bytes())? {
                println!("equal");
            } else {
                println!("not equal");
            }
        }
        Commands::Info { json } => {
            let hks = open_store(args.store)?;
            let info = hks.info()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{info}");
            }
        }
    }

    Ok(())
}
