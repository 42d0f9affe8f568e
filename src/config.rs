use std::{env, fmt::Debug, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
    pub seed: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("STUDYNOTES_PORT", 8080),
            database_path: try_load("STUDYNOTES_DATABASE", PathBuf::from("studynotes.db")),
            upload_dir: try_load("STUDYNOTES_UPLOAD_DIR", PathBuf::from("uploads")),
            max_upload_bytes: try_load("STUDYNOTES_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            bcrypt_cost: try_load("STUDYNOTES_BCRYPT_COST", bcrypt::DEFAULT_COST),
            seed: try_load("STUDYNOTES_SEED", true),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Debug,
{
    match env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => {
            info!("{key} not set, using default: {default:?}");
            default
        }
    }
}

fn parse_or_default<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Debug,
{
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e:?}, using default: {default:?}");
        default
    })
}
