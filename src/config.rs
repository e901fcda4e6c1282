use serde::Deserialize;

use crate::error::{Error, Result};
use crate::storage::disk::DiskType;

#[derive(Debug, PartialEq, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    /// Which disk engine backs the pool.
    pub disk_type: DiskType,
    /// Path of the page file, used by the file engine only.
    pub path: String,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// History depth K of the LRU-K replacer.
    pub replacer_k: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("disk_type", "memory")?
            .set_default("path", "data/framepool.db")?
            .set_default("pool_size", 64)?
            .set_default("replacer_k", 2)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("FRAMEPOOL"));
        let cfg: Config = cfg.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::value("pool_size must be at least 1"));
        }
        if self.replacer_k == 0 {
            return Err(Error::value("replacer_k must be at least 1"));
        }
        Ok(())
    }
}
