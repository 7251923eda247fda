use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ContainerError, Result};
use crate::types::HashAlg;

/// File picked up from the working directory when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "gencontainer.toml";

/// Optional settings file; command line flags take precedence over every field
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding signing keys
    pub key_dir: Option<PathBuf>,
    /// Directory holding `Lz4Compress` / `LzmaCompress`
    pub tool_dir: Option<PathBuf>,
    /// Output directory
    pub out_dir: Option<PathBuf>,
    /// Directory component files are resolved against
    pub comp_dir: Option<PathBuf>,
    /// Signing hash algorithm, `SHA2_256` or `SHA2_384`
    pub hash_alg: Option<String>,
    /// `openssl` executable
    pub openssl: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("could not read '{}': {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ContainerError::Config(format!("{}: {e}", path.display())))?;
        debug!("loaded configuration from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Load `gencontainer.toml` from `dir` if present
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn hash_alg(&self) -> Result<Option<HashAlg>> {
        self.hash_alg
            .as_deref()
            .map(str::parse::<HashAlg>)
            .transpose()
            .map_err(|e| ContainerError::Config(e.to_string()))
    }
}
