//! Interfaces for parsing configuration files

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acl::StaticRootAcl;
use crate::db::LmdbRecordStore;
use crate::error::Result as PermissionResult;
use crate::mask::Mask;
use crate::model::{Sid, DEFAULT_DELIMITER};

/// Top-level configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    /// Storage-level entries used as the last fallback of every resolution
    #[serde(default)]
    pub root_acl: Vec<RootAclEntry>,
}

/// Location and sizing of the LMDB record store
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    #[serde(default = "default_max_dbs")]
    pub max_dbs: u32,
    /// Path delimiter shared by every root kept in the store
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_max_dbs() -> u32 {
    4
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            path: path.into(),
            map_size: default_map_size(),
            max_dbs: default_max_dbs(),
            delimiter: default_delimiter(),
        }
    }
}

/// One storage-level entry: `sid` gets `allow` and `deny` on the whole root
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RootAclEntry {
    pub root_id: u64,
    /// `user:<name>` or `group:<name>`
    pub sid: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io { path: path.into(), err })?;
        toml::from_str(&contents).map_err(|err| ConfigError::Parse { path: path.into(), err })
    }

    pub fn from_toml_str(contents: &str) -> Result<Config, ConfigError> {
        toml::from_str(contents).map_err(|err| ConfigError::Parse { path: PathBuf::from("<inline>"), err })
    }

    /// Open the record store and build the root fallback it is used with
    pub fn open(&self) -> PermissionResult<(LmdbRecordStore, StaticRootAcl)> {
        let acl = self.root_acl()?;
        let store = LmdbRecordStore::open(&self.store)?;
        Ok((store, acl))
    }

    /// Build the storage-level fallback from the configured entries
    pub fn root_acl(&self) -> Result<StaticRootAcl, ConfigError> {
        let mut acl = StaticRootAcl::new();
        for (i, e) in self.root_acl.iter().enumerate() {
            let sid = Sid::parse(&e.sid).map_err(|_| ConfigError::Invalid {
                entry: i,
                reason: format!("invalid sid '{}'", e.sid),
            })?;
            let mask = Mask::from_names(&e.allow, &e.deny).map_err(|err| ConfigError::Invalid {
                entry: i,
                reason: err.to_string(),
            })?;
            acl.set(e.root_id, sid, mask);
        }
        Ok(acl)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading \"{}\": {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{}\": {err}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        err: toml::de::Error,
    },
    #[error("root_acl entry {entry}: {reason}")]
    Invalid { entry: usize, reason: String },
}
