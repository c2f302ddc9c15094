//! Storage roots, sids, grants and listing entries

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PermissionError, Result};
use crate::mask::{EffectiveMask, Mask};
use crate::path;

pub const DEFAULT_DELIMITER: char = '/';

/// One registered storage. Identity is immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRoot {
    pub id: u64,
    pub owner: String,
    pub delimiter: char,
    /// Absolute location of the storage, e.g. the bucket name
    pub base_path: String,
    /// Versioned roots soft-delete items, which keeps their grants
    pub versioning_enabled: bool,
}

impl StorageRoot {
    pub fn new(id: u64, owner: impl Into<String>, base_path: &str) -> Self {
        StorageRoot {
            id,
            owner: owner.into(),
            delimiter: DEFAULT_DELIMITER,
            base_path: path::normalize(base_path, DEFAULT_DELIMITER),
            versioning_enabled: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self.base_path = path::normalize(&self.base_path, delimiter);
        self
    }

    pub fn versioned(mut self, enabled: bool) -> Self {
        self.versioning_enabled = enabled;
        self
    }

    /// Absolute, normalised path of a root-relative path. `.` and `..`
    /// segments are rejected rather than interpreted.
    pub fn resolve_absolute_path(&self, relative: &str) -> Result<String> {
        if path::has_dot_segment(relative, self.delimiter) {
            return Err(PermissionError::InvalidPath(relative.to_string()));
        }
        Ok(path::join(&self.base_path, &path::normalize(relative, self.delimiter), self.delimiter))
    }

    /// Root-relative form of an absolute path, `None` when it lies outside the root
    pub fn relative_path(&self, absolute: &str) -> Option<String> {
        path::rebase(absolute, &self.base_path, "", self.delimiter)
    }

    pub fn is_owner(&self, principal: &str) -> bool {
        self.owner == principal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidKind {
    User,
    Group,
}

/// Security identifier: the subject of a grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sid {
    pub kind: SidKind,
    pub name: String,
}

impl Sid {
    pub fn user(name: impl Into<String>) -> Self {
        Sid { kind: SidKind::User, name: name.into() }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Sid { kind: SidKind::Group, name: name.into() }
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        self.kind == SidKind::Group
    }

    /// Parse `user:<name>` or `group:<name>`
    pub fn parse(s: &str) -> Result<Sid> {
        match s.split_once(':') {
            Some(("user", n)) if !n.is_empty() => Ok(Sid::user(n)),
            Some(("group", n)) if !n.is_empty() => Ok(Sid::group(n)),
            _ => Err(PermissionError::InvalidSid(s.to_string())),
        }
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SidKind::User => write!(f, "user:{}", self.name),
            SidKind::Group => write!(f, "group:{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    File,
    Folder,
}

/// The persisted unit: one sid's mask on one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub root_id: u64,
    /// Absolute path
    pub path: String,
    pub path_type: PathType,
    pub sid: Sid,
    pub mask: Mask,
}

impl PermissionGrant {
    pub fn new(root_id: u64, path: impl Into<String>, path_type: PathType, sid: Sid, mask: Mask) -> Self {
        PermissionGrant { root_id, path: path.into(), path_type, sid, mask }
    }
}

/// Entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    /// Root-relative path
    pub path: String,
    pub item_type: PathType,
    pub size: Option<u64>,
    pub mask: Option<EffectiveMask>,
}

impl StorageItem {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        StorageItem { path: path.into(), item_type: PathType::File, size: Some(size), mask: None }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        StorageItem { path: path.into(), item_type: PathType::Folder, size: None, mask: None }
    }
}
