//! storage-acl - Hierarchical storage permission resolution
//!
//! Grants attach a [`Mask`] (allow and deny bits per [`PermissionKind`]) to a
//! user or group on a file or folder. Resolution folds the grants on a path
//! and its ancestor folders, then a storage-level fallback, into an
//! [`EffectiveMask`].
//!
//! - [`PermissionResolver`]: single path, whole subtree and listing decisions
//! - [`PermissionMutationManager`]: grant writes and propagation on move/copy/delete
//! - [`AuthorizationGate`]: decorator checking every [`StorageProvider`] call
//! - [`LmdbRecordStore`]: grant persistence

pub mod acl;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gate;
pub mod keys;
pub mod mask;
pub mod model;
pub mod mutation;
pub mod path;
pub mod principal;
pub mod protected;
pub mod resolver;
pub mod store;
pub mod tx;

pub use acl::{NoRootAcl, RootAcl, StaticRootAcl};
pub use config::{Config, ConfigError, RootAclEntry, StoreConfig};
pub use db::LmdbRecordStore;
pub use error::{PermissionError, Result};
pub use gate::{AuthorizationGate, StorageProvider, Tags};
pub use mask::{
    fold_item_masks, merge_item_mask, merge_parent_mask, project_to_effective, Decision, EffectiveMask, Mask,
    PermissionKind,
};
pub use model::{PathType, PermissionGrant, Sid, SidKind, StorageItem, StorageRoot};
pub use mutation::{GrantRequest, PermissionMutationManager};
pub use principal::{Principal, PrincipalContext, Session};
pub use protected::ProtectedPermissions;
pub use resolver::PermissionResolver;
pub use store::PermissionRecordStore;
