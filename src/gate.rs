//! Authorization gate in front of a storage provider
//!
//! [`AuthorizationGate`] implements [`StorageProvider`] itself, so it can be
//! dropped in wherever the real provider is used. Every operation is checked
//! before it is delegated; a refused operation never reaches the provider.
//! After a successful delete, move or copy the grants follow the items.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::acl::RootAcl;
use crate::error::{PermissionError, Result};
use crate::mask::{EffectiveMask, PermissionKind};
use crate::model::{PathType, StorageItem, StorageRoot};
use crate::mutation::PermissionMutationManager;
use crate::principal::Session;
use crate::resolver::PermissionResolver;
use crate::store::PermissionRecordStore;

pub type Tags = BTreeMap<String, String>;

/// Capability interface of a storage provider. Paths are root-relative.
pub trait StorageProvider {
    fn list(&self, root: &StorageRoot, p: &str) -> Result<Vec<StorageItem>>;
    fn read(&self, root: &StorageRoot, p: &str) -> Result<Vec<u8>>;
    fn write(&self, root: &StorageRoot, p: &str, data: &[u8]) -> Result<()>;
    fn create_folder(&self, root: &StorageRoot, p: &str) -> Result<()>;
    /// `total` removes every version of a versioned item
    fn delete(&self, root: &StorageRoot, p: &str, path_type: PathType, total: bool) -> Result<()>;
    fn move_item(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<()>;
    fn copy_item(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<()>;
    fn get_tags(&self, root: &StorageRoot, p: &str, path_type: PathType) -> Result<Tags>;
    fn set_tags(&self, root: &StorageRoot, p: &str, path_type: PathType, tags: Tags) -> Result<()>;
    fn delete_tags(&self, root: &StorageRoot, p: &str, path_type: PathType, keys: &[String]) -> Result<()>;
}

const READ: &[PermissionKind] = &[PermissionKind::Read];
const WRITE: &[PermissionKind] = &[PermissionKind::Write];
const READ_WRITE: &[PermissionKind] = &[PermissionKind::Read, PermissionKind::Write];

pub struct AuthorizationGate<P, S, A> {
    inner: P,
    resolver: PermissionResolver<S, A>,
    mutations: PermissionMutationManager<S>,
    session: Session,
}

impl<P, S, A> AuthorizationGate<P, S, A>
where
    P: StorageProvider,
    S: PermissionRecordStore,
    A: RootAcl,
{
    pub fn new(inner: P, resolver: PermissionResolver<S, A>, mutations: PermissionMutationManager<S>, session: Session) -> Self {
        AuthorizationGate { inner, resolver, mutations, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn check(&self, root: &StorageRoot, p: &str, mask: EffectiveMask, kinds: &[PermissionKind]) -> Result<()> {
        match mask.first_missing(kinds) {
            Some(k) => {
                debug!(root_id = root.id, path = p, kind = %k, "operation denied");
                Err(PermissionError::denied(p, k))
            }
            None => Ok(()),
        }
    }

    /// Require every kind on one item
    fn require(&self, root: &StorageRoot, p: &str, path_type: PathType, kinds: &[PermissionKind]) -> Result<()> {
        let mask = self.resolver.resolve_mask(&self.session, root, p, path_type);
        self.check(root, p, mask, kinds)
    }

    /// Require every kind on an item and, for folders, on everything below it
    fn require_recursive(&self, root: &StorageRoot, p: &str, path_type: PathType, kinds: &[PermissionKind]) -> Result<()> {
        let mask = self.resolver.resolve_recursive_mask(&self.session, root, p, path_type);
        self.check(root, p, mask, kinds)
    }

    fn propagate(&self, what: &str, r: Result<usize>) -> Result<()> {
        r.map(|_| ()).map_err(|e| {
            warn!(error = %e, "failed to propagate grants after {}", what);
            e
        })
    }
}

impl<P, S, A> StorageProvider for AuthorizationGate<P, S, A>
where
    P: StorageProvider,
    S: PermissionRecordStore,
    A: RootAcl,
{
    fn list(&self, root: &StorageRoot, p: &str) -> Result<Vec<StorageItem>> {
        if !self.resolver.is_listing_allowed(&self.session, root, p) {
            return Err(PermissionError::denied(p, PermissionKind::Read));
        }
        let items = self.inner.list(root, p)?;
        self.resolver.decorate_listing(&self.session, root, p, items)
    }

    fn read(&self, root: &StorageRoot, p: &str) -> Result<Vec<u8>> {
        self.require(root, p, PathType::File, READ)?;
        self.inner.read(root, p)
    }

    fn write(&self, root: &StorageRoot, p: &str, data: &[u8]) -> Result<()> {
        self.require(root, p, PathType::File, WRITE)?;
        self.inner.write(root, p, data)
    }

    fn create_folder(&self, root: &StorageRoot, p: &str) -> Result<()> {
        self.require(root, p, PathType::Folder, WRITE)?;
        self.inner.create_folder(root, p)
    }

    fn delete(&self, root: &StorageRoot, p: &str, path_type: PathType, total: bool) -> Result<()> {
        self.require_recursive(root, p, path_type, WRITE)?;
        self.inner.delete(root, p, path_type, total)?;
        self.propagate("delete", self.mutations.on_item_deleted(root, p, path_type, total))
    }

    fn move_item(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<()> {
        self.require_recursive(root, old, path_type, READ_WRITE)?;
        self.require(root, new, path_type, WRITE)?;
        self.mutations.check_relocation(root, old, new, path_type)?;
        self.inner.move_item(root, old, new, path_type)?;
        self.propagate("move", self.mutations.on_item_moved(root, old, new, path_type))
    }

    fn copy_item(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<()> {
        self.require_recursive(root, old, path_type, READ)?;
        self.require(root, new, path_type, WRITE)?;
        self.mutations.check_relocation(root, old, new, path_type)?;
        self.inner.copy_item(root, old, new, path_type)?;
        self.propagate("copy", self.mutations.on_item_copied(root, old, new, path_type))
    }

    fn get_tags(&self, root: &StorageRoot, p: &str, path_type: PathType) -> Result<Tags> {
        self.require(root, p, path_type, READ)?;
        self.inner.get_tags(root, p, path_type)
    }

    fn set_tags(&self, root: &StorageRoot, p: &str, path_type: PathType, tags: Tags) -> Result<()> {
        self.require(root, p, path_type, WRITE)?;
        self.inner.set_tags(root, p, path_type, tags)
    }

    fn delete_tags(&self, root: &StorageRoot, p: &str, path_type: PathType, keys: &[String]) -> Result<()> {
        self.require(root, p, path_type, WRITE)?;
        self.inner.delete_tags(root, p, path_type, keys)
    }
}
