//! Grant writes and grant propagation on storage mutations
//!
//! This is the only writer of grant rows. Paths are root-relative and are
//! resolved against the [`StorageRoot`] before reaching the store.

use std::sync::Arc;

use tracing::info;

use crate::error::{PermissionError, Result};
use crate::keys::is_key_safe;
use crate::mask::Mask;
use crate::model::{PathType, PermissionGrant, Sid, StorageRoot};
use crate::path;
use crate::store::{absolute_path, PermissionRecordStore};

/// One entry of a batch grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    pub path: String,
    pub path_type: PathType,
    pub sid: Sid,
    pub mask: Mask,
}

impl GrantRequest {
    pub fn new(path: impl Into<String>, path_type: PathType, sid: Sid, mask: Mask) -> Self {
        GrantRequest { path: path.into(), path_type, sid, mask }
    }
}

pub struct PermissionMutationManager<S> {
    store: Arc<S>,
}

impl<S> Clone for PermissionMutationManager<S> {
    fn clone(&self) -> Self {
        PermissionMutationManager { store: Arc::clone(&self.store) }
    }
}

impl<S: PermissionRecordStore> PermissionMutationManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        PermissionMutationManager { store }
    }

    fn abs(&self, root: &StorageRoot, p: &str) -> Result<String> {
        absolute_path(&*self.store, root, p)
    }

    fn to_grant(&self, root: &StorageRoot, p: &str, path_type: PathType, sid: Sid, mask: Mask) -> Result<PermissionGrant> {
        if !is_key_safe(p) {
            return Err(PermissionError::InvalidPath(p.to_string()));
        }
        if sid.name.is_empty() || !is_key_safe(&sid.name) {
            return Err(PermissionError::InvalidSid(sid.to_string()));
        }
        Ok(PermissionGrant::new(root.id, self.abs(root, p)?, path_type, sid, mask))
    }

    /// Insert or replace the grant of `sid` on one item
    pub fn grant(&self, root: &StorageRoot, p: &str, path_type: PathType, sid: Sid, mask: Mask) -> Result<()> {
        let g = self.to_grant(root, p, path_type, sid, mask)?;
        self.store.upsert(&g)?;
        info!(root_id = root.id, path = %g.path, sid = %g.sid, "granted permissions");
        Ok(())
    }

    /// Apply every request or none of them
    pub fn batch_grant(&self, root: &StorageRoot, requests: Vec<GrantRequest>) -> Result<()> {
        let grants = requests
            .into_iter()
            .map(|r| self.to_grant(root, &r.path, r.path_type, r.sid, r.mask))
            .collect::<Result<Vec<_>>>()?;
        self.store.upsert_all(&grants)?;
        info!(root_id = root.id, count = grants.len(), "granted permissions in batch");
        Ok(())
    }

    /// Remove the grant of `sid` on one item; `false` if there was none
    pub fn revoke(&self, root: &StorageRoot, p: &str, path_type: PathType, sid: &Sid) -> Result<bool> {
        let abs = self.abs(root, p)?;
        let removed = self.store.remove(root.id, &abs, path_type, sid)?;
        if removed {
            info!(root_id = root.id, path = %abs, sid = %sid, "revoked permissions");
        }
        Ok(removed)
    }

    /// Remove several grants, or none of them
    pub fn batch_revoke(&self, root: &StorageRoot, items: &[(String, PathType, Sid)]) -> Result<usize> {
        let keys = items
            .iter()
            .map(|(p, t, s)| Ok((self.abs(root, p)?, *t, s.clone())))
            .collect::<Result<Vec<_>>>()?;
        let n = self.store.remove_all(root.id, &keys)?;
        info!(root_id = root.id, removed = n, "revoked permissions in batch");
        Ok(n)
    }

    /// Every grant (all sids) on one item
    pub fn list_grants(&self, root: &StorageRoot, p: &str, path_type: PathType) -> Result<Vec<PermissionGrant>> {
        self.store.list_at(root.id, &self.abs(root, p)?, path_type)
    }

    /// Drop grants of a deleted item. Soft deletes in a versioned root keep them,
    /// since the item can still be restored.
    pub fn on_item_deleted(&self, root: &StorageRoot, p: &str, path_type: PathType, total: bool) -> Result<usize> {
        if root.versioning_enabled && !total {
            return Ok(0);
        }
        let abs = self.abs(root, p)?;
        let n = self.store.delete(root.id, &abs, path_type)?;
        info!(root_id = root.id, path = %abs, removed = n, "dropped grants of deleted item");
        Ok(n)
    }

    /// Absolute source and target of a move or copy. A folder cannot be
    /// relocated into its own subtree.
    pub fn check_relocation(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<(String, String)> {
        let (old_abs, new_abs) = (self.abs(root, old)?, self.abs(root, new)?);
        if path_type == PathType::Folder && path::is_descendant(&new_abs, &old_abs, root.delimiter) {
            return Err(PermissionError::InvalidPath(format!("cannot relocate '{}' into its own subtree '{}'", old, new)));
        }
        Ok((old_abs, new_abs))
    }

    /// Move grants with the item: copy to the new prefix, then delete the old one.
    /// A failure between the two steps leaves both sets; retrying is safe.
    pub fn on_item_moved(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<usize> {
        let (old_abs, new_abs) = self.check_relocation(root, old, new, path_type)?;
        if old_abs == new_abs {
            return Ok(0);
        }
        let n = self.store.copy(root.id, &old_abs, &new_abs, path_type)?;
        self.store.delete(root.id, &old_abs, path_type)?;
        info!(root_id = root.id, from = %old_abs, to = %new_abs, moved = n, "moved grants");
        Ok(n)
    }

    /// Copy grants with the item, leaving the originals in place
    pub fn on_item_copied(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<usize> {
        let (old_abs, new_abs) = self.check_relocation(root, old, new, path_type)?;
        if old_abs == new_abs {
            return Ok(0);
        }
        let n = self.store.copy(root.id, &old_abs, &new_abs, path_type)?;
        info!(root_id = root.id, from = %old_abs, to = %new_abs, copied = n, "copied grants");
        Ok(n)
    }

    /// Drop every grant of a storage that is being deregistered
    pub fn on_root_deleted(&self, root: &StorageRoot) -> Result<usize> {
        let n = self.store.delete_root(root.id)?;
        info!(root_id = root.id, removed = n, "dropped grants of deleted storage");
        Ok(n)
    }
}
