//! Protected grant management
//!
//! All operations require a session that administers the storage: a platform
//! administrator or the storage owner.

use crate::error::{PermissionError, Result};
use crate::mask::{Mask, PermissionKind};
use crate::model::{PathType, PermissionGrant, Sid, StorageRoot};
use crate::mutation::{GrantRequest, PermissionMutationManager};
use crate::principal::Session;
use crate::store::PermissionRecordStore;

// ============================================================================
// Permission Checks
// ============================================================================

/// Check that the session may manage grants on `root`
fn require_manager(session: &Session, root: &StorageRoot, p: &str) -> Result<()> {
    match session.principal() {
        Some(pr) if pr.is_admin || root.is_owner(&pr.name) => Ok(()),
        _ => Err(PermissionError::denied(p, PermissionKind::Write)),
    }
}

pub struct ProtectedPermissions<S> {
    mutations: PermissionMutationManager<S>,
}

impl<S: PermissionRecordStore> ProtectedPermissions<S> {
    pub fn new(mutations: PermissionMutationManager<S>) -> Self {
        ProtectedPermissions { mutations }
    }

    // ========================================================================
    // Grants
    // ========================================================================

    /// Set a grant. Requires admin or ownership of the storage.
    pub fn grant(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType, sid: Sid, mask: Mask) -> Result<()> {
        require_manager(session, root, p)?;
        self.mutations.grant(root, p, path_type, sid, mask)
    }

    /// Set several grants atomically. Requires admin or ownership of the storage.
    pub fn batch_grant(&self, session: &Session, root: &StorageRoot, requests: Vec<GrantRequest>) -> Result<()> {
        require_manager(session, root, "")?;
        self.mutations.batch_grant(root, requests)
    }

    /// Delete a grant. Requires admin or ownership of the storage.
    pub fn revoke(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType, sid: &Sid) -> Result<bool> {
        require_manager(session, root, p)?;
        self.mutations.revoke(root, p, path_type, sid)
    }

    /// List every grant on one item. Requires admin or ownership of the storage.
    pub fn list_grants(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> Result<Vec<PermissionGrant>> {
        require_manager(session, root, p)?;
        self.mutations.list_grants(root, p, path_type)
    }
}
