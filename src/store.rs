//! Permission record store contract
//!
//! The resolver only relies on the results being correct; it assumes nothing
//! about how ancestors are found. Every reader must answer from one consistent
//! snapshot. Paths passed in are absolute and normalised.

use std::collections::BTreeSet;

use crate::error::{PermissionError, Result};
use crate::mask::Mask;
use crate::model::{PathType, PermissionGrant, Sid, StorageRoot};

pub trait PermissionRecordStore: Send + Sync {
    /// Delimiter the store uses to find ancestors and subtrees
    fn delimiter(&self) -> char;

    /// Grants for `sids` on exactly `path` (same `path_type`) or on any ancestor
    /// folder of `path` within the root. No rows is a valid result.
    fn load(&self, root_id: u64, path: &str, path_type: PathType, sids: &[Sid]) -> Result<Vec<PermissionGrant>>;

    /// Grants for `sids` on the direct children of `parent_path`
    fn find_immediate_child_grants(&self, root_id: u64, parent_path: &str, sids: &[Sid]) -> Result<Vec<PermissionGrant>>;

    /// Direct children of `parent_path` with at least one grant for `sids` that allows read
    fn find_read_allowed_immediate_child_paths(
        &self,
        root_id: u64,
        parent_path: &str,
        sids: &[Sid],
    ) -> Result<BTreeSet<(String, PathType)>>;

    /// Union of every grant for `sids` strictly below `path` that denies a kind
    /// or leaves a basic kind undecided. `None` when there is no such grant.
    fn load_recursive_deny_or_incomplete_mask(&self, root_id: u64, path: &str, sids: &[Sid]) -> Result<Option<Mask>>;

    /// All grants, any sid, on exactly `path` with `path_type`
    fn list_at(&self, root_id: u64, path: &str, path_type: PathType) -> Result<Vec<PermissionGrant>>;

    /// Insert or replace one grant
    fn upsert(&self, grant: &PermissionGrant) -> Result<()>;

    /// Insert or replace all grants, or none of them
    fn upsert_all(&self, grants: &[PermissionGrant]) -> Result<()>;

    /// Remove one grant; `false` when it did not exist
    fn remove(&self, root_id: u64, path: &str, path_type: PathType, sid: &Sid) -> Result<bool>;

    /// Remove several grants, or none of them. Returns how many existed.
    fn remove_all(&self, root_id: u64, keys: &[(String, PathType, Sid)]) -> Result<usize>;

    /// Copy grants at `old_path` (and, for folders, below it) to `new_path`,
    /// keeping relative sub-paths. Returns the number of grants written.
    fn copy(&self, root_id: u64, old_path: &str, new_path: &str, path_type: PathType) -> Result<usize>;

    /// Delete grants at `path` (and, for folders, below it)
    fn delete(&self, root_id: u64, path: &str, path_type: PathType) -> Result<usize>;

    /// Delete every grant of a root
    fn delete_root(&self, root_id: u64) -> Result<usize>;
}

/// Absolute path of `p` in `root`, checked against the store's delimiter.
/// A root with another delimiter would have its ancestors looked up wrongly.
pub(crate) fn absolute_path<S: PermissionRecordStore + ?Sized>(store: &S, root: &StorageRoot, p: &str) -> Result<String> {
    if root.delimiter != store.delimiter() {
        return Err(PermissionError::InvalidPath(format!(
            "root {} uses delimiter '{}', the record store uses '{}'",
            root.id,
            root.delimiter,
            store.delimiter()
        )));
    }
    root.resolve_absolute_path(p)
}
