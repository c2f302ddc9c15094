//! Permission resolution: single paths, whole subtrees and listings
//!
//! Resolution of one path:
//! 1. no principal: nothing is allowed
//! 2. administrator or storage owner: everything is allowed
//! 3. otherwise the grants of the principal and its groups on the path and
//!    its ancestor folders are folded per path (groups first, then the user),
//!    then from the deepest path up to the root-level fallback mask
//!
//! Every read here is side-effect free. Store faults and inconsistent grant
//! rows resolve to "denied"; they are logged and never surfaced as masks.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::acl::RootAcl;
use crate::error::{PermissionError, Result};
use crate::mask::{
    fold_item_masks, merge_parent_mask, project_to_effective, Decision, EffectiveMask, Mask, PermissionKind,
};
use crate::model::{PathType, PermissionGrant, StorageItem, StorageRoot};
use crate::path;
use crate::principal::Session;
use crate::store::{absolute_path, PermissionRecordStore};

/// Fold grants per exact item. Two rows for the same item and sid are a store fault.
pub(crate) fn fold_by_item(grants: Vec<PermissionGrant>) -> Result<BTreeMap<(String, PathType), Mask>> {
    let mut groups: BTreeMap<(String, PathType), Vec<PermissionGrant>> = BTreeMap::new();
    for g in grants {
        groups.entry((g.path.clone(), g.path_type)).or_default().push(g);
    }
    let mut out = BTreeMap::new();
    for (item, gs) in groups {
        let mut seen = HashSet::with_capacity(gs.len());
        for g in &gs {
            if !seen.insert(&g.sid) {
                return Err(PermissionError::InconsistentGrantState(format!(
                    "duplicate grant for {} on '{}'",
                    g.sid, g.path
                )));
            }
        }
        let mask = fold_item_masks(gs.iter().map(|g| (&g.sid, g.mask)));
        out.insert(item, mask);
    }
    Ok(out)
}

/// Outcome that does not need the grant tables
fn shortcut(session: &Session, root: &StorageRoot) -> Option<EffectiveMask> {
    match session.principal() {
        None => Some(EffectiveMask::NONE),
        Some(p) if p.is_admin || root.is_owner(&p.name) => Some(EffectiveMask::ALL),
        Some(_) => None,
    }
}

pub struct PermissionResolver<S, A> {
    store: Arc<S>,
    acl: Arc<A>,
}

impl<S, A> Clone for PermissionResolver<S, A> {
    fn clone(&self) -> Self {
        PermissionResolver { store: Arc::clone(&self.store), acl: Arc::clone(&self.acl) }
    }
}

impl<S: PermissionRecordStore, A: RootAcl> PermissionResolver<S, A> {
    pub fn new(store: Arc<S>, acl: Arc<A>) -> Self {
        PermissionResolver { store, acl }
    }

    /// Extended mask of an absolute path, before deny resolution
    pub(crate) fn try_resolve_extended_mask(
        &self,
        session: &Session,
        root: &StorageRoot,
        abs_path: &str,
        path_type: PathType,
    ) -> Result<Mask> {
        let sids = session.sids();
        let grants = self.store.load(root.id, abs_path, path_type, &sids)?;
        let mut levels: Vec<((String, PathType), Mask)> = fold_by_item(grants)?.into_iter().collect();
        levels.sort_by_key(|((p, _), _)| Reverse(path::depth(p, root.delimiter)));

        let mut mask = Mask::EMPTY;
        for (_, level) in levels {
            mask = merge_parent_mask(mask, level);
        }
        let fallback = self.acl.root_mask(root, session, true)?;
        Ok(merge_parent_mask(mask, fallback))
    }

    fn fail_closed(&self, root: &StorageRoot, p: &str, e: &PermissionError) {
        warn!(root_id = root.id, path = p, error = %e, "permission resolution failed, denying");
    }

    fn abs(&self, root: &StorageRoot, p: &str) -> Result<String> {
        absolute_path(&*self.store, root, p)
    }

    /// [`shortcut`], after rejecting paths that cannot be resolved for anyone
    fn checked_shortcut(&self, session: &Session, root: &StorageRoot, p: &str) -> Option<EffectiveMask> {
        match self.abs(root, p) {
            Ok(_) => shortcut(session, root),
            Err(e) => {
                self.fail_closed(root, p, &e);
                Some(EffectiveMask::NONE)
            }
        }
    }

    fn try_resolve_mask(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> Result<EffectiveMask> {
        let abs = self.abs(root, p)?;
        let effective = project_to_effective(self.try_resolve_extended_mask(session, root, &abs, path_type)?);
        debug!(root_id = root.id, path = %abs, mask = %effective, "resolved permissions");
        Ok(effective)
    }

    /// Effective mask of a root-relative path for the session's principal
    pub fn resolve_mask(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> EffectiveMask {
        if let Some(m) = self.checked_shortcut(session, root, p) {
            return m;
        }
        self.try_resolve_mask(session, root, p, path_type).unwrap_or_else(|e| {
            self.fail_closed(root, p, &e);
            EffectiveMask::NONE
        })
    }

    pub fn is_allowed(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType, kinds: &[PermissionKind]) -> bool {
        self.resolve_mask(session, root, p, path_type).allows_all(kinds)
    }

    pub fn is_read_allowed(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> bool {
        self.is_allowed(session, root, p, path_type, &[PermissionKind::Read])
    }

    pub fn is_write_allowed(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> bool {
        self.is_allowed(session, root, p, path_type, &[PermissionKind::Write])
    }

    pub fn is_read_write_allowed(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> bool {
        self.is_allowed(session, root, p, path_type, &[PermissionKind::Read, PermissionKind::Write])
    }

    fn try_resolve_recursive_mask(&self, session: &Session, root: &StorageRoot, p: &str) -> Result<EffectiveMask> {
        let abs = self.abs(root, p)?;
        let mut mask = project_to_effective(self.try_resolve_extended_mask(session, root, &abs, PathType::Folder)?);
        if mask == EffectiveMask::NONE {
            return Ok(mask);
        }
        if let Some(below) = self.store.load_recursive_deny_or_incomplete_mask(root.id, &abs, &session.sids())? {
            for k in PermissionKind::ALL {
                if below.denies(k) {
                    mask = mask.without(k);
                }
            }
        }
        debug!(root_id = root.id, path = %abs, mask = %mask, "resolved subtree permissions");
        Ok(mask)
    }

    /// Kinds allowed on an item and, for folders, on everything below it.
    ///
    /// A folder keeps a kind when its own mask allows it and no grant below
    /// denies it. Grants below that only leave kinds undecided inherit the
    /// folder's decision and do not remove anything.
    pub fn resolve_recursive_mask(&self, session: &Session, root: &StorageRoot, p: &str, path_type: PathType) -> EffectiveMask {
        if path_type == PathType::File {
            return self.resolve_mask(session, root, p, path_type);
        }
        if let Some(m) = self.checked_shortcut(session, root, p) {
            return m;
        }
        self.try_resolve_recursive_mask(session, root, p).unwrap_or_else(|e| {
            self.fail_closed(root, p, &e);
            EffectiveMask::NONE
        })
    }

    /// Allow decision for a whole subtree, see [`Self::resolve_recursive_mask`]
    pub fn is_recursive_allowed(
        &self,
        session: &Session,
        root: &StorageRoot,
        p: &str,
        path_type: PathType,
        kinds: &[PermissionKind],
    ) -> bool {
        self.resolve_recursive_mask(session, root, p, path_type).allows_all(kinds)
    }

    /// Whether the principal may list `p` at all: the folder is readable, or
    /// at least one direct child is individually readable
    pub fn is_listing_allowed(&self, session: &Session, root: &StorageRoot, p: &str) -> bool {
        if let Some(m) = self.checked_shortcut(session, root, p) {
            return m.allows(PermissionKind::Read);
        }
        if self.is_read_allowed(session, root, p, PathType::Folder) {
            return true;
        }
        let children = self
            .abs(root, p)
            .and_then(|abs| self.store.find_read_allowed_immediate_child_paths(root.id, &abs, &session.sids()));
        match children {
            Ok(children) => !children.is_empty(),
            Err(e) => {
                self.fail_closed(root, p, &e);
                false
            }
        }
    }

    /// Stamp every listed item with its effective mask.
    ///
    /// When the folder itself is not readable, only children the principal may
    /// read individually are kept; if there are none the listing is denied.
    pub fn decorate_listing(
        &self,
        session: &Session,
        root: &StorageRoot,
        parent: &str,
        items: Vec<StorageItem>,
    ) -> Result<Vec<StorageItem>> {
        match self.checked_shortcut(session, root, parent) {
            Some(m) if m.allows(PermissionKind::Read) => {
                return Ok(items.into_iter().map(|it| StorageItem { mask: Some(m), ..it }).collect());
            }
            Some(_) => return Err(PermissionError::denied(parent, PermissionKind::Read)),
            None => {}
        }

        let deny = |e: PermissionError| {
            self.fail_closed(root, parent, &e);
            PermissionError::denied(parent, PermissionKind::Read)
        };
        let abs_parent = self.abs(root, parent).map_err(deny)?;
        let sids = session.sids();

        let folder_mask = self
            .try_resolve_extended_mask(session, root, &abs_parent, PathType::Folder)
            .map_err(deny)?;
        let child_grants = self
            .store
            .find_immediate_child_grants(root.id, &abs_parent, &sids)
            .map_err(deny)?;
        let child_masks = fold_by_item(child_grants).map_err(deny)?;
        let merged = |abs: String, t: PathType| {
            let own = child_masks.get(&(abs, t)).copied().unwrap_or(Mask::EMPTY);
            merge_parent_mask(own, folder_mask)
        };

        // items whose path cannot be resolved are dropped from the listing
        let item_abs = |it: &StorageItem| match self.abs(root, &it.path) {
            Ok(abs) => Some(abs),
            Err(e) => {
                self.fail_closed(root, &it.path, &e);
                None
            }
        };

        if project_to_effective(folder_mask).allows(PermissionKind::Read) {
            return Ok(items
                .into_iter()
                .filter_map(|it| {
                    let m = merged(item_abs(&it)?, it.item_type);
                    Some(StorageItem { mask: Some(project_to_effective(m)), ..it })
                })
                .collect());
        }

        let readable = self
            .store
            .find_read_allowed_immediate_child_paths(root.id, &abs_parent, &sids)
            .map_err(deny)?;
        if readable.is_empty() {
            debug!(root_id = root.id, path = %abs_parent, "no readable children, denying listing");
            return Err(PermissionError::denied(parent, PermissionKind::Read));
        }
        Ok(items
            .into_iter()
            .filter_map(|it| {
                let abs = item_abs(&it)?;
                if !readable.contains(&(abs.clone(), it.item_type)) {
                    return None;
                }
                // membership in the readable set already proves read access
                let m = merged(abs, it.item_type).with(PermissionKind::Read, Decision::ALLOW);
                Some(StorageItem { mask: Some(project_to_effective(m)), ..it })
            })
            .collect())
    }
}
