//! Storage-level (root) permission fallback

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::mask::{fold_item_masks, Mask, PermissionKind};
use crate::model::{Sid, StorageRoot};
use crate::principal::Session;

/// Umbrella ACL supplying the mask used when no path-level grant decides a kind
pub trait RootAcl: Send + Sync {
    fn root_mask(&self, root: &StorageRoot, session: &Session, include_owner_write: bool) -> Result<Mask>;
}

/// Root ACL kept in memory, usually built from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticRootAcl {
    entries: HashMap<u64, BTreeMap<Sid, Mask>>,
}

impl StaticRootAcl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (replace) the entry of `sid` on a root
    pub fn set(&mut self, root_id: u64, sid: Sid, mask: Mask) {
        self.entries.entry(root_id).or_default().insert(sid, mask);
    }

    pub fn with(mut self, root_id: u64, sid: Sid, mask: Mask) -> Self {
        self.set(root_id, sid, mask);
        self
    }

    pub fn remove(&mut self, root_id: u64, sid: &Sid) -> bool {
        self.entries.get_mut(&root_id).map(|m| m.remove(sid).is_some()).unwrap_or(false)
    }
}

impl RootAcl for StaticRootAcl {
    fn root_mask(&self, root: &StorageRoot, session: &Session, include_owner_write: bool) -> Result<Mask> {
        let Some(principal) = session.principal() else { return Ok(Mask::EMPTY) };
        let sids = session.sids();
        let mut mask = match self.entries.get(&root.id) {
            Some(entries) => fold_item_masks(entries.iter().filter(|(s, _)| sids.contains(*s)).map(|(s, m)| (s, *m))),
            None => Mask::EMPTY,
        };
        if include_owner_write && root.is_owner(&principal.name) {
            mask = mask.with_allow(PermissionKind::Write);
        }
        Ok(mask)
    }
}

/// Root ACL that never decides anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRootAcl;

impl RootAcl for NoRootAcl {
    fn root_mask(&self, _root: &StorageRoot, _session: &Session, _include_owner_write: bool) -> Result<Mask> {
        Ok(Mask::EMPTY)
    }
}
