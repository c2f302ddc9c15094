//! Write transaction wrapper for grant mutations

use heed::{Env, RoTxn, RwTxn};

use crate::db::{decode, Db};
use crate::error::{err, PermissionError, Result};
use crate::keys::{grant_key, is_key_safe, item_prefix, subtree_prefix};
use crate::model::{PathType, PermissionGrant, Sid};
use crate::path;

/// Collect `(key, mask bits)` for every entry under `prefix`
pub(crate) fn scan(tx: &RoTxn, db: &Db, prefix: &[u8]) -> Result<Vec<(Vec<u8>, u64)>> {
    let mut r = Vec::new();
    for item in db.prefix_iter(tx, prefix).map_err(err)? {
        let (k, v) = item.map_err(err)?;
        r.push((k.to_vec(), v));
    }
    Ok(r)
}

/// Grants on exactly `p` with `path_type`, plus everything below `p` for folders
pub(crate) fn item_grants(tx: &RoTxn, db: &Db, root_id: u64, p: &str, path_type: PathType, delim: char) -> Result<Vec<PermissionGrant>> {
    let mut out = Vec::new();
    for (k, v) in scan(tx, db, &item_prefix(root_id, p, path_type))? {
        out.push(decode(&k, v)?);
    }
    if path_type == PathType::Folder {
        for (k, v) in scan(tx, db, &subtree_prefix(root_id, p, delim))? {
            let g = decode(&k, v)?;
            // the subtree prefix of the empty path also covers the path itself
            if g.path != p {
                out.push(g);
            }
        }
    }
    Ok(out)
}

/// Transaction wrapper for batched grant writes
pub struct Tx<'e> {
    txn: Option<RwTxn<'e>>,
    db: Db,
    delim: char,
}

impl<'e> Tx<'e> {
    #[inline]
    pub(crate) fn new(env: &'e Env, db: Db, delim: char) -> Result<Self> {
        Ok(Tx { txn: Some(env.write_txn().map_err(err)?), db, delim })
    }

    #[inline]
    fn tx(&mut self) -> Result<&mut RwTxn<'e>> {
        self.txn.as_mut().ok_or_else(|| PermissionError::RecordStoreUnavailable("transaction already committed".into()))
    }

    #[inline]
    fn ro(&self) -> Result<&RoTxn<'e>> {
        match self.txn.as_ref() {
            Some(t) => Ok(&**t),
            None => Err(PermissionError::RecordStoreUnavailable("transaction already committed".into())),
        }
    }

    #[inline]
    pub(crate) fn commit(mut self) -> Result<()> {
        match self.txn.take() {
            Some(t) => t.commit().map_err(err),
            None => Ok(()),
        }
    }

    /// Insert or replace a grant
    pub fn put(&mut self, grant: &PermissionGrant) -> Result<()> {
        if !is_key_safe(&grant.path) || !is_key_safe(&grant.sid.name) {
            return Err(PermissionError::InvalidPath(grant.path.clone()));
        }
        let k = grant_key(grant.root_id, &grant.path, grant.path_type, &grant.sid);
        let db = self.db;
        db.put(self.tx()?, &k, &grant.mask.bits()).map_err(err)
    }

    /// Remove a grant
    pub fn del(&mut self, root_id: u64, p: &str, path_type: PathType, sid: &Sid) -> Result<bool> {
        let k = grant_key(root_id, p, path_type, sid);
        let db = self.db;
        db.delete(self.tx()?, &k).map_err(err)
    }

    /// Grants at and (for folders) below `p`
    pub fn item_grants(&self, root_id: u64, p: &str, path_type: PathType) -> Result<Vec<PermissionGrant>> {
        item_grants(self.ro()?, &self.db, root_id, p, path_type, self.delim)
    }

    /// Copy grants to a new location, keeping relative sub-paths
    pub fn copy(&mut self, root_id: u64, old: &str, new: &str, path_type: PathType) -> Result<usize> {
        let grants = self.item_grants(root_id, old, path_type)?;
        let mut n = 0;
        for mut g in grants {
            let Some(target) = path::rebase(&g.path, old, new, self.delim) else { continue };
            g.path = target;
            self.put(&g)?;
            n += 1;
        }
        Ok(n)
    }

    /// Delete grants at and (for folders) below `p`
    pub fn delete(&mut self, root_id: u64, p: &str, path_type: PathType) -> Result<usize> {
        let grants = self.item_grants(root_id, p, path_type)?;
        let mut n = 0;
        for g in &grants {
            if self.del(root_id, &g.path, g.path_type, &g.sid)? {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Delete every entry under a raw key prefix
    pub(crate) fn delete_prefix(&mut self, prefix: &[u8]) -> Result<usize> {
        let keys = scan(self.ro()?, &self.db, prefix)?;
        let db = self.db;
        let mut n = 0;
        for (k, _) in keys {
            if db.delete(self.tx()?, &k).map_err(err)? {
                n += 1;
            }
        }
        Ok(n)
    }
}

/// Run multiple writes in a single transaction. Nothing is committed on error.
#[inline]
pub fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(env: &Env, db: Db, delim: char, f: F) -> Result<T> {
    let mut tx = Tx::new(env, db, delim)?;
    let r = f(&mut tx)?;
    tx.commit()?;
    Ok(r)
}
