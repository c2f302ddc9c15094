//! LMDB-backed permission record store

use std::collections::BTreeSet;
use std::path::Path;

use heed::types::{Bytes, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{err, PermissionError, Result};
use crate::keys::{item_prefix, parse_grant_key, root_prefix, subtree_prefix, GrantKey};
use crate::mask::{Mask, PermissionKind};
use crate::model::{PathType, PermissionGrant, Sid};
use crate::path;
use crate::store::PermissionRecordStore;
use crate::tx::{item_grants, scan, transact, Tx};

/// Grant table: encoded grant key -> packed mask bits
pub type Db = Database<Bytes, U64<byteorder::BigEndian>>;

/// Decode one stored row. A key that cannot be decoded is a store invariant violation.
pub(crate) fn decode(k: &[u8], v: u64) -> Result<PermissionGrant> {
    let g = parse_grant_key(k)
        .ok_or_else(|| PermissionError::InconsistentGrantState(format!("malformed grant key ({} bytes)", k.len())))?;
    Ok(PermissionGrant {
        root_id: g.root_id,
        path: g.path.to_string(),
        path_type: g.path_type,
        sid: g.sid(),
        mask: Mask::from_bits(v),
    })
}

#[inline]
fn sid_matches(k: &GrantKey<'_>, sids: &[Sid]) -> bool {
    sids.iter().any(|s| s.kind == k.sid_kind && s.name == k.sid_name)
}

/// Store holding every grant of every root in one LMDB database
pub struct LmdbRecordStore {
    env: Env,
    grants: Db,
    delimiter: char,
}

impl LmdbRecordStore {
    /// Open (or create) the store described by `cfg`
    pub fn open(cfg: &StoreConfig) -> Result<Self> {
        Self::open_at(&cfg.path, cfg)
    }

    /// Open at an explicit location, taking sizing and delimiter from `cfg`
    pub fn open_at(dir: impl AsRef<Path>, cfg: &StoreConfig) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(cfg.map_size)
                .max_dbs(cfg.max_dbs)
                .open(dir)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let grants: Db = env.create_database(&mut tx, Some("grants")).map_err(err)?;
        tx.commit().map_err(err)?;
        debug!(path = %dir.display(), "opened permission record store");
        Ok(LmdbRecordStore { env, grants, delimiter: cfg.delimiter })
    }

    /// Execute a read-only operation on one snapshot
    #[inline]
    fn read<T, F: FnOnce(&RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        f(&self.env.read_txn().map_err(err)?)
    }

    #[inline]
    fn write<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        transact(&self.env, self.grants, self.delimiter, f)
    }

    /// Rows for `sids` strictly below `p`, decoded
    fn subtree(&self, tx: &RoTxn, root_id: u64, p: &str, sids: &[Sid]) -> Result<Vec<PermissionGrant>> {
        let mut out = Vec::new();
        for (k, v) in scan(tx, &self.grants, &subtree_prefix(root_id, p, self.delimiter))? {
            let g = decode(&k, v)?;
            if g.path == p || !sids.contains(&g.sid) {
                continue;
            }
            out.push(g);
        }
        Ok(out)
    }

    fn immediate_children(&self, tx: &RoTxn, root_id: u64, parent: &str, sids: &[Sid]) -> Result<Vec<PermissionGrant>> {
        let mut rows = self.subtree(tx, root_id, parent, sids)?;
        rows.retain(|g| path::is_immediate_child(&g.path, parent, self.delimiter));
        Ok(rows)
    }

    /// Number of stored grants (all roots)
    pub fn len(&self) -> Result<usize> {
        self.read(|tx| Ok(self.grants.len(tx).map_err(err)? as usize))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl PermissionRecordStore for LmdbRecordStore {
    fn delimiter(&self) -> char {
        self.delimiter
    }

    fn load(&self, root_id: u64, p: &str, path_type: PathType, sids: &[Sid]) -> Result<Vec<PermissionGrant>> {
        self.read(|tx| {
            let mut prefixes: Vec<Vec<u8>> = path::ancestors(p, self.delimiter)
                .into_iter()
                .map(|a| item_prefix(root_id, a, PathType::Folder))
                .collect();
            prefixes.push(item_prefix(root_id, p, path_type));
            let mut out = Vec::new();
            for pfx in prefixes {
                for (k, v) in scan(tx, &self.grants, &pfx)? {
                    let matches = parse_grant_key(&k).map(|g| sid_matches(&g, sids)).unwrap_or(true);
                    if matches {
                        out.push(decode(&k, v)?);
                    }
                }
            }
            Ok(out)
        })
    }

    fn find_immediate_child_grants(&self, root_id: u64, parent: &str, sids: &[Sid]) -> Result<Vec<PermissionGrant>> {
        self.read(|tx| self.immediate_children(tx, root_id, parent, sids))
    }

    fn find_read_allowed_immediate_child_paths(
        &self,
        root_id: u64,
        parent: &str,
        sids: &[Sid],
    ) -> Result<BTreeSet<(String, PathType)>> {
        self.read(|tx| {
            Ok(self
                .immediate_children(tx, root_id, parent, sids)?
                .into_iter()
                .filter(|g| g.mask.allows(PermissionKind::Read))
                .map(|g| (g.path, g.path_type))
                .collect())
        })
    }

    fn load_recursive_deny_or_incomplete_mask(&self, root_id: u64, p: &str, sids: &[Sid]) -> Result<Option<Mask>> {
        self.read(|tx| {
            Ok(self
                .subtree(tx, root_id, p, sids)?
                .into_iter()
                .filter(|g| g.mask.has_any_deny() || !g.mask.is_complete())
                .map(|g| g.mask)
                .reduce(|a, b| a.union(&b)))
        })
    }

    fn list_at(&self, root_id: u64, p: &str, path_type: PathType) -> Result<Vec<PermissionGrant>> {
        self.read(|tx| {
            scan(tx, &self.grants, &item_prefix(root_id, p, path_type))?
                .into_iter()
                .map(|(k, v)| decode(&k, v))
                .collect()
        })
    }

    fn upsert(&self, grant: &PermissionGrant) -> Result<()> {
        self.write(|tx| tx.put(grant))
    }

    fn upsert_all(&self, grants: &[PermissionGrant]) -> Result<()> {
        self.write(|tx| {
            for g in grants {
                tx.put(g)?;
            }
            Ok(())
        })
    }

    fn remove(&self, root_id: u64, p: &str, path_type: PathType, sid: &Sid) -> Result<bool> {
        self.write(|tx| tx.del(root_id, p, path_type, sid))
    }

    fn remove_all(&self, root_id: u64, keys: &[(String, PathType, Sid)]) -> Result<usize> {
        self.write(|tx| {
            let mut n = 0;
            for (p, t, sid) in keys {
                if tx.del(root_id, p, *t, sid)? {
                    n += 1;
                }
            }
            Ok(n)
        })
    }

    fn copy(&self, root_id: u64, old: &str, new: &str, path_type: PathType) -> Result<usize> {
        let n = self.write(|tx| tx.copy(root_id, old, new, path_type))?;
        debug!(root_id, old, new, copied = n, "copied grants");
        Ok(n)
    }

    fn delete(&self, root_id: u64, p: &str, path_type: PathType) -> Result<usize> {
        let n = self.write(|tx| tx.delete(root_id, p, path_type))?;
        debug!(root_id, path = p, deleted = n, "deleted grants");
        Ok(n)
    }

    fn delete_root(&self, root_id: u64) -> Result<usize> {
        self.write(|tx| tx.delete_prefix(&root_prefix(root_id)))
    }
}

impl LmdbRecordStore {
    /// Grants at and (for folders) below a path, any sid
    pub fn item_grants(&self, root_id: u64, p: &str, path_type: PathType) -> Result<Vec<PermissionGrant>> {
        self.read(|tx| item_grants(tx, &self.grants, root_id, p, path_type, self.delimiter))
    }
}
