//! Shared fixtures: an LMDB store in a temp dir and an in-memory storage provider
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use storage_acl::{
    path, AuthorizationGate, LmdbRecordStore, PathType, PermissionError, PermissionMutationManager,
    PermissionResolver, Result, Session, StaticRootAcl, StorageItem, StorageProvider, StorageRoot, StoreConfig,
    Tags,
};
use tempfile::TempDir;

pub type Resolver = PermissionResolver<LmdbRecordStore, StaticRootAcl>;
pub type Mutations = PermissionMutationManager<LmdbRecordStore>;

pub struct Fixture {
    // Keeps the LMDB directory alive for the duration of the test
    pub dir: TempDir,
    pub store: Arc<LmdbRecordStore>,
    pub resolver: Resolver,
    pub mutations: Mutations,
}

pub fn setup() -> Fixture {
    setup_with_acl(StaticRootAcl::new())
}

pub fn setup_with_acl(acl: StaticRootAcl) -> Fixture {
    let dir = TempDir::new().unwrap();
    let cfg = StoreConfig::at(dir.path().join("grants"));
    let store = Arc::new(LmdbRecordStore::open(&cfg).unwrap());
    let resolver = PermissionResolver::new(Arc::clone(&store), Arc::new(acl));
    let mutations = PermissionMutationManager::new(Arc::clone(&store));
    Fixture { dir, store, resolver, mutations }
}

/// Root 1 owned by alice, rooted at the bucket "bucket"
pub fn root() -> StorageRoot {
    StorageRoot::new(1, "alice", "bucket")
}

pub fn bob() -> Session {
    Session::user("bob").with_groups(["scientists"])
}

// ============================================================================
// In-memory storage provider
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Folder,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    tags: BTreeMap<String, Tags>,
    calls: Vec<String>,
}

/// Provider keeping items in a map; clones share state so tests can inspect it
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, p: &str, data: &[u8]) -> Self {
        self.state.lock().unwrap().nodes.insert(p.to_string(), Node::File(data.to_vec()));
        self
    }

    pub fn with_folder(self, p: &str) -> Self {
        self.state.lock().unwrap().nodes.insert(p.to_string(), Node::Folder);
        self
    }

    /// Names of the provider operations that were actually invoked
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn exists(&self, p: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(p)
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }

    fn under<'a>(nodes: &'a BTreeMap<String, Node>, p: &'a str) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
        nodes.iter().filter(move |(k, _)| k.as_str() == p || path::is_descendant(k, p, '/'))
    }
}

fn missing(p: &str) -> PermissionError {
    PermissionError::Storage(format!("no such item '{}'", p))
}

impl StorageProvider for MemoryStorage {
    fn list(&self, _root: &StorageRoot, p: &str) -> Result<Vec<StorageItem>> {
        self.record("list");
        let st = self.state.lock().unwrap();
        Ok(st
            .nodes
            .iter()
            .filter(|(k, _)| path::is_immediate_child(k, p, '/'))
            .map(|(k, n)| match n {
                Node::File(d) => StorageItem::file(k.clone(), d.len() as u64),
                Node::Folder => StorageItem::folder(k.clone()),
            })
            .collect())
    }

    fn read(&self, _root: &StorageRoot, p: &str) -> Result<Vec<u8>> {
        self.record("read");
        match self.state.lock().unwrap().nodes.get(p) {
            Some(Node::File(d)) => Ok(d.clone()),
            _ => Err(missing(p)),
        }
    }

    fn write(&self, _root: &StorageRoot, p: &str, data: &[u8]) -> Result<()> {
        self.record("write");
        self.state.lock().unwrap().nodes.insert(p.to_string(), Node::File(data.to_vec()));
        Ok(())
    }

    fn create_folder(&self, _root: &StorageRoot, p: &str) -> Result<()> {
        self.record("create_folder");
        self.state.lock().unwrap().nodes.insert(p.to_string(), Node::Folder);
        Ok(())
    }

    fn delete(&self, _root: &StorageRoot, p: &str, _path_type: PathType, _total: bool) -> Result<()> {
        self.record("delete");
        let mut st = self.state.lock().unwrap();
        let keys: Vec<String> = Self::under(&st.nodes, p).map(|(k, _)| k.clone()).collect();
        if keys.is_empty() {
            return Err(missing(p));
        }
        for k in keys {
            st.nodes.remove(&k);
        }
        Ok(())
    }

    fn move_item(&self, root: &StorageRoot, old: &str, new: &str, path_type: PathType) -> Result<()> {
        self.copy_item(root, old, new, path_type)?;
        let mut st = self.state.lock().unwrap();
        st.calls.pop();
        st.calls.push("move_item".to_string());
        let keys: Vec<String> = Self::under(&st.nodes, old).map(|(k, _)| k.clone()).collect();
        for k in keys {
            st.nodes.remove(&k);
        }
        Ok(())
    }

    fn copy_item(&self, _root: &StorageRoot, old: &str, new: &str, _path_type: PathType) -> Result<()> {
        self.record("copy_item");
        let mut st = self.state.lock().unwrap();
        let moved: Vec<(String, Node)> = Self::under(&st.nodes, old)
            .filter_map(|(k, n)| path::rebase(k, old, new, '/').map(|t| (t, n.clone())))
            .collect();
        if moved.is_empty() {
            return Err(missing(old));
        }
        st.nodes.extend(moved);
        Ok(())
    }

    fn get_tags(&self, _root: &StorageRoot, p: &str, _path_type: PathType) -> Result<Tags> {
        self.record("get_tags");
        Ok(self.state.lock().unwrap().tags.get(p).cloned().unwrap_or_default())
    }

    fn set_tags(&self, _root: &StorageRoot, p: &str, _path_type: PathType, tags: Tags) -> Result<()> {
        self.record("set_tags");
        self.state.lock().unwrap().tags.entry(p.to_string()).or_default().extend(tags);
        Ok(())
    }

    fn delete_tags(&self, _root: &StorageRoot, p: &str, _path_type: PathType, keys: &[String]) -> Result<()> {
        self.record("delete_tags");
        if let Some(t) = self.state.lock().unwrap().tags.get_mut(p) {
            for k in keys {
                t.remove(k);
            }
        }
        Ok(())
    }
}

pub fn gate(fx: &Fixture, storage: MemoryStorage, session: Session) -> AuthorizationGate<MemoryStorage, LmdbRecordStore, StaticRootAcl> {
    AuthorizationGate::new(storage, fx.resolver.clone(), fx.mutations.clone(), session)
}
