//! Shared fixtures for docsync-sync integration tests
//!
//! [`MemoryRemote`] is an in-memory repository implementing
//! [`IRemoteClient`], with helpers to change it behind the engine's back
//! and to inject failures. [`Harness`] binds a temporary directory to it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use docsync_cache::{DatabasePool, SqliteStateStore};
use docsync_core::config::IgnoreConfig;
use docsync_core::domain::{
    Capabilities, ClientError, DigestAlgorithm, FileSystemInfo, LocalPath, PairState, RemoteRef,
    RootBinding, ServerBinding, SyncPair,
};
use docsync_core::ports::{ILocalClient, IRemoteClient, IRemoteConnector, IStateStore, PairFilter};
use docsync_sync::{CycleOutcome, CycleReport, LocalFileSystemClient, SyncSettings, Synchronizer};
use tempfile::TempDir;

pub const ROOT_ID: &str = "defaultSyncRootFolderItemFactory#default#ws";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "token-0001";

pub fn rref(id: &str) -> RemoteRef {
    RemoteRef::new(id.to_string()).unwrap()
}

pub fn lpath(path: &str) -> LocalPath {
    LocalPath::new(path.to_string()).unwrap()
}

pub fn md5_hex(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

// ============================================================================
// In-memory remote
// ============================================================================

#[derive(Debug, Clone)]
struct Node {
    parent: Option<String>,
    name: String,
    folderish: bool,
    content: Vec<u8>,
    capabilities: Capabilities,
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<String, Node>,
    next_id: u64,
    failures: HashMap<&'static str, VecDeque<ClientError>>,
    writes: usize,
    omit_digests: bool,
    on_write: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Tree {
    fn allocate(&mut self) -> String {
        self.next_id += 1;
        format!("defaultFileSystemItemFactory#default#uid-{}", self.next_id)
    }

    fn info(&self, id: &str) -> Result<FileSystemInfo, ClientError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| ClientError::NotFound(id.to_string()))?;
        let info = if node.folderish {
            FileSystemInfo::folder(id, node.parent.clone(), node.name.clone())
        } else if self.omit_digests {
            FileSystemInfo::file(id, node.parent.clone(), node.name.clone(), None, None)
        } else {
            FileSystemInfo::file(
                id,
                node.parent.clone(),
                node.name.clone(),
                Some(md5_hex(&node.content)),
                Some(DigestAlgorithm::Md5),
            )
        };
        Ok(info
            .with_path(format!("nxfile/default/{id}/blobholder:0/{}", node.name))
            .with_capabilities(node.capabilities))
    }

    fn children(&self, id: &str) -> Vec<String> {
        let mut children: Vec<(&String, &Node)> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.as_deref() == Some(id))
            .collect();
        children.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        children.into_iter().map(|(id, _)| id.clone()).collect()
    }

    fn insert(&mut self, parent: &str, name: &str, folderish: bool, content: &[u8]) -> String {
        let id = self.allocate();
        self.nodes.insert(
            id.clone(),
            Node {
                parent: Some(parent.to_string()),
                name: name.to_string(),
                folderish,
                content: content.to_vec(),
                capabilities: Capabilities::all(),
            },
        );
        id
    }

    fn remove(&mut self, id: &str) {
        for child in self.children(id) {
            self.remove(&child);
        }
        self.nodes.remove(id);
    }

    fn take_failure(&mut self, op: &'static str) -> Result<(), ClientError> {
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory repository rooted at [`ROOT_ID`]
pub struct MemoryRemote {
    tree: Mutex<Tree>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.nodes.insert(
            ROOT_ID.to_string(),
            Node {
                parent: None,
                name: "Workspace".to_string(),
                folderish: true,
                content: Vec::new(),
                capabilities: Capabilities::all(),
            },
        );
        Self {
            tree: Mutex::new(tree),
        }
    }

    pub fn root() -> RemoteRef {
        rref(ROOT_ID)
    }

    // ------------------------------------------------------------------
    // Out-of-band changes (another user editing the server)
    // ------------------------------------------------------------------

    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        self.tree.lock().unwrap().insert(parent, name, true, b"")
    }

    pub fn add_file(&self, parent: &str, name: &str, content: &[u8]) -> String {
        self.tree.lock().unwrap().insert(parent, name, false, content)
    }

    pub fn set_content(&self, id: &str, content: &[u8]) {
        let mut tree = self.tree.lock().unwrap();
        tree.nodes.get_mut(id).unwrap().content = content.to_vec();
    }

    pub fn rename_node(&self, id: &str, name: &str) {
        let mut tree = self.tree.lock().unwrap();
        tree.nodes.get_mut(id).unwrap().name = name.to_string();
    }

    pub fn move_node(&self, id: &str, parent: &str) {
        let mut tree = self.tree.lock().unwrap();
        tree.nodes.get_mut(id).unwrap().parent = Some(parent.to_string());
    }

    pub fn remove_node(&self, id: &str) {
        self.tree.lock().unwrap().remove(id);
    }

    pub fn set_capabilities(&self, id: &str, capabilities: Capabilities) {
        let mut tree = self.tree.lock().unwrap();
        tree.nodes.get_mut(id).unwrap().capabilities = capabilities;
    }

    /// Reports files without digests, forcing the engine to download them
    pub fn omit_digests(&self) {
        self.tree.lock().unwrap().omit_digests = true;
    }

    /// Makes the next `times` calls of `op` fail with `err`
    pub fn fail(&self, op: &'static str, err: ClientError, times: usize) {
        let mut tree = self.tree.lock().unwrap();
        let queue = tree.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    /// Runs `hook` after every successful mutating call
    pub fn on_write(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.tree.lock().unwrap().on_write = Some(Arc::new(hook));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn find(&self, parent: &str, name: &str) -> Option<String> {
        let tree = self.tree.lock().unwrap();
        tree.children(parent)
            .into_iter()
            .find(|id| tree.nodes[id].name == name)
    }

    pub fn child_names(&self, parent: &str) -> Vec<String> {
        let tree = self.tree.lock().unwrap();
        tree.children(parent)
            .iter()
            .map(|id| tree.nodes[id].name.clone())
            .collect()
    }

    pub fn content_of(&self, id: &str) -> Option<Vec<u8>> {
        self.tree
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .map(|n| n.content.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tree.lock().unwrap().nodes.contains_key(id)
    }

    /// Number of successful mutating calls so far
    pub fn writes(&self) -> usize {
        self.tree.lock().unwrap().writes
    }

    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Tree) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let hook = {
            let mut tree = self.tree.lock().unwrap();
            tree.take_failure(op)?;
            let value = f(&mut tree)?;
            tree.writes += 1;
            (value, tree.on_write.clone())
        };
        if let Some(on_write) = hook.1 {
            on_write();
        }
        Ok(hook.0)
    }

    fn read<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Tree) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let mut tree = self.tree.lock().unwrap();
        tree.take_failure(op)?;
        f(&tree)
    }
}

#[async_trait::async_trait]
impl IRemoteClient for MemoryRemote {
    async fn get_info(&self, id: &RemoteRef) -> Result<FileSystemInfo, ClientError> {
        self.read("get_info", |t| t.info(id.as_str()))
    }

    async fn get_content(&self, id: &RemoteRef) -> Result<Vec<u8>, ClientError> {
        self.read("get_content", |t| match t.nodes.get(id.as_str()) {
            Some(node) if !node.folderish => Ok(node.content.clone()),
            _ => Err(ClientError::NotFound(id.to_string())),
        })
    }

    async fn get_children_info(&self, id: &RemoteRef) -> Result<Vec<FileSystemInfo>, ClientError> {
        self.read("get_children", |t| {
            t.info(id.as_str())?;
            t.children(id.as_str()).iter().map(|c| t.info(c)).collect()
        })
    }

    async fn make_folder(
        &self,
        parent: &RemoteRef,
        name: &str,
    ) -> Result<FileSystemInfo, ClientError> {
        self.mutate("make_folder", |t| {
            t.info(parent.as_str())?;
            let id = t.insert(parent.as_str(), name, true, b"");
            t.info(&id)
        })
    }

    async fn make_file(
        &self,
        parent: &RemoteRef,
        name: &str,
        content: &[u8],
    ) -> Result<FileSystemInfo, ClientError> {
        self.mutate("make_file", |t| {
            t.info(parent.as_str())?;
            let id = t.insert(parent.as_str(), name, false, content);
            t.info(&id)
        })
    }

    async fn update_content(
        &self,
        id: &RemoteRef,
        content: &[u8],
    ) -> Result<FileSystemInfo, ClientError> {
        self.mutate("update_content", |t| {
            let node = t
                .nodes
                .get_mut(id.as_str())
                .ok_or_else(|| ClientError::NotFound(id.to_string()))?;
            node.content = content.to_vec();
            t.info(id.as_str())
        })
    }

    async fn delete(&self, id: &RemoteRef) -> Result<(), ClientError> {
        self.mutate("delete", |t| {
            t.info(id.as_str())?;
            t.remove(id.as_str());
            Ok(())
        })
    }

    async fn exists(&self, id: &RemoteRef) -> Result<bool, ClientError> {
        self.read("exists", |t| Ok(t.nodes.contains_key(id.as_str())))
    }

    async fn rename(&self, id: &RemoteRef, new_name: &str) -> Result<FileSystemInfo, ClientError> {
        self.mutate("rename", |t| {
            let node = t
                .nodes
                .get_mut(id.as_str())
                .ok_or_else(|| ClientError::NotFound(id.to_string()))?;
            node.name = new_name.to_string();
            t.info(id.as_str())
        })
    }

    async fn move_item(
        &self,
        id: &RemoteRef,
        new_parent: &RemoteRef,
    ) -> Result<FileSystemInfo, ClientError> {
        self.mutate("move_item", |t| {
            t.info(new_parent.as_str())?;
            let node = t
                .nodes
                .get_mut(id.as_str())
                .ok_or_else(|| ClientError::NotFound(id.to_string()))?;
            node.parent = Some(new_parent.to_string());
            t.info(id.as_str())
        })
    }
}

/// Connector handing out one shared [`MemoryRemote`]
pub struct MemoryConnector {
    pub remote: Arc<MemoryRemote>,
}

#[async_trait::async_trait]
impl IRemoteConnector for MemoryConnector {
    async fn authenticate(
        &self,
        _server_url: &str,
        _username: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        if password == PASSWORD {
            Ok(TOKEN.to_string())
        } else {
            Err(ClientError::Unauthorized("bad credentials".into()))
        }
    }

    fn connect(
        &self,
        binding: &ServerBinding,
        _repository: &str,
    ) -> Result<Arc<dyn IRemoteClient>, ClientError> {
        if binding.token != TOKEN {
            return Err(ClientError::Unauthorized("unknown token".into()));
        }
        Ok(self.remote.clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub async fn memory_store() -> Arc<SqliteStateStore> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteStateStore::new(pool.pool().clone()))
}

/// One bound root over a temporary directory and a [`MemoryRemote`]
pub struct Harness {
    pub tmp: TempDir,
    pub store: Arc<SqliteStateStore>,
    pub remote: Arc<MemoryRemote>,
    pub local: Arc<LocalFileSystemClient>,
    pub synchronizer: Synchronizer,
    pub binding: RootBinding,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(SyncSettings::default()).await
    }

    pub async fn with_settings(settings: SyncSettings) -> Self {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("Nuxeo Drive");
        let local_root = folder.join("Workspace");
        std::fs::create_dir_all(&local_root).unwrap();

        let store = memory_store().await;
        let remote = Arc::new(MemoryRemote::new());

        store
            .save_server_binding(&ServerBinding::new(
                folder.clone(),
                "http://localhost:8080/nuxeo",
                "Administrator",
                TOKEN,
            ))
            .await
            .unwrap();
        let binding = RootBinding::new(local_root.clone(), folder, MemoryRemote::root(), "default");
        store.save_root_binding(&binding).await.unwrap();

        let connector = Arc::new(MemoryConnector {
            remote: remote.clone(),
        });
        let synchronizer = Synchronizer::new(
            store.clone(),
            connector,
            settings,
            IgnoreConfig::default(),
        );
        let local = Arc::new(LocalFileSystemClient::new(
            &local_root,
            IgnoreConfig::default(),
        ));

        Self {
            tmp,
            store,
            remote,
            local,
            synchronizer,
            binding,
        }
    }

    /// Runs one unbounded cycle and returns its report
    pub async fn cycle(&self) -> CycleReport {
        self.try_cycle(None).await.expect("cycle failed")
    }

    pub async fn try_cycle(&self, max_sync_step: Option<usize>) -> Result<CycleReport, docsync_sync::SyncError> {
        self.try_cycle_with(self.local.clone(), max_sync_step).await
    }

    /// Runs one cycle through another local client for the same root
    pub async fn try_cycle_with(
        &self,
        local: Arc<dyn ILocalClient>,
        max_sync_step: Option<usize>,
    ) -> Result<CycleReport, docsync_sync::SyncError> {
        match self
            .synchronizer
            .synchronize_root(&self.binding, local, self.remote.clone(), max_sync_step)
            .await?
        {
            CycleOutcome::Completed(report) => Ok(report),
            CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
        }
    }

    /// Runs cycles until one performs no work, at most `limit` of them
    pub async fn settle(&self, limit: usize) -> usize {
        for n in 1..=limit {
            if self.cycle().await.is_idle() {
                return n;
            }
        }
        panic!("still busy after {limit} cycles");
    }

    pub fn root(&self) -> &Path {
        &self.binding.local_root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, content: &[u8]) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn mkdir(&self, rel: &str) {
        std::fs::create_dir_all(self.path(rel)).unwrap();
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.path(rel)).unwrap()
    }

    pub async fn pair_at(&self, path: &str) -> Option<SyncPair> {
        self.store
            .find_pair_by_local_path(self.root(), &lpath(path))
            .await
            .unwrap()
    }

    pub async fn pair_for(&self, id: &str) -> Option<SyncPair> {
        self.store
            .find_pair_by_remote_ref(self.root(), &rref(id))
            .await
            .unwrap()
    }

    pub async fn states(&self) -> Vec<PairState> {
        self.store
            .list_pairs(&PairFilter::new().with_local_root(self.root()))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pair_state)
            .collect()
    }
}

// ============================================================================
// Local client that edits a file mid-transfer
// ============================================================================

/// Wraps a [`LocalFileSystemClient`] and overwrites one file right after a
/// given operation touched it, once
pub struct EditingLocal {
    inner: Arc<LocalFileSystemClient>,
    op: &'static str,
    path: LocalPath,
    edit: Vec<u8>,
    armed: AtomicBool,
}

impl EditingLocal {
    /// `op` is `"get_content"` or `"update_content"`
    pub fn new(inner: Arc<LocalFileSystemClient>, op: &'static str, path: &str, edit: &[u8]) -> Self {
        Self {
            inner,
            op,
            path: lpath(path),
            edit: edit.to_vec(),
            armed: AtomicBool::new(true),
        }
    }

    pub fn fired(&self) -> bool {
        !self.armed.load(Ordering::SeqCst)
    }

    fn after(&self, op: &'static str, path: &LocalPath) {
        if op == self.op && *path == self.path && self.armed.swap(false, Ordering::SeqCst) {
            std::fs::write(self.inner.abspath(path), &self.edit).unwrap();
        }
    }
}

#[async_trait::async_trait]
impl ILocalClient for EditingLocal {
    fn base_folder(&self) -> &Path {
        self.inner.base_folder()
    }

    async fn get_info(&self, path: &LocalPath) -> Result<FileSystemInfo, ClientError> {
        self.inner.get_info(path).await
    }

    async fn get_content(&self, path: &LocalPath) -> Result<Vec<u8>, ClientError> {
        let content = self.inner.get_content(path).await?;
        self.after("get_content", path);
        Ok(content)
    }

    async fn update_content(&self, path: &LocalPath, content: &[u8]) -> Result<(), ClientError> {
        self.inner.update_content(path, content).await?;
        self.after("update_content", path);
        Ok(())
    }

    async fn delete(&self, path: &LocalPath) -> Result<(), ClientError> {
        self.inner.delete(path).await
    }

    async fn exists(&self, path: &LocalPath) -> bool {
        self.inner.exists(path).await
    }

    async fn get_children_info(&self, path: &LocalPath) -> Result<Vec<FileSystemInfo>, ClientError> {
        self.inner.get_children_info(path).await
    }

    async fn make_folder(&self, parent: &LocalPath, name: &str) -> Result<LocalPath, ClientError> {
        self.inner.make_folder(parent, name).await
    }

    async fn make_file(
        &self,
        parent: &LocalPath,
        name: &str,
        content: Option<&[u8]>,
    ) -> Result<LocalPath, ClientError> {
        self.inner.make_file(parent, name, content).await
    }

    async fn rename(&self, path: &LocalPath, new_name: &str) -> Result<LocalPath, ClientError> {
        self.inner.rename(path, new_name).await
    }

    async fn move_item(
        &self,
        path: &LocalPath,
        new_parent: &LocalPath,
    ) -> Result<LocalPath, ClientError> {
        self.inner.move_item(path, new_parent).await
    }

    async fn get_digest(
        &self,
        path: &LocalPath,
        algorithm: DigestAlgorithm,
    ) -> Result<String, ClientError> {
        self.inner.get_digest(path, algorithm).await
    }
}
