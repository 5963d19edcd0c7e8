//! Bidirectional synchronization engine
//!
//! The [`Synchronizer`] keeps every bound root in step with its remote
//! folder. Each root is handled by one cycle at a time.
//!
//! ## Sync Flow
//!
//! 1. **Scan**: walk the local tree and the remote tree in full. A failed
//!    walk aborts the cycle before anything is classified.
//! 2. **Reconcile**: compare each pair with its snapshot and record the
//!    resulting state (see [`crate::classify`]), then create pairs for
//!    entities nobody tracks yet.
//! 3. **Apply**: run the pending pairs in phase order, at most
//!    `max_sync_step` of them, re-reading each pair from the store first.
//!
//! ## Failure Handling
//!
//! A failed apply is recorded on its pair and the cycle moves on.
//! Capability refusals skip the pair for good, other errors are retried
//! until `max_error_count` is reached. Rejected credentials and store
//! integrity violations end the cycle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use docsync_core::config::{IgnoreConfig, SyncConfig};
use docsync_core::domain::{
    ClientError, DigestAlgorithm, FileSystemInfo, LocalPath, PairState, RemoteRef, RootBinding,
    SyncPair,
};
use docsync_core::ports::{
    ILocalClient, IRemoteClient, IRemoteConnector, IStateStore, PairFilter,
};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::classify::{self, Decision, Observation, PlannedApply, Side, SideObservation};
use crate::digest::digest_bytes;
use crate::local_client::{sanitize_name, LocalFileSystemClient};
use crate::SyncError;

// ============================================================================
// Settings and reports
// ============================================================================

/// Engine tunables, taken from the `sync` configuration section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Failed attempts before a pair becomes `unsynchronized`
    pub max_error_count: u32,
    /// Consecutive cycles a side must be missing before it counts as deleted
    pub deletion_debounce_cycles: u32,
    /// Re-raise per-pair failures instead of recording them
    pub stop_on_error: bool,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_error_count: config.max_error_count,
            deletion_debounce_cycles: config.deletion_debounce_cycles,
            stop_on_error: config.stop_on_error,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Summary of one cycle over one root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub local_root: PathBuf,
    /// Entries seen below the local root
    pub local_entries: usize,
    /// Entries seen below the remote root
    pub remote_entries: usize,
    /// Pairs whose state changed during classification
    pub transitions: usize,
    /// Pairs inserted for untracked entities
    pub created_pairs: usize,
    /// Pairs removed because both sides are gone
    pub dropped_pairs: usize,
    /// Successful applies
    pub applied: usize,
    /// Failed applies
    pub failed: usize,
    /// Applies postponed until a parent exists on the target side
    pub deferred: usize,
    /// Pairs left in `conflicted` after the cycle
    pub conflicted: u64,
    /// Pairs left in `unsynchronized` after the cycle
    pub unsynchronized: u64,
    /// The cycle ended early at a pair boundary
    pub stopped: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl CycleReport {
    /// Number of apply attempts, successful or not
    pub fn operations(&self) -> usize {
        self.applied + self.failed
    }

    /// True when the cycle neither changed the store nor touched a client
    pub fn is_idle(&self) -> bool {
        self.transitions == 0
            && self.created_pairs == 0
            && self.dropped_pairs == 0
            && self.operations() == 0
            && self.deferred == 0
    }
}

/// Result of asking for a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran (possibly stopping early, see [`CycleReport::stopped`])
    Completed(CycleReport),
    /// Another cycle held the root's token, this trigger was dropped
    Skipped,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped)
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Runs synchronization cycles for bound roots
pub struct Synchronizer {
    store: Arc<dyn IStateStore>,
    connector: Arc<dyn IRemoteConnector>,
    settings: SyncSettings,
    ignore: IgnoreConfig,
    cycle_tokens: DashMap<PathBuf, Arc<Mutex<()>>>,
    shutdown: CancellationToken,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn IStateStore>,
        connector: Arc<dyn IRemoteConnector>,
        settings: SyncSettings,
        ignore: IgnoreConfig,
    ) -> Self {
        Self {
            store,
            connector,
            settings,
            ignore,
            cycle_tokens: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Requests a graceful halt; running cycles stop at the next pair
    pub fn stop(&self) {
        info!("Stop requested");
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled by [`stop`](Synchronizer::stop)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs one cycle over `binding` with the given clients
    ///
    /// Returns [`CycleOutcome::Skipped`] when a cycle for the same root is
    /// already running.
    #[instrument(skip(self, binding, local, remote), fields(root = %binding.local_root.display()))]
    pub async fn synchronize_root(
        &self,
        binding: &RootBinding,
        local: Arc<dyn ILocalClient>,
        remote: Arc<dyn IRemoteClient>,
        max_sync_step: Option<usize>,
    ) -> Result<CycleOutcome, SyncError> {
        if self.is_stopped() {
            return Err(SyncError::Stopped);
        }

        let token = self
            .cycle_tokens
            .entry(binding.local_root.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let Ok(_guard) = token.try_lock_owned() else {
            info!("Cycle already running for this root, trigger dropped");
            return Ok(CycleOutcome::Skipped);
        };

        let cycle = Cycle {
            settings: &self.settings,
            ignore: &self.ignore,
            store: self.store.as_ref(),
            shutdown: &self.shutdown,
            binding,
            local: local.as_ref(),
            remote: remote.as_ref(),
            report: CycleReport {
                local_root: binding.local_root.clone(),
                ..CycleReport::default()
            },
        };
        let report = cycle.run(max_sync_step).await?;

        info!(
            local_entries = report.local_entries,
            remote_entries = report.remote_entries,
            transitions = report.transitions,
            applied = report.applied,
            failed = report.failed,
            deferred = report.deferred,
            conflicted = report.conflicted,
            stopped = report.stopped,
            duration_ms = report.duration_ms,
            "Synchronization cycle complete"
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// Runs one cycle for every bound root, concurrently
    #[instrument(skip(self))]
    pub async fn synchronize_all(
        &self,
        max_sync_step: Option<usize>,
    ) -> Result<Vec<(PathBuf, Result<CycleOutcome, SyncError>)>, SyncError> {
        let roots = self
            .store
            .list_root_bindings(None)
            .await
            .map_err(SyncError::from_store)?;
        debug!(roots = roots.len(), "Synchronizing bound roots");

        let cycles = roots.iter().map(|root| async move {
            let outcome = self.synchronize_bound_root(root, max_sync_step).await;
            (root.local_root.clone(), outcome)
        });
        Ok(join_all(cycles).await)
    }

    async fn synchronize_bound_root(
        &self,
        root: &RootBinding,
        max_sync_step: Option<usize>,
    ) -> Result<CycleOutcome, SyncError> {
        let server = self
            .store
            .get_server_binding(&root.local_folder)
            .await
            .map_err(SyncError::from_store)?
            .ok_or_else(|| SyncError::NotBound(root.local_folder.clone()))?;
        let remote = self
            .connector
            .connect(&server, &root.remote_repository)
            .map_err(SyncError::from_client)?;
        let local: Arc<dyn ILocalClient> = Arc::new(LocalFileSystemClient::new(
            &root.local_root,
            self.ignore.clone(),
        ));

        self.synchronize_root(root, local, remote, max_sync_step)
            .await
    }

    /// Repeats [`synchronize_all`](Synchronizer::synchronize_all) every
    /// `delay` until [`stop`](Synchronizer::stop) is called
    ///
    /// Per-root failures are logged and retried on the next round unless
    /// `stop_on_error` is set.
    pub async fn run_loop(&self, delay: Duration, max_sync_step: usize) -> Result<(), SyncError> {
        info!(
            delay_secs = delay.as_secs(),
            max_sync_step, "Starting synchronization loop"
        );

        while !self.is_stopped() {
            let results = match self.synchronize_all(Some(max_sync_step)).await {
                Ok(results) => results,
                Err(e) if self.settings.stop_on_error => return Err(e),
                Err(e) => {
                    error!(error = %e, "Failed to list bound roots");
                    Vec::new()
                }
            };

            for (root, result) in results {
                match result {
                    Ok(CycleOutcome::Completed(report)) if report.stopped => {
                        info!(root = %root.display(), "Cycle interrupted by stop request");
                    }
                    Ok(_) => {}
                    Err(SyncError::Stopped) => {}
                    Err(e) if self.settings.stop_on_error => return Err(e),
                    Err(e) => warn!(root = %root.display(), error = %e, "Cycle failed"),
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Synchronization loop stopped");
        Ok(())
    }
}

// ============================================================================
// Scan results
// ============================================================================

#[derive(Debug, Default)]
struct LocalScan {
    /// Path order puts every folder before its content
    entries: BTreeMap<LocalPath, FileSystemInfo>,
    by_marker: HashMap<String, LocalPath>,
}

#[derive(Debug)]
struct RemoteEntry {
    remote_ref: RemoteRef,
    info: FileSystemInfo,
    /// Effective digest: reported by the server or computed from content
    digest: Option<String>,
    algorithm: DigestAlgorithm,
    depth: usize,
}

impl RemoteEntry {
    fn parent_ref(&self) -> Option<RemoteRef> {
        self.info
            .parent_id
            .as_ref()
            .and_then(|p| RemoteRef::new(p.clone()).ok())
    }
}

#[derive(Debug, Default)]
struct RemoteScan {
    entries: HashMap<RemoteRef, RemoteEntry>,
    /// Discovery order, parents before children
    order: Vec<RemoteRef>,
}

// ============================================================================
// Apply plumbing
// ============================================================================

enum Applied {
    Done,
    Deferred,
}

enum ApplyError {
    Client(ClientError),
    Store(anyhow::Error),
}

impl From<ClientError> for ApplyError {
    fn from(err: ClientError) -> Self {
        ApplyError::Client(err)
    }
}

impl From<anyhow::Error> for ApplyError {
    fn from(err: anyhow::Error) -> Self {
        ApplyError::Store(err)
    }
}

type ApplyResult = Result<Applied, ApplyError>;

// ============================================================================
// Cycle
// ============================================================================

/// State of one running cycle over one root
struct Cycle<'a> {
    settings: &'a SyncSettings,
    ignore: &'a IgnoreConfig,
    store: &'a dyn IStateStore,
    shutdown: &'a CancellationToken,
    binding: &'a RootBinding,
    local: &'a dyn ILocalClient,
    remote: &'a dyn IRemoteClient,
    report: CycleReport,
}

impl<'a> Cycle<'a> {
    async fn run(mut self, max_sync_step: Option<usize>) -> Result<CycleReport, SyncError> {
        let started = Instant::now();

        self.check_roots().await?;

        let mut local_scan = LocalScan::default();
        self.walk_local(LocalPath::root(), &mut local_scan)
            .await
            .map_err(SyncError::from_client)?;
        let remote_scan = self.scan_remote().await.map_err(SyncError::from_client)?;
        self.report.local_entries = local_scan.entries.len();
        self.report.remote_entries = remote_scan.entries.len();
        debug!(
            local_entries = self.report.local_entries,
            remote_entries = self.report.remote_entries,
            "Scan complete"
        );

        self.reconcile(&local_scan, &remote_scan).await?;
        self.apply_pending(&remote_scan, max_sync_step).await?;

        let counts = self
            .store
            .count_pairs_by_state(Some(&self.binding.local_root))
            .await
            .map_err(SyncError::from_store)?;
        self.report.conflicted = counts
            .get(PairState::Conflicted.as_str())
            .copied()
            .unwrap_or(0);
        self.report.unsynchronized = counts
            .get(PairState::Unsynchronized.as_str())
            .copied()
            .unwrap_or(0);
        self.report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(self.report)
    }

    fn root_unavailable(&self, reason: impl Into<String>) -> SyncError {
        SyncError::RootUnavailable {
            root: self.binding.local_root.clone(),
            reason: reason.into(),
        }
    }

    async fn check_roots(&self) -> Result<(), SyncError> {
        match self.local.get_info(&LocalPath::root()).await {
            Ok(info) if info.folderish => {}
            Ok(_) => return Err(self.root_unavailable("local root is not a folder")),
            Err(ClientError::NotFound(m)) => return Err(self.root_unavailable(m)),
            Err(e) => return Err(SyncError::from_client(e)),
        }

        match self.remote.get_info(&self.binding.remote_root).await {
            Ok(info) if info.folderish => Ok(()),
            Ok(_) => Err(self.root_unavailable("remote root is not a folder")),
            Err(ClientError::NotFound(m)) => Err(self.root_unavailable(m)),
            Err(e) => Err(SyncError::from_client(e)),
        }
    }

    // ------------------------------------------------------------------
    // Scan
    // ------------------------------------------------------------------

    /// Recursively collects every visible entry below `folder`
    fn walk_local<'s>(
        &'s self,
        folder: LocalPath,
        scan: &'s mut LocalScan,
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 's>> {
        Box::pin(async move {
            let children = match self.local.get_children_info(&folder).await {
                Ok(children) => children,
                // Removed while walking; the next cycle sees the final state
                Err(ClientError::NotFound(_)) if !folder.is_root() => return Ok(()),
                Err(e) => return Err(e),
            };

            for info in children {
                let path = folder
                    .join(&info.name)
                    .map_err(|e| ClientError::InvalidName(e.to_string()))?;
                if let Some(marker) = &info.marker {
                    scan.by_marker.insert(marker.clone(), path.clone());
                }
                let folderish = info.folderish;
                scan.entries.insert(path.clone(), info);
                if folderish {
                    self.walk_local(path, scan).await?;
                }
            }
            Ok(())
        })
    }

    async fn scan_remote(&self) -> Result<RemoteScan, ClientError> {
        let mut scan = RemoteScan::default();
        let root = self.binding.remote_root.clone();
        let mut pending = vec![(root.clone(), 0usize)];

        while let Some((folder, depth)) = pending.pop() {
            let children = match self.remote.get_children_info(&folder).await {
                Ok(children) => children,
                Err(ClientError::NotFound(_)) if folder != root => continue,
                Err(e) => return Err(e),
            };

            for info in children {
                let remote_ref = RemoteRef::new(info.id.clone())
                    .map_err(|e| ClientError::Remote(e.to_string()))?;
                let (digest, algorithm) = if info.folderish {
                    (None, DigestAlgorithm::Md5)
                } else {
                    self.remote_digest(&remote_ref, &info, None).await?
                };
                if info.folderish {
                    pending.push((remote_ref.clone(), depth + 1));
                }
                scan.order.push(remote_ref.clone());
                scan.entries.insert(
                    remote_ref.clone(),
                    RemoteEntry {
                        remote_ref,
                        info,
                        digest,
                        algorithm,
                        depth: depth + 1,
                    },
                );
            }
        }
        Ok(scan)
    }

    /// Returns the digest to record for a remote file
    ///
    /// A digest in an unknown algorithm, or no digest at all, is replaced by
    /// the MD5 of the content, downloading it unless `content` is given.
    async fn remote_digest(
        &self,
        id: &RemoteRef,
        info: &FileSystemInfo,
        content: Option<&[u8]>,
    ) -> Result<(Option<String>, DigestAlgorithm), ClientError> {
        if let (Some(digest), Some(algorithm)) = (&info.digest, info.digest_algorithm) {
            return Ok((Some(digest.to_lowercase()), algorithm));
        }

        let digest = match content {
            Some(content) => digest_bytes(DigestAlgorithm::Md5, content),
            None => match self.remote.get_content(id).await {
                Ok(content) => digest_bytes(DigestAlgorithm::Md5, &content),
                // A document without a blob has nothing to compare
                Err(ClientError::NotFound(_)) => return Ok((None, DigestAlgorithm::Md5)),
                Err(e) => return Err(e),
            },
        };
        debug!(id = %id, "remote digest computed from content");
        Ok((Some(digest), DigestAlgorithm::Md5))
    }

    async fn same_content(
        &self,
        path: &LocalPath,
        local_info: &FileSystemInfo,
        entry: &RemoteEntry,
    ) -> Result<bool, ClientError> {
        let Some(remote_digest) = entry.digest.as_deref() else {
            return Ok(false);
        };
        let local_digest = match entry.algorithm {
            DigestAlgorithm::Md5 => local_info.digest.clone(),
            algorithm => Some(self.local.get_digest(path, algorithm).await?),
        };
        Ok(local_digest.as_deref() == Some(remote_digest))
    }

    // ------------------------------------------------------------------
    // Reconcile
    // ------------------------------------------------------------------

    async fn reconcile(&mut self, local: &LocalScan, remote: &RemoteScan) -> Result<(), SyncError> {
        let filter = PairFilter::new().with_local_root(&self.binding.local_root);
        let mut pairs = self
            .store
            .list_pairs(&filter)
            .await
            .map_err(SyncError::from_store)?;

        if !pairs.iter().any(SyncPair::is_root) {
            let mut root = SyncPair::root(
                self.binding.local_root.clone(),
                self.binding.remote_root.clone(),
                self.binding.remote_repository.clone(),
            );
            root.id = Some(
                self.store
                    .insert_pair(&root)
                    .await
                    .map_err(SyncError::from_store)?,
            );
            pairs.push(root);
        }

        // Ancestors first, so folder moves are known before their content
        pairs.sort_by_key(|p| (p.local_path.is_none(), p.depth()));

        let mut claimed_paths: HashSet<LocalPath> =
            pairs.iter().filter_map(|p| p.local_path.clone()).collect();
        let claimed_refs: HashSet<RemoteRef> =
            pairs.iter().filter_map(|p| p.remote_ref.clone()).collect();
        let mut rebases: Vec<(LocalPath, LocalPath)> = Vec::new();
        let mut kept: Vec<SyncPair> = Vec::with_capacity(pairs.len());

        for mut pair in pairs {
            let before = pair.clone();
            rebase_within_moved_folder(&mut pair, &rebases, &mut claimed_paths);

            if pair.is_root() || pair.pair_state == PairState::Unsynchronized {
                self.save_if_changed(&before, &pair).await?;
                kept.push(pair);
                continue;
            }

            let (obs, local_info, remote_entry) = self
                .observe(&mut pair, local, remote, &mut claimed_paths, &mut rebases, &kept)
                .await?;
            let decision = classify::classify(&pair, &obs, self.settings.deletion_debounce_cycles);

            if decision == Decision::DropRow {
                if let Some(id) = pair.id {
                    self.store
                        .delete_pair(id)
                        .await
                        .map_err(SyncError::from_store)?;
                }
                debug!(pair = %describe(&pair), "Both sides gone, pair dropped");
                self.report.dropped_pairs += 1;
                continue;
            }

            record_decision(&mut pair, decision, local_info, remote_entry);
            if pair.pair_state != before.pair_state {
                debug!(
                    pair = %describe(&pair),
                    from = %before.pair_state,
                    to = %pair.pair_state,
                    "State changed"
                );
                self.report.transitions += 1;
            }
            self.save_if_changed(&before, &pair).await?;
            kept.push(pair);
        }

        self.track_new_entities(local, remote, &kept, claimed_paths, claimed_refs)
            .await
    }

    async fn save_if_changed(&self, before: &SyncPair, pair: &SyncPair) -> Result<(), SyncError> {
        if before != pair {
            self.store
                .update_pair(pair)
                .await
                .map_err(SyncError::from_store)?;
        }
        Ok(())
    }

    /// Builds the observation of one pair against both scans
    async fn observe<'s>(
        &self,
        pair: &mut SyncPair,
        local: &'s LocalScan,
        remote: &'s RemoteScan,
        claimed_paths: &mut HashSet<LocalPath>,
        rebases: &mut Vec<(LocalPath, LocalPath)>,
        kept: &[SyncPair],
    ) -> Result<(Observation, Option<&'s FileSystemInfo>, Option<&'s RemoteEntry>), SyncError> {
        let mut obs = Observation::default();
        let mut local_info = None;
        let mut remote_entry = None;

        if let Some(path) = pair.local_path.clone() {
            let at_path = local
                .entries
                .get(&path)
                .filter(|info| info.folderish == pair.folderish);

            if let Some(info) = at_path {
                obs.local = SideObservation::present(local_content_changed(pair, info), false);
                local_info = Some(info);
            } else if let Some((new_path, info)) = find_moved(pair, local, claimed_paths) {
                debug!(from = %path, to = %new_path, "Local move detected");
                claimed_paths.insert(new_path.clone());
                if pair.folderish {
                    rebases.push((path, new_path.clone()));
                }
                pair.local_path = Some(new_path);
                obs.local = SideObservation::present(local_content_changed(pair, info), true);
                local_info = Some(info);
            } else {
                obs.local = SideObservation::missing();
            }
        }

        if let Some(remote_ref) = &pair.remote_ref {
            match remote.entries.get(remote_ref) {
                Some(entry) => {
                    let content_changed = !pair.folderish && entry.digest != pair.remote_digest;
                    let moved = entry.parent_ref() != pair.remote_parent_ref
                        || pair.remote_name.as_deref() != Some(entry.info.name.as_str());
                    obs.remote = SideObservation::present(content_changed, moved);
                    remote_entry = Some(entry);
                }
                None => obs.remote = SideObservation::missing(),
            }
        }

        if obs.local.moved && obs.remote.moved {
            obs.same_location = same_location(pair, remote_entry, kept);
        }

        if classify::needs_content_check(pair, &obs) {
            if let (Some(path), Some(info), Some(entry)) =
                (pair.local_path.as_ref(), local_info, remote_entry)
            {
                obs.same_content = Some(
                    self.same_content(path, info, entry)
                        .await
                        .map_err(SyncError::from_client)?,
                );
            }
        }

        Ok((obs, local_info, remote_entry))
    }

    /// Inserts pairs for entities no pair claims, pairing same-named
    /// newcomers below an already paired folder
    async fn track_new_entities(
        &mut self,
        local: &LocalScan,
        remote: &RemoteScan,
        kept: &[SyncPair],
        claimed_paths: HashSet<LocalPath>,
        mut claimed_refs: HashSet<RemoteRef>,
    ) -> Result<(), SyncError> {
        let mut path_refs: HashMap<LocalPath, Option<RemoteRef>> = kept
            .iter()
            .filter(|p| !p.pair_state.is_deletion())
            .filter_map(|p| p.local_path.clone().map(|lp| (lp, p.remote_ref.clone())))
            .collect();

        let mut unclaimed_remote: HashMap<&str, Vec<&RemoteEntry>> = HashMap::new();
        for remote_ref in &remote.order {
            if claimed_refs.contains(remote_ref) {
                continue;
            }
            let Some(entry) = remote.entries.get(remote_ref) else {
                continue;
            };
            if self.is_ignored_remote(&entry.info.name) {
                debug!(name = %entry.info.name, "Remote entry has an ignored name, not tracked");
                continue;
            }
            let parent = entry.info.parent_id.as_deref().unwrap_or_default();
            unclaimed_remote.entry(parent).or_default().push(entry);
        }

        for (path, info) in &local.entries {
            if claimed_paths.contains(path) {
                continue;
            }

            let parent_ref = path
                .parent()
                .and_then(|parent| path_refs.get(&parent).cloned().flatten());
            let matched = parent_ref.as_ref().and_then(|parent_ref| {
                let siblings = unclaimed_remote.get_mut(parent_ref.as_str())?;
                let idx = siblings.iter().position(|e| {
                    e.info.folderish == info.folderish && names_match(&info.name, &e.info.name)
                })?;
                Some(siblings.remove(idx))
            });

            let mut pair = SyncPair::locally_created(
                self.binding.local_root.clone(),
                self.binding.remote_repository.clone(),
                path.clone(),
                info,
            );

            match matched {
                Some(entry) => {
                    pair.remote_ref = Some(entry.remote_ref.clone());
                    pair.refresh_remote(&entry.info, entry.digest.clone());
                    let equal = info.folderish
                        || self
                            .same_content(path, info, entry)
                            .await
                            .map_err(SyncError::from_client)?;
                    if equal {
                        pair.mark_synchronized();
                        debug!(path = %path, "Paired with a same-named remote entry");
                    } else {
                        pair.pair_state = PairState::Conflicted;
                        warn!(path = %path, "Same-named local and remote files differ, conflicted");
                    }
                    claimed_refs.insert(entry.remote_ref.clone());
                    path_refs.insert(path.clone(), Some(entry.remote_ref.clone()));
                }
                None => {
                    debug!(path = %path, "New local entry");
                    path_refs.insert(path.clone(), None);
                }
            }

            self.store
                .insert_pair(&pair)
                .await
                .map_err(SyncError::from_store)?;
            self.report.created_pairs += 1;
        }

        for remote_ref in &remote.order {
            if claimed_refs.contains(remote_ref) {
                continue;
            }
            let Some(entry) = remote.entries.get(remote_ref) else {
                continue;
            };
            if self.is_ignored_remote(&entry.info.name) {
                continue;
            }

            debug!(id = %remote_ref, name = %entry.info.name, "New remote entry");
            let pair = SyncPair::remotely_created(
                self.binding.local_root.clone(),
                self.binding.remote_repository.clone(),
                remote_ref.clone(),
                &entry.info,
                entry.digest.clone(),
            );
            self.store
                .insert_pair(&pair)
                .await
                .map_err(SyncError::from_store)?;
            self.report.created_pairs += 1;
        }

        Ok(())
    }

    /// A remote entry whose local name would be hidden from scans cannot be
    /// tracked: its local copy would look deleted on the next cycle
    fn is_ignored_remote(&self, name: &str) -> bool {
        sanitize_name(name).map_or(true, |local_name| self.ignore.is_ignored(&local_name))
    }

    // ------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------

    async fn apply_pending(
        &mut self,
        remote: &RemoteScan,
        max_sync_step: Option<usize>,
    ) -> Result<(), SyncError> {
        let filter = PairFilter::new().with_local_root(&self.binding.local_root);
        let pairs = self
            .store
            .list_pairs(&filter)
            .await
            .map_err(SyncError::from_store)?;

        let planned = classify::plan_applies(
            pairs
                .iter()
                .filter(|p| p.pair_state.is_pending())
                .filter_map(|p| {
                    let depth = match (&p.local_path, &p.remote_ref) {
                        (Some(path), _) => path.depth(),
                        (None, Some(remote_ref)) => {
                            remote.entries.get(remote_ref).map_or(0, |e| e.depth)
                        }
                        (None, None) => 0,
                    };
                    Some(PlannedApply {
                        pair_id: p.id?,
                        state: p.pair_state,
                        depth,
                    })
                })
                .collect(),
        );

        let mut attempts = 0usize;
        for step in planned {
            if self.shutdown.is_cancelled() {
                info!("Stop requested, remaining pairs left for the next cycle");
                self.report.stopped = true;
                break;
            }
            if max_sync_step.is_some_and(|max| attempts >= max) {
                debug!(max_sync_step, "Apply limit reached for this cycle");
                break;
            }

            let Some(pair) = self
                .store
                .get_pair(step.pair_id)
                .await
                .map_err(SyncError::from_store)?
            else {
                continue;
            };
            if pair.pair_state != step.state {
                continue;
            }

            match self.apply_pair(pair.clone()).await {
                Ok(Applied::Done) => {
                    attempts += 1;
                    self.report.applied += 1;
                }
                Ok(Applied::Deferred) => self.report.deferred += 1,
                Err(ApplyError::Store(e)) => return Err(SyncError::from_store(e)),
                Err(ApplyError::Client(err)) => {
                    attempts += 1;
                    self.record_failure(pair, err).await?;
                }
            }
        }
        Ok(())
    }

    async fn record_failure(&mut self, mut pair: SyncPair, err: ClientError) -> Result<(), SyncError> {
        if err.aborts_cycle() {
            error!(pair = %describe(&pair), error = %err, "Credentials rejected, aborting cycle");
            return Err(SyncError::Unauthorized(err.to_string()));
        }
        if self.settings.stop_on_error {
            return Err(SyncError::PairFailed {
                pair: describe(&pair),
                source: err,
            });
        }

        self.report.failed += 1;
        if err.is_permanent() {
            pair.mark_unsynchronized(err.to_string());
            warn!(pair = %describe(&pair), error = %err, "Operation refused, pair skipped");
        } else if pair.record_failure(err.to_string(), self.settings.max_error_count) {
            warn!(
                pair = %describe(&pair),
                error = %err,
                error_count = pair.error_count,
                "Giving up on pair after repeated failures"
            );
        } else {
            warn!(
                pair = %describe(&pair),
                error = %err,
                error_count = pair.error_count,
                "Apply failed, will retry"
            );
        }

        self.store
            .update_pair(&pair)
            .await
            .map_err(SyncError::from_store)?;
        Ok(())
    }

    #[instrument(skip(self, pair), fields(pair = %describe(&pair), state = %pair.pair_state))]
    async fn apply_pair(&self, pair: SyncPair) -> ApplyResult {
        match pair.pair_state {
            PairState::LocallyCreated => self.push_creation(pair).await,
            PairState::RemotelyCreated => self.pull_creation(pair).await,
            PairState::LocallyModified => self.push_content(pair).await,
            PairState::RemotelyModified => self.pull_content(pair).await,
            PairState::LocallyMoved => self.push_move(pair).await,
            PairState::RemotelyMoved => self.pull_move(pair).await,
            PairState::LocallyDeleted => self.push_deletion(pair).await,
            PairState::RemotelyDeleted => self.pull_deletion(pair).await,
            PairState::Synchronized | PairState::Conflicted | PairState::Unsynchronized => {
                Ok(Applied::Deferred)
            }
        }
    }

    async fn push_creation(&self, mut pair: SyncPair) -> ApplyResult {
        let path = require_local_path(&pair)?;
        let Some(parent_ref) = self.parent_remote_ref(&path).await? else {
            debug!("Parent not created remotely yet, deferred");
            return Ok(Applied::Deferred);
        };
        if !self.remote.can_create_child(&parent_ref).await? {
            return Err(ClientError::denied("create_child", parent_ref.as_str()).into());
        }

        let local_info = self.local.get_info(&path).await?;
        let (info, digest, content) = if pair.folderish {
            let info = self.remote.make_folder(&parent_ref, path.name()).await?;
            (info, None, None)
        } else {
            let content = self.local.get_content(&path).await?;
            let info = self
                .remote
                .make_file(&parent_ref, path.name(), &content)
                .await?;
            let remote_ref = remote_ref_of(&info)?;
            let (digest, _) = self.remote_digest(&remote_ref, &info, Some(&content)).await?;
            (info, digest, Some(content))
        };

        pair.remote_ref = Some(remote_ref_of(&info)?);
        pair.refresh_remote(&info, digest);
        refresh_local_transferred(&mut pair, &local_info, content.as_deref());
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(path = %path, id = %info.id, "Created remotely");
        Ok(Applied::Done)
    }

    async fn pull_creation(&self, mut pair: SyncPair) -> ApplyResult {
        let remote_ref = require_remote_ref(&pair)?;
        let Some(parent_ref) = pair.remote_parent_ref.clone() else {
            return Err(ClientError::Remote(format!("{remote_ref} has no parent")).into());
        };
        let Some(parent_path) = self.parent_local_path(&parent_ref).await? else {
            debug!("Parent not created locally yet, deferred");
            return Ok(Applied::Deferred);
        };

        let info = self.remote.get_info(&remote_ref).await?;
        let (path, digest, content) = if info.folderish {
            (self.local.make_folder(&parent_path, &info.name).await?, None, None)
        } else {
            let content = self.remote.get_content(&remote_ref).await?;
            let (digest, _) = self.remote_digest(&remote_ref, &info, Some(&content)).await?;
            let path = self
                .local
                .make_file(&parent_path, &info.name, Some(&content))
                .await?;
            (path, digest, Some(content))
        };

        let local_info = self.local.get_info(&path).await?;
        pair.local_path = Some(path.clone());
        refresh_local_transferred(&mut pair, &local_info, content.as_deref());
        pair.refresh_remote(&info, digest);
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(path = %path, id = %remote_ref, "Created locally");
        Ok(Applied::Done)
    }

    async fn push_content(&self, mut pair: SyncPair) -> ApplyResult {
        let path = require_local_path(&pair)?;
        let remote_ref = require_remote_ref(&pair)?;
        if !self.remote.can_update(&remote_ref).await? {
            return Err(ClientError::denied("update", remote_ref.as_str()).into());
        }

        let content = self.local.get_content(&path).await?;
        let local_info = self.local.get_info(&path).await?;
        let info = self.remote.update_content(&remote_ref, &content).await?;
        let (digest, _) = self.remote_digest(&remote_ref, &info, Some(&content)).await?;

        refresh_local_transferred(&mut pair, &local_info, Some(&content));
        pair.remote_digest = digest;
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(path = %path, bytes = content.len(), "Uploaded local changes");
        Ok(Applied::Done)
    }

    async fn pull_content(&self, mut pair: SyncPair) -> ApplyResult {
        let path = require_local_path(&pair)?;
        let remote_ref = require_remote_ref(&pair)?;

        let info = self.remote.get_info(&remote_ref).await?;
        let content = self.remote.get_content(&remote_ref).await?;
        self.local.update_content(&path, &content).await?;
        let local_info = self.local.get_info(&path).await?;
        let (digest, _) = self.remote_digest(&remote_ref, &info, Some(&content)).await?;

        refresh_local_transferred(&mut pair, &local_info, Some(&content));
        pair.remote_digest = digest;
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(path = %path, bytes = content.len(), "Downloaded remote changes");
        Ok(Applied::Done)
    }

    async fn push_move(&self, mut pair: SyncPair) -> ApplyResult {
        let path = require_local_path(&pair)?;
        let remote_ref = require_remote_ref(&pair)?;
        let Some(target_parent) = self.parent_remote_ref(&path).await? else {
            debug!("Destination not created remotely yet, deferred");
            return Ok(Applied::Deferred);
        };

        let mut info = self.remote.get_info(&remote_ref).await?;
        if info.parent_id.as_deref() != Some(target_parent.as_str()) {
            if !info.capabilities.can_delete
                || !self.remote.can_create_child(&target_parent).await?
            {
                return Err(ClientError::denied("move", remote_ref.as_str()).into());
            }
            info = self.remote.move_item(&remote_ref, &target_parent).await?;
        }
        if !names_match(path.name(), &info.name) {
            if !info.capabilities.can_rename {
                return Err(ClientError::denied("rename", remote_ref.as_str()).into());
            }
            info = self.remote.rename(&remote_ref, path.name()).await?;
        }

        let local_info = self.local.get_info(&path).await?;
        pair.local_name = Some(local_info.name.clone());
        pair.local_marker = local_info.marker.clone();
        let digest = pair.remote_digest.clone();
        pair.refresh_remote(&info, digest);
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(path = %path, id = %remote_ref, "Moved remotely");
        Ok(Applied::Done)
    }

    async fn pull_move(&self, mut pair: SyncPair) -> ApplyResult {
        let old_path = require_local_path(&pair)?;
        let remote_ref = require_remote_ref(&pair)?;
        let info = self.remote.get_info(&remote_ref).await?;
        let Some(parent_ref) = info
            .parent_id
            .as_ref()
            .and_then(|p| RemoteRef::new(p.clone()).ok())
        else {
            return Err(ClientError::Remote(format!("{remote_ref} has no parent")).into());
        };
        let Some(target_parent) = self.parent_local_path(&parent_ref).await? else {
            debug!("Destination not created locally yet, deferred");
            return Ok(Applied::Deferred);
        };

        let mut path = old_path.clone();
        if path.parent().as_ref() != Some(&target_parent) {
            path = self.local.move_item(&path, &target_parent).await?;
        }
        if !names_match(path.name(), &info.name) {
            path = self.local.rename(&path, &info.name).await?;
        }
        let local_info = self.local.get_info(&path).await?;

        if pair.folderish && path != old_path {
            let rebased = self
                .store
                .rebase_local_paths(&self.binding.local_root, &old_path, &path)
                .await?;
            debug!(rebased, "Descendant paths rebased");
        }

        pair.local_path = Some(path.clone());
        pair.local_name = Some(local_info.name.clone());
        pair.local_marker = local_info.marker.clone();
        let digest = pair.remote_digest.clone();
        pair.refresh_remote(&info, digest);
        pair.mark_synchronized();
        self.store.update_pair(&pair).await?;
        info!(from = %old_path, to = %path, "Moved locally");
        Ok(Applied::Done)
    }

    async fn push_deletion(&self, mut pair: SyncPair) -> ApplyResult {
        let remote_ref = require_remote_ref(&pair)?;
        if pair.folderish && self.has_survivors(&pair, Side::Remote).await? {
            forget_local(&mut pair);
            self.store.update_pair(&pair).await?;
            info!(id = %remote_ref, "Folder holds remote changes, recreating it locally");
            return Ok(Applied::Deferred);
        }

        match self.remote.can_delete(&remote_ref).await {
            Ok(true) => match self.remote.delete(&remote_ref).await {
                Ok(()) | Err(ClientError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            },
            Ok(false) => return Err(ClientError::denied("delete", remote_ref.as_str()).into()),
            Err(ClientError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.forget_pair(&pair).await?;
        info!(id = %remote_ref, "Deleted remotely");
        Ok(Applied::Done)
    }

    async fn pull_deletion(&self, mut pair: SyncPair) -> ApplyResult {
        let path = require_local_path(&pair)?;
        if pair.folderish && self.has_survivors(&pair, Side::Local).await? {
            forget_remote(&mut pair);
            self.store.update_pair(&pair).await?;
            info!(path = %path, "Folder holds local changes, recreating it remotely");
            return Ok(Applied::Deferred);
        }

        match self.local.delete(&path).await {
            Ok(()) | Err(ClientError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.forget_pair(&pair).await?;
        info!(path = %path, "Deleted locally");
        Ok(Applied::Done)
    }

    // ------------------------------------------------------------------
    // Apply helpers
    // ------------------------------------------------------------------

    async fn forget_pair(&self, pair: &SyncPair) -> Result<(), ApplyError> {
        if let Some(id) = pair.id {
            self.store.delete_pair(id).await?;
        }
        if pair.folderish {
            if let Some(path) = &pair.local_path {
                self.store
                    .delete_pairs_under(&self.binding.local_root, path)
                    .await?;
            }
        }
        Ok(())
    }

    /// Remote ref of the pair owning `path`'s parent, once it exists remotely
    async fn parent_remote_ref(&self, path: &LocalPath) -> Result<Option<RemoteRef>, ApplyError> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        let parent_pair = self
            .store
            .find_pair_by_local_path(&self.binding.local_root, &parent)
            .await?;
        Ok(parent_pair
            .filter(|p| !p.pair_state.is_deletion())
            .and_then(|p| p.remote_ref))
    }

    /// Local path of the pair owning `parent_ref`, once it exists locally
    async fn parent_local_path(&self, parent_ref: &RemoteRef) -> Result<Option<LocalPath>, ApplyError> {
        let parent_pair = self
            .store
            .find_pair_by_remote_ref(&self.binding.local_root, parent_ref)
            .await?;
        Ok(parent_pair
            .filter(|p| !p.pair_state.is_deletion())
            .and_then(|p| p.local_path))
    }

    /// True when deleting the folder would destroy pending changes made on
    /// `side` below it
    async fn has_survivors(&self, pair: &SyncPair, side: Side) -> Result<bool, ApplyError> {
        let filter = PairFilter::new().with_local_root(&self.binding.local_root);
        let pairs = self.store.list_pairs(&filter).await?;

        let survives = |p: &SyncPair| match side {
            Side::Local => matches!(
                p.pair_state,
                PairState::LocallyCreated
                    | PairState::LocallyModified
                    | PairState::LocallyMoved
                    | PairState::Conflicted
            ),
            Side::Remote => matches!(
                p.pair_state,
                PairState::RemotelyCreated
                    | PairState::RemotelyModified
                    | PairState::RemotelyMoved
                    | PairState::Conflicted
            ),
        };

        Ok(pairs.iter().filter(|p| p.id != pair.id).any(|p| {
            let below = match side {
                Side::Local => match (&p.local_path, &pair.local_path) {
                    (Some(child), Some(folder)) => child.is_within(folder),
                    _ => false,
                },
                Side::Remote => p.remote_parent_ref.is_some()
                    && p.remote_parent_ref == pair.remote_ref,
            };
            below && survives(p)
        }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Local and remote names designate the same entry
///
/// Local names are sanitized, so a remote `a/b` matches a local `a-b`.
pub fn names_match(local_name: &str, remote_name: &str) -> bool {
    local_name == remote_name || sanitize_name(remote_name).is_ok_and(|n| n == local_name)
}

fn describe(pair: &SyncPair) -> String {
    match (&pair.local_path, &pair.remote_ref) {
        (Some(path), _) => path.to_string(),
        (None, Some(remote_ref)) => remote_ref.to_string(),
        (None, None) => pair.display_name().to_string(),
    }
}

fn local_content_changed(pair: &SyncPair, info: &FileSystemInfo) -> bool {
    !pair.folderish && info.digest != pair.local_digest
}

/// Local snapshot after a transfer
///
/// The digest describes the bytes that went over the wire, not what the
/// file holds now, so an edit made during the transfer is still seen as a
/// local change by the next scan.
fn refresh_local_transferred(pair: &mut SyncPair, info: &FileSystemInfo, content: Option<&[u8]>) {
    pair.refresh_local(info);
    if let Some(content) = content {
        pair.local_digest = Some(digest_bytes(DigestAlgorithm::Md5, content));
    }
}

fn require_local_path(pair: &SyncPair) -> Result<LocalPath, ClientError> {
    pair.local_path
        .clone()
        .ok_or_else(|| ClientError::InvalidName(format!("{} has no local path", describe(pair))))
}

fn require_remote_ref(pair: &SyncPair) -> Result<RemoteRef, ClientError> {
    pair.remote_ref
        .clone()
        .ok_or_else(|| ClientError::Remote(format!("{} has no remote ref", describe(pair))))
}

fn remote_ref_of(info: &FileSystemInfo) -> Result<RemoteRef, ClientError> {
    RemoteRef::new(info.id.clone()).map_err(|e| ClientError::Remote(e.to_string()))
}

/// Moves a pair below a folder whose local move was detected earlier in
/// the same pass
fn rebase_within_moved_folder(
    pair: &mut SyncPair,
    rebases: &[(LocalPath, LocalPath)],
    claimed_paths: &mut HashSet<LocalPath>,
) {
    let Some(path) = pair.local_path.clone() else {
        return;
    };
    let rebased = rebases
        .iter()
        .rev()
        .find(|(old, _)| path != *old && path.is_within(old))
        .and_then(|(old, new)| path.rebase(old, new));
    if let Some(rebased) = rebased {
        claimed_paths.insert(rebased.clone());
        pair.local_path = Some(rebased);
    }
}

/// Finds where the pair's marker went, if that place is not tracked already
fn find_moved<'s>(
    pair: &SyncPair,
    local: &'s LocalScan,
    claimed_paths: &HashSet<LocalPath>,
) -> Option<(LocalPath, &'s FileSystemInfo)> {
    let marker = pair.local_marker.as_ref()?;
    let path = local.by_marker.get(marker)?;
    if claimed_paths.contains(path) {
        return None;
    }
    let info = local.entries.get(path)?;
    (info.folderish == pair.folderish).then(|| (path.clone(), info))
}

/// Both sides moved: true when they landed in corresponding places
fn same_location(pair: &SyncPair, entry: Option<&RemoteEntry>, kept: &[SyncPair]) -> bool {
    let (Some(path), Some(entry)) = (pair.local_path.as_ref(), entry) else {
        return false;
    };
    let Some(parent) = path.parent() else {
        return false;
    };
    let parent_ref = kept
        .iter()
        .find(|p| p.local_path.as_ref() == Some(&parent))
        .and_then(|p| p.remote_ref.clone());

    parent_ref.is_some()
        && parent_ref == entry.parent_ref()
        && names_match(path.name(), &entry.info.name)
}

/// Copies the scan results a decision calls for into the pair
fn record_decision(
    pair: &mut SyncPair,
    decision: Decision,
    local_info: Option<&FileSystemInfo>,
    remote_entry: Option<&RemoteEntry>,
) {
    if let Some(info) = local_info {
        pair.local_missing_cycles = 0;
        if pair.remote_ref.is_none() {
            pair.refresh_local(info);
        } else if info.marker.is_some() {
            // Editors replace files on save; the path still identifies them
            pair.local_marker = info.marker.clone();
        }
    }
    if let Some(entry) = remote_entry {
        pair.remote_missing_cycles = 0;
        if pair.local_path.is_none() {
            pair.refresh_remote(&entry.info, entry.digest.clone());
        }
    }

    match decision {
        Decision::Keep(state) => {
            if state == pair.pair_state {
                return;
            }
            match pair.transition_to(state) {
                Ok(()) if state == PairState::Synchronized => {
                    pair.error_count = 0;
                    pair.last_error = None;
                }
                Ok(()) => {}
                Err(e) => warn!(pair = %describe(pair), error = %e, "Transition refused"),
            }
        }
        Decision::Converged => {
            if let (Some(info), Some(entry)) = (local_info, remote_entry) {
                pair.refresh_local(info);
                pair.refresh_remote(&entry.info, entry.digest.clone());
                pair.mark_synchronized();
                info!(pair = %describe(pair), "Both sides agree, pair synchronized");
            }
        }
        Decision::Relocated => {
            if let (Some(info), Some(entry)) = (local_info, remote_entry) {
                pair.local_name = Some(info.name.clone());
                pair.remote_name = Some(entry.info.name.clone());
                pair.remote_parent_ref = entry.parent_ref();
                pair.mark_synchronized();
            }
        }
        Decision::AwaitDebounce(Side::Local) => {
            pair.local_missing_cycles += 1;
            debug!(pair = %describe(pair), cycles = pair.local_missing_cycles, "Local side missing");
        }
        Decision::AwaitDebounce(Side::Remote) => {
            pair.remote_missing_cycles += 1;
            debug!(pair = %describe(pair), cycles = pair.remote_missing_cycles, "Remote side missing");
        }
        Decision::RecreateFrom(Side::Local) => {
            forget_remote(pair);
            if let Some(info) = local_info {
                pair.refresh_local(info);
            }
            info!(pair = %describe(pair), "Deleted remotely but changed locally, recreating remotely");
        }
        Decision::RecreateFrom(Side::Remote) => {
            forget_local(pair);
            if let Some(entry) = remote_entry {
                pair.refresh_remote(&entry.info, entry.digest.clone());
            }
            info!(pair = %describe(pair), "Deleted locally but changed remotely, recreating locally");
        }
        Decision::DropRow => {}
    }
}

/// Drops the remote side so the pair is created again from the local one
fn forget_remote(pair: &mut SyncPair) {
    pair.remote_ref = None;
    pair.remote_digest = None;
    pair.remote_name = None;
    pair.remote_parent_ref = None;
    pair.remote_missing_cycles = 0;
    pair.pair_state = PairState::LocallyCreated;
    pair.error_count = 0;
    pair.last_error = None;
}

/// Drops the local side so the pair is created again from the remote one
fn forget_local(pair: &mut SyncPair) {
    pair.local_path = None;
    pair.local_digest = None;
    pair.local_name = None;
    pair.local_marker = None;
    pair.local_missing_cycles = 0;
    pair.pair_state = PairState::RemotelyCreated;
    pair.error_count = 0;
    pair.last_error = None;
}
