//! Controller: binding management and status queries
//!
//! The controller owns the store, the remote connector and the
//! [`Synchronizer`]. Binaries talk to it only.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docsync_core::config::Config;
use docsync_core::domain::{
    ClientError, LocalPath, PairState, RemoteRef, RootBinding, ServerBinding, SyncPair,
};
use docsync_core::ports::{IRemoteConnector, IStateStore, PairFilter};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::engine::{SyncSettings, Synchronizer};
use crate::local_client::sanitize_name;

/// Errors raised by binding operations and status queries
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0} is not bound")]
    NotBound(PathBuf),

    #[error("{0} is already bound")]
    AlreadyBound(PathBuf),

    #[error("Remote item {0} is not a folder")]
    NotFolderish(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("State store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Entry point for binding servers and roots and reading pair states
pub struct Controller {
    config: Config,
    store: Arc<dyn IStateStore>,
    connector: Arc<dyn IRemoteConnector>,
    synchronizer: Arc<Synchronizer>,
}

impl Controller {
    pub fn new(
        config: Config,
        store: Arc<dyn IStateStore>,
        connector: Arc<dyn IRemoteConnector>,
    ) -> Self {
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&store),
            Arc::clone(&connector),
            SyncSettings::from(&config.sync),
            config.ignore.clone(),
        ));
        Self {
            config,
            store,
            connector,
            synchronizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn synchronizer(&self) -> Arc<Synchronizer> {
        Arc::clone(&self.synchronizer)
    }

    /// Requests a graceful halt of running cycles
    pub fn stop(&self) {
        self.synchronizer.stop();
    }

    /// Closes the state store
    pub async fn dispose(&self) {
        self.synchronizer.stop();
        self.store.close().await;
    }

    // ========================================================================
    // Server bindings
    // ========================================================================

    /// Authenticates, records the server binding, then binds each root
    ///
    /// Nothing is written when the credentials are rejected. When a root
    /// cannot be bound the server binding is removed again, so the call can
    /// be retried.
    #[instrument(skip(self, password, roots), fields(folder = %local_folder.display()))]
    pub async fn bind_server(
        &self,
        local_folder: &Path,
        server_url: &str,
        username: &str,
        password: &str,
        roots: &[RemoteRef],
        repository: Option<&str>,
    ) -> Result<ServerBinding, ControllerError> {
        let local_folder = absolute(local_folder)?;
        if self.store.get_server_binding(&local_folder).await?.is_some() {
            return Err(ControllerError::AlreadyBound(local_folder));
        }

        let token = self
            .connector
            .authenticate(server_url, username, password)
            .await?;
        debug!("Authenticated");

        tokio::fs::create_dir_all(&local_folder)
            .await
            .map_err(|e| ControllerError::Io(format!("{}: {e}", local_folder.display())))?;

        let binding = ServerBinding::new(local_folder.clone(), server_url, username, token);
        self.store.save_server_binding(&binding).await?;
        info!(server = %server_url, user = %username, "Server bound");

        for remote_root in roots {
            if let Err(e) = self.bind_root(&local_folder, remote_root, repository).await {
                warn!(
                    remote_root = %remote_root,
                    error = %e,
                    "Root binding failed, unbinding server"
                );
                if let Err(rollback) = self.store.delete_server_binding(&local_folder).await {
                    warn!(error = %rollback, "Could not remove the server binding");
                }
                return Err(e);
            }
        }
        Ok(binding)
    }

    /// Removes the server binding with its roots and pairs; files stay
    #[instrument(skip(self), fields(folder = %local_folder.display()))]
    pub async fn unbind_server(&self, local_folder: &Path) -> Result<(), ControllerError> {
        let local_folder = absolute(local_folder)?;
        if !self.store.delete_server_binding(&local_folder).await? {
            return Err(ControllerError::NotBound(local_folder));
        }
        info!("Server unbound");
        Ok(())
    }

    // ========================================================================
    // Root bindings
    // ========================================================================

    /// Binds a remote folder below an already bound local folder
    ///
    /// The local root is named after the remote folder, with a `__N` suffix
    /// when another root or directory already uses that name.
    #[instrument(skip(self), fields(folder = %local_folder.display(), remote_root = %remote_root))]
    pub async fn bind_root(
        &self,
        local_folder: &Path,
        remote_root: &RemoteRef,
        repository: Option<&str>,
    ) -> Result<RootBinding, ControllerError> {
        let local_folder = absolute(local_folder)?;
        let server = self
            .store
            .get_server_binding(&local_folder)
            .await?
            .ok_or_else(|| ControllerError::NotBound(local_folder.clone()))?;
        let repository = repository.unwrap_or(&self.config.remote.default_repository);

        let existing = self.store.list_root_bindings(Some(&local_folder)).await?;
        if let Some(bound) = existing.iter().find(|r| r.remote_root == *remote_root) {
            return Err(ControllerError::AlreadyBound(bound.local_root.clone()));
        }

        let remote = self.connector.connect(&server, repository)?;
        let info = remote.get_info(remote_root).await?;
        if !info.folderish {
            return Err(ControllerError::NotFolderish(remote_root.to_string()));
        }

        let taken: HashSet<PathBuf> = existing.into_iter().map(|r| r.local_root).collect();
        let local_root = available_root(&local_folder, &sanitize_name(&info.name)?, &taken).await?;
        tokio::fs::create_dir_all(&local_root)
            .await
            .map_err(|e| ControllerError::Io(format!("{}: {e}", local_root.display())))?;

        let binding = RootBinding::new(
            local_root.clone(),
            local_folder,
            remote_root.clone(),
            repository.to_string(),
        );
        self.store.save_root_binding(&binding).await?;
        self.store
            .insert_pair(&SyncPair::root(
                local_root.clone(),
                remote_root.clone(),
                repository.to_string(),
            ))
            .await?;

        info!(local_root = %local_root.display(), "Root bound");
        Ok(binding)
    }

    /// Removes one root binding and its pairs; other roots are untouched
    #[instrument(skip(self), fields(root = %local_root.display()))]
    pub async fn unbind_root(&self, local_root: &Path) -> Result<(), ControllerError> {
        let local_root = absolute(local_root)?;
        if !self.store.delete_root_binding(&local_root).await? {
            return Err(ControllerError::NotBound(local_root));
        }
        info!("Root unbound");
        Ok(())
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// States of the tracked direct children of `folder`
    ///
    /// `folder` is either a bound server folder, whose children are its
    /// roots, or a folder at or below a bound root.
    #[instrument(skip(self), fields(folder = %folder.display()))]
    pub async fn children_states(
        &self,
        folder: &Path,
    ) -> Result<Vec<(String, PairState)>, ControllerError> {
        let folder = absolute(folder)?;

        let roots = self.store.list_root_bindings(None).await?;
        let owner = roots
            .iter()
            .filter(|r| folder.starts_with(&r.local_root))
            .max_by_key(|r| r.local_root.components().count());

        let Some(root) = owner else {
            if self.store.get_server_binding(&folder).await?.is_none() {
                return Err(ControllerError::NotBound(folder));
            }
            let mut states: Vec<(String, PairState)> = roots
                .iter()
                .filter(|r| r.local_folder == folder)
                .filter_map(|r| r.local_root.file_name())
                .map(|name| (name.to_string_lossy().into_owned(), PairState::Synchronized))
                .collect();
            sort_like_local_children(&mut states);
            return Ok(states);
        };

        let relative = relative_local_path(&root.local_root, &folder)?;
        let mut states: Vec<(String, PairState)> = self
            .store
            .list_pairs(
                &PairFilter::new()
                    .with_local_root(&root.local_root)
                    .with_local_parent(relative.clone()),
            )
            .await?
            .iter()
            .map(|p| (p.display_name().to_string(), p.pair_state))
            .collect();

        // Remote-only children have no local path yet
        let folder_pair = self
            .store
            .find_pair_by_local_path(&root.local_root, &relative)
            .await?;
        if let Some(folder_ref) = folder_pair.and_then(|p| p.remote_ref) {
            let remote_only = self
                .store
                .list_pairs(&PairFilter::new().with_local_root(&root.local_root))
                .await?
                .into_iter()
                .filter(|p| p.local_path.is_none())
                .filter(|p| p.remote_parent_ref.as_ref() == Some(&folder_ref));
            for pair in remote_only {
                let name = sanitize_name(pair.display_name())
                    .unwrap_or_else(|_| pair.display_name().to_string());
                states.push((name, pair.pair_state));
            }
        } else {
            warn!("Folder is not tracked");
        }

        sort_like_local_children(&mut states);
        Ok(states)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn absolute(path: &Path) -> Result<PathBuf, ControllerError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| ControllerError::Io(e.to_string()))
}

async fn available_root(
    local_folder: &Path,
    name: &str,
    taken: &HashSet<PathBuf>,
) -> Result<PathBuf, ControllerError> {
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            local_folder.join(name)
        } else {
            local_folder.join(format!("{name}__{n}"))
        };
        if !taken.contains(&candidate) {
            let exists = tokio::fs::try_exists(&candidate)
                .await
                .map_err(|e| ControllerError::Io(format!("{}: {e}", candidate.display())))?;
            if !exists {
                return Ok(candidate);
            }
        }
        n += 1;
    }
}

fn relative_local_path(local_root: &Path, folder: &Path) -> Result<LocalPath, ControllerError> {
    let relative = folder
        .strip_prefix(local_root)
        .map_err(|_| ControllerError::NotBound(folder.to_path_buf()))?;
    let mut path = LocalPath::root();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        path = path
            .join(&name)
            .map_err(|e| ControllerError::Io(e.to_string()))?;
    }
    Ok(path)
}

fn sort_like_local_children(states: &mut [(String, PairState)]) {
    states.sort_by(|(a, _), (b, _)| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
}
