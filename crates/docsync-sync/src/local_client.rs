//! Local filesystem client (secondary/driven adapter)
//!
//! Implements [`ILocalClient`] on top of `tokio::fs`, scoped to one bound
//! root directory.
//!
//! ## Design Decisions
//!
//! - **Root scoping**: every operation takes a [`LocalPath`], which cannot
//!   hold `..` or empty components, so resolved paths never leave the root.
//!   Symbolic links below the root are not followed: listings skip them and
//!   `get_info` refuses them.
//! - **Atomic writes**: content goes to a hidden `.part` sibling first and
//!   is renamed over the target.
//! - **Name hygiene**: characters rejected by common filesystems are
//!   replaced by `-`, and a taken name gets a `__N` suffix before its
//!   extension.
//! - **Markers**: the inode number identifies an entry across renames and
//!   moves made while the engine was not looking.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docsync_core::{
    config::IgnoreConfig,
    domain::{Capabilities, ClientError, DigestAlgorithm, FileSystemInfo, LocalPath},
    ports::ILocalClient,
};
use tracing::{debug, instrument, warn};

use crate::digest::{ContentHasher, CHUNK_SIZE};

/// Characters replaced by `-` in names created locally
const FORBIDDEN_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Upper bound on `__N` attempts when looking for a free name
const MAX_DEDUP_ATTEMPTS: u32 = 1000;

// ============================================================================
// LocalFileSystemClient struct
// ============================================================================

/// [`ILocalClient`] implementation over a real directory
#[derive(Debug, Clone)]
pub struct LocalFileSystemClient {
    base_folder: PathBuf,
    ignore: IgnoreConfig,
}

impl LocalFileSystemClient {
    /// Creates a client for the directory `base_folder`
    #[must_use]
    pub fn new(base_folder: impl Into<PathBuf>, ignore: IgnoreConfig) -> Self {
        Self {
            base_folder: base_folder.into(),
            ignore,
        }
    }

    /// Resolves a root-relative path to a host path
    #[must_use]
    pub fn abspath(&self, path: &LocalPath) -> PathBuf {
        let mut abs = self.base_folder.clone();
        for component in path.components() {
            abs.push(component);
        }
        abs
    }

    fn info_from_metadata(
        &self,
        path: &LocalPath,
        metadata: &Metadata,
        digest: Option<String>,
    ) -> FileSystemInfo {
        let name = if path.is_root() {
            self.base_folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            path.name().to_string()
        };
        let parent_id = path.parent().map(String::from);

        let mut info = if metadata.is_dir() {
            FileSystemInfo::folder(path.as_str(), parent_id, name)
        } else {
            FileSystemInfo::file(
                path.as_str(),
                parent_id,
                name,
                digest,
                Some(DigestAlgorithm::Md5),
            )
        };
        info.path = Some(path.to_string());
        info.capabilities = Capabilities::all();
        info.marker = marker_of(metadata);
        if let Ok(modified) = metadata.modified() {
            info.last_modified = DateTime::<Utc>::from(modified);
        }
        info
    }

    /// Metadata of the entry itself, never of a link target
    ///
    /// The root folder is resolved normally since it may be bound through a
    /// link.
    async fn entry_metadata(&self, path: &LocalPath, abs: &Path) -> Result<Metadata, ClientError> {
        let metadata = if path.is_root() {
            tokio::fs::metadata(abs).await
        } else {
            tokio::fs::symlink_metadata(abs).await
        }
        .map_err(|e| io_error(path, e))?;
        if metadata.file_type().is_symlink() {
            return Err(ClientError::InvalidName(format!("{path} is a symbolic link")));
        }
        Ok(metadata)
    }

    async fn folder_metadata(&self, path: &LocalPath) -> Result<PathBuf, ClientError> {
        let abs = self.abspath(path);
        let metadata = self.entry_metadata(path, &abs).await?;
        if !metadata.is_dir() {
            return Err(ClientError::InvalidName(format!("{path} is not a folder")));
        }
        Ok(abs)
    }

    /// Picks `name` or the first free `__N` variant of it inside `parent_abs`
    async fn find_available_name(
        &self,
        parent_abs: &Path,
        name: &str,
        folderish: bool,
    ) -> Result<String, ClientError> {
        if !entry_exists(&parent_abs.join(name)).await {
            return Ok(name.to_string());
        }

        let (stem, extension) = split_extension(name, folderish);
        let (base, start) = strip_dedup_suffix(stem);
        for n in start..start + MAX_DEDUP_ATTEMPTS {
            let candidate = format!("{base}__{n}{extension}");
            if !entry_exists(&parent_abs.join(&candidate)).await {
                debug!(requested = name, chosen = %candidate, "name already taken");
                return Ok(candidate);
            }
        }

        Err(ClientError::InvalidName(format!(
            "no free name found for {name} in {}",
            parent_abs.display()
        )))
    }

    async fn write_atomic(
        &self,
        path: &LocalPath,
        target: &Path,
        content: &[u8],
    ) -> Result<(), ClientError> {
        let tmp_path = part_path(target);

        debug!(?tmp_path, "writing to temporary file");
        if let Err(e) = tokio::fs::write(&tmp_path, content).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_error(path, e));
        }

        debug!("renaming temporary file to target");
        if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_error(path, e));
        }
        Ok(())
    }
}

// ============================================================================
// ILocalClient implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalClient for LocalFileSystemClient {
    fn base_folder(&self) -> &Path {
        &self.base_folder
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get_info(&self, path: &LocalPath) -> Result<FileSystemInfo, ClientError> {
        let abs = self.abspath(path);
        let metadata = self.entry_metadata(path, &abs).await?;

        let digest = if metadata.is_file() {
            Some(
                hash_file(abs, DigestAlgorithm::Md5)
                    .await
                    .map_err(|e| io_error(path, e))?,
            )
        } else if metadata.is_dir() {
            None
        } else {
            return Err(ClientError::InvalidName(format!(
                "{path} is neither a file nor a folder"
            )));
        };

        Ok(self.info_from_metadata(path, &metadata, digest))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get_content(&self, path: &LocalPath) -> Result<Vec<u8>, ClientError> {
        debug!("reading file");
        let data = tokio::fs::read(self.abspath(path))
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, content), fields(path = %path, bytes = content.len()))]
    async fn update_content(&self, path: &LocalPath, content: &[u8]) -> Result<(), ClientError> {
        let target = self.abspath(path);
        let metadata = tokio::fs::metadata(&target)
            .await
            .map_err(|e| io_error(path, e))?;
        if metadata.is_dir() {
            return Err(ClientError::InvalidName(format!("{path} is a folder")));
        }

        self.write_atomic(path, &target, content).await?;
        debug!("update complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &LocalPath) -> Result<(), ClientError> {
        if path.is_root() {
            return Err(ClientError::InvalidName(
                "the root folder cannot be deleted".to_string(),
            ));
        }

        let target = self.abspath(path);
        let metadata = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| io_error(path, e))?;

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(&target).await
        } else {
            debug!("removing file");
            tokio::fs::remove_file(&target).await
        }
        .map_err(|e| io_error(path, e))?;

        debug!("delete complete");
        Ok(())
    }

    async fn exists(&self, path: &LocalPath) -> bool {
        entry_exists(&self.abspath(path)).await
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get_children_info(&self, path: &LocalPath) -> Result<Vec<FileSystemInfo>, ClientError> {
        let abs = self.folder_metadata(path).await?;
        let mut entries = tokio::fs::read_dir(&abs)
            .await
            .map_err(|e| io_error(path, e))?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(path, e))? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(name = ?file_name, "skipping entry with a non UTF-8 name");
                continue;
            };
            if self.ignore.is_ignored(name) {
                debug!(name, "ignored");
                continue;
            }
            if entry.file_type().await.is_ok_and(|t| t.is_symlink()) {
                debug!(name, "skipping symbolic link");
                continue;
            }
            let child = match path.join(name) {
                Ok(child) => child,
                Err(e) => {
                    warn!(name, error = %e, "skipping entry with an invalid name");
                    continue;
                }
            };

            match self.get_info(&child).await {
                Ok(info) => children.push(info),
                // Vanished since read_dir, or a socket/fifo/link
                Err(ClientError::NotFound(_)) | Err(ClientError::InvalidName(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        children.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        debug!(count = children.len(), "children listed");
        Ok(children)
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn make_folder(&self, parent: &LocalPath, name: &str) -> Result<LocalPath, ClientError> {
        let parent_abs = self.folder_metadata(parent).await?;
        let name = self
            .find_available_name(&parent_abs, &sanitize_name(name)?, true)
            .await?;
        let path = join(parent, &name)?;

        tokio::fs::create_dir(parent_abs.join(&name))
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!(path = %path, "folder created");
        Ok(path)
    }

    #[instrument(skip(self, content), fields(parent = %parent))]
    async fn make_file(
        &self,
        parent: &LocalPath,
        name: &str,
        content: Option<&[u8]>,
    ) -> Result<LocalPath, ClientError> {
        let parent_abs = self.folder_metadata(parent).await?;
        let name = self
            .find_available_name(&parent_abs, &sanitize_name(name)?, false)
            .await?;
        let path = join(parent, &name)?;

        self.write_atomic(&path, &parent_abs.join(&name), content.unwrap_or_default())
            .await?;
        debug!(path = %path, "file created");
        Ok(path)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn rename(&self, path: &LocalPath, new_name: &str) -> Result<LocalPath, ClientError> {
        let parent = path.parent().ok_or_else(|| {
            ClientError::InvalidName("the root folder cannot be renamed".to_string())
        })?;
        let new_name = sanitize_name(new_name)?;
        if new_name == path.name() {
            return Ok(path.clone());
        }

        let source = self.abspath(path);
        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| io_error(path, e))?;
        let parent_abs = self.abspath(&parent);

        // A case-only rename targets the entry itself on case-insensitive hosts
        let new_name = if new_name.to_lowercase() == path.name().to_lowercase() {
            new_name
        } else {
            self.find_available_name(&parent_abs, &new_name, metadata.is_dir())
                .await?
        };
        let target = join(&parent, &new_name)?;

        tokio::fs::rename(&source, parent_abs.join(&new_name))
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(target = %target, "renamed");
        Ok(target)
    }

    #[instrument(skip(self), fields(path = %path, new_parent = %new_parent))]
    async fn move_item(
        &self,
        path: &LocalPath,
        new_parent: &LocalPath,
    ) -> Result<LocalPath, ClientError> {
        if path.is_root() {
            return Err(ClientError::InvalidName(
                "the root folder cannot be moved".to_string(),
            ));
        }
        if new_parent.is_within(path) {
            return Err(ClientError::InvalidName(format!(
                "cannot move {path} inside itself"
            )));
        }
        if path.parent().as_ref() == Some(new_parent) {
            return Ok(path.clone());
        }

        let source = self.abspath(path);
        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| io_error(path, e))?;
        let parent_abs = self.folder_metadata(new_parent).await?;
        let name = self
            .find_available_name(&parent_abs, path.name(), metadata.is_dir())
            .await?;
        let target = join(new_parent, &name)?;

        tokio::fs::rename(&source, parent_abs.join(&name))
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(target = %target, "moved");
        Ok(target)
    }

    #[instrument(skip(self), fields(path = %path, algorithm = %algorithm))]
    async fn get_digest(
        &self,
        path: &LocalPath,
        algorithm: DigestAlgorithm,
    ) -> Result<String, ClientError> {
        let abs = self.abspath(path);
        let metadata = tokio::fs::metadata(&abs)
            .await
            .map_err(|e| io_error(path, e))?;
        if !metadata.is_file() {
            return Err(ClientError::InvalidName(format!("{path} is not a file")));
        }

        let digest = hash_file(abs, algorithm)
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(digest = %digest, "digest computed");
        Ok(digest)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Replaces characters that are invalid on common filesystems
///
/// # Errors
/// [`ClientError::InvalidName`] when nothing usable is left.
pub fn sanitize_name(name: &str) -> Result<String, ClientError> {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();
    let sanitized = sanitized.trim().to_string();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(ClientError::InvalidName(format!("unusable name {name:?}")));
    }
    Ok(sanitized)
}

/// Splits `name` into stem and extension (the extension keeps its dot)
fn split_extension(name: &str, folderish: bool) -> (&str, &str) {
    if folderish {
        return (name, "");
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Recognizes an existing `__N` suffix so `Title__1` continues with `__2`
fn strip_dedup_suffix(stem: &str) -> (&str, u32) {
    if let Some((base, digits)) = stem.rsplit_once("__") {
        let numeric = !digits.is_empty()
            && digits.len() <= 3
            && digits.chars().all(|c| c.is_ascii_digit());
        if numeric && !base.is_empty() {
            if let Ok(n) = digits.parse::<u32>() {
                return (base, n + 1);
            }
        }
    }
    (stem, 1)
}

fn part_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.part"))
}

fn join(parent: &LocalPath, name: &str) -> Result<LocalPath, ClientError> {
    parent
        .join(name)
        .map_err(|e| ClientError::InvalidName(e.to_string()))
}

async fn entry_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

async fn hash_file(path: PathBuf, algorithm: DigestAlgorithm) -> std::io::Result<String> {
    tokio::task::spawn_blocking(move || {
        use std::io::Read;

        let mut file = std::fs::File::open(&path)?;
        let mut hasher = ContentHasher::new(algorithm);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize())
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(unix)]
fn marker_of(metadata: &Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino().to_string())
}

#[cfg(not(unix))]
fn marker_of(_metadata: &Metadata) -> Option<String> {
    None
}

/// Maps an I/O failure to a client error naming the path
fn io_error(path: &LocalPath, err: std::io::Error) -> ClientError {
    let message = format!("{path}: {err}");
    match err.kind() {
        ErrorKind::NotFound => ClientError::NotFound(message),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            ClientError::TransientIo(message)
        }
        _ => ClientError::Io(message),
    }
}

// ============================================================================
// Unit tests
// ============================================================================
