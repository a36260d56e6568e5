//! Playlist CRUD over one `.pls` file per playlist.
//!
//! Every operation sanitizes the supplied name to its final path component
//! without a `.pls` suffix before any path is built, and the resulting file
//! name is still resolved through the playlist root's sandbox.
//!
//! Read-modify-write sequences (`add`, `remove`) are not atomic. Two writers
//! on the same playlist can lose an update unless the store is built with
//! per-name write locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{LibraryError, LibraryResult};
use crate::pls::{self, Track, EXTENSION};
use crate::sandbox::{ConfinedPath, PathSandbox};

/// Reduce a client supplied name to a bare playlist name.
///
/// `"../music/rock.PLS"` becomes `"rock"`.
pub fn sanitize_name(name: &str) -> LibraryResult<String> {
    let base = name
        .trim_end_matches(|c: char| c == '/' || c == '\\')
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let stem = strip_extension(base).unwrap_or(base);

    if stem.is_empty() || stem == "." || stem == ".." || stem.contains('\0') {
        return Err(LibraryError::InvalidArgument(format!(
            "invalid playlist name: {:?}",
            name
        )));
    }

    Ok(stem.to_string())
}

/// `Some(stem)` when `file_name` ends in `.pls`, in any case.
fn strip_extension(file_name: &str) -> Option<&str> {
    let suffix_len = EXTENSION.len() + 1;
    if file_name.len() < suffix_len || !file_name.is_char_boundary(file_name.len() - suffix_len) {
        return None;
    }

    let (stem, suffix) = file_name.split_at(file_name.len() - suffix_len);
    let matches = suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(EXTENSION);
    matches.then_some(stem)
}

/// Reject tracks the `.pls` format cannot store as given: an empty `file`
/// is dropped on read and a line break would inject extra entries.
pub fn validate_tracks(tracks: &[Track]) -> LibraryResult<()> {
    for (i, track) in tracks.iter().enumerate() {
        if track.file.is_empty() {
            return Err(LibraryError::InvalidArgument(format!(
                "track {} has an empty file",
                i
            )));
        }

        let fields = [Some(&track.file), track.title.as_ref(), track.length.as_ref()];
        if fields
            .into_iter()
            .flatten()
            .any(|value| value.contains(['\r', '\n']))
        {
            return Err(LibraryError::InvalidArgument(format!(
                "track {} contains a line break",
                i
            )));
        }
    }
    Ok(())
}

/// Parse a client supplied track index.
pub fn parse_track_index(raw: &str) -> LibraryResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| LibraryError::InvalidArgument(format!("invalid track index: {:?}", raw)))
}

#[derive(Default)]
struct NameLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NameLocks {
    /// Wait for exclusive use of `name`. The map entry is dropped again once
    /// no guard or waiter refers to it.
    async fn acquire(self: &Arc<Self>, name: &str) -> NameGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        NameGuard {
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(self),
            name: name.to_string(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct NameGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<NameLocks>,
    name: String,
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.name);
        }
    }
}

/// Playlists stored under their own sandboxed root.
#[derive(Clone)]
pub struct PlaylistStore {
    sandbox: PathSandbox,
    locks: Option<Arc<NameLocks>>,
}

impl PlaylistStore {
    pub fn new(sandbox: PathSandbox) -> Self {
        Self {
            sandbox,
            locks: None,
        }
    }

    /// Serialize writers on the same playlist name.
    pub fn with_write_locks(mut self) -> Self {
        self.locks = Some(Arc::new(NameLocks::default()));
        self
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Names of all playlists, sorted. A missing root yields no playlists.
    pub async fn list(&self) -> LibraryResult<Vec<String>> {
        let root = self.sandbox.root().as_path();
        let mut read_dir = match fs::read_dir(root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("playlist folder {} does not exist", root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = strip_extension(&file_name).filter(|stem| !stem.is_empty()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    pub async fn get(&self, name: &str) -> LibraryResult<Vec<Track>> {
        let name = sanitize_name(name)?;
        let path = self.playlist_path(&name)?;
        self.read(&name, &path).await
    }

    /// Create an empty playlist, creating the playlist root if needed.
    pub async fn create(&self, name: &str) -> LibraryResult<()> {
        let name = sanitize_name(name)?;
        let path = self.playlist_path(&name)?;
        self.ensure_root().await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.absolute())
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => LibraryError::AlreadyExists {
                    name: name.clone(),
                },
                _ => LibraryError::Io(e),
            })?;
        file.write_all(pls::serialize(&[]).as_bytes()).await?;
        file.flush().await?;

        info!("created playlist {:?}", name);
        Ok(())
    }

    /// Append tracks, creating the playlist when it does not exist yet.
    pub async fn add(&self, name: &str, new_tracks: Vec<Track>) -> LibraryResult<Vec<Track>> {
        let name = sanitize_name(name)?;
        validate_tracks(&new_tracks)?;
        let path = self.playlist_path(&name)?;
        let _guard = self.write_guard(&name).await;

        let mut tracks = match self.read(&name, &path).await {
            Ok(tracks) => tracks,
            Err(LibraryError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        let added = new_tracks.len();
        tracks.extend(new_tracks);
        self.write(&path, &tracks).await?;

        info!("added {} track(s) to playlist {:?}", added, name);
        Ok(tracks)
    }

    /// Remove the track at `index`. The file is left untouched on failure.
    pub async fn remove(&self, name: &str, index: i64) -> LibraryResult<Vec<Track>> {
        let name = sanitize_name(name)?;
        let path = self.playlist_path(&name)?;
        let _guard = self.write_guard(&name).await;

        let mut tracks = self.read(&name, &path).await?;
        let len = tracks.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(LibraryError::OutOfRange { index, len })?;

        tracks.remove(position);
        self.write(&path, &tracks).await?;

        info!("removed track {} from playlist {:?}", index, name);
        Ok(tracks)
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> LibraryResult<()> {
        let old_name = sanitize_name(old_name)?;
        let new_name = sanitize_name(new_name)?;
        let from = self.playlist_path(&old_name)?;
        let to = self.playlist_path(&new_name)?;

        if !exists(&from).await? {
            return Err(LibraryError::not_found(format!("playlist '{}'", old_name)));
        }
        if exists(&to).await? {
            return Err(LibraryError::AlreadyExists { name: new_name });
        }

        fs::rename(from.absolute(), to.absolute())
            .await
            .map_err(|e| LibraryError::from_io(e, format!("playlist '{}'", old_name)))?;

        info!("renamed playlist {:?} to {:?}", old_name, new_name);
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> LibraryResult<()> {
        let name = sanitize_name(name)?;
        let path = self.playlist_path(&name)?;

        fs::remove_file(path.absolute())
            .await
            .map_err(|e| LibraryError::from_io(e, format!("playlist '{}'", name)))?;

        info!("deleted playlist {:?}", name);
        Ok(())
    }

    fn playlist_path(&self, sanitized: &str) -> LibraryResult<ConfinedPath> {
        self.sandbox.resolve(&format!("{}.{}", sanitized, EXTENSION))
    }

    async fn write_guard(&self, name: &str) -> Option<NameGuard> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(name).await),
            None => None,
        }
    }

    async fn read(&self, name: &str, path: &ConfinedPath) -> LibraryResult<Vec<Track>> {
        let text = fs::read_to_string(path.absolute())
            .await
            .map_err(|e| LibraryError::from_io(e, format!("playlist '{}'", name)))?;
        Ok(pls::parse(&text))
    }

    async fn write(&self, path: &ConfinedPath, tracks: &[Track]) -> LibraryResult<()> {
        self.ensure_root().await?;
        fs::write(path.absolute(), pls::serialize(tracks)).await?;
        Ok(())
    }

    async fn ensure_root(&self) -> LibraryResult<()> {
        fs::create_dir_all(self.sandbox.root().as_path()).await?;
        Ok(())
    }
}

async fn exists(path: &ConfinedPath) -> LibraryResult<bool> {
    Ok(fs::try_exists(path.absolute()).await?)
}
