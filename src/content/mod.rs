//! Filtered, annotated and cached directory listings of the media root.

pub mod cache;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::sandbox::{ConfinedPath, PathSandbox};

pub use cache::ListingCache;

/// Characters left untouched when encoding a query component.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const PARENT_LINK_NAME: &str = "..";

/// Extensions listed when none are configured.
pub fn default_extensions() -> Vec<String> {
    vec!["mp3".to_string(), "flac".to_string(), "ogg".to_string()]
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub name: String,
    pub is_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Root relative, percent-encoded.
    pub path: String,
    pub enter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContentMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Boundary route a client follows to open an entry of this kind.
    pub fn route(self) -> &'static str {
        match self {
            EntryKind::File => "stream",
            EntryKind::Directory => "list",
        }
    }
}

/// Keeps every directory and the files whose extension is allowed.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    extensions: HashSet<String>,
}

impl EntryFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn accepts(&self, kind: EntryKind, name: &str) -> bool {
        match kind {
            EntryKind::Directory => true,
            EntryKind::File => self.has_allowed_extension(name),
        }
    }

    fn has_allowed_extension(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::new(default_extensions())
    }
}

/// Percent-encode a root relative path the way a URL query component expects.
pub fn encode_path(relative: &str) -> String {
    utf8_percent_encode(relative, QUERY_COMPONENT).to_string()
}

/// Lists directories under the media root.
#[derive(Clone)]
pub struct ContentLister {
    sandbox: PathSandbox,
    filter: EntryFilter,
    base_url: String,
    cache: ListingCache,
}

impl ContentLister {
    /// `base_url` prefixes every `enter` link, e.g. `http://10.0.0.2:3000`.
    pub fn new(
        sandbox: PathSandbox,
        filter: EntryFilter,
        base_url: impl Into<String>,
        cache: ListingCache,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            sandbox,
            filter,
            base_url,
            cache,
        }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// List `relative_path` under the media root.
    ///
    /// The path is confined before the cache is consulted, so a cached
    /// listing is never served for a path that would be rejected.
    pub async fn list(&self, relative_path: &str) -> LibraryResult<Vec<ContentEntry>> {
        let confined = self.sandbox.resolve(relative_path)?;

        if let Some(cached) = self.cache.get(relative_path).await {
            debug!("using cached listing for {:?}", relative_path);
            return Ok(cached.as_ref().clone());
        }

        debug!("reading listing for {:?} from disk", relative_path);
        let mut entries = Vec::new();
        if !confined.is_root() {
            entries.push(self.parent_link(&confined));
        }
        entries.extend(self.read_entries(&confined).await?);

        let entries = Arc::new(entries);
        self.cache
            .insert(relative_path.to_string(), entries.clone())
            .await;

        Ok(entries.as_ref().clone())
    }

    async fn read_entries(&self, dir: &ConfinedPath) -> LibraryResult<Vec<ContentEntry>> {
        let what = || format!("directory '{}'", dir.relative_url_path());

        let mut read_dir = fs::read_dir(dir.absolute())
            .await
            .map_err(|e| LibraryError::from_io(e, what()))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir.next_entry().await? {
            let name = dir_entry.file_name().to_string_lossy().into_owned();

            // Follows symlinks; a dangling link is skipped.
            let metadata = match fs::metadata(dir_entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("skipping {:?} in {:?}: {}", name, dir.relative(), e);
                    continue;
                }
            };

            let kind = if metadata.is_file() {
                EntryKind::File
            } else if metadata.is_dir() {
                EntryKind::Directory
            } else {
                debug!("skipping special file {:?}", name);
                continue;
            };

            if !self.filter.accepts(kind, &name) {
                continue;
            }

            let relative = join_url_path(&dir.relative_url_path(), &name);
            let size = (kind == EntryKind::File).then(|| metadata.len());
            entries.push(self.entry(name, kind, size, &relative));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn parent_link(&self, dir: &ConfinedPath) -> ContentEntry {
        let parent = dir.parent();
        self.entry(
            PARENT_LINK_NAME.to_string(),
            EntryKind::Directory,
            None,
            &parent.relative_url_path(),
        )
    }

    fn entry(&self, name: String, kind: EntryKind, size: Option<u64>, relative: &str) -> ContentEntry {
        let path = encode_path(relative);
        let enter = format!("{}/{}?path={}", self.base_url, kind.route(), path);

        ContentEntry {
            name,
            is_file: kind == EntryKind::File,
            size,
            path,
            enter,
            metadata: None,
        }
    }
}

fn join_url_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
