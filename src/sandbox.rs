//! Confinement of untrusted, client supplied paths to a configured root.
//!
//! All checks are lexical: the raw input is treated as relative, joined onto
//! the root and normalised (`.` and `..` collapsed) before the containment
//! test. Nothing here touches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{LibraryError, LibraryResult};

/// An absolute directory that resolved paths may never leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedRoot {
    path: PathBuf,
}

impl ConfinedRoot {
    /// Create a root from an absolute path. The path is normalised lexically.
    pub fn new(path: impl AsRef<Path>) -> LibraryResult<Self> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(LibraryError::InvalidArgument(
                "sandbox root cannot be empty".to_string(),
            ));
        }
        if !path.is_absolute() {
            return Err(LibraryError::InvalidArgument(format!(
                "sandbox root must be absolute: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: normalize(path),
        })
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

/// A path proven to lie inside its [`ConfinedRoot`].
///
/// Only [`PathSandbox::resolve`] can build one, so holding a `ConfinedPath`
/// means the containment check already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl ConfinedPath {
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the root; empty for the root itself.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// The containing directory. The parent of the root is the root.
    pub fn parent(&self) -> ConfinedPath {
        match (self.absolute.parent(), self.relative.parent()) {
            (Some(absolute), Some(relative)) if !self.is_root() => ConfinedPath {
                absolute: absolute.to_path_buf(),
                relative: relative.to_path_buf(),
            },
            _ => self.clone(),
        }
    }

    /// Relative path rendered with `/` separators regardless of platform.
    pub fn relative_url_path(&self) -> String {
        self.relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Resolves raw input against one root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: ConfinedRoot,
}

impl PathSandbox {
    pub fn new(root: ConfinedRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ConfinedRoot {
        &self.root
    }

    /// Resolve `raw` against the root, rejecting anything that would escape it.
    pub fn resolve(&self, raw: &str) -> LibraryResult<ConfinedPath> {
        resolve(&self.root, raw)
    }
}

/// Resolve an untrusted path against `root`.
pub fn resolve(root: &ConfinedRoot, raw: &str) -> LibraryResult<ConfinedPath> {
    if raw.contains('\0') {
        tracing::warn!("rejected path containing a NUL byte");
        return Err(LibraryError::rejected(raw.replace('\0', "\\0")));
    }

    let joined = root.path.join(strip_leading_separators(raw));
    let absolute = normalize(&joined);

    // Path::starts_with compares whole components, so `/media2` is not inside `/media`.
    if absolute != root.path && !absolute.starts_with(&root.path) {
        tracing::warn!("rejected path outside {}: {:?}", root.path.display(), raw);
        return Err(LibraryError::rejected(raw));
    }

    let relative = absolute
        .strip_prefix(&root.path)
        .map(Path::to_path_buf)
        .map_err(|_| LibraryError::rejected(raw))?;

    Ok(ConfinedPath { absolute, relative })
}

/// True when `raw` normalises to the root itself (`""`, `"."`, `"/"`, `"a/.."`).
pub fn is_root_relative(raw: &str) -> bool {
    normalize(Path::new(strip_leading_separators(raw)))
        .as_os_str()
        .is_empty()
}

fn strip_leading_separators(raw: &str) -> &str {
    raw.trim_start_matches(std::path::is_separator)
}

/// Collapse `.` and `..` without consulting the filesystem.
///
/// `..` never climbs above a root or prefix component; on a relative path a
/// leading `..` is kept so callers can still detect the escape.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }

    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sandbox() -> PathSandbox {
        PathSandbox::new(ConfinedRoot::new("/media").unwrap())
    }

    #[test]
    fn test_root_must_be_absolute() {
        assert!(matches!(
            ConfinedRoot::new("media"),
            Err(LibraryError::InvalidArgument(_))
        ));
        assert!(matches!(
            ConfinedRoot::new(""),
            Err(LibraryError::InvalidArgument(_))
        ));
        assert_eq!(
            ConfinedRoot::new("/srv/./music/../media").unwrap().as_path(),
            Path::new("/srv/media")
        );
    }

    #[test]
    fn test_resolve_inside_root() {
        let sandbox = sandbox();

        let resolved = sandbox.resolve("album/song.mp3").unwrap();
        assert_eq!(resolved.absolute(), Path::new("/media/album/song.mp3"));
        assert_eq!(resolved.relative(), Path::new("album/song.mp3"));
        assert!(!resolved.is_root());

        let resolved = sandbox.resolve("album/./disc1/../song.mp3").unwrap();
        assert_eq!(resolved.absolute(), Path::new("/media/album/song.mp3"));
    }

    #[test]
    fn test_resolve_empty_is_root() {
        let sandbox = sandbox();
        for raw in ["", ".", "/", "album/..", "///"] {
            let resolved = sandbox.resolve(raw).unwrap();
            assert_eq!(resolved.absolute(), Path::new("/media"), "input {:?}", raw);
            assert!(resolved.is_root());
        }
    }

    #[test]
    fn test_absolute_input_is_treated_as_relative() {
        let resolved = sandbox().resolve("/etc/passwd").unwrap();
        assert_eq!(resolved.absolute(), Path::new("/media/etc/passwd"));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let sandbox = sandbox();
        for raw in ["..", "../etc/passwd", "album/../../etc", "/../media2", "a/b/../../../x"] {
            assert!(
                matches!(sandbox.resolve(raw), Err(LibraryError::Rejected { .. })),
                "input {:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_rejected() {
        // `/media2` starts with the string `/media` but is not inside it.
        let result = sandbox().resolve("../media2/song.mp3");
        assert!(matches!(result, Err(LibraryError::Rejected { .. })));
    }

    #[test]
    fn test_climbing_out_and_back_in_is_accepted() {
        let resolved = sandbox().resolve("../media/album").unwrap();
        assert_eq!(resolved.absolute(), Path::new("/media/album"));
    }

    #[test]
    fn test_nul_byte_is_rejected() {
        assert!(matches!(
            sandbox().resolve("album\0/x"),
            Err(LibraryError::Rejected { .. })
        ));
    }

    #[test]
    fn test_confined_results_stay_under_root() {
        let sandbox = sandbox();
        let inputs = [
            "a", "a/b/c", "./a/../b", "a/b/../../c", "//x//y", "x/./y/./z", "deep/../../media",
        ];
        for raw in inputs {
            if let Ok(resolved) = sandbox.resolve(raw) {
                assert!(resolved.absolute().starts_with("/media"), "input {:?}", raw);
            }
        }
    }

    #[test]
    fn test_parent() {
        let sandbox = sandbox();

        let parent = sandbox.resolve("album/disc1").unwrap().parent();
        assert_eq!(parent.relative(), Path::new("album"));
        assert_eq!(parent.absolute(), Path::new("/media/album"));

        let parent = sandbox.resolve("album").unwrap().parent();
        assert!(parent.is_root());
        assert_eq!(parent.absolute(), Path::new("/media"));

        let root = sandbox.resolve("").unwrap();
        assert_eq!(root.parent(), root);
    }

    #[test]
    fn test_relative_url_path() {
        let resolved = sandbox().resolve("album//disc 1/").unwrap();
        assert_eq!(resolved.relative_url_path(), "album/disc 1");
        assert_eq!(sandbox().resolve("").unwrap().relative_url_path(), "");
    }

    #[test]
    fn test_is_root_relative() {
        assert!(is_root_relative(""));
        assert!(is_root_relative("."));
        assert!(is_root_relative("/"));
        assert!(is_root_relative("album/.."));
        assert!(!is_root_relative("album"));
        assert!(!is_root_relative(".."));
    }
}
