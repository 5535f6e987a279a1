//! Library path handling
//!
//! Request paths are `/`-separated and always relative to one of the
//! configured roots. They are split into plain name components before being
//! joined to a root, so no request can step outside it.

use std::path::{Path, PathBuf};

use super::error::ServerError;

/// Split a request path into plain components.
///
/// Empty and `.` segments are dropped; `..` and segments carrying a
/// backslash or NUL are rejected.
pub fn relative_components(path: &str) -> Result<Vec<&str>, ServerError> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(|segment| {
            if segment == ".." || segment.contains(['\\', '\0']) {
                Err(ServerError::BadPath {
                    path: path.to_string(),
                })
            } else {
                Ok(segment)
            }
        })
        .collect()
}

/// Join a request path below `root`
pub fn resolve_under(root: &Path, path: &str) -> Result<PathBuf, ServerError> {
    let mut resolved = root.to_path_buf();
    for segment in relative_components(path)? {
        resolved.push(segment);
    }
    Ok(resolved)
}

/// Whether `path` names `scope` itself or something below it
pub fn is_within(scope: &str, path: &str) -> Result<bool, ServerError> {
    let scope = relative_components(scope)?;
    let path = relative_components(path)?;
    Ok(path.starts_with(&scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_components() {
        assert_eq!(relative_components("a/b/c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(relative_components("/a//./b/").unwrap(), vec!["a", "b"]);
        assert!(relative_components("").unwrap().is_empty());
        assert_eq!(
            relative_components("Artist - Album (1999)").unwrap(),
            vec!["Artist - Album (1999)"]
        );
    }

    #[test]
    fn test_traversal_rejected() {
        for bad in ["..", "a/../b", "../etc/passwd", "a/..", "a\\..\\b", "a\0b"] {
            assert!(
                matches!(relative_components(bad), Err(ServerError::BadPath { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_under() {
        let root = Path::new("/srv/music");
        assert_eq!(
            resolve_under(root, "Artist/Album").unwrap(),
            PathBuf::from("/srv/music/Artist/Album")
        );
        assert_eq!(resolve_under(root, "/abs").unwrap(), PathBuf::from("/srv/music/abs"));
        assert_eq!(resolve_under(root, "").unwrap(), PathBuf::from("/srv/music"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("Artist/Album", "Artist/Album/01.flac").unwrap());
        assert!(is_within("Artist/Album", "Artist/Album").unwrap());
        assert!(is_within("Artist", "Artist/Album/01.flac").unwrap());
        assert!(!is_within("Artist/Album", "Artist/Album 2/01.flac").unwrap());
        assert!(!is_within("Artist/Album", "Other/01.flac").unwrap());
        assert!(is_within("Artist/Album", "Artist/../x").is_err());
    }
}
