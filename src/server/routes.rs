//! Stream server route handlers
//!
//! Browsing and token issuance run behind the bearer middleware; the mix and
//! audio routes are authorised by capability tokens instead, so players that
//! cannot set headers can still fetch them.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::auth::Principal;
use super::error::ServerError;
use super::paths::{is_within, resolve_under};
use super::range::serve_source;
use super::server::ServerState;
use crate::source::{CompositeSource, FilePart, RandomAccessSource, SourceError};

/// File name advertised for mixes
pub const MIX_FILENAME: &str = "mix.mp3";

/// Query parameters for token-authorised routes
#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: Option<String>,
}

/// One directory entry in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub dir: bool,
}

/// Answer of the token route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Greet the verified caller
pub async fn welcome(Extension(principal): Extension<Principal>) -> String {
    format!("Welcome {}", principal.display_name())
}

/// List the library root
pub async fn list_root(State(state): State<ServerState>) -> Result<Json<Vec<FileEntry>>, ServerError> {
    list(&state, "").await
}

/// List a directory below the library root
pub async fn list_directory(
    State(state): State<ServerState>,
    Path(dir): Path<String>,
) -> Result<Json<Vec<FileEntry>>, ServerError> {
    list(&state, &dir).await
}

async fn list(state: &ServerState, dir: &str) -> Result<Json<Vec<FileEntry>>, ServerError> {
    let path = resolve_under(&state.library_root, dir)?;
    let list_failed = |e: std::io::Error| ServerError::ListFailed {
        path: dir.to_string(),
        reason: e.to_string(),
    };

    let mut reader = tokio::fs::read_dir(&path).await.map_err(list_failed)?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(list_failed)? {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            dir: is_dir,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!("Listed {} entries in {:?}", entries.len(), path);
    Ok(Json(entries))
}

/// Issue a capability token for a library path
pub async fn issue_token(
    State(state): State<ServerState>,
    Extension(principal): Extension<Principal>,
    Path(path): Path<String>,
) -> Result<Json<TokenResponse>, ServerError> {
    let target = resolve_under(&state.library_root, &path)?;
    if tokio::fs::metadata(&target).await.is_err() {
        tracing::debug!("Cannot stat {:?}", target);
        return Err(ServerError::NotFound { path });
    }

    let token = state.tokens.issue_token(path.as_str());
    tracing::info!(email = %principal.email, "Issued token for {}", path);
    Ok(Json(TokenResponse { token }))
}

/// Serve the concatenated `.mp3` files of a token's directory as one stream
pub async fn serve_mix(
    State(state): State<ServerState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let path = state.tokens.resolve(&token)?;
    let dir = resolve_under(&state.mp3_root, &path)?;

    let files = mp3_files(&dir).await.map_err(|e| ServerError::Internal {
        reason: format!("cannot read mix directory {:?}: {}", dir, e),
    })?;
    tracing::debug!("Mixing {} files from {:?}", files.len(), dir);

    let composite = tokio::task::spawn_blocking(move || CompositeSource::open(files))
        .await
        .map_err(|e| ServerError::Internal { reason: e.to_string() })??;

    let source: Arc<dyn RandomAccessSource> = Arc::new(composite);
    serve_source(source, &headers, "audio/mpeg", Some(MIX_FILENAME))
}

/// `.mp3` entries directly inside `dir`, sorted by name.
///
/// Symlinks are followed, since the mirror links back into the library. A
/// link whose target is gone is still listed so that opening it fails the
/// mix instead of silently shortening it.
async fn mp3_files(dir: &FsPath) -> std::io::Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("mp3"))
            .unwrap_or(false);
        if !is_mp3 {
            continue;
        }
        let is_dir = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.is_dir(),
            Err(_) => false,
        };
        if !is_dir {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Serve one library file, authorised by a token covering its path
pub async fn serve_audio(
    State(state): State<ServerState>,
    Path(file): Path<String>,
    Query(params): Query<TokenParams>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or(ServerError::InvalidQueryToken)?;
    let scope = state.tokens.resolve(&token).map_err(|e| {
        tracing::debug!("Query token rejected: {}", e);
        ServerError::InvalidQueryToken
    })?;

    if !is_within(&scope, &file)? {
        tracing::warn!("Token for {} used for {}", scope, file);
        return Err(ServerError::OutsideToken { path: file });
    }

    let path = resolve_under(&state.library_root, &file)?;
    let content_type = content_type_for(&path);
    let part = tokio::task::spawn_blocking(move || FilePart::open(path))
        .await
        .map_err(|e| ServerError::Internal { reason: e.to_string() })?
        .map_err(|e| match e {
            SourceError::PartOpenFailed { ref source, .. }
                if matches!(
                    source.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput
                ) =>
            {
                ServerError::NotFound { path: file.clone() }
            }
            other => ServerError::Source(other),
        })?;

    tracing::debug!("Serving {:?} ({} bytes)", part.path(), part.size());
    serve_source(Arc::new(part), &headers, content_type, None)
}

/// MIME type from a file extension
pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("flac") => "audio/flac",
        Some("mp3") => "audio/mpeg",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(FsPath::new("a/01.flac")), "audio/flac");
        assert_eq!(content_type_for(FsPath::new("a/01.MP3")), "audio/mpeg");
        assert_eq!(content_type_for(FsPath::new("a/01.ogg")), "audio/ogg");
        assert_eq!(content_type_for(FsPath::new("a/01.m4a")), "audio/mp4");
        assert_eq!(content_type_for(FsPath::new("a/cover.jpg")), "application/octet-stream");
        assert_eq!(content_type_for(FsPath::new("a/README")), "application/octet-stream");
    }

    #[test]
    fn test_token_params() {
        let params: TokenParams = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(params.token.as_deref(), Some("abc"));

        let params: TokenParams = serde_json::from_str("{}").unwrap();
        assert!(params.token.is_none());
    }

    #[tokio::test]
    async fn test_mp3_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["02.mp3", "01.MP3", "cover.jpg", "03.flac"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.mp3")).unwrap();

        let files = mp3_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01.MP3", "02.mp3"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mp3_files_follows_symlinks() {
        let library = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        std::fs::write(library.path().join("track.mp3"), b"x").unwrap();
        std::fs::create_dir(library.path().join("folder")).unwrap();

        std::os::unix::fs::symlink(library.path().join("track.mp3"), mirror.path().join("01.mp3")).unwrap();
        std::os::unix::fs::symlink(library.path().join("gone.mp3"), mirror.path().join("02.mp3")).unwrap();
        std::os::unix::fs::symlink(library.path().join("folder"), mirror.path().join("03.mp3")).unwrap();

        let files = mp3_files(mirror.path()).await.unwrap();
        assert_eq!(
            files,
            vec![mirror.path().join("01.mp3"), mirror.path().join("02.mp3")]
        );
    }
}
